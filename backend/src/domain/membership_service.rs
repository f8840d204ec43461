//! Room membership lifecycle.
//!
//! Creating, joining, leaving and dissolving rooms touches the room document
//! and one or two user documents. Each multi-document change runs inside the
//! [`TransactionRunner`](super::ports::TransactionRunner) and relies on the
//! room repository's conditional writes, so two racing callers cannot both
//! win: the loser sees a condition failure, surfaced as `Conflict`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::cleanup::submit_room_cleanup;
use super::{
    Error, FieldUpdate, HouseholdPorts, Room, RoomId, RoomName, RoomSettingsUpdate, ShareToken,
    ShareTokenSource, User,
};

/// What happens to the room a joiner is leaving behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// The joiner was alone; the room is deleted.
    Dissolve(RoomId),
    /// Someone else stays; the joiner is removed.
    Leave(RoomId),
}

/// Room creation, invitations, joins and unanimous-vote deletion.
#[derive(Clone)]
pub struct MembershipService {
    ports: HouseholdPorts,
    share_tokens: Arc<dyn ShareTokenSource>,
    default_room_name: RoomName,
}

impl MembershipService {
    pub fn new(
        ports: HouseholdPorts,
        share_tokens: Arc<dyn ShareTokenSource>,
        default_room_name: RoomName,
    ) -> Self {
        Self {
            ports,
            share_tokens,
            default_room_name,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.ports.clock.utc()
    }

    async fn current_room(&self, user: &User) -> Result<Room, Error> {
        let room_id = user
            .room_id
            .ok_or_else(|| Error::not_found("user is not in a room"))?;
        self.ports
            .rooms
            .find_by_id(&room_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("room {room_id} no longer exists")))
    }

    /// The caller's room.
    ///
    /// `NotFound` when the user has no room or it has been deleted.
    pub async fn get_my_room(&self, user: &User) -> Result<Room, Error> {
        self.current_room(user).await
    }

    /// Create a room holding only `user`.
    pub async fn create_solo_room(&self, user: &User) -> Result<Room, Error> {
        if user.room_id.is_some() {
            return Err(Error::conflict("user already belongs to a room"));
        }
        let now = self.now();
        let room = Room::solo(RoomId::random(), user.id, self.default_room_name.clone(), now);
        let (rooms, users) = (&self.ports.rooms, &self.ports.users);
        let (user_id, room_ref) = (user.id, &room);
        self.ports
            .transactions
            .run(Box::pin(async move {
                rooms.insert(room_ref).await?;
                users.assign_room_if_unset(&user_id, &room_ref.id, now).await?;
                Ok::<(), Error>(())
            }))
            .await?;

        info!(room_id = %room.id, user_id = %user.id, "solo room created");
        Ok(room)
    }

    /// Issue a fresh invite code, replacing any active one.
    pub async fn rotate_share_token(&self, user: &User) -> Result<ShareToken, Error> {
        let room = self.current_room(user).await?;
        let token = self.share_tokens.next_token();
        self.ports
            .rooms
            .set_share_token(&room.id, &user.id, &token, self.now())
            .await?;
        info!(room_id = %room.id, user_id = %user.id, "share token rotated");
        Ok(token)
    }

    /// Join `room_id` using its active share token.
    ///
    /// A joiner who already belongs to another room leaves it in the same
    /// transaction: a room they were alone in is deleted, a shared one keeps
    /// its other member.
    pub async fn join_room(
        &self,
        joiner: &User,
        room_id: &RoomId,
        token: &str,
    ) -> Result<Room, Error> {
        let target = self
            .ports
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("room {room_id} not found")))?;

        let active = match &target.share_token {
            Some(active) if !token.is_empty() && active.matches(token) => active.clone(),
            _ => return Err(Error::forbidden("share token is not valid for this room")),
        };
        if target.is_member(&joiner.id) {
            return Err(Error::conflict("user is already a member of this room"));
        }
        if target.is_full() {
            return Err(Error::conflict("room already has two members"));
        }

        let departure = self.plan_departure(joiner, room_id).await?;
        let now = self.now();
        let (rooms, users) = (&self.ports.rooms, &self.ports.users);
        let (joiner_id, target_id, previous) = (joiner.id, target.id, joiner.room_id);
        self.ports
            .transactions
            .run(Box::pin(async move {
                // Claim the joiner first: a second join built from the same
                // read of the user fails here before touching any room.
                users
                    .set_room_id_if(&joiner_id, previous, Some(target_id), now)
                    .await?;
                rooms.add_member(&target_id, &joiner_id, now).await?;
                rooms.consume_share_token(&target_id, &active, now).await?;
                match departure {
                    Some(Departure::Dissolve(old)) => {
                        rooms.delete_if_sole_member(&old, &joiner_id).await?;
                    }
                    Some(Departure::Leave(old)) => {
                        rooms.remove_member(&old, &joiner_id, now).await?;
                    }
                    None => {}
                }
                Ok::<(), Error>(())
            }))
            .await?;

        match departure {
            Some(Departure::Dissolve(old)) => {
                submit_room_cleanup(self.ports.cleanup.as_ref(), old, now).await;
            }
            Some(Departure::Leave(old)) => {
                settle_after_departure(&self.ports, &old, now).await;
            }
            None => {}
        }
        info!(room_id = %target_id, user_id = %joiner_id, ?departure, "user joined room");

        self.ports
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| Error::conflict("room was deleted while joining"))
    }

    async fn plan_departure(
        &self,
        joiner: &User,
        target: &RoomId,
    ) -> Result<Option<Departure>, Error> {
        let Some(current) = joiner.room_id.filter(|current| current != target) else {
            return Ok(None);
        };
        let departure = match self.ports.rooms.find_by_id(&current).await? {
            Some(room) if room.is_sole_member(&joiner.id) => Some(Departure::Dissolve(room.id)),
            Some(room) if room.is_member(&joiner.id) => Some(Departure::Leave(room.id)),
            _ => {
                debug!(user_id = %joiner.id, room_id = %current, "ignoring stale room reference");
                None
            }
        };
        Ok(departure)
    }

    /// Join whichever room currently advertises `token`.
    pub async fn join_room_by_token(&self, joiner: &User, token: &str) -> Result<Room, Error> {
        if token.trim().is_empty() {
            return Err(Error::invalid_request("share token must not be empty"));
        }
        let room = self
            .ports
            .rooms
            .find_by_share_token(token)
            .await?
            .ok_or_else(|| Error::not_found("no room has this share token"))?;
        self.join_room(joiner, &room.id, token).await
    }

    /// Vote to dissolve the caller's room. Returns whether the room is gone.
    ///
    /// The room is deleted once every current member has voted; a solo room
    /// therefore goes on its first vote.
    pub async fn vote_deletion(&self, voter: &User) -> Result<bool, Error> {
        let room = self.current_room(voter).await?;
        let now = self.now();
        self.ports
            .rooms
            .vote_deletion(&room.id, &voter.id, now)
            .await?;

        let Some(room) = self.ports.rooms.find_by_id(&room.id).await? else {
            debug!(room_id = %room.id, "room deleted by a concurrent vote");
            return Ok(true);
        };
        if !room.deletion_agreed() {
            info!(
                room_id = %room.id,
                user_id = %voter.id,
                votes = room.deletion_votes.len(),
                members = room.member_ids.len(),
                "room deletion vote recorded"
            );
            return Ok(false);
        }

        dissolve_room(&self.ports, &room, now).await?;
        Ok(true)
    }

    /// Withdraw the caller's deletion vote. No-op when they had none.
    pub async fn cancel_deletion_vote(&self, user: &User) -> Result<(), Error> {
        let room = self.current_room(user).await?;
        let removed = self
            .ports
            .rooms
            .remove_deletion_vote(&room.id, &user.id, self.now())
            .await?;
        if removed {
            info!(room_id = %room.id, user_id = %user.id, "room deletion vote withdrawn");
        } else {
            debug!(room_id = %room.id, user_id = %user.id, "no room deletion vote to withdraw");
        }
        Ok(())
    }

    /// Rename the room or change its description.
    pub async fn update_room_settings(
        &self,
        user: &User,
        update: RoomSettingsUpdate,
    ) -> Result<Room, Error> {
        let settings = update
            .validate()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let room = self.current_room(user).await?;
        let now = self.now();
        let rooms = &self.ports.rooms;
        let (room_id, user_id) = (room.id, user.id);
        self.ports
            .transactions
            .run(Box::pin(async move {
                if let Some(name) = &settings.display_name {
                    rooms
                        .update_display_name(&room_id, &user_id, name, now)
                        .await?;
                }
                match settings.description {
                    FieldUpdate::Unchanged => {}
                    FieldUpdate::Clear => {
                        rooms
                            .update_description(&room_id, &user_id, None, now)
                            .await?;
                    }
                    FieldUpdate::Set(text) => {
                        rooms
                            .update_description(&room_id, &user_id, Some(text), now)
                            .await?;
                    }
                }
                Ok::<(), Error>(())
            }))
            .await?;

        debug!(%room_id, %user_id, "room settings updated");
        self.ports
            .rooms
            .find_by_id(&room_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("room {room_id} no longer exists")))
    }

    /// Leave the caller's room.
    ///
    /// The other member, if any, keeps the room unless they had already
    /// voted to delete it. A room left by its only member is deleted instead
    /// of being left empty.
    pub async fn leave_room(&self, user: &User) -> Result<(), Error> {
        let room = self.current_room(user).await?;
        if !room.is_member(&user.id) {
            return Err(Error::forbidden("caller is not a member of this room"));
        }
        let now = self.now();
        let (rooms, users) = (&self.ports.rooms, &self.ports.users);
        let (room_id, user_id) = (room.id, user.id);
        let dissolve = room.is_sole_member(&user_id);
        self.ports
            .transactions
            .run(Box::pin(async move {
                users
                    .set_room_id_if(&user_id, Some(room_id), None, now)
                    .await?;
                if dissolve {
                    rooms.delete_if_sole_member(&room_id, &user_id).await?;
                } else {
                    rooms.remove_member(&room_id, &user_id, now).await?;
                }
                Ok::<(), Error>(())
            }))
            .await?;

        if dissolve {
            submit_room_cleanup(self.ports.cleanup.as_ref(), room_id, now).await;
        } else {
            settle_after_departure(&self.ports, &room_id, now).await;
        }
        info!(%room_id, %user_id, dissolved = dissolve, "user left room");
        Ok(())
    }
}

/// Delete a room whose members have all voted, then queue its cleanup.
async fn dissolve_room(
    ports: &HouseholdPorts,
    room: &Room,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let (rooms, users) = (&ports.rooms, &ports.users);
    let (room_id, members) = (room.id, room.member_ids.as_slice());
    let outcome = ports
        .transactions
        .run(Box::pin(async move {
            rooms.delete_if_voted_by_all(&room_id, members).await?;
            for member in members {
                users
                    .set_room_id_if(member, Some(room_id), None, now)
                    .await?;
            }
            Ok::<(), Error>(())
        }))
        .await;

    if let Err(error) = outcome {
        if ports.rooms.find_by_id(&room_id).await?.is_none() {
            debug!(%room_id, %error, "room already dissolved by a concurrent vote");
            return Ok(());
        }
        return Err(error);
    }

    submit_room_cleanup(ports.cleanup.as_ref(), room_id, now).await;
    info!(%room_id, members = members.len(), "room dissolved");
    Ok(())
}

/// Re-check the deletion quorum of a room someone just left.
///
/// Votes are counted against current members, so a departure can complete a
/// quorum that was already waiting on the leaver. Returns whether the room
/// was dissolved.
async fn settle_room_deletion(
    ports: &HouseholdPorts,
    room_id: &RoomId,
    now: DateTime<Utc>,
) -> Result<bool, Error> {
    match ports.rooms.find_by_id(room_id).await? {
        Some(room) if room.deletion_agreed() => {
            dissolve_room(ports, &room, now).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// [`settle_room_deletion`] for callers whose own change already committed.
pub(crate) async fn settle_after_departure(
    ports: &HouseholdPorts,
    room_id: &RoomId,
    now: DateTime<Utc>,
) {
    match settle_room_deletion(ports, room_id, now).await {
        Ok(true) => info!(%room_id, "departure completed the deletion quorum"),
        Ok(false) => {}
        Err(error) => warn!(%room_id, %error, "deletion quorum was not re-checked"),
    }
}

#[cfg(test)]
#[path = "membership_service_tests.rs"]
mod tests;
