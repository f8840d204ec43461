//! Shared lists and their two-party deletion.
//!
//! A list is deleted only when every current member of its room has voted
//! for it. Membership can change after a vote was cast, so the quorum is
//! always evaluated against the room as it is now: reads settle a list whose
//! existing votes have become sufficient, and a member who joined after the
//! first vote has to vote as well.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::authorization::authorize_room;
use super::{
    Error, FieldUpdate, HouseholdPorts, List, ListDraft, ListId, ListUpdate, Room, RoomId, User,
};

/// Load `list_id` as seen from `room`, finalising a pending deletion that the
/// room's current members already agree on.
///
/// `NotFound` when the list does not exist, `Forbidden` when it belongs to a
/// different room.
pub(crate) async fn settled_list(
    ports: &HouseholdPorts,
    room: &Room,
    list_id: &ListId,
) -> Result<List, Error> {
    let list = ports
        .lists
        .find_by_id(list_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("list {list_id} not found")))?;
    if list.room_id != room.id {
        return Err(Error::forbidden("list belongs to another room"));
    }
    settle(ports, room, list).await
}

async fn settle(ports: &HouseholdPorts, room: &Room, mut list: List) -> Result<List, Error> {
    if list.is_deleted || !list.deletion_votes.covers(&room.member_ids) {
        return Ok(list);
    }
    let deleted = ports
        .lists
        .finalize_delete_if_voted_by_all(&list.id, &room.member_ids, ports.clock.utc())
        .await?;
    if deleted {
        info!(list_id = %list.id, room_id = %room.id, "pending list deletion settled");
        list.is_deleted = true;
    }
    Ok(list)
}

/// Like [`settled_list`], but a deleted list is `Forbidden`.
pub(crate) async fn live_list(
    ports: &HouseholdPorts,
    room: &Room,
    list_id: &ListId,
) -> Result<List, Error> {
    let list = settled_list(ports, room, list_id).await?;
    if list.is_deleted {
        return Err(Error::forbidden(format!("list {list_id} has been deleted")));
    }
    Ok(list)
}

/// List CRUD plus deletion votes.
#[derive(Clone)]
pub struct ListService {
    ports: HouseholdPorts,
}

impl ListService {
    pub fn new(ports: HouseholdPorts) -> Self {
        Self { ports }
    }

    fn now(&self) -> DateTime<Utc> {
        self.ports.clock.utc()
    }

    async fn authorize(&self, user: &User, room_id: &RoomId) -> Result<Room, Error> {
        authorize_room(self.ports.rooms.as_ref(), user, room_id).await
    }

    pub async fn create_list(
        &self,
        user: &User,
        room_id: &RoomId,
        draft: ListDraft,
    ) -> Result<List, Error> {
        let room = self.authorize(user, room_id).await?;
        let list = draft
            .into_list(ListId::random(), room.id, self.now())
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        self.ports.lists.insert(&list).await?;
        info!(list_id = %list.id, room_id = %room.id, user_id = %user.id, "list created");
        Ok(list)
    }

    /// Live lists of the room, oldest first.
    pub async fn list_lists(&self, user: &User, room_id: &RoomId) -> Result<Vec<List>, Error> {
        let room = self.authorize(user, room_id).await?;
        let mut live = Vec::new();
        for list in self.ports.lists.list_by_room(&room.id).await? {
            let list = settle(&self.ports, &room, list).await?;
            if !list.is_deleted {
                live.push(list);
            }
        }
        Ok(live)
    }

    /// A single live list. Deleted lists are `NotFound`.
    pub async fn get_list(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
    ) -> Result<List, Error> {
        let room = self.authorize(user, room_id).await?;
        let list = settled_list(&self.ports, &room, list_id).await?;
        if list.is_deleted {
            return Err(Error::not_found(format!("list {list_id} has been deleted")));
        }
        Ok(list)
    }

    pub async fn update_list(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
        update: ListUpdate,
    ) -> Result<List, Error> {
        let changes = update
            .validate()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let room = self.authorize(user, room_id).await?;
        let list = live_list(&self.ports, &room, list_id).await?;
        if changes.is_empty() {
            debug!(%list_id, "empty list update");
            return Ok(list);
        }

        let now = self.now();
        let lists = &self.ports.lists;
        let id = list.id;
        self.ports
            .transactions
            .run(Box::pin(async move {
                if let Some(name) = &changes.name {
                    lists.update_name(&id, name, now).await?;
                }
                match changes.description {
                    FieldUpdate::Unchanged => {}
                    FieldUpdate::Clear => lists.update_description(&id, None, now).await?,
                    FieldUpdate::Set(text) => lists.update_description(&id, Some(text), now).await?,
                }
                match changes.icon {
                    FieldUpdate::Unchanged => {}
                    FieldUpdate::Clear => lists.update_icon(&id, None, now).await?,
                    FieldUpdate::Set(icon) => lists.update_icon(&id, Some(icon), now).await?,
                }
                match changes.notes {
                    FieldUpdate::Unchanged => {}
                    FieldUpdate::Clear => lists.update_notes(&id, None, now).await?,
                    FieldUpdate::Set(text) => lists.update_notes(&id, Some(text), now).await?,
                }
                Ok::<(), Error>(())
            }))
            .await?;

        info!(%list_id, user_id = %user.id, "list updated");
        self.ports
            .lists
            .find_by_id(list_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("list {list_id} not found")))
    }

    /// Vote to delete a list. Returns whether the list is now deleted.
    pub async fn vote_list_deletion(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
    ) -> Result<bool, Error> {
        let room = self.authorize(user, room_id).await?;
        let list = live_list(&self.ports, &room, list_id).await?;
        let now = self.now();
        self.ports
            .lists
            .add_deletion_vote(&list.id, &user.id, now)
            .await?;

        // Membership may have changed since the guard ran.
        let room = self.authorize(user, room_id).await?;
        let deleted = self
            .ports
            .lists
            .finalize_delete_if_voted_by_all(&list.id, &room.member_ids, now)
            .await?;
        if deleted {
            info!(%list_id, %room_id, "list deleted by unanimous vote");
        } else {
            info!(%list_id, user_id = %user.id, "list deletion vote recorded");
        }
        Ok(deleted)
    }

    /// Withdraw the caller's vote. No-op when they had none.
    pub async fn cancel_list_deletion_vote(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
    ) -> Result<(), Error> {
        let room = self.authorize(user, room_id).await?;
        let list = live_list(&self.ports, &room, list_id).await?;
        let removed = self
            .ports
            .lists
            .remove_deletion_vote(&list.id, &user.id, self.now())
            .await?;
        if removed {
            info!(%list_id, user_id = %user.id, "list deletion vote withdrawn");
        } else {
            debug!(%list_id, user_id = %user.id, "no list deletion vote to withdraw");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "list_service_tests.rs"]
mod tests;
