//! Memory-backed `RoomRepository` with conditional updates.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::{MemoryStore, StoreFault};
use crate::domain::ports::{RoomRepository, RoomRepositoryError};
use crate::domain::{MAX_MEMBERS, Room, RoomId, RoomName, ShareToken, UserId};

/// `RoomRepository` over a shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryRoomRepository {
    store: Arc<MemoryStore>,
}

impl MemoryRoomRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn check(&self, operation: &'static str) -> Result<(), RoomRepositoryError> {
        match self.store.take_fault(operation) {
            None => Ok(()),
            Some(StoreFault::Connection) => Err(RoomRepositoryError::connection(operation)),
            Some(StoreFault::Query) => Err(RoomRepositoryError::query(operation)),
        }
    }

    /// Load the room for writing, apply `apply`, and stamp `updated_at`.
    fn update<R>(
        &self,
        operation: &'static str,
        id: &RoomId,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut Room) -> Result<R, RoomRepositoryError>,
    ) -> Result<R, RoomRepositoryError> {
        self.check(operation)?;
        self.store.write(|w| {
            let room = w
                .room_mut(id)
                .ok_or_else(|| RoomRepositoryError::not_found(id.to_string()))?;
            let outcome = apply(room)?;
            room.updated_at = now;
            Ok(outcome)
        })
    }

    /// As [`Self::update`], but only for a current member.
    fn update_as_member<R>(
        &self,
        operation: &'static str,
        id: &RoomId,
        actor: &UserId,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut Room) -> R,
    ) -> Result<R, RoomRepositoryError> {
        self.update(operation, id, now, |room| {
            ensure_member(room, actor)?;
            Ok(apply(room))
        })
    }

    fn delete_when(
        &self,
        operation: &'static str,
        id: &RoomId,
        condition: impl FnOnce(&Room) -> Result<(), RoomRepositoryError>,
    ) -> Result<(), RoomRepositoryError> {
        self.check(operation)?;
        self.store.write(|w| {
            let room = w
                .state()
                .rooms
                .get(id)
                .ok_or_else(|| RoomRepositoryError::not_found(id.to_string()))?;
            condition(room)?;
            w.remove_room(id);
            Ok(())
        })
    }
}

fn ensure_member(room: &Room, user: &UserId) -> Result<(), RoomRepositoryError> {
    if room.is_member(user) {
        Ok(())
    } else {
        Err(RoomRepositoryError::not_member(format!(
            "user {user} in room {}",
            room.id
        )))
    }
}

#[async_trait]
impl RoomRepository for MemoryRoomRepository {
    async fn insert(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        self.check("rooms.insert")?;
        self.store.write(|w| {
            if w.state().rooms.contains_key(&room.id) {
                return Err(RoomRepositoryError::condition_failed(format!(
                    "room {} already exists",
                    room.id
                )));
            }
            w.put_room(room.clone());
            Ok(())
        })
    }

    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Room>, RoomRepositoryError> {
        self.check("rooms.find_by_id")?;
        Ok(self.store.read(|s| s.rooms.get(id).cloned()))
    }

    async fn find_by_share_token(&self, token: &str) -> Result<Option<Room>, RoomRepositoryError> {
        self.check("rooms.find_by_share_token")?;
        Ok(self.store.read(|s| {
            s.rooms
                .values()
                .find(|room| room.share_token.as_ref().is_some_and(|t| t.matches(token)))
                .cloned()
        }))
    }

    async fn set_share_token(
        &self,
        id: &RoomId,
        actor: &UserId,
        token: &ShareToken,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update_as_member("rooms.set_share_token", id, actor, now, |room| {
            room.share_token = Some(token.clone());
        })
    }

    async fn remove_share_token(
        &self,
        id: &RoomId,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update_as_member("rooms.remove_share_token", id, actor, now, |room| {
            room.share_token = None;
        })
    }

    async fn consume_share_token(
        &self,
        id: &RoomId,
        token: &ShareToken,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update("rooms.consume_share_token", id, now, |room| {
            if room.share_token.as_ref() != Some(token) {
                return Err(RoomRepositoryError::condition_failed(
                    "share token is no longer active",
                ));
            }
            room.share_token = None;
            Ok(())
        })
    }

    async fn add_member(
        &self,
        id: &RoomId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update("rooms.add_member", id, now, |room| {
            if room.member_ids.len() != 1 || room.is_member(user) {
                return Err(RoomRepositoryError::condition_failed(format!(
                    "room {} cannot take user {user}: {} of {MAX_MEMBERS} members",
                    room.id,
                    room.member_ids.len()
                )));
            }
            room.member_ids.push(*user);
            Ok(())
        })
    }

    async fn remove_member(
        &self,
        id: &RoomId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update("rooms.remove_member", id, now, |room| {
            ensure_member(room, user)?;
            if room.member_ids.len() <= 1 {
                return Err(RoomRepositoryError::condition_failed(format!(
                    "user {user} is the last member of room {}",
                    room.id
                )));
            }
            room.member_ids.retain(|member| member != user);
            room.deletion_votes.withdraw(user);
            Ok(())
        })
    }

    async fn vote_deletion(
        &self,
        id: &RoomId,
        voter: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update_as_member("rooms.vote_deletion", id, voter, at, |room| {
            room.deletion_votes.record(*voter, at);
        })
    }

    async fn remove_deletion_vote(
        &self,
        id: &RoomId,
        voter: &UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, RoomRepositoryError> {
        self.update("rooms.remove_deletion_vote", id, now, |room| {
            Ok(room.deletion_votes.withdraw(voter))
        })
    }

    async fn delete_if_voted_by_all(
        &self,
        id: &RoomId,
        members: &[UserId],
    ) -> Result<(), RoomRepositoryError> {
        self.delete_when("rooms.delete_if_voted_by_all", id, |room| {
            if room.member_ids.as_slice() != members || !room.deletion_agreed() {
                return Err(RoomRepositoryError::condition_failed(format!(
                    "room {} membership or votes changed",
                    room.id
                )));
            }
            Ok(())
        })
    }

    async fn delete_if_sole_member(
        &self,
        id: &RoomId,
        user: &UserId,
    ) -> Result<(), RoomRepositoryError> {
        self.delete_when("rooms.delete_if_sole_member", id, |room| {
            if !room.is_sole_member(user) {
                return Err(RoomRepositoryError::condition_failed(format!(
                    "user {user} is not the sole member of room {}",
                    room.id
                )));
            }
            Ok(())
        })
    }

    async fn update_display_name(
        &self,
        id: &RoomId,
        actor: &UserId,
        name: &RoomName,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update_as_member("rooms.update_display_name", id, actor, now, |room| {
            room.display_name = name.clone();
        })
    }

    async fn update_description(
        &self,
        id: &RoomId,
        actor: &UserId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError> {
        self.update_as_member("rooms.update_description", id, actor, now, |room| {
            room.description = description;
        })
    }
}
