//! Port abstraction for room persistence adapters.
//!
//! Besides plain reads, every mutation here is a narrow conditional update.
//! Adapters must evaluate the condition and apply the write atomically for
//! the one room document, the way a document store's conditional update
//! would. Engines rely on these conditions instead of in-process locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Room, RoomId, RoomName, ShareToken, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised when persisting or loading rooms.
    pub enum RoomRepositoryError {
        /// Store connection could not be established.
        Connection { message: String } => "room repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "room repository query failed: {message}",
        /// The addressed room does not exist.
        NotFound { message: String } => "room not found: {message}",
        /// The acting user is not a member of the room.
        NotMember { message: String } => "user is not a room member: {message}",
        /// A conditional write found the room in a different state.
        ConditionFailed { message: String } => "room condition failed: {message}",
    }
}

/// Storage for [`Room`] documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn insert(&self, room: &Room) -> Result<(), RoomRepositoryError>;

    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Room>, RoomRepositoryError>;

    /// Find the room whose active share token equals `token` exactly.
    async fn find_by_share_token(&self, token: &str) -> Result<Option<Room>, RoomRepositoryError>;

    /// Replace the active token. Requires `actor` to be a member.
    async fn set_share_token(
        &self,
        id: &RoomId,
        actor: &UserId,
        token: &ShareToken,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;

    /// Drop the active token, if any. Requires `actor` to be a member.
    async fn remove_share_token(
        &self,
        id: &RoomId,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;

    /// Clear the token only if it still equals `token`.
    async fn consume_share_token(
        &self,
        id: &RoomId,
        token: &ShareToken,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;

    /// Append `user` only if the room has exactly one member and `user` is
    /// not already it.
    async fn add_member(
        &self,
        id: &RoomId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;

    /// Remove `user` and their deletion vote. Fails with `ConditionFailed`
    /// when `user` is the last member; use [`Self::delete_if_sole_member`].
    async fn remove_member(
        &self,
        id: &RoomId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;

    /// Record `voter → at`. Requires `voter` to be a member.
    async fn vote_deletion(
        &self,
        id: &RoomId,
        voter: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;

    /// Withdraw `voter`'s vote. Returns whether a vote was present.
    async fn remove_deletion_vote(
        &self,
        id: &RoomId,
        voter: &UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, RoomRepositoryError>;

    /// Delete the room only if its member set still equals `members` and
    /// every one of them has voted.
    async fn delete_if_voted_by_all(
        &self,
        id: &RoomId,
        members: &[UserId],
    ) -> Result<(), RoomRepositoryError>;

    /// Delete the room only if `user` is its one and only member.
    async fn delete_if_sole_member(
        &self,
        id: &RoomId,
        user: &UserId,
    ) -> Result<(), RoomRepositoryError>;

    /// Requires `actor` to be a member.
    async fn update_display_name(
        &self,
        id: &RoomId,
        actor: &UserId,
        name: &RoomName,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;

    /// Set or clear the description. Requires `actor` to be a member.
    async fn update_description(
        &self,
        id: &RoomId,
        actor: &UserId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RoomRepositoryError>;
}
