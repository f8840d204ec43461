//! Port abstraction for user persistence adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{RoomId, User, UserId, UserName, Username};

use super::define_port_error;

define_port_error! {
    /// Errors raised when persisting or loading users.
    pub enum UserRepositoryError {
        /// Store connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
        /// The addressed user does not exist.
        NotFound { message: String } => "user not found: {message}",
        /// A unique field (id or username) is already taken.
        Duplicate { message: String } => "user already exists: {message}",
        /// A conditional write found the document in a different state.
        ConditionFailed { message: String } => "user condition failed: {message}",
    }
}

/// Storage for [`User`] documents. Each call is atomic for one user only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Duplicate` when the id or username is
    /// already present.
    async fn insert(&self, user: &User) -> Result<(), UserRepositoryError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, UserRepositoryError>;

    /// Set `room_id` only when the user currently has none.
    ///
    /// Fails with `ConditionFailed` when a room is already assigned.
    async fn assign_room_if_unset(
        &self,
        id: &UserId,
        room_id: &RoomId,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError>;

    /// Replace `room_id` only while it still equals `expected`.
    ///
    /// Fails with `ConditionFailed` when another write moved the user first.
    async fn set_room_id_if(
        &self,
        id: &UserId,
        expected: Option<RoomId>,
        room_id: Option<RoomId>,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError>;

    async fn update_name(
        &self,
        id: &UserId,
        name: &UserName,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError>;

    /// Change the login handle. Fails with `Duplicate` when another user
    /// holds it.
    async fn update_username(
        &self,
        id: &UserId,
        username: &Username,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError>;

    async fn delete(&self, id: &UserId) -> Result<(), UserRepositoryError>;
}
