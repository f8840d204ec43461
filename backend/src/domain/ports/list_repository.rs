//! Port abstraction for list persistence adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{List, ListIcon, ListId, ListName, RoomId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised when persisting or loading lists.
    pub enum ListRepositoryError {
        /// Store connection could not be established.
        Connection { message: String } => "list repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "list repository query failed: {message}",
        /// The addressed list does not exist.
        NotFound { message: String } => "list not found: {message}",
        /// A conditional write found the list in a different state, usually
        /// because it was deleted concurrently.
        ConditionFailed { message: String } => "list condition failed: {message}",
    }
}

/// Storage for [`List`] documents.
///
/// Edits and votes are conditioned on the list not being deleted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListRepository: Send + Sync {
    async fn insert(&self, list: &List) -> Result<(), ListRepositoryError>;

    async fn find_by_id(&self, id: &ListId) -> Result<Option<List>, ListRepositoryError>;

    /// Every list of a room, deleted ones included, oldest first.
    async fn list_by_room(&self, room_id: &RoomId) -> Result<Vec<List>, ListRepositoryError>;

    async fn update_name(
        &self,
        id: &ListId,
        name: &ListName,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError>;

    async fn update_description(
        &self,
        id: &ListId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError>;

    async fn update_icon(
        &self,
        id: &ListId,
        icon: Option<ListIcon>,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError>;

    async fn update_notes(
        &self,
        id: &ListId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError>;

    async fn add_deletion_vote(
        &self,
        id: &ListId,
        voter: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError>;

    /// Returns whether a vote was present.
    async fn remove_deletion_vote(
        &self,
        id: &ListId,
        voter: &UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, ListRepositoryError>;

    /// Mark the list deleted if every id in `members` has voted.
    ///
    /// Returns whether the list is deleted afterwards. A list that was
    /// already deleted reports `true`.
    async fn finalize_delete_if_voted_by_all(
        &self,
        id: &ListId,
        members: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<bool, ListRepositoryError>;

    /// Remove the document outright.
    async fn delete(&self, id: &ListId) -> Result<(), ListRepositoryError>;
}
