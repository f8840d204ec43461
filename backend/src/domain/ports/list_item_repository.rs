//! Port abstraction for list item persistence adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ItemDetails, ItemId, ListId, ListItem};

use super::define_port_error;

define_port_error! {
    /// Errors raised when persisting or loading list items.
    pub enum ListItemRepositoryError {
        /// Store connection could not be established.
        Connection { message: String } => "item repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "item repository query failed: {message}",
        /// The addressed item does not exist.
        NotFound { message: String } => "item not found: {message}",
    }
}

/// Storage for [`ListItem`] documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListItemRepository: Send + Sync {
    async fn insert(&self, item: &ListItem) -> Result<(), ListItemRepositoryError>;

    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ListItem>, ListItemRepositoryError>;

    /// Every item of a list, archived ones included, in effective order.
    async fn list_by_list(&self, list_id: &ListId)
    -> Result<Vec<ListItem>, ListItemRepositoryError>;

    async fn update_completion(
        &self,
        id: &ItemId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError>;

    async fn update_starred(
        &self,
        id: &ItemId,
        starred: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError>;

    async fn update_details(
        &self,
        id: &ItemId,
        details: ItemDetails,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError>;

    async fn update_order(
        &self,
        id: &ItemId,
        order: f64,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError>;

    /// Archive every completed, unarchived item. Returns how many changed.
    async fn archive_completed(
        &self,
        list_id: &ListId,
        now: DateTime<Utc>,
    ) -> Result<usize, ListItemRepositoryError>;

    async fn delete(&self, id: &ItemId) -> Result<(), ListItemRepositoryError>;

    /// Remove every item of a list. Returns how many were removed.
    async fn delete_by_list(&self, list_id: &ListId) -> Result<usize, ListItemRepositoryError>;
}
