//! Memory-backed `ListItemRepository`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::{MemoryStore, StoreFault};
use crate::domain::ports::{ListItemRepository, ListItemRepositoryError};
use crate::domain::{ItemDetails, ItemId, ListId, ListItem, sort_effective};

/// `ListItemRepository` over a shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryListItemRepository {
    store: Arc<MemoryStore>,
}

impl MemoryListItemRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn check(&self, operation: &'static str) -> Result<(), ListItemRepositoryError> {
        match self.store.take_fault(operation) {
            None => Ok(()),
            Some(StoreFault::Connection) => Err(ListItemRepositoryError::connection(operation)),
            Some(StoreFault::Query) => Err(ListItemRepositoryError::query(operation)),
        }
    }

    fn update(
        &self,
        operation: &'static str,
        id: &ItemId,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut ListItem),
    ) -> Result<(), ListItemRepositoryError> {
        self.check(operation)?;
        self.store.write(|w| {
            let item = w
                .item_mut(id)
                .ok_or_else(|| ListItemRepositoryError::not_found(id.to_string()))?;
            apply(item);
            item.updated_at = now;
            Ok(())
        })
    }

    fn ids_in_list(&self, list_id: &ListId, filter: impl Fn(&ListItem) -> bool) -> Vec<ItemId> {
        self.store.read(|s| {
            s.items
                .values()
                .filter(|item| item.list_id == *list_id && filter(item))
                .map(|item| item.id)
                .collect()
        })
    }
}

#[async_trait]
impl ListItemRepository for MemoryListItemRepository {
    async fn insert(&self, item: &ListItem) -> Result<(), ListItemRepositoryError> {
        self.check("items.insert")?;
        self.store.write(|w| {
            if w.state().items.contains_key(&item.id) {
                return Err(ListItemRepositoryError::query(format!(
                    "item {} already exists",
                    item.id
                )));
            }
            w.put_item(item.clone());
            Ok(())
        })
    }

    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ListItem>, ListItemRepositoryError> {
        self.check("items.find_by_id")?;
        Ok(self.store.read(|s| s.items.get(id).cloned()))
    }

    async fn list_by_list(
        &self,
        list_id: &ListId,
    ) -> Result<Vec<ListItem>, ListItemRepositoryError> {
        self.check("items.list_by_list")?;
        let mut items: Vec<ListItem> = self.store.read(|s| {
            s.items
                .values()
                .filter(|item| item.list_id == *list_id)
                .cloned()
                .collect()
        });
        sort_effective(&mut items);
        Ok(items)
    }

    async fn update_completion(
        &self,
        id: &ItemId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError> {
        self.update("items.update_completion", id, now, |item| {
            item.completed = completed;
        })
    }

    async fn update_starred(
        &self,
        id: &ItemId,
        starred: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError> {
        self.update("items.update_starred", id, now, |item| {
            item.is_starred = starred;
        })
    }

    async fn update_details(
        &self,
        id: &ItemId,
        details: ItemDetails,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError> {
        self.update("items.update_details", id, now, |item| details.apply_to(item))
    }

    async fn update_order(
        &self,
        id: &ItemId,
        order: f64,
        now: DateTime<Utc>,
    ) -> Result<(), ListItemRepositoryError> {
        self.update("items.update_order", id, now, |item| {
            item.order = order;
        })
    }

    async fn archive_completed(
        &self,
        list_id: &ListId,
        now: DateTime<Utc>,
    ) -> Result<usize, ListItemRepositoryError> {
        self.check("items.archive_completed")?;
        let ids = self.ids_in_list(list_id, |item| item.completed && !item.is_archived);
        // One write per document, as a document store would apply them.
        let mut archived = 0;
        for id in ids {
            let changed = self.store.write(|w| {
                Ok::<bool, ListItemRepositoryError>(match w.item_mut(&id) {
                    Some(item) if item.completed && !item.is_archived => {
                        item.is_archived = true;
                        item.updated_at = now;
                        true
                    }
                    _ => false,
                })
            })?;
            archived += usize::from(changed);
        }
        Ok(archived)
    }

    async fn delete(&self, id: &ItemId) -> Result<(), ListItemRepositoryError> {
        self.check("items.delete")?;
        self.store.write(|w| {
            w.remove_item(id)
                .map(|_| ())
                .ok_or_else(|| ListItemRepositoryError::not_found(id.to_string()))
        })
    }

    async fn delete_by_list(&self, list_id: &ListId) -> Result<usize, ListItemRepositoryError> {
        self.check("items.delete_by_list")?;
        let ids = self.ids_in_list(list_id, |_| true);
        let mut removed = 0;
        for id in ids {
            let gone = self.store.write(|w| {
                Ok::<bool, ListItemRepositoryError>(w.remove_item(&id).is_some())
            })?;
            removed += usize::from(gone);
        }
        Ok(removed)
    }
}
