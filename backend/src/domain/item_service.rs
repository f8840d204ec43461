//! Items of a list and their manual ordering.
//!
//! Sort keys come from [`super::ordering`]. Repositioning normally writes a
//! single key; when the gap between the requested neighbours has run out of
//! float precision the whole list is rewritten to evenly spaced keys first.
//! That rewrite is a series of single-item writes, so a concurrent reader can
//! observe a partly compacted list. The relative order never changes during
//! compaction, only the key values.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::authorization::authorize_room;
use super::list_service::live_list;
use super::ordering::{KeyPlan, Placement, append_key, compaction_keys, max_key, midpoint, plan_key};
use super::{Error, HouseholdPorts, ItemDraft, ItemId, ItemUpdate, List, ListId, ListItem, RoomId, User};

/// Item CRUD, archiving and reordering.
#[derive(Clone)]
pub struct ListItemService {
    ports: HouseholdPorts,
}

impl ListItemService {
    pub fn new(ports: HouseholdPorts) -> Self {
        Self { ports }
    }

    fn now(&self) -> DateTime<Utc> {
        self.ports.clock.utc()
    }

    /// Authorise the caller and load a live list of their room.
    async fn open_list(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
    ) -> Result<List, Error> {
        let room = authorize_room(self.ports.rooms.as_ref(), user, room_id).await?;
        live_list(&self.ports, &room, list_id).await
    }

    async fn item_in(&self, list: &List, item_id: &ItemId) -> Result<ListItem, Error> {
        let item = self
            .ports
            .items
            .find_by_id(item_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("item {item_id} not found")))?;
        if item.list_id != list.id || item.room_id != list.room_id {
            return Err(Error::forbidden("item belongs to another list"));
        }
        Ok(item)
    }

    async fn reload(&self, item_id: &ItemId) -> Result<ListItem, Error> {
        self.ports
            .items
            .find_by_id(item_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("item {item_id} not found")))
    }

    /// Append a new item to the end of the list.
    pub async fn create_item(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
        draft: ItemDraft,
    ) -> Result<ListItem, Error> {
        let draft = draft
            .validate()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let list = self.open_list(user, room_id, list_id).await?;
        let existing = self.ports.items.list_by_list(&list.id).await?;
        let now = self.now();
        let order = append_key(max_key(&existing), now);
        let item = draft.into_item(ItemId::random(), list.id, list.room_id, order, now);
        self.ports.items.insert(&item).await?;
        debug!(item_id = %item.id, %list_id, order, "item created");
        Ok(item)
    }

    /// Visible items in effective order. Archived items are never returned;
    /// completed ones only when asked for.
    pub async fn list_items(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
        include_completed: bool,
    ) -> Result<Vec<ListItem>, Error> {
        let list = self.open_list(user, room_id, list_id).await?;
        let mut items = self.ports.items.list_by_list(&list.id).await?;
        items.retain(|item| !item.is_archived && (include_completed || !item.completed));
        Ok(items)
    }

    pub async fn update_item(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
        item_id: &ItemId,
        update: ItemUpdate,
    ) -> Result<ListItem, Error> {
        let (details, completed, starred) = update
            .validate()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let list = self.open_list(user, room_id, list_id).await?;
        let item = self.item_in(&list, item_id).await?;
        if details.is_empty() && completed.is_none() && starred.is_none() {
            debug!(%item_id, "empty item update");
            return Ok(item);
        }

        let now = self.now();
        let items = &self.ports.items;
        let id = item.id;
        self.ports
            .transactions
            .run(Box::pin(async move {
                if !details.is_empty() {
                    items.update_details(&id, details, now).await?;
                }
                if let Some(completed) = completed {
                    items.update_completion(&id, completed, now).await?;
                }
                if let Some(starred) = starred {
                    items.update_starred(&id, starred, now).await?;
                }
                Ok::<(), Error>(())
            }))
            .await?;

        debug!(%item_id, %list_id, "item updated");
        self.reload(item_id).await
    }

    /// Archive every completed item. Returns how many were archived.
    pub async fn archive_completed_items(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
    ) -> Result<usize, Error> {
        let list = self.open_list(user, room_id, list_id).await?;
        let archived = self
            .ports
            .items
            .archive_completed(&list.id, self.now())
            .await?;
        info!(%list_id, archived, "completed items archived");
        Ok(archived)
    }

    pub async fn delete_item(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> Result<(), Error> {
        let list = self.open_list(user, room_id, list_id).await?;
        let item = self.item_in(&list, item_id).await?;
        self.ports.items.delete(&item.id).await?;
        debug!(%item_id, %list_id, "item deleted");
        Ok(())
    }

    /// Move an item between `prev` and `next`.
    ///
    /// Either neighbour may be omitted: only `prev` places the item after it,
    /// only `next` before it, neither at the end of the list. Neighbours must
    /// be other items of the same list.
    pub async fn reposition_item(
        &self,
        user: &User,
        room_id: &RoomId,
        list_id: &ListId,
        item_id: &ItemId,
        prev: Option<ItemId>,
        next: Option<ItemId>,
    ) -> Result<ListItem, Error> {
        if prev.is_some() && prev == next {
            return Err(Error::invalid_request("prev and next must differ"));
        }
        if prev.as_ref() == Some(item_id) || next.as_ref() == Some(item_id) {
            return Err(Error::invalid_request("an item cannot be its own neighbour"));
        }
        let list = self.open_list(user, room_id, list_id).await?;
        let item = self.item_in(&list, item_id).await?;
        let items = self.ports.items.list_by_list(&list.id).await?;

        let keys: HashMap<ItemId, f64> = items.iter().map(|i| (i.id, i.order)).collect();
        let key_of = |neighbour: Option<ItemId>| -> Result<Option<f64>, Error> {
            neighbour
                .map(|id| {
                    keys.get(&id).copied().ok_or_else(|| {
                        Error::invalid_request(format!("item {id} is not in list {list_id}"))
                    })
                })
                .transpose()
        };
        let placement = match (key_of(prev)?, key_of(next)?) {
            (Some(prev), Some(next)) => Placement::Between { prev, next },
            (Some(prev), None) => Placement::After(prev),
            (None, Some(next)) => Placement::Before(next),
            (None, None) => Placement::End,
        };

        let others: Vec<ListItem> = items
            .iter()
            .filter(|other| other.id != item.id)
            .cloned()
            .collect();
        let now = self.now();
        let order = match plan_key(placement, max_key(&others), now) {
            KeyPlan::Key(order) => order,
            KeyPlan::CompactFirst => {
                self.compact_and_bisect(&list.id, &items, prev, next, now)
                    .await?
            }
        };

        self.ports.items.update_order(&item.id, order, now).await?;
        debug!(%item_id, %list_id, order, "item repositioned");
        self.reload(item_id).await
    }

    /// Rewrite every key in the list, then bisect the new neighbour keys.
    async fn compact_and_bisect(
        &self,
        list_id: &ListId,
        items: &[ListItem],
        prev: Option<ItemId>,
        next: Option<ItemId>,
        now: DateTime<Utc>,
    ) -> Result<f64, Error> {
        let compacted = compaction_keys(items);
        for (id, key) in &compacted {
            self.ports.items.update_order(id, *key, now).await?;
        }
        info!(%list_id, items = compacted.len(), "list keys compacted");

        let keys: HashMap<ItemId, f64> = compacted.into_iter().collect();
        let lookup = |id: Option<ItemId>| id.and_then(|id| keys.get(&id).copied());
        match (lookup(prev), lookup(next)) {
            (Some(prev), Some(next)) => midpoint(prev, next)
                .ok_or_else(|| Error::internal("neighbour keys still too close after compaction")),
            _ => Err(Error::internal("neighbours vanished during compaction")),
        }
    }
}

#[cfg(test)]
#[path = "item_service_tests.rs"]
mod tests;
