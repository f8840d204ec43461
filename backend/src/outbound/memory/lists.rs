//! Memory-backed `ListRepository`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::{MemoryStore, StoreFault};
use crate::domain::ports::{ListRepository, ListRepositoryError};
use crate::domain::{List, ListIcon, ListId, ListName, RoomId, UserId};

/// `ListRepository` over a shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryListRepository {
    store: Arc<MemoryStore>,
}

impl MemoryListRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn check(&self, operation: &'static str) -> Result<(), ListRepositoryError> {
        match self.store.take_fault(operation) {
            None => Ok(()),
            Some(StoreFault::Connection) => Err(ListRepositoryError::connection(operation)),
            Some(StoreFault::Query) => Err(ListRepositoryError::query(operation)),
        }
    }

    /// Apply `apply` to a live (not deleted) list and stamp `updated_at`.
    fn update_live<R>(
        &self,
        operation: &'static str,
        id: &ListId,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut List) -> R,
    ) -> Result<R, ListRepositoryError> {
        self.check(operation)?;
        self.store.write(|w| {
            let list = w
                .list_mut(id)
                .ok_or_else(|| ListRepositoryError::not_found(id.to_string()))?;
            if list.is_deleted {
                return Err(ListRepositoryError::condition_failed(format!(
                    "list {id} is deleted"
                )));
            }
            let outcome = apply(list);
            list.updated_at = now;
            Ok(outcome)
        })
    }
}

#[async_trait]
impl ListRepository for MemoryListRepository {
    async fn insert(&self, list: &List) -> Result<(), ListRepositoryError> {
        self.check("lists.insert")?;
        self.store.write(|w| {
            if w.state().lists.contains_key(&list.id) {
                return Err(ListRepositoryError::condition_failed(format!(
                    "list {} already exists",
                    list.id
                )));
            }
            w.put_list(list.clone());
            Ok(())
        })
    }

    async fn find_by_id(&self, id: &ListId) -> Result<Option<List>, ListRepositoryError> {
        self.check("lists.find_by_id")?;
        Ok(self.store.read(|s| s.lists.get(id).cloned()))
    }

    async fn list_by_room(&self, room_id: &RoomId) -> Result<Vec<List>, ListRepositoryError> {
        self.check("lists.list_by_room")?;
        let mut lists: Vec<List> = self.store.read(|s| {
            s.lists
                .values()
                .filter(|list| list.room_id == *room_id)
                .cloned()
                .collect()
        });
        lists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(lists)
    }

    async fn update_name(
        &self,
        id: &ListId,
        name: &ListName,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError> {
        self.update_live("lists.update_name", id, now, |list| {
            list.name = name.clone();
        })
    }

    async fn update_description(
        &self,
        id: &ListId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError> {
        self.update_live("lists.update_description", id, now, |list| {
            list.description = description;
        })
    }

    async fn update_icon(
        &self,
        id: &ListId,
        icon: Option<ListIcon>,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError> {
        self.update_live("lists.update_icon", id, now, |list| {
            list.icon = icon;
        })
    }

    async fn update_notes(
        &self,
        id: &ListId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError> {
        self.update_live("lists.update_notes", id, now, |list| {
            list.notes = notes;
        })
    }

    async fn add_deletion_vote(
        &self,
        id: &ListId,
        voter: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), ListRepositoryError> {
        self.update_live("lists.add_deletion_vote", id, at, |list| {
            list.deletion_votes.record(*voter, at);
        })
    }

    async fn remove_deletion_vote(
        &self,
        id: &ListId,
        voter: &UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, ListRepositoryError> {
        self.update_live("lists.remove_deletion_vote", id, now, |list| {
            list.deletion_votes.withdraw(voter)
        })
    }

    async fn finalize_delete_if_voted_by_all(
        &self,
        id: &ListId,
        members: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<bool, ListRepositoryError> {
        self.check("lists.finalize_delete_if_voted_by_all")?;
        self.store.write(|w| {
            let list = w
                .list_mut(id)
                .ok_or_else(|| ListRepositoryError::not_found(id.to_string()))?;
            if list.is_deleted {
                return Ok(true);
            }
            if !list.deletion_votes.covers(members) {
                return Ok(false);
            }
            list.is_deleted = true;
            list.updated_at = now;
            Ok(true)
        })
    }

    async fn delete(&self, id: &ListId) -> Result<(), ListRepositoryError> {
        self.check("lists.delete")?;
        self.store.write(|w| {
            w.remove_list(id)
                .map(|_| ())
                .ok_or_else(|| ListRepositoryError::not_found(id.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListDraft;
    use rstest::{fixture, rstest};

    #[fixture]
    async fn seeded() -> (MemoryListRepository, List) {
        let repo = MemoryListRepository::new(Arc::new(MemoryStore::new()));
        let list = ListDraft {
            name: "Groceries".to_owned(),
            ..ListDraft::default()
        }
        .into_list(ListId::random(), RoomId::random(), Utc::now())
        .expect("valid list");
        repo.insert(&list).await.expect("insert");
        (repo, list)
    }

    #[rstest]
    #[tokio::test]
    async fn finalize_waits_for_every_member(#[future] seeded: (MemoryListRepository, List)) {
        let (repo, list) = seeded.await;
        let (alice, bob) = (UserId::random(), UserId::random());
        repo.add_deletion_vote(&list.id, &alice, Utc::now())
            .await
            .expect("vote");
        assert!(!repo
            .finalize_delete_if_voted_by_all(&list.id, &[alice, bob], Utc::now())
            .await
            .expect("finalize"));
        assert!(repo
            .finalize_delete_if_voted_by_all(&list.id, &[alice], Utc::now())
            .await
            .expect("finalize"));
    }

    #[rstest]
    #[tokio::test]
    async fn deleted_lists_reject_edits(#[future] seeded: (MemoryListRepository, List)) {
        let (repo, list) = seeded.await;
        let alice = UserId::random();
        repo.add_deletion_vote(&list.id, &alice, Utc::now())
            .await
            .expect("vote");
        repo.finalize_delete_if_voted_by_all(&list.id, &[alice], Utc::now())
            .await
            .expect("finalize");

        let error = repo
            .update_notes(&list.id, Some("late".to_owned()), Utc::now())
            .await
            .expect_err("deleted");
        assert!(matches!(error, ListRepositoryError::ConditionFailed { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn list_by_room_filters_by_owner(#[future] seeded: (MemoryListRepository, List)) {
        let (repo, list) = seeded.await;
        assert_eq!(repo.list_by_room(&list.room_id).await.expect("list").len(), 1);
        assert!(repo
            .list_by_room(&RoomId::random())
            .await
            .expect("list")
            .is_empty());
    }
}
