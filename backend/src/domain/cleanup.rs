//! Post-dissolution cleanup of a room's lists and items.
//!
//! When a room is deleted its lists become unreachable. Removing them is the
//! one piece of work the engines detach: the job is queued after the deletion
//! commits and a background worker drains it. Failures are logged here and
//! never reach the user whose action dissolved the room.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::ports::{ListItemRepository, ListRepository, RoomCleanupQueue};
use super::{Error, RoomId, TraceId};

/// Request to remove everything a dissolved room owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCleanupJob {
    pub room_id: RoomId,
    /// Trace of the request that dissolved the room.
    pub trace_id: TraceId,
    pub requested_at: DateTime<Utc>,
}

impl RoomCleanupJob {
    /// Build a job correlated with the trace currently in scope.
    pub fn new(room_id: RoomId, requested_at: DateTime<Utc>) -> Self {
        Self {
            room_id,
            trace_id: TraceId::current_or_generate(),
            requested_at,
        }
    }
}

/// Queue cleanup for a room that was just deleted.
///
/// Runs after the deletion committed, so a refused submission is logged and
/// otherwise ignored.
pub(crate) async fn submit_room_cleanup(
    queue: &dyn RoomCleanupQueue,
    room_id: RoomId,
    now: DateTime<Utc>,
) {
    match queue.enqueue(RoomCleanupJob::new(room_id, now)).await {
        Ok(()) => debug!(%room_id, "room cleanup submitted"),
        Err(error) => warn!(%room_id, %error, "room cleanup was not submitted"),
    }
}

/// Outcome of one cleanup job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub lists_removed: usize,
    pub items_removed: usize,
    /// Lists that could not be fully removed and were left in place.
    pub lists_failed: usize,
}

/// Deletes the lists of dissolved rooms together with their items.
#[derive(Clone)]
pub struct RoomCleanupWorker {
    lists: Arc<dyn ListRepository>,
    items: Arc<dyn ListItemRepository>,
}

impl RoomCleanupWorker {
    pub fn new(lists: Arc<dyn ListRepository>, items: Arc<dyn ListItemRepository>) -> Self {
        Self { lists, items }
    }

    /// Run one job with its originating trace in scope.
    ///
    /// Only a failure to enumerate the room's lists is returned as an error.
    /// A list that fails part-way is counted in
    /// [`CleanupReport::lists_failed`] and the job moves on.
    pub async fn process(&self, job: &RoomCleanupJob) -> Result<CleanupReport, Error> {
        TraceId::scope(job.trace_id, self.process_in_scope(job.room_id)).await
    }

    async fn process_in_scope(&self, room_id: RoomId) -> Result<CleanupReport, Error> {
        let lists = self.lists.list_by_room(&room_id).await?;
        if lists.is_empty() {
            debug!(%room_id, "dissolved room owned no lists");
            return Ok(CleanupReport::default());
        }

        let mut report = CleanupReport::default();
        for list in lists {
            let items_removed = match self.items.delete_by_list(&list.id).await {
                Ok(count) => count,
                Err(error) => {
                    warn!(%room_id, list_id = %list.id, %error, "failed to delete list items");
                    report.lists_failed += 1;
                    continue;
                }
            };
            report.items_removed += items_removed;
            match self.lists.delete(&list.id).await {
                Ok(()) => report.lists_removed += 1,
                Err(error) => {
                    warn!(%room_id, list_id = %list.id, %error, "failed to delete list");
                    report.lists_failed += 1;
                }
            }
        }

        info!(
            %room_id,
            lists_removed = report.lists_removed,
            items_removed = report.items_removed,
            lists_failed = report.lists_failed,
            "room cleanup finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        ListItemRepositoryError, ListRepositoryError, MockListItemRepository, MockListRepository,
    };
    use crate::domain::{ErrorCode, List, ListDraft, ListId};
    use rstest::{fixture, rstest};

    fn list_in(room_id: RoomId) -> List {
        ListDraft {
            name: "Groceries".to_owned(),
            ..ListDraft::default()
        }
        .into_list(ListId::random(), room_id, Utc::now())
        .expect("valid list")
    }

    #[fixture]
    fn room_id() -> RoomId {
        RoomId::random()
    }

    #[rstest]
    #[tokio::test]
    async fn removes_every_list_and_its_items(room_id: RoomId) {
        let lists = vec![list_in(room_id), list_in(room_id)];
        let mut list_repo = MockListRepository::new();
        list_repo
            .expect_list_by_room()
            .times(1)
            .return_once(move |_| Ok(lists));
        list_repo.expect_delete().times(2).returning(|_| Ok(()));
        let mut item_repo = MockListItemRepository::new();
        item_repo
            .expect_delete_by_list()
            .times(2)
            .returning(|_| Ok(3));

        let worker = RoomCleanupWorker::new(Arc::new(list_repo), Arc::new(item_repo));
        let report = worker
            .process(&RoomCleanupJob::new(room_id, Utc::now()))
            .await
            .expect("cleanup succeeds");

        assert_eq!(
            report,
            CleanupReport {
                lists_removed: 2,
                items_removed: 6,
                lists_failed: 0,
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn keeps_going_after_item_failure(room_id: RoomId) {
        let lists = vec![list_in(room_id), list_in(room_id)];
        let failing = lists[0].id;
        let mut list_repo = MockListRepository::new();
        list_repo
            .expect_list_by_room()
            .return_once(move |_| Ok(lists));
        list_repo.expect_delete().times(1).returning(|_| Ok(()));
        let mut item_repo = MockListItemRepository::new();
        item_repo.expect_delete_by_list().returning(move |id| {
            if *id == failing {
                Err(ListItemRepositoryError::connection("reset"))
            } else {
                Ok(1)
            }
        });

        let worker = RoomCleanupWorker::new(Arc::new(list_repo), Arc::new(item_repo));
        let report = worker
            .process(&RoomCleanupJob::new(room_id, Utc::now()))
            .await
            .expect("cleanup completes");

        assert_eq!(report.lists_removed, 1);
        assert_eq!(report.lists_failed, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn enumeration_failure_is_returned(room_id: RoomId) {
        let mut list_repo = MockListRepository::new();
        list_repo
            .expect_list_by_room()
            .return_once(|_| Err(ListRepositoryError::connection("down")));
        let worker =
            RoomCleanupWorker::new(Arc::new(list_repo), Arc::new(MockListItemRepository::new()));

        let error = worker
            .process(&RoomCleanupJob::new(room_id, Utc::now()))
            .await
            .expect_err("listing fails");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn job_captures_current_trace() {
        let trace_id = TraceId::generate();
        let job = TraceId::scope(trace_id, async { RoomCleanupJob::new(RoomId::random(), Utc::now()) })
            .await;
        assert_eq!(job.trace_id, trace_id);
    }
}
