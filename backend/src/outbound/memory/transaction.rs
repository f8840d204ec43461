//! Transaction runners for the memory store.
//!
//! [`MemoryTransactionRunner`] gives all-or-nothing semantics: every write
//! made while the unit of work runs is journalled, and the journal is
//! replayed backwards if the unit fails or is dropped before finishing.
//! [`SequentialTransactionRunner`] models a store without multi-document
//! transactions: writes stick as they happen.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::{Journal, MemoryStore};
use crate::domain::Error;
use crate::domain::ports::{TransactionMode, TransactionRunner, TransactionWork};

/// All-or-nothing runner over a [`MemoryStore`].
///
/// Units of work are serialised against each other. Writes made outside a
/// transaction are not, so a rollback may overwrite a concurrent
/// non-transactional write to the same document. Not re-entrant: a unit of
/// work must not start another transaction on the same runner.
#[derive(Debug)]
pub struct MemoryTransactionRunner {
    store: Arc<MemoryStore>,
    gate: Mutex<()>,
}

impl MemoryTransactionRunner {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
        }
    }
}

/// Rolls the journal back unless disarmed.
struct RollbackGuard<'a> {
    store: &'a MemoryStore,
    journal: Journal,
    armed: bool,
}

impl RollbackGuard<'_> {
    fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let entries = self.journal.take();
            debug!(undone = entries.len(), "rolling back transaction");
            self.store.rollback(entries);
        }
    }
}

#[async_trait]
impl TransactionRunner for MemoryTransactionRunner {
    fn mode(&self) -> TransactionMode {
        TransactionMode::Atomic
    }

    async fn run<'a>(&self, work: TransactionWork<'a>) -> Result<(), Error> {
        let _serialised = self.gate.lock().await;
        let journal = Journal::default();
        let guard = RollbackGuard {
            store: &self.store,
            journal: journal.clone(),
            armed: true,
        };
        let outcome = journal.scope(work).await;
        match &outcome {
            Ok(()) => guard.commit(),
            Err(error) => {
                debug!(%error, "unit of work failed");
                drop(guard);
            }
        }
        outcome
    }
}

/// Best-effort runner: writes apply one at a time and are never undone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialTransactionRunner;

#[async_trait]
impl TransactionRunner for SequentialTransactionRunner {
    fn mode(&self) -> TransactionMode {
        TransactionMode::Sequential
    }

    async fn run<'a>(&self, work: TransactionWork<'a>) -> Result<(), Error> {
        let outcome = work.await;
        if let Err(error) = &outcome {
            warn!(
                %error,
                code = ?error.code(),
                "unit of work failed without a transaction; earlier writes were kept"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{RoomRepository, UserRepository};
    use crate::domain::{DEFAULT_ROOM_NAME, Room, RoomId, RoomName, User, UserId, UserName};
    use crate::outbound::memory::{MemoryRoomRepository, MemoryUserRepository};
    use chrono::Utc;
    use rstest::{fixture, rstest};

    struct Harness {
        store: Arc<MemoryStore>,
        users: MemoryUserRepository,
        rooms: MemoryRoomRepository,
        user: User,
    }

    #[fixture]
    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let users = MemoryUserRepository::new(Arc::clone(&store));
        let rooms = MemoryRoomRepository::new(Arc::clone(&store));
        let user = User::new(
            UserId::random(),
            UserName::new("Alice").expect("valid name"),
            None,
            Utc::now(),
        );
        users.insert(&user).await.expect("insert user");
        Harness {
            store,
            users,
            rooms,
            user,
        }
    }

    fn room_for(user: &User) -> Room {
        Room::solo(
            RoomId::random(),
            user.id,
            RoomName::new(DEFAULT_ROOM_NAME).expect("valid name"),
            Utc::now(),
        )
    }

    async fn create_then_fail(
        runner: &dyn TransactionRunner,
        h: &Harness,
        room: &Room,
    ) -> Result<(), Error> {
        runner
            .run(Box::pin(async {
                h.rooms.insert(room).await?;
                h.users
                    .assign_room_if_unset(&h.user.id, &room.id, Utc::now())
                    .await?;
                Err::<(), Error>(Error::internal("injected failure after both writes"))
            }))
            .await
    }

    #[rstest]
    #[tokio::test]
    async fn atomic_runner_rolls_back_every_write(#[future] harness: Harness) {
        let h = harness.await;
        let runner = MemoryTransactionRunner::new(Arc::clone(&h.store));
        let room = room_for(&h.user);

        create_then_fail(&runner, &h, &room)
            .await
            .expect_err("unit fails");

        assert!(h.rooms.find_by_id(&room.id).await.expect("lookup").is_none());
        let user = h.users.find_by_id(&h.user.id).await.expect("lookup").expect("exists");
        assert!(user.room_id.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn sequential_runner_keeps_partial_writes(#[future] harness: Harness) {
        let h = harness.await;
        let room = room_for(&h.user);

        create_then_fail(&SequentialTransactionRunner, &h, &room)
            .await
            .expect_err("unit fails");

        assert!(h.rooms.find_by_id(&room.id).await.expect("lookup").is_some());
        let user = h.users.find_by_id(&h.user.id).await.expect("lookup").expect("exists");
        assert_eq!(user.room_id, Some(room.id));
    }

    #[rstest]
    #[tokio::test]
    async fn atomic_runner_commits_on_success(#[future] harness: Harness) {
        let h = harness.await;
        let runner = MemoryTransactionRunner::new(Arc::clone(&h.store));
        let room = room_for(&h.user);

        runner
            .run(Box::pin(async {
                h.rooms.insert(&room).await?;
                Ok::<(), Error>(())
            }))
            .await
            .expect("commit");

        assert!(h.rooms.find_by_id(&room.id).await.expect("lookup").is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn dropped_unit_of_work_is_rolled_back(#[future] harness: Harness) {
        let h = harness.await;
        let runner = MemoryTransactionRunner::new(Arc::clone(&h.store));
        let room = room_for(&h.user);

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            runner.run(Box::pin(async {
                h.rooms.insert(&room).await?;
                std::future::pending::<()>().await;
                Ok::<(), Error>(())
            })),
        )
        .await;

        assert!(outcome.is_err(), "unit of work should time out");
        assert!(h.rooms.find_by_id(&room.id).await.expect("lookup").is_none());
    }
}
