//! Composition root: wires adapters and services from [`HouseholdSettings`].

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use crate::config::HouseholdSettings;
use crate::domain::ports::{TransactionMode, TransactionRunner};
use crate::domain::{
    AccountService, DomainResult, Error, HouseholdPorts, ListItemService, ListService,
    MembershipService, RoomCleanupWorker, ShareTokenSource,
};
use crate::outbound::memory::{
    MemoryListItemRepository, MemoryListRepository, MemoryRoomRepository, MemoryStore,
    MemoryTransactionRunner, MemoryUserRepository, SequentialTransactionRunner,
};
use crate::outbound::queue::{CleanupQueueHandle, TokioRoomCleanupQueue};

/// Every household service, sharing one set of adapters.
pub struct HouseholdServices {
    pub membership: MembershipService,
    pub lists: ListService,
    pub items: ListItemService,
    pub accounts: AccountService,
    transaction_mode: TransactionMode,
    cleanup: CleanupQueueHandle,
}

impl HouseholdServices {
    /// Build the services over a fresh in-memory store.
    ///
    /// Spawns the cleanup worker, so this must run inside a Tokio runtime.
    ///
    /// # Errors
    /// `InvalidRequest` when the configured default room name is invalid.
    pub fn in_memory(
        settings: &HouseholdSettings,
        clock: Arc<dyn Clock>,
        share_tokens: Arc<dyn ShareTokenSource>,
    ) -> DomainResult<Self> {
        let default_room_name = settings
            .default_room_name()
            .map_err(|err| Error::invalid_request(format!("default room name: {err}")))?;

        let store = Arc::new(MemoryStore::new());
        let users = Arc::new(MemoryUserRepository::new(Arc::clone(&store)));
        let rooms = Arc::new(MemoryRoomRepository::new(Arc::clone(&store)));
        let lists = Arc::new(MemoryListRepository::new(Arc::clone(&store)));
        let items = Arc::new(MemoryListItemRepository::new(Arc::clone(&store)));
        let transactions: Arc<dyn TransactionRunner> = if settings.sequential_transactions {
            Arc::new(SequentialTransactionRunner)
        } else {
            Arc::new(MemoryTransactionRunner::new(store))
        };
        let transaction_mode = transactions.mode();

        let worker = RoomCleanupWorker::new(lists.clone(), items.clone());
        let (queue, cleanup) =
            TokioRoomCleanupQueue::spawn(worker, settings.cleanup_queue_capacity());

        let ports = HouseholdPorts::new(
            users,
            rooms,
            lists,
            items,
            transactions,
            Arc::new(queue),
            clock,
        );
        info!(
            transactions = transaction_mode.as_str(),
            cleanup_capacity = settings.cleanup_queue_capacity(),
            "household services ready"
        );

        Ok(Self {
            membership: MembershipService::new(
                ports.clone(),
                share_tokens,
                default_room_name.clone(),
            ),
            lists: ListService::new(ports.clone()),
            items: ListItemService::new(ports.clone()),
            accounts: AccountService::new(ports, default_room_name),
            transaction_mode,
            cleanup,
        })
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        self.transaction_mode
    }

    /// Stop the cleanup worker after it drains queued jobs. Returns how many
    /// jobs it processed.
    pub async fn shutdown(self) -> usize {
        self.cleanup.shutdown().await
    }
}
