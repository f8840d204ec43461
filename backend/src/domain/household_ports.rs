//! Bundle of driven ports shared by the household services.

use std::sync::Arc;

use mockable::Clock;

use super::ports::{
    ListItemRepository, ListRepository, RoomCleanupQueue, RoomRepository, TransactionRunner,
    UserRepository,
};

/// Adapters the household services depend on.
#[derive(Clone)]
pub struct HouseholdPorts {
    pub users: Arc<dyn UserRepository>,
    pub rooms: Arc<dyn RoomRepository>,
    pub lists: Arc<dyn ListRepository>,
    pub items: Arc<dyn ListItemRepository>,
    pub transactions: Arc<dyn TransactionRunner>,
    pub cleanup: Arc<dyn RoomCleanupQueue>,
    pub clock: Arc<dyn Clock>,
}

impl HouseholdPorts {
    pub fn new(
        users: Arc<dyn UserRepository>,
        rooms: Arc<dyn RoomRepository>,
        lists: Arc<dyn ListRepository>,
        items: Arc<dyn ListItemRepository>,
        transactions: Arc<dyn TransactionRunner>,
        cleanup: Arc<dyn RoomCleanupQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            rooms,
            lists,
            items,
            transactions,
            cleanup,
            clock,
        }
    }
}
