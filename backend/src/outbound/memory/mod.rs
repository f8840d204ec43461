//! In-memory document store adapters.
//!
//! All four repositories share one [`MemoryStore`]. They honour the same
//! conditional-update contracts a document database adapter would, which
//! makes them the reference adapter for the engines and their tests.

mod items;
mod lists;
mod rooms;
mod store;
mod transaction;
mod users;

pub use items::MemoryListItemRepository;
pub use lists::MemoryListRepository;
pub use rooms::MemoryRoomRepository;
pub use store::{MemoryStore, StoreFault};
pub use transaction::{MemoryTransactionRunner, SequentialTransactionRunner};
pub use users::MemoryUserRepository;
