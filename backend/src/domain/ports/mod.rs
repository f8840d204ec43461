//! Driven ports consumed by the household engines.
//!
//! Repository errors stay on this side of the boundary: services translate
//! them into [`crate::domain::Error`] via the `From` impls in the domain
//! error mapping module.

mod macros;
mod list_item_repository;
mod list_repository;
mod room_cleanup_queue;
mod room_repository;
mod transaction_runner;
mod user_repository;

pub(crate) use macros::define_port_error;

#[cfg(test)]
pub use list_item_repository::MockListItemRepository;
pub use list_item_repository::{ListItemRepository, ListItemRepositoryError};
#[cfg(test)]
pub use list_repository::MockListRepository;
pub use list_repository::{ListRepository, ListRepositoryError};
#[cfg(test)]
pub use room_cleanup_queue::MockRoomCleanupQueue;
pub use room_cleanup_queue::{CleanupQueueError, RoomCleanupQueue};
#[cfg(test)]
pub use room_repository::MockRoomRepository;
pub use room_repository::{RoomRepository, RoomRepositoryError};
pub use transaction_runner::{TransactionMode, TransactionRunner, TransactionWork};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserRepository, UserRepositoryError};
