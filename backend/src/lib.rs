//! Shared-household core: two-person rooms, shared lists and ordered items.
//!
//! The [`domain`] module holds the entities and services; [`outbound`] holds
//! the adapters behind the domain ports; [`app`] wires them together from
//! [`config::HouseholdSettings`].

pub mod app;
pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use app::HouseholdServices;
pub use config::HouseholdSettings;
