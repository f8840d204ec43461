//! Outbound adapters implementing domain ports.
//!
//! - **memory**: in-process document store backing all four repositories,
//!   plus the atomic and sequential transaction runners
//! - **queue**: Tokio channel and worker task that drain room cleanup jobs
//!
//! Adapters are thin translators between domain types and their storage
//! representation. They enforce the conditional-write contracts the ports
//! document but contain no business rules.

pub mod memory;
pub mod queue;
