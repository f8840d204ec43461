//! Port for running multi-document units of work.
//!
//! Engines hand the runner a boxed future that performs several repository
//! calls. Whether those calls commit together depends on the adapter's
//! [`TransactionMode`].

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::domain::Error;

/// A unit of work. Returning `Err` asks the runner to roll back.
pub type TransactionWork<'a> = BoxFuture<'a, Result<(), Error>>;

/// Guarantee offered by a [`TransactionRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Every write in the unit commits, or none does.
    Atomic,
    /// Writes apply one by one; a failure leaves earlier writes in place.
    Sequential,
}

impl TransactionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Sequential => "sequential",
        }
    }
}

/// Runs a unit of work inside the store's transaction boundary.
///
/// The error returned by `work` is passed through unchanged after rollback.
#[async_trait]
pub trait TransactionRunner: Send + Sync {
    fn mode(&self) -> TransactionMode;

    async fn run<'a>(&self, work: TransactionWork<'a>) -> Result<(), Error>;
}
