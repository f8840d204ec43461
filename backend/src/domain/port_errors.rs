//! Translation of repository errors into domain errors.
//!
//! Connection failures become `service_unavailable`, query failures
//! `internal`, and the conditional-write outcomes map onto the domain codes
//! callers act on. Adapter messages are kept for diagnostics.

use super::Error;
use super::ports::{
    CleanupQueueError, ListItemRepositoryError, ListRepositoryError, RoomRepositoryError,
    UserRepositoryError,
};

impl From<UserRepositoryError> for Error {
    fn from(error: UserRepositoryError) -> Self {
        match error {
            UserRepositoryError::Connection { message } => {
                Self::service_unavailable(format!("user repository unavailable: {message}"))
            }
            UserRepositoryError::Query { message } => {
                Self::internal(format!("user repository error: {message}"))
            }
            UserRepositoryError::NotFound { message } => {
                Self::not_found(format!("user not found: {message}"))
            }
            UserRepositoryError::Duplicate { message } => {
                Self::conflict(format!("user already exists: {message}"))
            }
            UserRepositoryError::ConditionFailed { message } => {
                Self::conflict(format!("user changed concurrently: {message}"))
            }
        }
    }
}

impl From<RoomRepositoryError> for Error {
    fn from(error: RoomRepositoryError) -> Self {
        match error {
            RoomRepositoryError::Connection { message } => {
                Self::service_unavailable(format!("room repository unavailable: {message}"))
            }
            RoomRepositoryError::Query { message } => {
                Self::internal(format!("room repository error: {message}"))
            }
            RoomRepositoryError::NotFound { message } => {
                Self::not_found(format!("room not found: {message}"))
            }
            RoomRepositoryError::NotMember { message } => {
                Self::forbidden(format!("not a member of this room: {message}"))
            }
            RoomRepositoryError::ConditionFailed { message } => {
                Self::conflict(format!("room changed concurrently: {message}"))
            }
        }
    }
}

impl From<ListRepositoryError> for Error {
    fn from(error: ListRepositoryError) -> Self {
        match error {
            ListRepositoryError::Connection { message } => {
                Self::service_unavailable(format!("list repository unavailable: {message}"))
            }
            ListRepositoryError::Query { message } => {
                Self::internal(format!("list repository error: {message}"))
            }
            ListRepositoryError::NotFound { message } => {
                Self::not_found(format!("list not found: {message}"))
            }
            ListRepositoryError::ConditionFailed { message } => {
                Self::conflict(format!("list changed concurrently: {message}"))
            }
        }
    }
}

impl From<ListItemRepositoryError> for Error {
    fn from(error: ListItemRepositoryError) -> Self {
        match error {
            ListItemRepositoryError::Connection { message } => {
                Self::service_unavailable(format!("item repository unavailable: {message}"))
            }
            ListItemRepositoryError::Query { message } => {
                Self::internal(format!("item repository error: {message}"))
            }
            ListItemRepositoryError::NotFound { message } => {
                Self::not_found(format!("item not found: {message}"))
            }
        }
    }
}

impl From<CleanupQueueError> for Error {
    fn from(error: CleanupQueueError) -> Self {
        match error {
            CleanupQueueError::Unavailable { message } => {
                Self::service_unavailable(format!("cleanup queue unavailable: {message}"))
            }
            CleanupQueueError::Rejected { message } => {
                Self::service_unavailable(format!("cleanup job rejected: {message}"))
            }
        }
    }
}
