//! Household domain: rooms, shared lists and their items.
//!
//! Purpose: Define the strongly typed entities and the services that change
//! them. Services talk to storage only through the traits in [`ports`], so
//! every rule here (two-member rooms, unanimous deletion, fractional item
//! ordering) holds regardless of the adapter behind them.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — caller-facing error payload.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - Room, List, ListItem, User — the four stored documents.
//! - MembershipService, ListService, ListItemService, AccountService — the
//!   operations callers drive.

pub mod authorization;
pub mod error;
pub mod ordering;
pub mod ports;

mod account_service;
mod cleanup;
mod field_update;
mod household_ports;
mod ids;
mod item_service;
mod list;
mod list_item;
mod list_service;
mod membership_service;
mod port_errors;
mod room;
mod share_token;
mod trace_id;
mod user;
mod votes;

pub use self::account_service::AccountService;
pub use self::authorization::authorize_room;
pub use self::cleanup::{CleanupReport, RoomCleanupJob, RoomCleanupWorker};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::field_update::FieldUpdate;
pub use self::household_ports::HouseholdPorts;
pub use self::ids::{IdParseError, ItemId, ListId, RoomId, UserId};
pub use self::item_service::ListItemService;
pub use self::list::{
    LIST_DESCRIPTION_MAX, LIST_NAME_MAX, LIST_NOTES_MAX_BYTES, List, ListChanges, ListDraft,
    ListIcon, ListName, ListUpdate, ListValidationError,
};
pub use self::list_item::{
    ITEM_DESCRIPTION_MAX, ITEM_LABEL_MAX, ItemDescription, ItemDetails, ItemDraft, ItemUpdate,
    ItemValidationError, ListItem, ValidItemDraft, sort_effective,
};
pub use self::list_service::ListService;
pub use self::membership_service::MembershipService;
pub use self::ordering::{ORDER_EPSILON, ORDER_STEP};
pub use self::room::{
    DEFAULT_ROOM_NAME, MAX_MEMBERS, ROOM_DESCRIPTION_MAX, ROOM_NAME_MAX, Room, RoomName,
    RoomSettingsUpdate, RoomValidationError, ValidRoomSettings,
};
pub use self::share_token::{
    RandomShareTokenSource, SHARE_TOKEN_ALPHABET, SHARE_TOKEN_LEN, ShareToken, ShareTokenError,
    ShareTokenSource,
};
pub use self::trace_id::TraceId;
pub use self::user::{USER_NAME_MAX, USERNAME_MAX, User, UserName, UserValidationError, Username};
pub use self::votes::DeletionVotes;

/// Result alias used by the services.
///
/// # Examples
/// ```
/// use household::domain::{DomainResult, Error};
///
/// fn refuse() -> DomainResult<()> {
///     Err(Error::forbidden("nope"))
/// }
///
/// assert!(refuse().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
