//! Room (household) data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeletionVotes, FieldUpdate, RoomId, ShareToken, UserId};

/// Upper bound on room membership.
pub const MAX_MEMBERS: usize = 2;
/// Display name given to rooms nobody has renamed.
pub const DEFAULT_ROOM_NAME: &str = "My Room";
/// Maximum length of a room display name.
pub const ROOM_NAME_MAX: usize = 64;
/// Maximum length of a room description.
pub const ROOM_DESCRIPTION_MAX: usize = 1_000;

/// Validation errors for room settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomValidationError {
    EmptyDisplayName,
    DisplayNameTooLong { max: usize },
    DescriptionTooLong { max: usize },
}

impl fmt::Display for RoomValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDisplayName => write!(f, "room name must not be empty"),
            Self::DisplayNameTooLong { max } => {
                write!(f, "room name must be at most {max} characters")
            }
            Self::DescriptionTooLong { max } => {
                write!(f, "room description must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for RoomValidationError {}

/// Human readable room name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    /// Validate a room name. Surrounding whitespace is trimmed.
    pub fn new(name: impl Into<String>) -> Result<Self, RoomValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RoomValidationError::EmptyDisplayName);
        }
        if trimmed.chars().count() > ROOM_NAME_MAX {
            return Err(RoomValidationError::DisplayNameTooLong {
                max: ROOM_NAME_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for RoomName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<RoomName> for String {
    fn from(value: RoomName) -> Self {
        value.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = RoomValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A one- or two-person household.
///
/// ## Invariants
/// - `member_ids` holds between one and [`MAX_MEMBERS`] distinct users.
/// - Every key in `deletion_votes` is a current member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub member_ids: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_token: Option<ShareToken>,
    #[serde(default)]
    pub deletion_votes: DeletionVotes,
    pub display_name: RoomName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// A fresh room whose only member is `owner`.
    pub fn solo(id: RoomId, owner: UserId, display_name: RoomName, now: DateTime<Utc>) -> Self {
        Self {
            id,
            member_ids: vec![owner],
            share_token: None,
            deletion_votes: DeletionVotes::new(),
            display_name,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member_ids.contains(user_id)
    }

    pub fn is_full(&self) -> bool {
        self.member_ids.len() >= MAX_MEMBERS
    }

    /// True when `user_id` is the one and only member.
    pub fn is_sole_member(&self, user_id: &UserId) -> bool {
        self.member_ids.as_slice() == [*user_id]
    }

    /// Whether every current member has voted to delete the room.
    pub fn deletion_agreed(&self) -> bool {
        self.deletion_votes.covers(&self.member_ids)
    }
}

/// Requested change to a room's user-editable settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSettingsUpdate {
    /// `None` keeps the current name; a supplied value must not be blank.
    pub display_name: Option<String>,
    pub description: FieldUpdate<String>,
}

impl RoomSettingsUpdate {
    /// Validate both fields.
    pub fn validate(self) -> Result<ValidRoomSettings, RoomValidationError> {
        let display_name = self.display_name.map(RoomName::new).transpose()?;
        let description = self.description.try_map(|text| {
            if text.chars().count() > ROOM_DESCRIPTION_MAX {
                Err(RoomValidationError::DescriptionTooLong {
                    max: ROOM_DESCRIPTION_MAX,
                })
            } else {
                Ok(text)
            }
        })?;
        Ok(ValidRoomSettings {
            display_name,
            description,
        })
    }
}

/// Room settings that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRoomSettings {
    pub display_name: Option<RoomName>,
    pub description: FieldUpdate<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn room() -> Room {
        Room::solo(
            RoomId::random(),
            UserId::random(),
            RoomName::new(DEFAULT_ROOM_NAME).expect("valid name"),
            Utc::now(),
        )
    }

    #[rstest]
    fn solo_room_has_one_member(room: Room) {
        assert_eq!(room.member_ids.len(), 1);
        assert!(!room.is_full());
        assert!(room.is_sole_member(&room.member_ids[0]));
        assert!(room.deletion_votes.is_empty());
    }

    #[rstest]
    fn pair_is_full(mut room: Room) {
        let owner = room.member_ids[0];
        room.member_ids.push(UserId::random());
        assert!(room.is_full());
        assert!(!room.is_sole_member(&owner));
    }

    #[rstest]
    fn deletion_agreed_needs_every_member(mut room: Room) {
        let owner = room.member_ids[0];
        let partner = UserId::random();
        room.member_ids.push(partner);
        room.deletion_votes.record(owner, Utc::now());
        assert!(!room.deletion_agreed());
        room.deletion_votes.record(partner, Utc::now());
        assert!(room.deletion_agreed());
    }

    #[rstest]
    #[case(Some(String::new()), RoomValidationError::EmptyDisplayName)]
    #[case(Some("x".repeat(ROOM_NAME_MAX + 1)), RoomValidationError::DisplayNameTooLong { max: ROOM_NAME_MAX })]
    fn settings_reject_bad_names(
        #[case] display_name: Option<String>,
        #[case] expected: RoomValidationError,
    ) {
        let update = RoomSettingsUpdate {
            display_name,
            description: FieldUpdate::Unchanged,
        };
        assert_eq!(update.validate(), Err(expected));
    }

    #[rstest]
    fn settings_reject_long_description() {
        let update = RoomSettingsUpdate {
            display_name: None,
            description: FieldUpdate::Set("x".repeat(ROOM_DESCRIPTION_MAX + 1)),
        };
        assert_eq!(
            update.validate(),
            Err(RoomValidationError::DescriptionTooLong {
                max: ROOM_DESCRIPTION_MAX
            })
        );
    }

    #[rstest]
    fn settings_keep_clear_instruction() {
        let update = RoomSettingsUpdate {
            display_name: Some(" Flat 3 ".to_owned()),
            description: FieldUpdate::Clear,
        };
        let valid = update.validate().expect("valid settings");
        assert_eq!(valid.display_name.map(String::from), Some("Flat 3".to_owned()));
        assert_eq!(valid.description, FieldUpdate::Clear);
    }
}
