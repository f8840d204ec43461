//! Collaborative checklist data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeletionVotes, FieldUpdate, ListId, RoomId};

/// Maximum length of a list name.
pub const LIST_NAME_MAX: usize = 100;
/// Maximum length of a list description.
pub const LIST_DESCRIPTION_MAX: usize = 1_000;
/// Maximum size of list notes in bytes.
pub const LIST_NOTES_MAX_BYTES: usize = 65_535;

/// Validation errors for list fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListValidationError {
    EmptyName,
    NameTooLong { max: usize },
    DescriptionTooLong { max: usize },
    UnknownIcon { value: String },
    NotesTooLong { max_bytes: usize },
}

impl fmt::Display for ListValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "list name must not be empty"),
            Self::NameTooLong { max } => write!(f, "list name must be at most {max} characters"),
            Self::DescriptionTooLong { max } => {
                write!(f, "list description must be at most {max} characters")
            }
            Self::UnknownIcon { value } => write!(f, "unknown list icon: {value}"),
            Self::NotesTooLong { max_bytes } => {
                write!(f, "list notes must be at most {max_bytes} bytes")
            }
        }
    }
}

impl std::error::Error for ListValidationError {}

/// Icon picked from the fixed set the clients can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListIcon {
    House,
    Car,
    Plane,
    Pencil,
    Apple,
    Broccoli,
    Tv,
    Sunflower,
}

impl ListIcon {
    /// Every icon, in display order.
    pub const ALL: [Self; 8] = [
        Self::House,
        Self::Car,
        Self::Plane,
        Self::Pencil,
        Self::Apple,
        Self::Broccoli,
        Self::Tv,
        Self::Sunflower,
    ];

    /// Wire name of the icon.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::House => "HOUSE",
            Self::Car => "CAR",
            Self::Plane => "PLANE",
            Self::Pencil => "PENCIL",
            Self::Apple => "APPLE",
            Self::Broccoli => "BROCCOLI",
            Self::Tv => "TV",
            Self::Sunflower => "SUNFLOWER",
        }
    }
}

impl fmt::Display for ListIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListIcon {
    type Err = ListValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|icon| icon.as_str() == s)
            .ok_or_else(|| ListValidationError::UnknownIcon {
                value: s.to_owned(),
            })
    }
}

/// Validated list name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListName(String);

impl ListName {
    /// Validate a list name. Surrounding whitespace is trimmed.
    pub fn new(name: impl Into<String>) -> Result<Self, ListValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ListValidationError::EmptyName);
        }
        if trimmed.chars().count() > LIST_NAME_MAX {
            return Err(ListValidationError::NameTooLong { max: LIST_NAME_MAX });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for ListName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ListName> for String {
    fn from(value: ListName) -> Self {
        value.0
    }
}

impl TryFrom<String> for ListName {
    type Error = ListValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn check_description(text: String) -> Result<String, ListValidationError> {
    if text.chars().count() > LIST_DESCRIPTION_MAX {
        return Err(ListValidationError::DescriptionTooLong {
            max: LIST_DESCRIPTION_MAX,
        });
    }
    Ok(text)
}

fn check_notes(text: String) -> Result<String, ListValidationError> {
    if text.len() > LIST_NOTES_MAX_BYTES {
        return Err(ListValidationError::NotesTooLong {
            max_bytes: LIST_NOTES_MAX_BYTES,
        });
    }
    Ok(text)
}

/// A checklist owned by a room.
///
/// ## Invariants
/// - `room_id` never changes after creation.
/// - Once `is_deleted` is set the list accepts no further edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: ListId,
    pub room_id: RoomId,
    pub name: ListName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<ListIcon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub deletion_votes: DeletionVotes,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDraft {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl ListDraft {
    /// Validate the draft and build the list it describes.
    pub fn into_list(
        self,
        id: ListId,
        room_id: RoomId,
        now: DateTime<Utc>,
    ) -> Result<List, ListValidationError> {
        let name = ListName::new(self.name)?;
        let description = self
            .description
            .filter(|text| !text.trim().is_empty())
            .map(check_description)
            .transpose()?;
        let icon = self
            .icon
            .filter(|text| !text.trim().is_empty())
            .map(|text| text.parse::<ListIcon>())
            .transpose()?;
        Ok(List {
            id,
            room_id,
            name,
            description,
            icon,
            notes: None,
            deletion_votes: DeletionVotes::new(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Requested edit of a list. Text fields use [`FieldUpdate::from_text`]
/// semantics, so a blank string clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUpdate {
    pub name: Option<String>,
    pub description: FieldUpdate<String>,
    pub icon: FieldUpdate<String>,
    pub notes: FieldUpdate<String>,
}

impl ListUpdate {
    /// Validate every supplied field.
    pub fn validate(self) -> Result<ListChanges, ListValidationError> {
        Ok(ListChanges {
            name: self.name.map(ListName::new).transpose()?,
            description: self.description.try_map(check_description)?,
            icon: self.icon.try_map(|text| text.parse::<ListIcon>())?,
            notes: self.notes.try_map(check_notes)?,
        })
    }
}

/// List edits that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListChanges {
    pub name: Option<ListName>,
    pub description: FieldUpdate<String>,
    pub icon: FieldUpdate<ListIcon>,
    pub notes: FieldUpdate<String>,
}

impl ListChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_unchanged()
            && self.icon.is_unchanged()
            && self.notes.is_unchanged()
    }
}
