//! Orderable list entries.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FieldUpdate, ItemId, ListId, RoomId};

/// Maximum length of an item description.
pub const ITEM_DESCRIPTION_MAX: usize = 500;
/// Maximum length of quantity, unit and category labels.
pub const ITEM_LABEL_MAX: usize = 64;

/// Validation errors for item fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    EmptyDescription,
    DescriptionTooLong { max: usize },
    LabelTooLong { field: &'static str, max: usize },
}

impl fmt::Display for ItemValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "item description must not be empty"),
            Self::DescriptionTooLong { max } => {
                write!(f, "item description must be at most {max} characters")
            }
            Self::LabelTooLong { field, max } => {
                write!(f, "item {field} must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for ItemValidationError {}

/// Validated item text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemDescription(String);

impl ItemDescription {
    pub fn new(text: impl Into<String>) -> Result<Self, ItemValidationError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ItemValidationError::EmptyDescription);
        }
        if trimmed.chars().count() > ITEM_DESCRIPTION_MAX {
            return Err(ItemValidationError::DescriptionTooLong {
                max: ITEM_DESCRIPTION_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for ItemDescription {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ItemDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ItemDescription> for String {
    fn from(value: ItemDescription) -> Self {
        value.0
    }
}

impl TryFrom<String> for ItemDescription {
    type Error = ItemValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn check_label(field: &'static str) -> impl Fn(String) -> Result<String, ItemValidationError> {
    move |text| {
        if text.chars().count() > ITEM_LABEL_MAX {
            Err(ItemValidationError::LabelTooLong {
                field,
                max: ITEM_LABEL_MAX,
            })
        } else {
            Ok(text)
        }
    }
}

fn optional_label(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ItemValidationError> {
    value
        .filter(|text| !text.trim().is_empty())
        .map(check_label(field))
        .transpose()
}

/// One entry in a list.
///
/// `order` is an opaque sort key. It need not be integral or contiguous; only
/// the relative order of keys within one list matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub id: ItemId,
    pub list_id: ListId,
    pub room_id: RoomId,
    pub description: ItemDescription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default)]
    pub is_archived: bool,
    pub order: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListItem {
    /// Total order used for display: `order`, then creation time, then id.
    pub fn effective_cmp(&self, other: &Self) -> Ordering {
        self.order
            .total_cmp(&other.order)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort items into their effective sequence.
pub fn sort_effective(items: &mut [ListItem]) {
    items.sort_by(ListItem::effective_cmp);
}

/// Input for creating an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub description: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub is_starred: bool,
}

/// Parts of a new item that do not depend on where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidItemDraft {
    pub description: ItemDescription,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub is_starred: bool,
}

impl ItemDraft {
    pub fn validate(self) -> Result<ValidItemDraft, ItemValidationError> {
        Ok(ValidItemDraft {
            description: ItemDescription::new(self.description)?,
            quantity: optional_label("quantity", self.quantity)?,
            unit: optional_label("unit", self.unit)?,
            category: optional_label("category", self.category)?,
            is_starred: self.is_starred,
        })
    }
}

impl ValidItemDraft {
    /// Place the draft in a list at `order`.
    pub fn into_item(
        self,
        id: ItemId,
        list_id: ListId,
        room_id: RoomId,
        order: f64,
        now: DateTime<Utc>,
    ) -> ListItem {
        ListItem {
            id,
            list_id,
            room_id,
            description: self.description,
            quantity: self.quantity,
            unit: self.unit,
            category: self.category,
            completed: false,
            is_starred: self.is_starred,
            is_archived: false,
            order,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Requested edit of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub is_starred: Option<bool>,
    pub quantity: FieldUpdate<String>,
    pub unit: FieldUpdate<String>,
    pub category: FieldUpdate<String>,
}

/// Text edits that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDetails {
    pub description: Option<ItemDescription>,
    pub quantity: FieldUpdate<String>,
    pub unit: FieldUpdate<String>,
    pub category: FieldUpdate<String>,
}

impl ItemDetails {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_unchanged()
            && self.unit.is_unchanged()
            && self.category.is_unchanged()
    }

    /// Write the edits onto `item`.
    pub fn apply_to(self, item: &mut ListItem) {
        if let Some(description) = self.description {
            item.description = description;
        }
        self.quantity.apply_to(&mut item.quantity);
        self.unit.apply_to(&mut item.unit);
        self.category.apply_to(&mut item.category);
    }
}

impl ItemUpdate {
    /// Split into validated text details plus the two flags.
    pub fn validate(self) -> Result<(ItemDetails, Option<bool>, Option<bool>), ItemValidationError> {
        let details = ItemDetails {
            description: self.description.map(ItemDescription::new).transpose()?,
            quantity: self.quantity.try_map(check_label("quantity"))?,
            unit: self.unit.try_map(check_label("unit"))?,
            category: self.category.try_map(check_label("category"))?,
        };
        Ok((details, self.completed, self.is_starred))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rstest::{fixture, rstest};

    #[fixture]
    fn draft() -> ValidItemDraft {
        ItemDraft {
            description: "Milk".to_owned(),
            ..ItemDraft::default()
        }
        .validate()
        .expect("valid draft")
    }

    fn item_at(draft: &ValidItemDraft, order: f64, created_at: DateTime<Utc>) -> ListItem {
        draft
            .clone()
            .into_item(ItemId::random(), ListId::random(), RoomId::random(), order, created_at)
    }

    #[rstest]
    fn effective_order_uses_key_first(draft: ValidItemDraft) {
        let now = Utc::now();
        let mut items = vec![
            item_at(&draft, 2000.0, now),
            item_at(&draft, 1000.0, now + TimeDelta::seconds(5)),
        ];
        sort_effective(&mut items);
        assert_eq!(items[0].order, 1000.0);
    }

    #[rstest]
    fn equal_keys_fall_back_to_creation_time(draft: ValidItemDraft) {
        let now = Utc::now();
        let later = item_at(&draft, 1000.0, now + TimeDelta::seconds(1));
        let earlier = item_at(&draft, 1000.0, now);
        let mut items = vec![later.clone(), earlier.clone()];
        sort_effective(&mut items);
        assert_eq!(items[0].id, earlier.id);
        assert_eq!(items[1].id, later.id);
    }

    #[rstest]
    fn full_ties_fall_back_to_id(draft: ValidItemDraft) {
        let now = Utc::now();
        let a = item_at(&draft, 1000.0, now);
        let b = item_at(&draft, 1000.0, now);
        let expected = a.id.min(b.id);
        let mut items = vec![a, b];
        sort_effective(&mut items);
        assert_eq!(items[0].id, expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_description_rejected(#[case] raw: &str) {
        let result = ItemDraft {
            description: raw.to_owned(),
            ..ItemDraft::default()
        }
        .validate();
        assert_eq!(result, Err(ItemValidationError::EmptyDescription));
    }

    #[rstest]
    fn long_labels_rejected() {
        let result = ItemUpdate {
            unit: FieldUpdate::Set("x".repeat(ITEM_LABEL_MAX + 1)),
            ..ItemUpdate::default()
        }
        .validate();
        assert_eq!(
            result.map(|(details, _, _)| details),
            Err(ItemValidationError::LabelTooLong {
                field: "unit",
                max: ITEM_LABEL_MAX
            })
        );
    }

    #[rstest]
    fn details_apply_clears_and_sets(draft: ValidItemDraft) {
        let mut item = item_at(&draft, 1000.0, Utc::now());
        item.quantity = Some("2".to_owned());
        ItemDetails {
            description: Some(ItemDescription::new("Oat milk").expect("valid")),
            quantity: FieldUpdate::Clear,
            unit: FieldUpdate::Set("l".to_owned()),
            category: FieldUpdate::Unchanged,
        }
        .apply_to(&mut item);
        assert_eq!(item.description.as_ref(), "Oat milk");
        assert!(item.quantity.is_none());
        assert_eq!(item.unit.as_deref(), Some("l"));
    }
}
