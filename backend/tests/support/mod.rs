//! Shared fixtures for the household integration tests.
#![allow(dead_code)]

use household::domain::{Error, ItemDraft, List, ListDraft, ListItem, RoomId, User};
use household::test_support::household::MemoryHousehold;

/// Unwrap a service result, naming the step that failed.
pub fn ok<T>(result: Result<T, Error>, step: &str) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{step} failed: {error}"),
    }
}

/// Create a list with only a name.
pub async fn create_list(
    household: &MemoryHousehold,
    user: &User,
    room_id: &RoomId,
    name: &str,
) -> List {
    let draft = ListDraft {
        name: name.to_owned(),
        ..ListDraft::default()
    };
    ok(
        household.lists().create_list(user, room_id, draft).await,
        "create list",
    )
}

/// Append an item with only a description.
pub async fn add_item(
    household: &MemoryHousehold,
    user: &User,
    list: &List,
    description: &str,
) -> ListItem {
    let draft = ItemDraft {
        description: description.to_owned(),
        ..ItemDraft::default()
    };
    ok(
        household
            .items()
            .create_item(user, &list.room_id, &list.id, draft)
            .await,
        "create item",
    )
}

/// Visible item descriptions in display order.
pub async fn descriptions(household: &MemoryHousehold, user: &User, list: &List) -> Vec<String> {
    ok(
        household
            .items()
            .list_items(user, &list.room_id, &list.id, true)
            .await,
        "list items",
    )
    .into_iter()
    .map(|item| item.description.as_ref().to_owned())
    .collect()
}
