//! Room membership guard shared by every room-scoped operation.

use super::ports::RoomRepository;
use super::{Error, Room, RoomId, User};

/// Confirm `user` may act on `room_id` and return the freshly loaded room.
///
/// Both the user's cached room reference and the room's current member list
/// must agree. Any mismatch is `Forbidden`, including a room that no longer
/// exists, so callers cannot probe for foreign room ids.
pub async fn authorize_room(
    rooms: &dyn RoomRepository,
    user: &User,
    room_id: &RoomId,
) -> Result<Room, Error> {
    if !user.belongs_to(room_id) {
        return Err(Error::forbidden("room does not belong to the caller"));
    }
    match rooms.find_by_id(room_id).await? {
        Some(room) if room.is_member(&user.id) => Ok(room),
        _ => Err(Error::forbidden("caller is not a member of this room")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockRoomRepository, RoomRepositoryError};
    use crate::domain::{ErrorCode, RoomName, UserId, UserName};
    use chrono::Utc;
    use rstest::{fixture, rstest};

    #[fixture]
    fn member() -> User {
        let mut user = User::new(
            UserId::random(),
            UserName::new("Alice").expect("valid name"),
            None,
            Utc::now(),
        );
        user.room_id = Some(RoomId::random());
        user
    }

    fn room_for(user: &User, room_id: RoomId) -> Room {
        Room::solo(
            room_id,
            user.id,
            RoomName::new("Flat").expect("valid name"),
            Utc::now(),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn admits_current_member(member: User) {
        let room_id = member.room_id.expect("fixture sets room");
        let room = room_for(&member, room_id);
        let mut rooms = MockRoomRepository::new();
        rooms
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(room)));

        let room = authorize_room(&rooms, &member, &room_id)
            .await
            .expect("member admitted");
        assert_eq!(room.id, room_id);
    }

    #[rstest]
    #[tokio::test]
    async fn rejects_foreign_room_without_lookup(member: User) {
        let rooms = MockRoomRepository::new();
        let error = authorize_room(&rooms, &member, &RoomId::random())
            .await
            .expect_err("foreign room");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn stale_membership_is_forbidden(member: User) {
        let room_id = member.room_id.expect("fixture sets room");
        let mut room = room_for(&member, room_id);
        room.member_ids = vec![UserId::random()];
        let mut rooms = MockRoomRepository::new();
        rooms
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(room)));

        let error = authorize_room(&rooms, &member, &room_id)
            .await
            .expect_err("stale cache");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn vanished_room_is_forbidden_not_missing(member: User) {
        let room_id = member.room_id.expect("fixture sets room");
        let mut rooms = MockRoomRepository::new();
        rooms.expect_find_by_id().return_once(|_| Ok(None));

        let error = authorize_room(&rooms, &member, &room_id)
            .await
            .expect_err("room gone");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn store_failure_propagates(member: User) {
        let room_id = member.room_id.expect("fixture sets room");
        let mut rooms = MockRoomRepository::new();
        rooms
            .expect_find_by_id()
            .return_once(|_| Err(RoomRepositoryError::connection("refused")));

        let error = authorize_room(&rooms, &member, &room_id)
            .await
            .expect_err("store down");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }
}
