//! Tests for the room membership lifecycle.

use super::*;
use crate::domain::ports::{
    MockRoomRepository, RoomRepository, RoomRepositoryError, TransactionMode, TransactionRunner,
    TransactionWork, UserRepository,
};
use crate::domain::{ErrorCode, TraceId, UserId, UserName};
use crate::outbound::memory::{
    MemoryListItemRepository, MemoryListRepository, MemoryStore, MemoryUserRepository,
    SequentialTransactionRunner, StoreFault,
};
use crate::test_support::household::{
    MemoryHousehold, MutableClock, RecordingCleanupQueue, SequenceShareTokens,
};
use async_trait::async_trait;
use mockable::Clock;
use rstest::{fixture, rstest};
use tokio::sync::Barrier;

#[fixture]
fn household() -> MemoryHousehold {
    MemoryHousehold::atomic()
}

async fn roomless(household: &MemoryHousehold, name: &str) -> User {
    let user = User::new(
        UserId::random(),
        UserName::new(name).expect("valid name"),
        None,
        household.clock.utc(),
    );
    household.users.insert(&user).await.expect("insert user");
    user
}

async fn room_of(household: &MemoryHousehold, id: &RoomId) -> Option<Room> {
    household.rooms.find_by_id(id).await.expect("room lookup")
}

#[rstest]
#[tokio::test]
async fn create_solo_room_assigns_the_creator(household: MemoryHousehold) {
    let user = roomless(&household, "Alice").await;
    let membership = household.membership();

    let room = membership.create_solo_room(&user).await.expect("create");

    assert_eq!(room.member_ids, vec![user.id]);
    assert!(room.share_token.is_none());
    assert!(room.deletion_votes.is_empty());
    let user = household.reload(&user.id).await;
    assert_eq!(user.room_id, Some(room.id));
    assert_eq!(membership.get_my_room(&user).await.expect("room"), room);

    let error = membership
        .create_solo_room(&user)
        .await
        .expect_err("already has a room");
    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn get_my_room_without_room_is_not_found(household: MemoryHousehold) {
    let user = roomless(&household, "Alice").await;
    let error = household
        .membership()
        .get_my_room(&user)
        .await
        .expect_err("no room");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn join_by_token_moves_joiner_and_dissolves_their_solo_room(household: MemoryHousehold) {
    household.tokens.push("K7M3P");
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let (r1, r2) = (alice.room_id.expect("r1"), bob.room_id.expect("r2"));
    let membership = household.membership();

    let token = membership.rotate_share_token(&alice).await.expect("token");
    assert_eq!(token.as_ref(), "K7M3P");
    let room = membership
        .join_room_by_token(&bob, "K7M3P")
        .await
        .expect("join");

    assert_eq!(room.id, r1);
    assert_eq!(room.member_ids, vec![alice.id, bob.id]);
    assert!(room.share_token.is_none(), "token is single use");
    assert!(room_of(&household, &r2).await.is_none());
    assert_eq!(household.reload(&bob.id).await.room_id, Some(r1));
    let jobs = household.cleanup.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].room_id, r2);
}

#[rstest]
#[tokio::test]
async fn consumed_token_cannot_be_reused(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let carol = household.register("Carol").await;
    let membership = household.membership();
    let token = membership.rotate_share_token(&alice).await.expect("token");
    let r1 = alice.room_id.expect("room");
    membership
        .join_room(&bob, &r1, token.as_ref())
        .await
        .expect("join");

    let error = membership
        .join_room_by_token(&carol, token.as_ref())
        .await
        .expect_err("consumed");
    assert_eq!(error.code(), ErrorCode::NotFound);
    let error = membership
        .join_room(&carol, &r1, token.as_ref())
        .await
        .expect_err("consumed");
    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[rstest]
#[case::empty("")]
#[case::wrong("ZZZZZ")]
#[case::lowercase("k7m3p")]
#[tokio::test]
async fn mismatched_token_is_forbidden(household: MemoryHousehold, #[case] supplied: &str) {
    household.tokens.push("K7M3P");
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let membership = household.membership();
    membership.rotate_share_token(&alice).await.expect("token");

    let error = membership
        .join_room(&bob, &alice.room_id.expect("room"), supplied)
        .await
        .expect_err("bad token");
    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn room_without_active_token_is_forbidden(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let error = household
        .membership()
        .join_room(&bob, &alice.room_id.expect("room"), "K7M3P")
        .await
        .expect_err("no token");
    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn rotation_replaces_previous_token(household: MemoryHousehold) {
    let household = MemoryHousehold {
        tokens: Arc::new(SequenceShareTokens::new(["AAAAA", "BBBBB"])),
        ..household
    };
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let membership = household.membership();
    membership.rotate_share_token(&alice).await.expect("first");
    membership.rotate_share_token(&alice).await.expect("second");

    let error = membership
        .join_room_by_token(&bob, "AAAAA")
        .await
        .expect_err("replaced");
    assert_eq!(error.code(), ErrorCode::NotFound);
    membership
        .join_room_by_token(&bob, "BBBBB")
        .await
        .expect("current token works");
}

#[rstest]
#[tokio::test]
async fn empty_token_lookup_is_invalid(household: MemoryHousehold) {
    let bob = household.register("Bob").await;
    let error = household
        .membership()
        .join_room_by_token(&bob, "  ")
        .await
        .expect_err("empty");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn full_room_and_existing_member_conflict(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let carol = household.register("Carol").await;
    let room = household.pair(&alice, &bob).await;
    let membership = household.membership();
    let bob = household.reload(&bob.id).await;

    let token = membership.rotate_share_token(&alice).await.expect("token");
    let error = membership
        .join_room(&carol, &room.id, token.as_ref())
        .await
        .expect_err("full");
    assert_eq!(error.code(), ErrorCode::Conflict);
    let error = membership
        .join_room(&bob, &room.id, token.as_ref())
        .await
        .expect_err("already in");
    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn joiner_from_shared_room_leaves_partner_behind(household: MemoryHousehold) {
    let carol = household.register("Carol").await;
    let dave = household.register("Dave").await;
    let erin = household.register("Erin").await;
    let shared = household.pair(&carol, &dave).await;

    let joined = household.pair(&erin, &dave).await;

    assert_eq!(joined.member_ids, vec![erin.id, dave.id]);
    let shared = room_of(&household, &shared.id).await.expect("kept");
    assert_eq!(shared.member_ids, vec![carol.id]);
}

#[rstest]
#[tokio::test]
async fn solo_room_dissolves_on_first_vote(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let membership = household.membership();
    let room_id = alice.room_id.expect("room");

    assert!(membership.vote_deletion(&alice).await.expect("vote"));

    assert!(room_of(&household, &room_id).await.is_none());
    let alice = household.reload(&alice.id).await;
    assert!(alice.room_id.is_none());
    let error = membership.get_my_room(&alice).await.expect_err("gone");
    assert_eq!(error.code(), ErrorCode::NotFound);
    assert_eq!(household.cleanup.jobs().last().map(|j| j.room_id), Some(room_id));
}

#[rstest]
#[tokio::test]
async fn paired_room_needs_both_votes(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let room = household.pair(&alice, &bob).await;
    let (alice, bob) = (
        household.reload(&alice.id).await,
        household.reload(&bob.id).await,
    );
    let membership = household.membership();

    assert!(!membership.vote_deletion(&alice).await.expect("alice votes"));
    membership
        .cancel_deletion_vote(&alice)
        .await
        .expect("alice cancels");
    assert!(!membership.vote_deletion(&bob).await.expect("bob votes"));
    let pending = room_of(&household, &room.id).await.expect("still there");
    assert!(pending.deletion_votes.contains(&bob.id));
    assert!(!pending.deletion_votes.contains(&alice.id));

    assert!(membership.vote_deletion(&alice).await.expect("alice again"));
    assert!(room_of(&household, &room.id).await.is_none());
    assert!(household.reload(&alice.id).await.room_id.is_none());
    assert!(household.reload(&bob.id).await.room_id.is_none());
}

#[rstest]
#[tokio::test]
async fn cancel_without_vote_is_a_no_op(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let membership = household.membership();
    membership
        .cancel_deletion_vote(&alice)
        .await
        .expect("no-op");
    assert!(membership.get_my_room(&alice).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn refused_cleanup_does_not_fail_dissolution(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    household.cleanup.refuse_jobs();
    assert!(household
        .membership()
        .vote_deletion(&alice)
        .await
        .expect("vote"));
    assert!(household.cleanup.jobs().is_empty());
}

#[rstest]
#[tokio::test]
async fn cleanup_job_carries_request_trace(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let trace_id = TraceId::generate();
    TraceId::scope(trace_id, household.membership().vote_deletion(&alice))
        .await
        .expect("vote");
    let job = household.cleanup.jobs().pop().expect("job queued");
    assert_eq!(job.trace_id, trace_id);
}

#[rstest]
#[tokio::test]
async fn settings_update_per_field(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let membership = household.membership();

    let room = membership
        .update_room_settings(
            &alice,
            RoomSettingsUpdate {
                display_name: Some("Flat 3".to_owned()),
                description: FieldUpdate::Set("Top floor".to_owned()),
            },
        )
        .await
        .expect("update");
    assert_eq!(room.display_name.as_ref(), "Flat 3");
    assert_eq!(room.description.as_deref(), Some("Top floor"));

    let room = membership
        .update_room_settings(
            &alice,
            RoomSettingsUpdate {
                display_name: None,
                description: FieldUpdate::from_text(Some(String::new())),
            },
        )
        .await
        .expect("clear");
    assert_eq!(room.display_name.as_ref(), "Flat 3");
    assert!(room.description.is_none());

    let error = membership
        .update_room_settings(
            &alice,
            RoomSettingsUpdate {
                display_name: Some("   ".to_owned()),
                description: FieldUpdate::Unchanged,
            },
        )
        .await
        .expect_err("blank name");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn leaving_shared_room_keeps_partner(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let room = household.pair(&alice, &bob).await;
    let bob = household.reload(&bob.id).await;
    let queued = household.cleanup.jobs().len();

    household.membership().leave_room(&bob).await.expect("leave");

    let room = room_of(&household, &room.id).await.expect("kept");
    assert_eq!(room.member_ids, vec![alice.id]);
    assert!(household.reload(&bob.id).await.room_id.is_none());
    assert_eq!(household.cleanup.jobs().len(), queued);
}

#[rstest]
#[tokio::test]
async fn leaving_solo_room_deletes_it(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let room_id = alice.room_id.expect("room");

    household.membership().leave_room(&alice).await.expect("leave");

    assert!(room_of(&household, &room_id).await.is_none());
    assert_eq!(household.cleanup.jobs().len(), 1);
}

#[rstest]
#[tokio::test]
async fn failed_join_rolls_back_when_atomic(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let membership = household.membership();
    let token = membership.rotate_share_token(&alice).await.expect("token");
    let r1 = alice.room_id.expect("r1");
    household
        .store
        .fail_next("rooms.consume_share_token", StoreFault::Connection);

    let error = membership
        .join_room(&bob, &r1, token.as_ref())
        .await
        .expect_err("store down");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    let r1 = room_of(&household, &r1).await.expect("r1");
    assert_eq!(r1.member_ids, vec![alice.id]);
    assert_eq!(r1.share_token, Some(token));
    assert!(room_of(&household, &bob.room_id.expect("r2")).await.is_some());
    assert!(household.cleanup.jobs().is_empty());
}

#[tokio::test]
async fn failed_join_keeps_partial_writes_when_sequential() {
    let household = MemoryHousehold::sequential();
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let membership = household.membership();
    let token = membership.rotate_share_token(&alice).await.expect("token");
    let r1 = alice.room_id.expect("r1");
    household
        .store
        .fail_next("rooms.consume_share_token", StoreFault::Connection);

    membership
        .join_room(&bob, &r1, token.as_ref())
        .await
        .expect_err("store down");

    let room = room_of(&household, &r1).await.expect("r1");
    assert_eq!(room.member_ids, vec![alice.id, bob.id]);
    assert_eq!(room.share_token, Some(token));
    assert_eq!(household.reload(&bob.id).await.room_id, Some(r1));
    assert!(room_of(&household, &bob.room_id.expect("r2")).await.is_some());
}

#[rstest]
#[case::atomic(MemoryHousehold::atomic())]
#[case::sequential(MemoryHousehold::sequential())]
#[tokio::test]
async fn second_join_from_a_stale_user_record_conflicts(#[case] household: MemoryHousehold) {
    let household = MemoryHousehold {
        tokens: Arc::new(SequenceShareTokens::new(["AAAAA", "CCCCC"])),
        ..household
    };
    let alice = household.register("Alice").await;
    let carol = household.register("Carol").await;
    let stale_bob = household.register("Bob").await;
    let membership = household.membership();
    let (r1, r3) = (alice.room_id.expect("r1"), carol.room_id.expect("r3"));
    let first = membership.rotate_share_token(&alice).await.expect("token");
    let second = membership.rotate_share_token(&carol).await.expect("token");

    membership
        .join_room(&stale_bob, &r1, first.as_ref())
        .await
        .expect("first join");
    let error = membership
        .join_room(&stale_bob, &r3, second.as_ref())
        .await
        .expect_err("bob already moved");

    assert_eq!(error.code(), ErrorCode::Conflict);
    assert_eq!(household.reload(&stale_bob.id).await.room_id, Some(r1));
    let r3 = room_of(&household, &r3).await.expect("r3");
    assert_eq!(r3.member_ids, vec![carol.id]);
    assert_eq!(r3.share_token, Some(second));
    let r1 = room_of(&household, &r1).await.expect("r1");
    assert_eq!(r1.member_ids, vec![alice.id, stale_bob.id]);
}

/// Holds each unit of work at `gate` so racing callers all pass their checks first.
struct GatedRunner {
    inner: Arc<dyn TransactionRunner>,
    gate: Barrier,
}

#[async_trait]
impl TransactionRunner for GatedRunner {
    fn mode(&self) -> TransactionMode {
        self.inner.mode()
    }

    async fn run<'a>(&self, work: TransactionWork<'a>) -> Result<(), Error> {
        self.gate.wait().await;
        self.inner.run(work).await
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_joins_admit_one_joiner(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let carol = household.register("Carol").await;
    let token = household
        .membership()
        .rotate_share_token(&alice)
        .await
        .expect("token");
    let r1 = alice.room_id.expect("r1");
    let mut ports = household.ports.clone();
    ports.transactions = Arc::new(GatedRunner {
        inner: Arc::clone(&household.ports.transactions),
        gate: Barrier::new(2),
    });
    let membership = MembershipService::new(
        ports,
        household.tokens.clone(),
        RoomName::new("My Room").expect("valid name"),
    );

    let (bob_joins, carol_joins) = tokio::join!(
        membership.join_room(&bob, &r1, token.as_ref()),
        membership.join_room(&carol, &r1, token.as_ref()),
    );

    let (winner, loser, error) = match (bob_joins, carol_joins) {
        (Ok(_), Err(error)) => (&bob, &carol, error),
        (Err(error), Ok(_)) => (&carol, &bob, error),
        outcome => panic!("expected exactly one join to succeed: {outcome:?}"),
    };
    assert_eq!(error.code(), ErrorCode::Conflict);
    let room = room_of(&household, &r1).await.expect("r1");
    assert_eq!(room.member_ids, vec![alice.id, winner.id]);
    assert!(room.share_token.is_none());
    assert_eq!(household.reload(&loser.id).await.room_id, loser.room_id);
    assert!(room_of(&household, &loser.room_id.expect("solo")).await.is_some());
}

#[rstest]
#[tokio::test]
async fn leaving_completes_a_pending_deletion_vote(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let room = household.pair(&alice, &bob).await;
    let (alice, bob) = (
        household.reload(&alice.id).await,
        household.reload(&bob.id).await,
    );
    let membership = household.membership();
    assert!(!membership.vote_deletion(&alice).await.expect("alice votes"));
    let queued = household.cleanup.jobs().len();

    membership.leave_room(&bob).await.expect("bob leaves");

    assert!(room_of(&household, &room.id).await.is_none());
    assert!(household.reload(&alice.id).await.room_id.is_none());
    let jobs = household.cleanup.jobs();
    assert_eq!(jobs.len(), queued + 1);
    assert_eq!(jobs.last().map(|job| job.room_id), Some(room.id));
}

#[rstest]
#[tokio::test]
async fn joining_elsewhere_completes_a_pending_deletion_vote(household: MemoryHousehold) {
    let alice = household.register("Alice").await;
    let bob = household.register("Bob").await;
    let carol = household.register("Carol").await;
    let shared = household.pair(&alice, &bob).await;
    let alice = household.reload(&alice.id).await;
    assert!(!household
        .membership()
        .vote_deletion(&alice)
        .await
        .expect("alice votes"));

    let joined = household.pair(&carol, &bob).await;

    assert_eq!(joined.member_ids, vec![carol.id, bob.id]);
    assert!(room_of(&household, &shared.id).await.is_none());
    assert!(household.reload(&alice.id).await.room_id.is_none());
}

#[tokio::test]
async fn room_store_outage_is_service_unavailable() {
    let mut rooms = MockRoomRepository::new();
    rooms
        .expect_find_by_id()
        .returning(|_| Err(RoomRepositoryError::connection("refused")));
    let store = Arc::new(MemoryStore::new());
    let ports = HouseholdPorts::new(
        Arc::new(MemoryUserRepository::new(Arc::clone(&store))),
        Arc::new(rooms),
        Arc::new(MemoryListRepository::new(Arc::clone(&store))),
        Arc::new(MemoryListItemRepository::new(store)),
        Arc::new(SequentialTransactionRunner),
        Arc::new(RecordingCleanupQueue::default()),
        Arc::new(MutableClock::fixed()),
    );
    let service = MembershipService::new(
        ports,
        Arc::new(SequenceShareTokens::default()),
        RoomName::new("My Room").expect("valid name"),
    );
    let mut user = User::new(
        UserId::random(),
        UserName::new("Alice").expect("valid name"),
        None,
        chrono::Utc::now(),
    );
    user.room_id = Some(RoomId::random());

    let error = service.get_my_room(&user).await.expect_err("outage");
    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}
