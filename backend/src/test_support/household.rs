//! Deterministic doubles and a memory-backed harness for household tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::ports::{
    CleanupQueueError, RoomCleanupQueue, TransactionRunner, UserRepository,
};
use crate::domain::{
    AccountService, DEFAULT_ROOM_NAME, HouseholdPorts, ListItemService, ListService,
    MembershipService, RandomShareTokenSource, Room, RoomCleanupJob, RoomCleanupWorker, RoomName,
    ShareToken, ShareTokenSource, User, UserId,
};
use crate::outbound::memory::{
    MemoryListItemRepository, MemoryListRepository, MemoryRoomRepository, MemoryStore,
    MemoryTransactionRunner, MemoryUserRepository, SequentialTransactionRunner,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test double mutex poisoned"),
    }
}

/// Clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// A clock fixed at 2026-01-01T09:00:00Z.
    pub fn fixed() -> Self {
        match Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).single() {
            Some(now) => Self::new(now),
            None => panic!("fixed test instant is unambiguous"),
        }
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *lock(&self.0) += TimeDelta::seconds(seconds);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Hands out scripted share tokens, then random ones.
#[derive(Default)]
pub struct SequenceShareTokens(Mutex<VecDeque<ShareToken>>);

impl SequenceShareTokens {
    /// Panics if a scripted token is malformed.
    pub fn new<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Self {
        let parsed = tokens
            .into_iter()
            .map(|raw| match ShareToken::parse(raw) {
                Ok(token) => token,
                Err(error) => panic!("scripted token {raw:?} is invalid: {error}"),
            })
            .collect();
        Self(Mutex::new(parsed))
    }

    pub fn push(&self, raw: &str) {
        match ShareToken::parse(raw) {
            Ok(token) => lock(&self.0).push_back(token),
            Err(error) => panic!("scripted token {raw:?} is invalid: {error}"),
        }
    }
}

impl ShareTokenSource for SequenceShareTokens {
    fn next_token(&self) -> ShareToken {
        lock(&self.0)
            .pop_front()
            .unwrap_or_else(|| RandomShareTokenSource.next_token())
    }
}

/// Cleanup queue that keeps every job it accepts.
#[derive(Default)]
pub struct RecordingCleanupQueue {
    jobs: Mutex<Vec<RoomCleanupJob>>,
    refuse: Mutex<bool>,
}

impl RecordingCleanupQueue {
    pub fn jobs(&self) -> Vec<RoomCleanupJob> {
        lock(&self.jobs).clone()
    }

    /// Make every later submission fail as if the queue were full.
    pub fn refuse_jobs(&self) {
        *lock(&self.refuse) = true;
    }

    /// Run every recorded job through `worker`, oldest first.
    pub async fn drain_into(&self, worker: &RoomCleanupWorker) {
        let jobs = std::mem::take(&mut *lock(&self.jobs));
        for job in jobs {
            if let Err(error) = worker.process(&job).await {
                panic!("cleanup of {} failed: {error}", job.room_id);
            }
        }
    }
}

#[async_trait]
impl RoomCleanupQueue for RecordingCleanupQueue {
    async fn enqueue(&self, job: RoomCleanupJob) -> Result<(), CleanupQueueError> {
        if *lock(&self.refuse) {
            return Err(CleanupQueueError::rejected("refusing jobs"));
        }
        lock(&self.jobs).push(job);
        Ok(())
    }
}

/// Every service wired to one in-memory store.
pub struct MemoryHousehold {
    pub store: Arc<MemoryStore>,
    pub users: Arc<MemoryUserRepository>,
    pub rooms: Arc<MemoryRoomRepository>,
    pub lists: Arc<MemoryListRepository>,
    pub items: Arc<MemoryListItemRepository>,
    pub clock: Arc<MutableClock>,
    pub tokens: Arc<SequenceShareTokens>,
    pub cleanup: Arc<RecordingCleanupQueue>,
    pub ports: HouseholdPorts,
}

impl MemoryHousehold {
    /// Harness whose transactions roll back on failure.
    pub fn atomic() -> Self {
        let store = Arc::new(MemoryStore::new());
        let runner = Arc::new(MemoryTransactionRunner::new(Arc::clone(&store)));
        Self::with_runner(store, runner)
    }

    /// Harness whose transactions keep partial writes.
    pub fn sequential() -> Self {
        Self::with_runner(
            Arc::new(MemoryStore::new()),
            Arc::new(SequentialTransactionRunner),
        )
    }

    fn with_runner(store: Arc<MemoryStore>, runner: Arc<dyn TransactionRunner>) -> Self {
        let users = Arc::new(MemoryUserRepository::new(Arc::clone(&store)));
        let rooms = Arc::new(MemoryRoomRepository::new(Arc::clone(&store)));
        let lists = Arc::new(MemoryListRepository::new(Arc::clone(&store)));
        let items = Arc::new(MemoryListItemRepository::new(Arc::clone(&store)));
        let clock = Arc::new(MutableClock::fixed());
        let cleanup = Arc::new(RecordingCleanupQueue::default());
        let ports = HouseholdPorts::new(
            users.clone(),
            rooms.clone(),
            lists.clone(),
            items.clone(),
            runner,
            cleanup.clone(),
            clock.clone(),
        );
        Self {
            store,
            users,
            rooms,
            lists,
            items,
            clock,
            tokens: Arc::new(SequenceShareTokens::default()),
            cleanup,
            ports,
        }
    }

    fn default_room_name() -> RoomName {
        match RoomName::new(DEFAULT_ROOM_NAME) {
            Ok(name) => name,
            Err(error) => panic!("default room name rejected: {error}"),
        }
    }

    pub fn membership(&self) -> MembershipService {
        MembershipService::new(
            self.ports.clone(),
            self.tokens.clone(),
            Self::default_room_name(),
        )
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.ports.clone(), Self::default_room_name())
    }

    pub fn lists(&self) -> ListService {
        ListService::new(self.ports.clone())
    }

    pub fn items(&self) -> ListItemService {
        ListItemService::new(self.ports.clone())
    }

    pub fn cleanup_worker(&self) -> RoomCleanupWorker {
        RoomCleanupWorker::new(self.lists.clone(), self.items.clone())
    }

    /// Register a user with a solo room.
    pub async fn register(&self, name: &str) -> User {
        match self.accounts().register(name, None).await {
            Ok(user) => user,
            Err(error) => panic!("registering {name} failed: {error}"),
        }
    }

    /// Invite `guest` into `host`'s room and return the shared room.
    pub async fn pair(&self, host: &User, guest: &User) -> Room {
        let membership = self.membership();
        let host = self.reload(&host.id).await;
        let guest = self.reload(&guest.id).await;
        let token = match membership.rotate_share_token(&host).await {
            Ok(token) => token,
            Err(error) => panic!("issuing a token failed: {error}"),
        };
        let Some(room_id) = host.room_id else {
            panic!("host {} has no room", host.id);
        };
        match membership.join_room(&guest, &room_id, token.as_ref()).await {
            Ok(room) => room,
            Err(error) => panic!("joining failed: {error}"),
        }
    }

    /// Fresh copy of a stored user.
    pub async fn reload(&self, id: &UserId) -> User {
        match self.users.find_by_id(id).await {
            Ok(Some(user)) => user,
            Ok(None) => panic!("user {id} is missing"),
            Err(error) => panic!("loading user {id} failed: {error}"),
        }
    }
}
