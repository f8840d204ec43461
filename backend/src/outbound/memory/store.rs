//! Shared in-memory document store backing the memory repositories.
//!
//! Every repository call takes the state mutex once, evaluates its condition
//! and applies its write before releasing it, which gives the same
//! single-document atomicity a document database offers. Writes record the
//! before-image of each touched document. Inside an atomic transaction those
//! images land in a task-local journal so the runner can restore them if the
//! unit of work fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task_local;

use crate::domain::{ItemId, List, ListId, ListItem, Room, RoomId, User, UserId};

task_local! {
    static TX_JOURNAL: Journal;
}

/// Before-image of one document. `None` means the document did not exist.
#[derive(Debug, Clone)]
pub(crate) enum UndoEntry {
    User(UserId, Option<User>),
    Room(RoomId, Option<Room>),
    List(ListId, Option<List>),
    Item(ItemId, Option<ListItem>),
}

/// Undo log of the atomic transaction running on the current task.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<UndoEntry>>>);

impl Journal {
    fn lock(&self) -> MutexGuard<'_, Vec<UndoEntry>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn extend(&self, entries: Vec<UndoEntry>) {
        self.lock().extend(entries);
    }

    pub(crate) fn take(&self) -> Vec<UndoEntry> {
        std::mem::take(&mut *self.lock())
    }

    /// Run `fut` with this journal collecting before-images.
    pub(crate) async fn scope<F: Future>(&self, fut: F) -> F::Output {
        TX_JOURNAL.scope(self.clone(), fut).await
    }
}

/// Kind of failure a store can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    /// Behave as though the backing store were unreachable.
    Connection,
    /// Behave as though the operation itself failed.
    Query,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) rooms: HashMap<RoomId, Room>,
    pub(crate) lists: HashMap<ListId, List>,
    pub(crate) items: HashMap<ItemId, ListItem>,
}

/// Mutable view of the state that records before-images on first touch.
pub(crate) struct StoreWriter<'a> {
    state: &'a mut StoreState,
    undo: Vec<UndoEntry>,
}

macro_rules! writer_accessors {
    ($field:ident, $id:ty, $doc:ty, $variant:ident, $get_mut:ident, $put:ident, $remove:ident) => {
        pub(crate) fn $get_mut(&mut self, id: &$id) -> Option<&mut $doc> {
            let before = self.state.$field.get(id).cloned();
            if before.is_some() {
                self.undo.push(UndoEntry::$variant(*id, before));
            }
            self.state.$field.get_mut(id)
        }

        pub(crate) fn $put(&mut self, doc: $doc) {
            let before = self.state.$field.get(&doc.id).cloned();
            self.undo.push(UndoEntry::$variant(doc.id, before));
            self.state.$field.insert(doc.id, doc);
        }

        pub(crate) fn $remove(&mut self, id: &$id) -> Option<$doc> {
            let removed = self.state.$field.remove(id);
            if let Some(doc) = &removed {
                self.undo.push(UndoEntry::$variant(*id, Some(doc.clone())));
            }
            removed
        }
    };
}

impl StoreWriter<'_> {
    pub(crate) fn state(&self) -> &StoreState {
        self.state
    }

    writer_accessors!(users, UserId, User, User, user_mut, put_user, remove_user);
    writer_accessors!(rooms, RoomId, Room, Room, room_mut, put_room, remove_room);
    writer_accessors!(lists, ListId, List, List, list_mut, put_list, remove_list);
    writer_accessors!(items, ItemId, ListItem, Item, item_mut, put_item, remove_item);
}

/// Process-local store shared by the memory repositories.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    faults: Mutex<HashMap<&'static str, StoreFault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call to `operation` fail with `fault`.
    ///
    /// Operations are named `<collection>.<method>`, for example
    /// `"users.set_room_id_if"` or `"rooms.add_member"`.
    pub fn fail_next(&self, operation: &'static str, fault: StoreFault) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, fault);
    }

    /// Consume the fault armed for `operation`, if any.
    pub(crate) fn take_fault(&self, operation: &'static str) -> Option<StoreFault> {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(operation)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.lock_state())
    }

    /// Apply `f` atomically.
    ///
    /// On `Err` every change `f` made is reverted before the lock is
    /// released. On `Ok` the before-images join the current transaction's
    /// journal, if one is in scope.
    pub(crate) fn write<R, E>(
        &self,
        f: impl FnOnce(&mut StoreWriter<'_>) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut state = self.lock_state();
        let mut writer = StoreWriter {
            state: &mut *state,
            undo: Vec::new(),
        };
        let result = f(&mut writer);
        let undo = writer.undo;
        match result {
            Ok(value) => {
                if !undo.is_empty() {
                    // Outside a transaction there is nobody to hand the images to.
                    let _ = TX_JOURNAL.try_with(|journal| journal.extend(undo));
                }
                Ok(value)
            }
            Err(error) => {
                restore(&mut state, undo);
                Err(error)
            }
        }
    }

    /// Put back every before-image, newest first.
    pub(crate) fn rollback(&self, entries: Vec<UndoEntry>) {
        restore(&mut self.lock_state(), entries);
    }
}

fn restore(state: &mut StoreState, entries: Vec<UndoEntry>) {
    for entry in entries.into_iter().rev() {
        match entry {
            UndoEntry::User(id, before) => reinstate(&mut state.users, id, before),
            UndoEntry::Room(id, before) => reinstate(&mut state.rooms, id, before),
            UndoEntry::List(id, before) => reinstate(&mut state.lists, id, before),
            UndoEntry::Item(id, before) => reinstate(&mut state.items, id, before),
        }
    }
}

fn reinstate<K, V>(map: &mut HashMap<K, V>, id: K, before: Option<V>)
where
    K: std::hash::Hash + Eq,
{
    match before {
        Some(doc) => {
            map.insert(id, doc);
        }
        None => {
            map.remove(&id);
        }
    }
}
