//! Memory-backed `UserRepository`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::{MemoryStore, StoreFault};
use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{RoomId, User, UserId, UserName, Username};

/// `UserRepository` over a shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryUserRepository {
    store: Arc<MemoryStore>,
}

impl MemoryUserRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn check(&self, operation: &'static str) -> Result<(), UserRepositoryError> {
        match self.store.take_fault(operation) {
            None => Ok(()),
            Some(StoreFault::Connection) => Err(UserRepositoryError::connection(operation)),
            Some(StoreFault::Query) => Err(UserRepositoryError::query(operation)),
        }
    }

    fn update(
        &self,
        operation: &'static str,
        id: &UserId,
        apply: impl FnOnce(&mut User) -> Result<(), UserRepositoryError>,
    ) -> Result<(), UserRepositoryError> {
        self.check(operation)?;
        self.store.write(|w| {
            let user = w
                .user_mut(id)
                .ok_or_else(|| UserRepositoryError::not_found(id.to_string()))?;
            apply(user)
        })
    }
}

fn username_taken(state: &super::store::StoreState, username: &Username, except: &UserId) -> bool {
    state
        .users
        .values()
        .any(|user| user.id != *except && user.username.as_ref() == Some(username))
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<(), UserRepositoryError> {
        self.check("users.insert")?;
        self.store.write(|w| {
            if w.state().users.contains_key(&user.id) {
                return Err(UserRepositoryError::duplicate(user.id.to_string()));
            }
            if let Some(username) = &user.username
                && username_taken(w.state(), username, &user.id)
            {
                return Err(UserRepositoryError::duplicate(username.to_string()));
            }
            w.put_user(user.clone());
            Ok(())
        })
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        self.check("users.find_by_id")?;
        Ok(self.store.read(|s| s.users.get(id).cloned()))
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, UserRepositoryError> {
        self.check("users.find_by_username")?;
        Ok(self.store.read(|s| {
            s.users
                .values()
                .find(|user| user.username.as_ref() == Some(username))
                .cloned()
        }))
    }

    async fn assign_room_if_unset(
        &self,
        id: &UserId,
        room_id: &RoomId,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        self.update("users.assign_room_if_unset", id, |user| {
            if let Some(existing) = user.room_id {
                return Err(UserRepositoryError::condition_failed(format!(
                    "user {} already belongs to room {existing}",
                    user.id
                )));
            }
            user.room_id = Some(*room_id);
            user.updated_at = now;
            Ok(())
        })
    }

    async fn set_room_id_if(
        &self,
        id: &UserId,
        expected: Option<RoomId>,
        room_id: Option<RoomId>,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        self.update("users.set_room_id_if", id, |user| {
            if user.room_id != expected {
                return Err(UserRepositoryError::condition_failed(format!(
                    "user {} moved to room {:?}",
                    user.id, user.room_id
                )));
            }
            user.room_id = room_id;
            user.updated_at = now;
            Ok(())
        })
    }

    async fn update_name(
        &self,
        id: &UserId,
        name: &UserName,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        self.update("users.update_name", id, |user| {
            user.name = name.clone();
            user.updated_at = now;
            Ok(())
        })
    }

    async fn update_username(
        &self,
        id: &UserId,
        username: &Username,
        now: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        self.check("users.update_username")?;
        self.store.write(|w| {
            if username_taken(w.state(), username, id) {
                return Err(UserRepositoryError::duplicate(username.to_string()));
            }
            let user = w
                .user_mut(id)
                .ok_or_else(|| UserRepositoryError::not_found(id.to_string()))?;
            user.username = Some(username.clone());
            user.updated_at = now;
            Ok(())
        })
    }

    async fn delete(&self, id: &UserId) -> Result<(), UserRepositoryError> {
        self.check("users.delete")?;
        self.store.write(|w| {
            w.remove_user(id)
                .map(|_| ())
                .ok_or_else(|| UserRepositoryError::not_found(id.to_string()))
        })
    }
}
