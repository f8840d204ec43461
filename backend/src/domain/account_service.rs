//! Account registration, profile edits and account removal.
//!
//! A registered user always starts with a room of their own, so the user
//! document and the solo room are written together.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::cleanup::submit_room_cleanup;
use super::membership_service::settle_after_departure;
use super::{Error, HouseholdPorts, Room, RoomId, RoomName, User, UserId, UserName, Username};

fn parse_username(raw: &str) -> Result<Username, Error> {
    Username::new(raw).map_err(|err| Error::invalid_request(err.to_string()))
}

/// Sign-up and account maintenance.
#[derive(Clone)]
pub struct AccountService {
    ports: HouseholdPorts,
    default_room_name: RoomName,
}

impl AccountService {
    pub fn new(ports: HouseholdPorts, default_room_name: RoomName) -> Self {
        Self {
            ports,
            default_room_name,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.ports.clock.utc()
    }

    async fn ensure_username_free(&self, username: &Username, owner: &UserId) -> Result<(), Error> {
        match self.ports.users.find_by_username(username).await? {
            Some(holder) if holder.id != *owner => {
                Err(Error::conflict(format!("username {username} is taken")))
            }
            _ => Ok(()),
        }
    }

    /// Load a user by id. `NotFound` when absent.
    pub async fn find_user(&self, id: &UserId) -> Result<User, Error> {
        self.ports
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("user {id} not found")))
    }

    /// Create a user and their solo room.
    ///
    /// A blank `username` counts as none. Usernames must look like an email
    /// address and be unused.
    pub async fn register(&self, name: &str, username: Option<&str>) -> Result<User, Error> {
        let name = UserName::new(name).map_err(|err| Error::invalid_request(err.to_string()))?;
        let username = username
            .filter(|raw| !raw.trim().is_empty())
            .map(parse_username)
            .transpose()?;
        let id = UserId::random();
        if let Some(username) = &username {
            self.ensure_username_free(username, &id).await?;
        }

        let now = self.now();
        let room = Room::solo(RoomId::random(), id, self.default_room_name.clone(), now);
        let mut user = User::new(id, name, username, now);
        user.room_id = Some(room.id);

        let (users, rooms) = (&self.ports.users, &self.ports.rooms);
        let (user_ref, room_ref) = (&user, &room);
        self.ports
            .transactions
            .run(Box::pin(async move {
                users.insert(user_ref).await?;
                rooms.insert(room_ref).await?;
                Ok::<(), Error>(())
            }))
            .await?;

        info!(user_id = %user.id, room_id = %room.id, "user registered");
        Ok(user)
    }

    /// Change the display name, the username, or both.
    pub async fn update_profile(
        &self,
        user: &User,
        name: Option<&str>,
        username: Option<&str>,
    ) -> Result<User, Error> {
        let name = name
            .map(UserName::new)
            .transpose()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let username = username.map(parse_username).transpose()?;
        if let Some(username) = &username {
            self.ensure_username_free(username, &user.id).await?;
        }

        if name.is_some() || username.is_some() {
            let now = self.now();
            let users = &self.ports.users;
            let user_id = user.id;
            let (name_ref, username_ref) = (&name, &username);
            self.ports
                .transactions
                .run(Box::pin(async move {
                    if let Some(name) = name_ref {
                        users.update_name(&user_id, name, now).await?;
                    }
                    if let Some(username) = username_ref {
                        users.update_username(&user_id, username, now).await?;
                    }
                    Ok::<(), Error>(())
                }))
                .await?;
            info!(user_id = %user.id, "profile updated");
        } else {
            debug!(user_id = %user.id, "empty profile update");
        }

        self.find_user(&user.id).await
    }

    /// Remove the user.
    ///
    /// A room the user had to themselves is deleted with them. In a shared
    /// room the other member stays, and the leaver's deletion vote goes too;
    /// if the partner had already voted, the room is dissolved.
    pub async fn delete_account(&self, user: &User) -> Result<(), Error> {
        let room = match user.room_id {
            Some(room_id) => self.ports.rooms.find_by_id(&room_id).await?,
            None => None,
        }
        .filter(|room| room.is_member(&user.id));

        let now = self.now();
        let (users, rooms) = (&self.ports.users, &self.ports.rooms);
        let user_id = user.id;
        let mut departed = None;
        let dissolved = match room {
            Some(room) if room.is_sole_member(&user_id) => {
                let room_id = room.id;
                self.ports
                    .transactions
                    .run(Box::pin(async move {
                        rooms.delete_if_sole_member(&room_id, &user_id).await?;
                        users.delete(&user_id).await?;
                        Ok::<(), Error>(())
                    }))
                    .await?;
                Some(room_id)
            }
            Some(room) => {
                let room_id = room.id;
                self.ports
                    .transactions
                    .run(Box::pin(async move {
                        rooms.remove_member(&room_id, &user_id, now).await?;
                        users.delete(&user_id).await?;
                        Ok::<(), Error>(())
                    }))
                    .await?;
                departed = Some(room_id);
                None
            }
            None => {
                users.delete(&user_id).await?;
                None
            }
        };

        if let Some(room_id) = dissolved {
            submit_room_cleanup(self.ports.cleanup.as_ref(), room_id, now).await;
        }
        if let Some(room_id) = departed {
            settle_after_departure(&self.ports, &room_id, now).await;
        }
        info!(%user_id, dissolved_room = ?dissolved, "account deleted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "account_service_tests.rs"]
mod tests;
