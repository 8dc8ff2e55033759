//! User repository.
//!
//! Writes to a single user are serialized through that user's mutex, so
//! an update closure observes a consistent record and its changes land
//! atomically. Uniqueness of email and username is enforced under the
//! map's write lock at insert time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use vscrub_models::User;

use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    users: HashMap<String, Arc<Mutex<User>>>,
    /// Lowercased email -> user id.
    by_email: HashMap<String, String>,
    /// Username -> user id.
    by_username: HashMap<String, String>,
}

/// In-memory user repository.
#[derive(Default)]
pub struct UserStore {
    inner: RwLock<Inner>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new user. The duplicate check and the insert happen
    /// under one write lock, so two concurrent registrations with the
    /// same email cannot both succeed.
    pub async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let email_key = user.email.to_lowercase();
        if inner.by_email.contains_key(&email_key) {
            return Err(StoreError::EmailTaken);
        }
        if inner.by_username.contains_key(&user.username) {
            return Err(StoreError::UsernameTaken);
        }

        debug!(user_id = %user.id, username = %user.username, "user created");
        inner.by_email.insert(email_key, user.id.clone());
        inner.by_username.insert(user.username.clone(), user.id.clone());
        inner
            .users
            .insert(user.id.clone(), Arc::new(Mutex::new(user)));
        Ok(())
    }

    /// Snapshot of a user by id.
    pub async fn get(&self, id: &str) -> Result<User, StoreError> {
        let slot = {
            let inner = self.inner.read().await;
            inner.users.get(id).cloned()
        };
        match slot {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Err(StoreError::NotFound),
        }
    }

    /// Snapshot of a user by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let id = {
            let inner = self.inner.read().await;
            inner.by_email.get(&email.to_lowercase()).cloned()
        };
        match id {
            Some(id) => self.get(&id).await,
            None => Err(StoreError::NotFound),
        }
    }

    /// Apply `f` to the user under their mutex and return its result.
    /// `updated_at` is bumped on every call.
    pub async fn update<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut User) -> T,
    ) -> Result<T, StoreError> {
        let slot = {
            let inner = self.inner.read().await;
            inner.users.get(id).cloned()
        };
        let Some(slot) = slot else {
            return Err(StoreError::NotFound);
        };

        let mut user = slot.lock().await;
        let out = f(&mut user);
        user.updated_at = Utc::now();
        Ok(out)
    }

    /// Change a user's username and/or email, keeping the uniqueness
    /// indexes consistent. Both checks happen under the map's write
    /// lock before anything is modified.
    pub async fn update_identity(
        &self,
        id: &str,
        new_username: Option<&str>,
        new_email: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        let slot = inner.users.get(id).cloned().ok_or(StoreError::NotFound)?;
        let mut user = slot.lock().await;

        if let Some(email) = new_email {
            let key = email.to_lowercase();
            if inner.by_email.get(&key).is_some_and(|owner| owner != id) {
                return Err(StoreError::EmailTaken);
            }
        }
        if let Some(username) = new_username {
            if inner
                .by_username
                .get(username)
                .is_some_and(|owner| owner != id)
            {
                return Err(StoreError::UsernameTaken);
            }
        }

        if let Some(email) = new_email {
            inner.by_email.remove(&user.email.to_lowercase());
            inner.by_email.insert(email.to_lowercase(), id.to_string());
            user.email = email.to_string();
        }
        if let Some(username) = new_username {
            inner.by_username.remove(&user.username);
            inner
                .by_username
                .insert(username.to_string(), id.to_string());
            user.username = username.to_string();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    /// Delete a user and their index entries.
    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let slot = inner.users.remove(id).ok_or(StoreError::NotFound)?;

        let user = slot.lock().await;
        inner.by_email.remove(&user.email.to_lowercase());
        inner.by_username.remove(&user.username);
        debug!(user_id = %id, "user removed");
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscrub_models::PlanTier;

    fn sample(username: &str, email: &str) -> User {
        User::new(username, email, "$2b$...")
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = UserStore::new();
        let user = sample("alice", "Alice@Example.com");
        let id = user.id.clone();
        store.insert(user).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap().username, "alice");
        // Email lookup is case-insensitive
        let found = store.find_by_email("alice@example.com").await.unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = UserStore::new();
        store.insert(sample("alice", "a@example.com")).await.unwrap();
        assert_eq!(
            store.insert(sample("bob", "A@example.com")).await,
            Err(StoreError::EmailTaken)
        );
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = UserStore::new();
        store.insert(sample("alice", "a@example.com")).await.unwrap();
        assert_eq!(
            store.insert(sample("alice", "b@example.com")).await,
            Err(StoreError::UsernameTaken)
        );
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let store = UserStore::new();
        assert_eq!(
            store.update("missing", |_| ()).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_concurrent_updates_serialize() {
        let store = Arc::new(UserStore::new());
        let user = sample("alice", "a@example.com");
        let id = user.id.clone();
        store.insert(user).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update(&id, |u| {
                        u.total_usage += 1;
                    })
                    .await
                    .unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        // No lost increments under contention
        assert_eq!(store.get(&id).await.unwrap().total_usage, 50);
    }

    #[tokio::test]
    async fn test_update_identity_reindexes_email() {
        let store = UserStore::new();
        let user = sample("alice", "a@example.com");
        let id = user.id.clone();
        store.insert(user).await.unwrap();
        store.insert(sample("bob", "b@example.com")).await.unwrap();

        let updated = store
            .update_identity(&id, None, Some("new@example.com"))
            .await
            .unwrap();
        assert_eq!(updated.email, "new@example.com");

        assert_eq!(
            store.find_by_email("new@example.com").await.unwrap().id,
            id
        );
        assert!(matches!(
            store.find_by_email("a@example.com").await,
            Err(StoreError::NotFound)
        ));

        // Taking another user's email is rejected
        assert!(matches!(
            store
                .update_identity(&id, None, Some("B@example.com"))
                .await,
            Err(StoreError::EmailTaken)
        ));
        // Keeping your own email is not a conflict
        assert!(store
            .update_identity(&id, Some("alice2"), Some("new@example.com"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_remove_frees_identity() {
        let store = UserStore::new();
        let user = sample("alice", "a@example.com");
        let id = user.id.clone();
        store.insert(user).await.unwrap();

        store.remove(&id).await.unwrap();
        assert!(matches!(store.get(&id).await, Err(StoreError::NotFound)));
        assert_eq!(store.count().await, 0);

        // Removal releases the email and username for re-registration
        store.insert(sample("alice", "a@example.com")).await.unwrap();

        assert_eq!(store.remove("missing").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_update_returns_closure_value() {
        let store = UserStore::new();
        let user = sample("alice", "a@example.com");
        let id = user.id.clone();
        store.insert(user).await.unwrap();

        let tier = store
            .update(&id, |u| {
                u.plan_tier = PlanTier::Paid;
                u.plan_tier
            })
            .await
            .unwrap();
        assert_eq!(tier, PlanTier::Paid);
        assert_eq!(store.get(&id).await.unwrap().plan_tier, PlanTier::Paid);
    }
}
