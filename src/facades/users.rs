//! User profile, preference and session caching.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheEngine, Invalidation};
use crate::error::Result;

/// Session sets live for a day.
pub const SESSION_TTL: u64 = 86_400;

/// User-facing cache over the `user:` namespace.
#[derive(Debug, Clone)]
pub struct UserCache {
    engine: Arc<CacheEngine>,
}

impl UserCache {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CacheEngine> {
        &self.engine
    }

    fn profile_key(user_id: &str) -> String {
        format!("profile:{}", user_id)
    }

    fn preferences_key(user_id: &str) -> String {
        format!("preferences:{}", user_id)
    }

    fn sessions_key(user_id: &str) -> String {
        format!("sessions:{}", user_id)
    }

    // == Profiles ==
    pub async fn get_profile<T: DeserializeOwned>(&self, user_id: &str) -> Option<T> {
        self.engine.get(&Self::profile_key(user_id)).await
    }

    /// Reads a profile, loading it with `load` on a miss.
    pub async fn load_profile<T, F, Fut>(&self, user_id: &str, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        self.engine
            .get_or_compute(&Self::profile_key(user_id), None, load)
            .await
    }

    pub async fn set_profile<T: Serialize + ?Sized>(&self, user_id: &str, profile: &T) -> Result<()> {
        self.engine
            .set(&Self::profile_key(user_id), profile, None)
            .await
    }

    pub async fn invalidate_profile(&self, user_id: &str) -> Result<bool> {
        self.engine.del(&Self::profile_key(user_id)).await
    }

    // == Preferences ==
    pub async fn get_preferences<T: DeserializeOwned>(&self, user_id: &str) -> Option<T> {
        self.engine.get(&Self::preferences_key(user_id)).await
    }

    pub async fn set_preferences<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        preferences: &T,
    ) -> Result<()> {
        self.engine
            .set(&Self::preferences_key(user_id), preferences, None)
            .await
    }

    // == Sessions ==
    /// Records an active session id; the set expires a day after the last add.
    pub async fn add_session(&self, user_id: &str, session_id: &str) -> Result<u64> {
        self.engine
            .sadd(&Self::sessions_key(user_id), &[session_id], Some(SESSION_TTL))
            .await
    }

    pub async fn sessions(&self, user_id: &str) -> Result<Vec<String>> {
        self.engine.smembers(&Self::sessions_key(user_id)).await
    }

    /// Drops everything cached for one user.
    pub async fn invalidate_user(&self, user_id: &str) -> Invalidation {
        self.engine.del_pattern(&format!("*:{}", user_id)).await
    }
}
