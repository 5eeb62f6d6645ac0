use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use userapi_core::config::CacheConfig;
use userapi_core::error::{AppError, Result};
use userapi_core::user::{User, UserInput, UserRepository};

use crate::cache::TtlCache;

fn cache_key(id: i64) -> String {
    format!("user:{}", id)
}

fn check_id(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(AppError::InvalidArgument("invalid user ID".to_string()));
    }
    Ok(())
}

/// User use cases: validation, email uniqueness, and cache-aside reads.
pub struct UserService<R: UserRepository> {
    repo: R,
    cache: Arc<TtlCache>,
    ttl: Duration,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R, cache: Arc<TtlCache>, ttl: Duration) -> Self {
        Self { repo, cache, ttl }
    }

    /// Build a service with a fresh cache sized from `[cache]`.
    pub fn from_config(repo: R, config: &CacheConfig) -> Self {
        Self::new(
            repo,
            Arc::new(TtlCache::with_max_entries(config.max_entries)),
            Duration::from_secs(config.ttl_secs),
        )
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub async fn create(&self, input: &UserInput) -> Result<User> {
        input.validate()?;
        let input = input.normalized();

        if self.repo.get_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict("email already exists".to_string()));
        }

        self.repo.create(&input).await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        check_id(id)?;

        let key = cache_key(id);
        if let Some(user) = self.cache.get_json::<User>(&key) {
            debug!("Cache hit for {}", key);
            return Ok(user);
        }

        let user = self.repo.get_by_id(id).await?;
        self.cache.set_json(key, &user, self.ttl);
        Ok(user)
    }

    pub async fn update(&self, id: i64, input: &UserInput) -> Result<User> {
        check_id(id)?;
        input.validate()?;
        let input = input.normalized();

        let existing = self.repo.get_by_id(id).await?;
        if existing.email != input.email {
            if let Some(other) = self.repo.get_by_email(&input.email).await? {
                if other.id != id {
                    return Err(AppError::Conflict("email already exists".to_string()));
                }
            }
        }

        let user = self.repo.update(id, &input).await?;
        self.cache.invalidate(&cache_key(id));
        Ok(user)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        check_id(id)?;
        self.repo.delete(id).await?;
        self.cache.invalidate(&cache_key(id));
        Ok(())
    }
}
