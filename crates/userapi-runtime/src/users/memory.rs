//! In-memory `UserRepository` for service and router tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use userapi_core::error::{AppError, Result};
use userapi_core::user::{User, UserInput, UserRepository};

#[derive(Clone, Default)]
pub(crate) struct MemoryUserRepository {
    users: Arc<Mutex<Vec<User>>>,
    /// Number of `get_by_id` calls that reached storage.
    reads: Arc<AtomicUsize>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("user {} not found", id))
}

impl UserRepository for MemoryUserRepository {
    fn create<'a>(
        &'a self,
        input: &'a UserInput,
    ) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>> {
        Box::pin(async move {
            let mut users = self.users.lock().unwrap();
            let now = Utc::now();
            let user = User {
                id: users.len() as i64 + 1,
                name: input.name.clone(),
                email: input.email.clone(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            users.push(user.clone());
            Ok(user)
        })
    }

    fn get_by_id(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<User>> + Send + '_>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id && u.deleted_at.is_none())
                .cloned()
                .ok_or_else(|| not_found(id))
        })
    }

    fn get_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>>> + Send + 'a>> {
        Box::pin(async move {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email && u.deleted_at.is_none())
                .cloned())
        })
    }

    fn update<'a>(
        &'a self,
        id: i64,
        input: &'a UserInput,
    ) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>> {
        Box::pin(async move {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == id && u.deleted_at.is_none())
                .ok_or_else(|| not_found(id))?;
            user.name = input.name.clone();
            user.email = input.email.clone();
            user.updated_at = Utc::now();
            Ok(user.clone())
        })
    }

    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == id && u.deleted_at.is_none())
                .ok_or_else(|| not_found(id))?;
            user.deleted_at = Some(Utc::now());
            Ok(())
        })
    }
}
