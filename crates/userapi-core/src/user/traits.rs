use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

use super::entity::{User, UserInput};

/// Storage for user records.
///
/// Lookups ignore soft-deleted rows. `get_by_email` returns `Ok(None)` when no
/// live record matches; the other lookups and writes report a missing row as
/// `AppError::NotFound`.
pub trait UserRepository: Send + Sync + 'static {
    fn create<'a>(
        &'a self,
        input: &'a UserInput,
    ) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>>;

    fn get_by_id(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<User>> + Send + '_>>;

    fn get_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>>> + Send + 'a>>;

    fn update<'a>(
        &'a self,
        id: i64,
        input: &'a UserInput,
    ) -> Pin<Box<dyn Future<Output = Result<User>> + Send + 'a>>;

    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
