//! User records: Postgres storage and the cache-aside use case on top of it.

mod repository;
mod service;

#[cfg(test)]
pub(crate) mod memory;

pub use repository::PgUserRepository;
pub use service::UserService;
