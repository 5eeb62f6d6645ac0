pub mod config;
pub mod error;
pub mod user;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use user::{User, UserInput, UserRepository, ValidationErrors, FieldError};
