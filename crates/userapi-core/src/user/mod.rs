//! User records: the entity, request validation and the storage seam.

mod entity;
mod traits;
mod validation;

pub use entity::{User, UserInput};
pub use traits::UserRepository;
pub use validation::{FieldError, ValidationErrors};
