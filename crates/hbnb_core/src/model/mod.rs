//! Domain entities persisted by the storage layer.
//!
//! # Responsibility
//! - Define the six storable types and their shared identity fields.
//! - Provide the `Entity` value both backends stage and return.
//!
//! # Invariants
//! - Attributes the schema requires are still `Option` here; only the
//!   relational backend enforces them.

pub mod base;
pub mod entity;
pub mod geo;
pub mod place;
pub mod user;

pub use base::BaseFields;
pub use entity::{composite_key, Entity, Record, CLASS_FIELD};
pub use geo::{City, State};
pub use place::{Amenity, Place, Review};
pub use user::User;
