//! Entity registry: type names, constructors and table descriptors.
//!
//! # Responsibility
//! - Resolve a persisted type name to the kind that can rebuild it.
//! - Describe the relational table backing each kind.
//!
//! # Invariants
//! - `EntityKind::ALL` is parent-first: a kind never references a kind
//!   listed after it.
//! - `columns()` lists exactly the attributes `Entity::to_record()` emits,
//!   minus `__class__`.

use crate::model::{Amenity, City, Entity, Place, Record, Review, State, User};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Builds a typed entity from a flat attribute mapping.
pub type Constructor = fn(Record) -> Result<Entity, RegistryError>;

const BASE_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Registered entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    State,
    City,
    User,
    Place,
    Review,
    Amenity,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        Self::State,
        Self::City,
        Self::User,
        Self::Place,
        Self::Review,
        Self::Amenity,
    ];

    /// Type name used in composite keys and `__class__`.
    pub fn name(self) -> &'static str {
        match self {
            Self::State => "State",
            Self::City => "City",
            Self::User => "User",
            Self::Place => "Place",
            Self::Review => "Review",
            Self::Amenity => "Amenity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::State => "states",
            Self::City => "cities",
            Self::User => "users",
            Self::Place => "places",
            Self::Review => "reviews",
            Self::Amenity => "amenities",
        }
    }

    /// Columns of `table()`, `id` first.
    pub fn columns(self) -> Vec<&'static str> {
        let own: &[&'static str] = match self {
            Self::State => &["name"],
            Self::City => &["state_id", "name"],
            Self::User => &["email", "password", "first_name", "last_name"],
            Self::Place => &[
                "city_id",
                "user_id",
                "name",
                "description",
                "number_rooms",
                "number_bathrooms",
                "max_guest",
                "price_by_night",
                "latitude",
                "longitude",
            ],
            Self::Review => &["place_id", "user_id", "text"],
            Self::Amenity => &["name"],
        };
        BASE_COLUMNS.iter().chain(own).copied().collect()
    }

    pub fn constructor(self) -> Constructor {
        match self {
            Self::State => |record: Record| build::<State>(EntityKind::State, record),
            Self::City => |record: Record| build::<City>(EntityKind::City, record),
            Self::User => |record: Record| build::<User>(EntityKind::User, record),
            Self::Place => |record: Record| build::<Place>(EntityKind::Place, record),
            Self::Review => |record: Record| build::<Review>(EntityKind::Review, record),
            Self::Amenity => |record: Record| build::<Amenity>(EntityKind::Amenity, record),
        }
    }

    /// Shorthand for `self.constructor()(record)`.
    pub fn build(self, record: Record) -> Result<Entity, RegistryError> {
        (self.constructor())(record)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves a type name.
pub fn lookup(name: &str) -> Option<EntityKind> {
    EntityKind::from_name(name)
}

/// Registered type names in registry order.
pub fn type_names() -> Vec<&'static str> {
    EntityKind::ALL.iter().map(|kind| kind.name()).collect()
}

/// Rebuilds an entity from a record carrying its own `__class__` field.
pub fn from_tagged_record(record: Record) -> Result<Entity, RegistryError> {
    let class_name = match record.get(crate::model::CLASS_FIELD) {
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(RegistryError::MalformedRecord {
                kind: None,
                message: format!("`__class__` must be a string, got {other}"),
            })
        }
        None => {
            return Err(RegistryError::MalformedRecord {
                kind: None,
                message: "missing `__class__` field".to_string(),
            })
        }
    };

    let kind = lookup(&class_name).ok_or(RegistryError::UnknownType(class_name))?;
    kind.build(record)
}

/// Registry resolution and construction errors.
#[derive(Debug)]
pub enum RegistryError {
    UnknownType(String),
    MalformedRecord {
        kind: Option<EntityKind>,
        message: String,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(name) => write!(f, "unknown entity type `{name}`"),
            Self::MalformedRecord {
                kind: Some(kind),
                message,
            } => write!(f, "malformed {kind} record: {message}"),
            Self::MalformedRecord { kind: None, message } => {
                write!(f, "malformed record: {message}")
            }
        }
    }
}

impl Error for RegistryError {}

fn build<T>(kind: EntityKind, record: Record) -> Result<Entity, RegistryError>
where
    T: DeserializeOwned + Into<Entity>,
{
    serde_json::from_value::<T>(Value::Object(record))
        .map(Into::into)
        .map_err(|err| RegistryError::MalformedRecord {
            kind: Some(kind),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{lookup, type_names, EntityKind};

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in EntityKind::ALL {
            assert_eq!(lookup(kind.name()), Some(kind));
        }
        assert_eq!(lookup("BaseModel"), None);
        assert_eq!(lookup("state"), None);
    }

    #[test]
    fn type_names_follow_registry_order() {
        assert_eq!(
            type_names(),
            vec!["State", "City", "User", "Place", "Review", "Amenity"]
        );
    }

    #[test]
    fn columns_start_with_identity_fields() {
        for kind in EntityKind::ALL {
            assert_eq!(&kind.columns()[..3], &["id", "created_at", "updated_at"]);
        }
    }
}
