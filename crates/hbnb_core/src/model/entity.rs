//! Closed set of storable objects.
//!
//! # Responsibility
//! - Give both backends one value type to stage, persist and return.
//! - Render an object as a flat `Record` tagged with its type name.
//!
//! # Invariants
//! - `key()` is always `"<Type>.<id>"` with the registry type name.
//! - `to_record()` emits every attribute, including nulls, plus `__class__`.

use super::base::BaseFields;
use super::geo::{City, State};
use super::place::{Amenity, Place, Review};
use super::user::User;
use crate::registry::EntityKind;
use serde::Serialize;
use serde_json::Value;

/// Flat attribute mapping used by the file document and SQL rows.
pub type Record = serde_json::Map<String, Value>;

/// Name of the type discriminator field in persisted records.
pub const CLASS_FIELD: &str = "__class__";

/// Any persisted domain object.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    State(State),
    City(City),
    User(User),
    Place(Place),
    Review(Review),
    Amenity(Amenity),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::State(_) => EntityKind::State,
            Self::City(_) => EntityKind::City,
            Self::User(_) => EntityKind::User,
            Self::Place(_) => EntityKind::Place,
            Self::Review(_) => EntityKind::Review,
            Self::Amenity(_) => EntityKind::Amenity,
        }
    }

    pub fn base(&self) -> &BaseFields {
        match self {
            Self::State(inner) => &inner.base,
            Self::City(inner) => &inner.base,
            Self::User(inner) => &inner.base,
            Self::Place(inner) => &inner.base,
            Self::Review(inner) => &inner.base,
            Self::Amenity(inner) => &inner.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut BaseFields {
        match self {
            Self::State(inner) => &mut inner.base,
            Self::City(inner) => &mut inner.base,
            Self::User(inner) => &mut inner.base,
            Self::Place(inner) => &mut inner.base,
            Self::Review(inner) => &mut inner.base,
            Self::Amenity(inner) => &mut inner.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    /// Composite store address, `"<Type>.<id>"`.
    pub fn key(&self) -> String {
        composite_key(self.kind(), self.id())
    }

    /// Refreshes the update timestamp before the object is staged again.
    pub fn touch(&mut self) {
        self.base_mut().touch();
    }

    /// Renders all attributes plus the `__class__` discriminator.
    pub fn to_record(&self) -> Result<Record, serde_json::Error> {
        let value = match self {
            Self::State(inner) => to_value(inner)?,
            Self::City(inner) => to_value(inner)?,
            Self::User(inner) => to_value(inner)?,
            Self::Place(inner) => to_value(inner)?,
            Self::Review(inner) => to_value(inner)?,
            Self::Amenity(inner) => to_value(inner)?,
        };

        let mut record = match value {
            Value::Object(map) => map,
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "entity rendered as non-object value: {other}"
                )))
            }
        };
        record.insert(
            CLASS_FIELD.to_string(),
            Value::String(self.kind().name().to_string()),
        );
        Ok(record)
    }
}

/// Builds `"<Type>.<id>"`.
pub fn composite_key(kind: EntityKind, id: &str) -> String {
    format!("{}.{}", kind.name(), id)
}

fn to_value<T: Serialize>(inner: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(inner)
}

macro_rules! entity_conversions {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Self::$variant(value)
                }
            }

            impl TryFrom<Entity> for $variant {
                type Error = Entity;

                fn try_from(value: Entity) -> Result<Self, Self::Error> {
                    match value {
                        Entity::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

entity_conversions!(State, City, User, Place, Review, Amenity);
