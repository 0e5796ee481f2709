//! Lodging entities: `Place`, its `Review`s, and `Amenity`.

use super::base::BaseFields;
use serde::{Deserialize, Serialize};

/// Rentable place owned by a `User` and located in a `City`.
///
/// Counters default to zero when absent from a persisted record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(flatten)]
    pub base: BaseFields,
    pub city_id: Option<String>,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub number_rooms: i64,
    #[serde(default)]
    pub number_bathrooms: i64,
    #[serde(default)]
    pub max_guest: i64,
    #[serde(default)]
    pub price_by_night: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Place {
    pub fn new(
        city_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            city_id: Some(city_id.into()),
            user_id: Some(user_id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Review text left by a `User` on a `Place`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(flatten)]
    pub base: BaseFields,
    pub place_id: Option<String>,
    pub user_id: Option<String>,
    pub text: Option<String>,
}

impl Review {
    pub fn new(
        place_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            base: BaseFields::new(),
            place_id: Some(place_id.into()),
            user_id: Some(user_id.into()),
            text: Some(text.into()),
        }
    }
}

/// Named facility a place can offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    #[serde(flatten)]
    pub base: BaseFields,
    pub name: Option<String>,
}

impl Amenity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: BaseFields::new(),
            name: Some(name.into()),
        }
    }
}
