//! Account entity.

use super::base::BaseFields;
use serde::{Deserialize, Serialize};

/// Registered account. `email` and `password` are required by the schema;
/// the storage layer stores `password` as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub base: BaseFields,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base: BaseFields::new(),
            email: Some(email.into()),
            password: Some(password.into()),
            first_name: None,
            last_name: None,
        }
    }
}
