//! Location entities: `State` and `City`.

use super::base::BaseFields;
use serde::{Deserialize, Serialize};

/// Top-level region. `name` is required by the relational schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(flatten)]
    pub base: BaseFields,
    pub name: Option<String>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: BaseFields::new(),
            name: Some(name.into()),
        }
    }
}

/// City inside one `State`, referenced through `state_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    #[serde(flatten)]
    pub base: BaseFields,
    pub state_id: Option<String>,
    pub name: Option<String>,
}

impl City {
    pub fn new(state_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base: BaseFields::new(),
            state_id: Some(state_id.into()),
            name: Some(name.into()),
        }
    }
}
