//! Storage layer for the HBNB domain.
//! One CRUD facade over a JSON document backend and a SQLite backend.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod storage;

pub use config::{AppConfig, BackendKind, ConfigError, DbConfig, FileConfig, StorageConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{Amenity, BaseFields, City, Entity, Place, Record, Review, State, User};
pub use registry::{EntityKind, RegistryError};
pub use storage::{
    DbStorage, FileStorage, Objects, Storage, StorageBackend, StorageError, StorageResult,
    UnitOfWork,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
