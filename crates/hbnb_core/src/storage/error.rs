//! Storage error taxonomy shared by both backends.

use crate::config::BackendKind;
use crate::db::DbError;
use crate::registry::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced through the storage facade.
#[derive(Debug)]
pub enum StorageError {
    /// The database rejected a write (NOT NULL, foreign key, unique).
    ConstraintViolation { message: String },
    /// Relational session is not open; `reload` must run first.
    SessionClosed,
    /// A failed `save` left staged writes behind; `rollback` must run first.
    SessionNeedsRollback,
    /// `rollback` was called with nothing staged and no failed commit.
    NothingToRollback,
    /// The active backend does not implement the operation.
    UnsupportedOperation {
        backend: BackendKind,
        operation: &'static str,
    },
    /// A type name did not resolve through the registry.
    UnknownEntityType(String),
    /// Durable document write failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialization(serde_json::Error),
    /// A persisted row or record could not be rebuilt into an entity.
    InvalidData(String),
    Db(DbError),
}

impl StorageError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConstraintViolation { message } => {
                write!(f, "constraint violation: {message}")
            }
            Self::SessionClosed => write!(f, "storage session is not open; call reload first"),
            Self::SessionNeedsRollback => write!(
                f,
                "storage session has a failed commit pending; call rollback first"
            ),
            Self::NothingToRollback => write!(f, "no staged changes to roll back"),
            Self::UnsupportedOperation { backend, operation } => write!(
                f,
                "operation `{operation}` is not supported by the {} backend",
                backend.as_str()
            ),
            Self::UnknownEntityType(name) => write!(f, "unknown entity type `{name}`"),
            Self::Io { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
            Self::Serialization(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::ConstraintViolation { .. }
            | Self::SessionClosed
            | Self::SessionNeedsRollback
            | Self::NothingToRollback
            | Self::UnsupportedOperation { .. }
            | Self::UnknownEntityType(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        match value.constraint_message() {
            Some(message) => Self::ConstraintViolation { message },
            None => Self::Db(value),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<RegistryError> for StorageError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::UnknownType(name) => Self::UnknownEntityType(name),
            other => Self::InvalidData(other.to_string()),
        }
    }
}
