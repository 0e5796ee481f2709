//! Storage facade over the file and relational backends.
//!
//! # Responsibility
//! - Define the CRUD contract every backend implements.
//! - Construct exactly one backend from configuration and dispatch to it.
//! - Scope work through `UnitOfWork`, which always ends with `close()`.
//!
//! # Invariants
//! - The facade adds no validation and no branching beyond dispatch.
//! - `get` and `count` are derived from `all` on every backend.
//! - `rollback` is only meaningful for the relational backend.

pub mod error;
pub mod file;
pub mod relational;

pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use relational::DbStorage;

use crate::config::{BackendKind, StorageConfig};
use crate::model::{composite_key, Entity};
use crate::registry::{self, EntityKind};
use log::{info, warn};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Objects keyed by composite key `"<Type>.<id>"`.
pub type Objects = BTreeMap<String, Entity>;

/// CRUD contract shared by both backends.
pub trait StorageBackend {
    fn kind(&self) -> BackendKind;
    /// Whether operations can run without a prior `reload`.
    fn is_open(&self) -> bool;
    /// Every object, or only those of `kind`.
    fn all(&self, kind: Option<EntityKind>) -> StorageResult<Objects>;
    /// Stages `obj`; nothing is durable until `save`.
    fn new(&mut self, obj: &Entity) -> StorageResult<()>;
    fn save(&mut self) -> StorageResult<()>;
    /// Removes `obj` and makes the removal durable. Absent objects are a no-op.
    fn delete(&mut self, obj: &Entity) -> StorageResult<()>;
    fn delete_all(&mut self) -> StorageResult<()>;
    fn reload(&mut self) -> StorageResult<()>;
    fn close(&mut self) -> StorageResult<()>;

    fn rollback(&mut self) -> StorageResult<()> {
        Err(StorageError::UnsupportedOperation {
            backend: self.kind(),
            operation: "rollback",
        })
    }

    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        let mut objects = self.all(Some(kind))?;
        Ok(objects.remove(&composite_key(kind, id)))
    }

    fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize> {
        Ok(self.all(kind)?.len())
    }
}

/// Process-wide storage handle owned by the composition root.
pub struct Storage {
    backend: Box<dyn StorageBackend>,
}

impl Storage {
    /// Constructs the configured backend. Call `reload` (or take a
    /// `unit_of_work`) before the first operation.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        let backend: Box<dyn StorageBackend> = match config {
            StorageConfig::File(file) => Box::new(FileStorage::open(file)),
            StorageConfig::Relational(db) => Box::new(DbStorage::open(db)?),
        };
        info!(
            "event=storage_open module=storage status=ok backend={}",
            backend.kind().as_str()
        );
        Ok(Self::from_backend(backend))
    }

    pub fn from_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Resolves a type name through the registry.
    pub fn resolve(name: &str) -> StorageResult<EntityKind> {
        registry::lookup(name).ok_or_else(|| StorageError::UnknownEntityType(name.to_string()))
    }

    pub fn all(&self, kind: Option<EntityKind>) -> StorageResult<Objects> {
        self.backend.all(kind)
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        self.backend.get(kind, id)
    }

    pub fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize> {
        self.backend.count(kind)
    }

    pub fn new(&mut self, obj: &Entity) -> StorageResult<()> {
        self.backend.new(obj)
    }

    pub fn save(&mut self) -> StorageResult<()> {
        self.backend.save()
    }

    pub fn delete(&mut self, obj: &Entity) -> StorageResult<()> {
        self.backend.delete(obj)
    }

    pub fn delete_all(&mut self) -> StorageResult<()> {
        self.backend.delete_all()
    }

    pub fn reload(&mut self) -> StorageResult<()> {
        self.backend.reload()
    }

    pub fn close(&mut self) -> StorageResult<()> {
        self.backend.close()
    }

    /// Discards staged writes after a failed `save`. Relational backend only.
    pub fn rollback(&mut self) -> StorageResult<()> {
        self.backend.rollback()
    }

    /// Starts one unit of work, reopening the backend if a previous unit
    /// closed it.
    pub fn unit_of_work(&mut self) -> StorageResult<UnitOfWork<'_>> {
        if !self.backend.is_open() {
            self.backend.reload()?;
        }
        Ok(UnitOfWork {
            storage: self,
            finished: false,
        })
    }
}

/// Scoped access to `Storage` that calls `close()` when it ends.
///
/// Dropping the guard closes the backend and logs a close failure; use
/// `finish` to observe it instead.
pub struct UnitOfWork<'a> {
    storage: &'a mut Storage,
    finished: bool,
}

impl UnitOfWork<'_> {
    /// Ends the unit of work and reports the close result.
    pub fn finish(mut self) -> StorageResult<()> {
        self.finished = true;
        self.storage.close()
    }
}

impl Deref for UnitOfWork<'_> {
    type Target = Storage;

    fn deref(&self) -> &Storage {
        &*self.storage
    }
}

impl DerefMut for UnitOfWork<'_> {
    fn deref_mut(&mut self) -> &mut Storage {
        &mut *self.storage
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.storage.close() {
            warn!(
                "event=unit_of_work_close module=storage status=error backend={} error={}",
                self.storage.backend_kind().as_str(),
                err
            );
        }
    }
}
