//! JSON document backend.
//!
//! # Responsibility
//! - Hold every object in an in-process table keyed by `"<Type>.<id>"`.
//! - Persist the whole table as one JSON document on `save`.
//!
//! # Invariants
//! - Only `save`, `delete` and `delete_all` touch the disk for writing.
//! - `reload`/`close` never fail: any read or parse problem leaves the table
//!   empty and is logged with its cause.
//! - Required attributes are not checked here.

use super::error::{StorageError, StorageResult};
use super::{Objects, StorageBackend};
use crate::config::{BackendKind, FileConfig};
use crate::model::{Entity, Record};
use crate::registry::{self, EntityKind, RegistryError};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File-backed storage engine.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    objects: Objects,
    loaded: bool,
}

impl FileStorage {
    /// Creates an empty engine bound to `config.path`. It reports itself
    /// closed until `reload` has read the document once.
    pub fn open(config: &FileConfig) -> Self {
        Self {
            path: config.path.clone(),
            objects: Objects::new(),
            loaded: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self) -> StorageResult<()> {
        let mut document: BTreeMap<&str, Record> = BTreeMap::new();
        for (key, obj) in &self.objects {
            document.insert(key.as_str(), obj.to_record()?);
        }
        let bytes = serde_json::to_vec(&document)?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let staging = staging_path(&self.path);
        fs::write(&staging, bytes).map_err(|source| StorageError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StorageBackend for FileStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn is_open(&self) -> bool {
        self.loaded
    }

    fn all(&self, kind: Option<EntityKind>) -> StorageResult<Objects> {
        let objects = match kind {
            None => self.objects.clone(),
            Some(kind) => self
                .objects
                .iter()
                .filter(|(_, obj)| obj.kind() == kind)
                .map(|(key, obj)| (key.clone(), obj.clone()))
                .collect(),
        };
        Ok(objects)
    }

    fn new(&mut self, obj: &Entity) -> StorageResult<()> {
        self.objects.insert(obj.key(), obj.clone());
        Ok(())
    }

    fn save(&mut self) -> StorageResult<()> {
        let started_at = Instant::now();
        match self.write_document() {
            Ok(()) => {
                debug!(
                    "event=storage_save module=storage backend=file status=ok objects={} duration_ms={}",
                    self.objects.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=storage_save module=storage backend=file status=error path={} error={}",
                    self.path.display(),
                    err
                );
                Err(err)
            }
        }
    }

    fn delete(&mut self, obj: &Entity) -> StorageResult<()> {
        if self.objects.remove(&obj.key()).is_none() {
            debug!(
                "event=storage_delete module=storage backend=file status=absent key={}",
                obj.key()
            );
        }
        self.save()
    }

    fn delete_all(&mut self) -> StorageResult<()> {
        match fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
        {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                "event=storage_delete_all module=storage backend=file status=truncate_failed path={} error={}",
                self.path.display(),
                err
            ),
        }
        self.objects.clear();
        self.save()
    }

    fn reload(&mut self) -> StorageResult<()> {
        self.objects.clear();
        match load_document(&self.path) {
            Ok(objects) => {
                debug!(
                    "event=storage_reload module=storage backend=file status=ok objects={}",
                    objects.len()
                );
                self.objects = objects;
            }
            Err(ColdStart::Missing) => info!(
                "event=storage_reload module=storage backend=file status=empty cause=missing path={}",
                self.path.display()
            ),
            Err(cause) => warn!(
                "event=storage_reload module=storage backend=file status=empty cause={} path={} error={}",
                cause.code(),
                self.path.display(),
                cause
            ),
        }
        self.loaded = true;
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.reload()
    }
}

/// Why a cold start produced an empty table.
#[derive(Debug)]
enum ColdStart {
    Missing,
    PermissionDenied(std::io::Error),
    Unreadable(std::io::Error),
    Malformed(serde_json::Error),
    InvalidRecord { key: String, error: RegistryError },
}

impl ColdStart {
    fn code(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Unreadable(_) => "unreadable",
            Self::Malformed(_) => "malformed",
            Self::InvalidRecord { .. } => "invalid_record",
        }
    }
}

impl std::fmt::Display for ColdStart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "document does not exist"),
            Self::PermissionDenied(err) | Self::Unreadable(err) => write!(f, "{err}"),
            Self::Malformed(err) => write!(f, "{err}"),
            Self::InvalidRecord { key, error } => write!(f, "record `{key}`: {error}"),
        }
    }
}

fn load_document(path: &Path) -> Result<Objects, ColdStart> {
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ColdStart::Missing,
        ErrorKind::PermissionDenied => ColdStart::PermissionDenied(err),
        _ => ColdStart::Unreadable(err),
    })?;
    let document: BTreeMap<String, Record> =
        serde_json::from_slice(&bytes).map_err(ColdStart::Malformed)?;

    let mut objects = Objects::new();
    for (key, record) in document {
        let obj = registry::from_tagged_record(record)
            .map_err(|error| ColdStart::InvalidRecord { key, error })?;
        objects.insert(obj.key(), obj);
    }
    Ok(objects)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::staging_path;
    use std::path::Path;

    #[test]
    fn staging_path_sits_next_to_document() {
        assert_eq!(
            staging_path(Path::new("dev/file.json")),
            Path::new("dev/file.json.tmp")
        );
    }
}
