//! Process configuration read once at startup.
//!
//! # Responsibility
//! - Select exactly one storage backend and carry its parameters.
//! - Carry logging level and optional log directory.
//!
//! # Invariants
//! - Unset variables fall back to defaults; malformed values are rejected.
//! - `DbConfig` never prints its password.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_FILE_PATH: &str = "./dev/file.json";
pub const DEFAULT_DATABASE: &str = "hbnb.db";

pub const ENV_STORAGE_TYPE: &str = "HBNB_TYPE_STORAGE";
pub const ENV_FILE_PATH: &str = "HBNB_FILE_PATH";
pub const ENV_DB_HOST: &str = "HBNB_MYSQL_HOST";
pub const ENV_DB_USER: &str = "HBNB_MYSQL_USER";
pub const ENV_DB_PASSWORD: &str = "HBNB_MYSQL_PWD";
pub const ENV_DB_NAME: &str = "HBNB_MYSQL_DB";
pub const ENV_RUN_MODE: &str = "HBNB_ENV";
pub const ENV_FOREIGN_KEYS: &str = "HBNB_FOREIGN_KEYS";
pub const ENV_LOG_LEVEL: &str = "HBNB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "HBNB_LOG_DIR";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidStorageType(String),
    InvalidFlag { variable: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidStorageType(value) => write!(
                f,
                "unsupported {ENV_STORAGE_TYPE} `{value}`; expected file|db"
            ),
            Self::InvalidFlag { variable, value } => {
                write!(f, "invalid boolean `{value}` for {variable}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Which backend the facade instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    File,
    Relational,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Relational => "db",
        }
    }
}

/// File backend parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    pub path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FILE_PATH),
        }
    }
}

/// Relational backend parameters.
///
/// `database` names the SQLite database file (`:memory:` for a private
/// in-memory database). `host`, `user` and `password` are accepted for
/// deployments that configure them, and only reported in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    /// Drop and recreate every table when the backend is constructed.
    pub drop_on_start: bool,
    /// Value for `PRAGMA foreign_keys`.
    pub foreign_keys: bool,
}

impl DbConfig {
    pub fn in_memory() -> Self {
        Self {
            database: ":memory:".to_string(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == ":memory:"
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            drop_on_start: false,
            foreign_keys: true,
        }
    }
}

impl Debug for DbConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("drop_on_start", &self.drop_on_start)
            .field("foreign_keys", &self.foreign_keys)
            .finish()
    }
}

/// Backend selection plus that backend's parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    File(FileConfig),
    Relational(DbConfig),
}

impl StorageConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::File(_) => BackendKind::File,
            Self::Relational(_) => BackendKind::Relational,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::File(FileConfig::default())
    }
}

/// Logging parameters consumed by `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rotated log files; `None` logs to stderr.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let storage = match value(ENV_STORAGE_TYPE).as_deref() {
            None | Some("file") => StorageConfig::File(FileConfig {
                path: value(ENV_FILE_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_PATH)),
            }),
            Some("db") => StorageConfig::Relational(DbConfig {
                host: value(ENV_DB_HOST),
                user: value(ENV_DB_USER),
                password: value(ENV_DB_PASSWORD),
                database: value(ENV_DB_NAME).unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                drop_on_start: value(ENV_RUN_MODE).as_deref() == Some("test"),
                foreign_keys: match value(ENV_FOREIGN_KEYS) {
                    Some(raw) => parse_flag(ENV_FOREIGN_KEYS, &raw)?,
                    None => true,
                },
            }),
            Some(other) => return Err(ConfigError::InvalidStorageType(other.to_string())),
        };

        let logging = LoggingConfig {
            level: value(ENV_LOG_LEVEL)
                .unwrap_or_else(|| crate::logging::default_log_level().to_string()),
            dir: value(ENV_LOG_DIR).map(PathBuf::from),
        };

        Ok(Self { storage, logging })
    }
}

fn parse_flag(variable: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            variable,
            value: raw.to_string(),
        }),
    }
}
