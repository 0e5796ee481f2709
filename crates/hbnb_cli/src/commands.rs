//! Console commands over the storage facade.

use clap::Subcommand;
use hbnb_core::{
    BaseFields, Entity, EntityKind, Record, RegistryError, Storage, StorageError, StorageResult,
};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CommandError {
    Storage(StorageError),
    NoInstance { type_name: String, id: String },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::NoInstance { type_name, id } => write!(f, "no instance found: {type_name}.{id}"),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::NoInstance { .. } => None,
        }
    }
}

impl From<StorageError> for CommandError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<RegistryError> for CommandError {
    fn from(value: RegistryError) -> Self {
        Self::Storage(value.into())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(value: serde_json::Error) -> Self {
        Self::Storage(value.into())
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an object, e.g. `create Place city_id=... name="My_house" number_rooms=4`.
    Create {
        type_name: String,
        attributes: Vec<String>,
    },
    /// Print one object.
    Show { type_name: String, id: String },
    /// Print every object, optionally of one type.
    All { type_name: Option<String> },
    /// Count objects, optionally of one type.
    Count { type_name: Option<String> },
    /// Set attributes on an existing object.
    Update {
        type_name: String,
        id: String,
        attributes: Vec<String>,
    },
    /// Delete one object.
    Destroy { type_name: String, id: String },
    /// Delete every object of every type.
    Reset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Show { .. } => "show",
            Self::All { .. } => "all",
            Self::Count { .. } => "count",
            Self::Update { .. } => "update",
            Self::Destroy { .. } => "destroy",
            Self::Reset => "reset",
        }
    }
}

/// Runs `command` and returns the lines to print.
pub fn execute(storage: &mut Storage, command: Command) -> Result<Vec<String>, CommandError> {
    match command {
        Command::Create {
            type_name,
            attributes,
        } => {
            let kind = Storage::resolve(&type_name)?;
            let mut record = serde_json::to_value(BaseFields::new())?
                .as_object()
                .cloned()
                .unwrap_or_default();
            merge_attributes(kind, &mut record, &attributes);
            let obj = kind.build(record)?;
            storage.new(&obj)?;
            storage.save()?;
            Ok(vec![obj.id().to_string()])
        }
        Command::Show { type_name, id } => {
            let obj = find(storage, &type_name, &id)?;
            Ok(vec![render(&obj)?])
        }
        Command::All { type_name } => {
            let kind = type_name.as_deref().map(Storage::resolve).transpose()?;
            let lines = storage
                .all(kind)?
                .values()
                .map(render)
                .collect::<StorageResult<Vec<_>>>()?;
            Ok(lines)
        }
        Command::Count { type_name } => {
            let kind = type_name.as_deref().map(Storage::resolve).transpose()?;
            Ok(vec![storage.count(kind)?.to_string()])
        }
        Command::Update {
            type_name,
            id,
            attributes,
        } => {
            let current = find(storage, &type_name, &id)?;
            let mut record = current.to_record()?;
            merge_attributes(current.kind(), &mut record, &attributes);
            let mut updated = current.kind().build(record)?;
            updated.touch();
            storage.new(&updated)?;
            storage.save()?;
            Ok(Vec::new())
        }
        Command::Destroy { type_name, id } => {
            let obj = find(storage, &type_name, &id)?;
            storage.delete(&obj)?;
            Ok(Vec::new())
        }
        Command::Reset => {
            storage.delete_all()?;
            Ok(Vec::new())
        }
    }
}

fn find(storage: &Storage, type_name: &str, id: &str) -> Result<Entity, CommandError> {
    let kind: EntityKind = Storage::resolve(type_name)?;
    storage
        .get(kind, id)?
        .ok_or_else(|| CommandError::NoInstance {
            type_name: type_name.to_string(),
            id: id.to_string(),
        })
}

fn render(obj: &Entity) -> StorageResult<String> {
    Ok(format!(
        "[{}] ({}) {}",
        obj.kind(),
        obj.id(),
        Value::Object(obj.to_record()?)
    ))
}

/// Applies `key=value` pairs; identity fields and `__class__` are ignored.
fn merge_attributes(kind: EntityKind, record: &mut Record, attributes: &[String]) {
    for pair in attributes {
        let Some((key, raw)) = pair.split_once('=') else {
            continue;
        };
        if matches!(key, "id" | "created_at" | "updated_at" | "__class__") {
            continue;
        }
        record.insert(key.to_string(), parse_value(raw, is_numeric_field(kind, key)));
    }
}

fn is_numeric_field(kind: EntityKind, key: &str) -> bool {
    kind == EntityKind::Place
        && matches!(
            key,
            "number_rooms"
                | "number_bathrooms"
                | "max_guest"
                | "price_by_night"
                | "latitude"
                | "longitude"
        )
}

/// `"quoted_text"` becomes a string with underscores as spaces. Numeric
/// fields take integers and floats as numbers; every other field keeps the
/// text as a string.
fn parse_value(raw: &str, numeric: bool) -> Value {
    if let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Value::String(inner.replace("\\\"", "\"").replace('_', " "));
    }
    if !numeric {
        return Value::String(raw.to_string());
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Value::from(integer);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    Value::String(raw.to_string())
}
