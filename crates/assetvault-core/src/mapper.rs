//! Live ↔ archived record mapping.
//!
//! Storage backends move rows as JSON objects ([`Record`]). The mappers here
//! translate between the live and archived shape of one entity kind, passing
//! through the typed structs so a row that does not match its kind's shape is
//! rejected before it is written anywhere.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::kinds::EntityKind;
use crate::models::{ArchiveStamp, Archived};

/// One row as moved between storage areas: column name → value.
pub type Record = serde_json::Map<String, JsonValue>;

/// Serialize a typed value into a record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::Serialization(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Deserialize a record into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(JsonValue::Object(record))?)
}

/// Read an integer column, typically a key or foreign key.
pub fn record_i64(record: &Record, column: &str) -> Result<i64> {
    record
        .get(column)
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| Error::InvalidInput(format!("record has no integer column {column}")))
}

/// Map a live row of kind `K` to its archived row.
pub fn archive_record<K: EntityKind>(live: Record, stamp: &ArchiveStamp) -> Result<Record> {
    let live: K = from_record(live)?;
    to_record(&Archived::new(live, stamp.note.clone(), stamp.at))
}

/// Map an archived row of kind `K` back to its live row.
///
/// `archive_note` and `delete_time` are dropped; every other field, the key
/// included, is carried over verbatim.
pub fn restore_record<K: EntityKind>(archived: Record) -> Result<Record> {
    let archived: Archived<K> = from_record(archived)?;
    to_record(&archived.record)
}

/// Mapper for dependent rows whose live and archived shapes are identical.
///
/// Still round-trips through `T` so malformed rows fail the move.
pub fn same_shape<T: Serialize + DeserializeOwned>(record: Record) -> Result<Record> {
    let typed: T = from_record(record)?;
    to_record(&typed)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
