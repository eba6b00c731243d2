//! JSON records as loaded from input and as read back from SQLite.

use rusqlite::types::Type;
use rusqlite::Row;
use serde::Serialize;
use serde_json::Value;

use super::reader::FromRow;
use crate::generate_record_id;

/// One JSON document to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecord {
    pub id: String,
    pub body: Value,
}

impl JsonRecord {
    /// Parse one line of JSON.
    ///
    /// The id comes from a string or number `id` field when present,
    /// otherwise a fresh UUIDv7 is generated.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let body: Value = serde_json::from_str(line)?;
        let id = match body.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => generate_record_id(),
        };
        Ok(Self { id, body })
    }
}

/// A record read back from the record table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: String,
    pub body: Value,
    pub ingested_at: i64,
}

impl StoredRecord {
    /// Columns in the order [`FromRow`] expects them.
    pub const COLUMNS: [&'static str; 3] = ["id", "body", "ingested_at"];
}

impl FromRow for StoredRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get(1)?;
        let body = serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        Ok(Self {
            id: row.get(0)?,
            body,
            ingested_at: row.get(2)?,
        })
    }
}
