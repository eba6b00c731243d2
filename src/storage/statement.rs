//! SQL statements and the record insert builder.

use rusqlite::types::Value;
use thiserror::Error;

use super::record::JsonRecord;
use super::schema::is_valid_identifier;
use crate::now_millis;
use crate::writer::RequestBuilder;

/// Error type for statement building.
#[derive(Debug, Error)]
pub enum StatementError {
    #[error("invalid JSON record: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),
}

/// A parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Builds `INSERT` statements for the record table.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    sql: String,
}

impl InsertBuilder {
    pub fn new(table: &str) -> Result<Self, StatementError> {
        if !is_valid_identifier(table) {
            return Err(StatementError::InvalidTableName(table.to_string()));
        }
        Ok(Self {
            table: table.to_string(),
            sql: format!("INSERT INTO {table} (id, body, ingested_at) VALUES (?1, ?2, ?3)"),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl RequestBuilder<JsonRecord> for InsertBuilder {
    type Statement = SqlStatement;
    type Error = StatementError;

    fn to_statement(&self, record: JsonRecord) -> Result<SqlStatement, StatementError> {
        Ok(SqlStatement::new(
            self.sql.clone(),
            vec![
                Value::Text(record.id),
                Value::Text(record.body.to_string()),
                Value::Integer(now_millis()),
            ],
        ))
    }
}

/// Raw JSON lines are parsed first; a malformed line fails the write.
impl RequestBuilder<String> for InsertBuilder {
    type Statement = SqlStatement;
    type Error = StatementError;

    fn to_statement(&self, line: String) -> Result<SqlStatement, StatementError> {
        let record = JsonRecord::parse(&line)?;
        RequestBuilder::<JsonRecord>::to_statement(self, record)
    }
}
