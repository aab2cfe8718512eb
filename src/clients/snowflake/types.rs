//! Snowflake SQL API wire types and result decoding
//!
//! Result sets arrive as `data: [[cell, ...], ...]` where every cell is a
//! string or null; column positions come from `resultSetMetaData.rowType`.

use crate::error::{Result, SyncError};
use catalog_types::{ColumnRecord, ColumnTag, TableRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
pub struct StatementRequest<'a> {
    pub statement: &'a str,
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Binding>,
}

/// Positional bind variable; keys are 1-based positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

impl Binding {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "TEXT",
            value: value.into(),
        }
    }
}

/// Number text bindings `?` markers from 1
pub fn text_bindings(values: &[&str]) -> BTreeMap<String, Binding> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| ((i + 1).to_string(), Binding::text(*v)))
        .collect()
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    #[serde(default)]
    pub result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub statement_handle: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetaData {
    #[serde(default)]
    pub row_type: Vec<RowType>,
    #[serde(default)]
    pub partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RowType {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    #[serde(default)]
    pub row_count: u64,
}

/// Rows of a finished statement with column lookup by name
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: HashMap<String, usize>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(column_names: &[&str], rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns: column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.to_ascii_uppercase(), i))
                .collect(),
            rows,
        }
    }

    pub fn from_metadata(meta: &ResultSetMetaData, rows: Vec<Vec<Option<String>>>) -> Self {
        let names: Vec<&str> = meta.row_type.iter().map(|r| r.name.as_str()).collect();
        Self::new(&names, rows)
    }

    fn cell<'a>(&self, row: &'a [Option<String>], column: &str) -> Option<&'a str> {
        let idx = *self.columns.get(column)?;
        row.get(idx)?.as_deref()
    }

    fn required(&self, row: &[Option<String>], column: &str, scope: &str) -> Result<String> {
        self.cell(row, column)
            .map(str::to_string)
            .ok_or_else(|| SyncError::Decode(format!("{}: missing {} in row", scope, column)))
    }

    /// Null and blank cells both read as absent
    fn optional_text(&self, row: &[Option<String>], column: &str) -> Option<String> {
        self.cell(row, column)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

// =============================================================================
// Decoding into catalog records
// =============================================================================

pub fn decode_tables(rs: &ResultSet) -> Result<Vec<TableRecord>> {
    const SCOPE: &str = "warehouse tables";
    rs.rows
        .iter()
        .map(|row| {
            let row_count = match rs.cell(row, "ROW_COUNT") {
                Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                    SyncError::Decode(format!("{}: ROW_COUNT '{}': {}", SCOPE, raw, e))
                })?),
                None => None,
            };
            Ok(TableRecord {
                database: rs.required(row, "TABLE_CATALOG", SCOPE)?,
                schema_name: rs.required(row, "TABLE_SCHEMA", SCOPE)?,
                table_name: rs.required(row, "TABLE_NAME", SCOPE)?,
                row_count,
                comment: rs.optional_text(row, "COMMENT"),
            })
        })
        .collect()
}

pub fn decode_columns(rs: &ResultSet) -> Result<Vec<ColumnRecord>> {
    const SCOPE: &str = "warehouse columns";
    rs.rows
        .iter()
        .map(|row| {
            Ok(ColumnRecord {
                schema_name: rs.required(row, "TABLE_SCHEMA", SCOPE)?,
                table_name: rs.required(row, "TABLE_NAME", SCOPE)?,
                column_name: rs.required(row, "COLUMN_NAME", SCOPE)?,
                comment: rs.optional_text(row, "COMMENT"),
            })
        })
        .collect()
}

pub fn decode_tags(rs: &ResultSet) -> Result<Vec<ColumnTag>> {
    const SCOPE: &str = "warehouse column tags";
    rs.rows
        .iter()
        .map(|row| {
            Ok(ColumnTag {
                database: rs.required(row, "OBJECT_DATABASE", SCOPE)?,
                schema_name: rs.required(row, "OBJECT_SCHEMA", SCOPE)?,
                object_name: rs.required(row, "OBJECT_NAME", SCOPE)?,
                column_name: rs.required(row, "COLUMN_NAME", SCOPE)?,
                tag_name: rs.required(row, "TAG_NAME", SCOPE)?,
                tag_value: rs.required(row, "TAG_VALUE", SCOPE)?,
            })
        })
        .collect()
}
