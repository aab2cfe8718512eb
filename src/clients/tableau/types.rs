//! Tableau REST API wire types
//!
//! Only the fields the sync pipeline consumes are modelled. Tableau renders
//! pagination counters as strings in JSON, and renders an empty collection as
//! `{}`, hence the lenient defaults.

use catalog_types::{ColumnAsset, LabelValue, TableAsset};
use serde::{Deserialize, Deserializer};

// =============================================================================
// Sign-in
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignInResponse {
    pub credentials: SignInCredentials,
}

#[derive(Debug, Deserialize)]
pub struct SignInCredentials {
    pub token: String,
    pub site: IdRef,
    pub user: IdRef,
}

#[derive(Debug, Deserialize)]
pub struct IdRef {
    pub id: String,
}

// =============================================================================
// Pagination
// =============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(deserialize_with = "count")]
    pub page_number: u32,
    #[serde(deserialize_with = "count")]
    pub page_size: u32,
    #[serde(deserialize_with = "count")]
    pub total_available: u32,
}

impl Pagination {
    /// Whether pages after this one hold more items
    pub fn has_more(&self) -> bool {
        self.page_number.saturating_mul(self.page_size) < self.total_available
    }
}

/// Accept `"42"` as well as `42`
fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Tables
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TablesResponse {
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub tables: TableList,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableList {
    #[serde(default)]
    pub table: Vec<TableItem>,
}

#[derive(Debug, Deserialize)]
pub struct TableItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
}

impl From<TableItem> for TableAsset {
    fn from(item: TableItem) -> Self {
        TableAsset {
            catalog_table_id: item.id,
            name: item.name,
            schema_name: item.schema.unwrap_or_default(),
        }
    }
}

// =============================================================================
// Columns
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ColumnsResponse {
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub columns: ColumnList,
}

#[derive(Debug, Default, Deserialize)]
pub struct ColumnList {
    #[serde(default)]
    pub column: Vec<ColumnItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_table_id: Option<String>,
}

impl ColumnItem {
    /// Columns fetched through a table's endpoint belong to that table even
    /// when the payload omits `parentTableId`.
    pub fn into_asset(self, table_id: &str) -> ColumnAsset {
        ColumnAsset {
            catalog_column_id: self.id,
            name: self.name,
            parent_table_id: self.parent_table_id.unwrap_or_else(|| table_id.to_string()),
        }
    }
}

// =============================================================================
// Label values
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelValuesResponse {
    #[serde(default)]
    pub label_values: LabelValueList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelValueList {
    #[serde(default)]
    pub label_value: Vec<LabelValue>,
}
