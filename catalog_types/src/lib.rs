//! Catalog Types - Level 1 Foundation Types
//!
//! Plain records describing the two metadata catalogs the sync pipeline
//! correlates: the BI catalog (external table and column assets keyed by
//! catalog-native IDs) and the warehouse (tables, columns and governance tags
//! keyed by database/schema/name).
//!
//! ## Critical Rules
//!
//! 1. **NO BUSINESS LOGIC** - matching and normalization live in `catalog_sync`
//! 2. **NO WORKSPACE DEPENDENCIES**
//! 3. **SERIALIZABLE** - every record supports serde so run summaries can embed them
//!
//! All records are rebuilt from live reads on every run and never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// BI CATALOG SIDE
// ============================================================================

/// An external table asset registered in the BI catalog.
///
/// Identity: `catalog_table_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAsset {
    /// BI-catalog-native table ID (LUID)
    pub catalog_table_id: String,
    /// Table name as registered in the BI catalog
    pub name: String,
    /// Schema the asset claims to live in
    pub schema_name: String,
}

impl TableAsset {
    pub fn new(
        catalog_table_id: impl Into<String>,
        name: impl Into<String>,
        schema_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog_table_id: catalog_table_id.into(),
            name: name.into(),
            schema_name: schema_name.into(),
        }
    }
}

/// A column asset belonging to one BI-catalog table.
///
/// Identity: `catalog_column_id`. Foreign-keyed to [`TableAsset::catalog_table_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAsset {
    pub catalog_column_id: String,
    pub name: String,
    pub parent_table_id: String,
}

impl ColumnAsset {
    pub fn new(
        catalog_column_id: impl Into<String>,
        name: impl Into<String>,
        parent_table_id: impl Into<String>,
    ) -> Self {
        Self {
            catalog_column_id: catalog_column_id.into(),
            name: name.into(),
            parent_table_id: parent_table_id.into(),
        }
    }
}

/// A sensitivity label value defined in the BI catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValue {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl LabelValue {
    /// Category used for every label value the label flow creates
    pub const SENSITIVITY: &'static str = "sensitivity";

    /// A sensitivity-category label value
    pub fn sensitivity(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: Self::SENSITIVITY.to_string(),
            description: Some(description.into()),
        }
    }
}

// ============================================================================
// WAREHOUSE SIDE
// ============================================================================

/// Table metadata read from the warehouse information schema.
///
/// Identity: `(database, schema_name, table_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub database: String,
    pub schema_name: String,
    pub table_name: String,
    /// Absent for views and for tables the warehouse has no statistics for
    pub row_count: Option<u64>,
    pub comment: Option<String>,
}

/// Column metadata read from the warehouse information schema.
///
/// Identity: `(schema_name, table_name, column_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub schema_name: String,
    pub table_name: String,
    pub column_name: String,
    pub comment: Option<String>,
}

/// A governance tag attached to one warehouse column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTag {
    pub database: String,
    pub schema_name: String,
    pub object_name: String,
    pub column_name: String,
    /// Tag key, e.g. `SENSITIVITY`
    pub tag_name: String,
    /// Literal tag value; becomes the label name in the BI catalog
    pub tag_value: String,
}

// ============================================================================
// FLOWS
// ============================================================================

/// Which reconciliation flow a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SyncFlow {
    /// Warehouse comments → BI descriptions
    #[default]
    Descriptions,
    /// Warehouse column tags → BI sensitivity labels
    Labels,
}

impl fmt::Display for SyncFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptions => write!(f, "descriptions"),
            Self::Labels => write!(f, "labels"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sync flow '{0}' (expected 'descriptions' or 'labels')")]
pub struct ParseFlowError(pub String);

impl FromStr for SyncFlow {
    type Err = ParseFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "descriptions" | "description" => Ok(Self::Descriptions),
            "labels" | "label" | "sensitivity-labels" => Ok(Self::Labels),
            other => Err(ParseFlowError(other.to_string())),
        }
    }
}
