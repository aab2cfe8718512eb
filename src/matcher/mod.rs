//! Entity Matcher
//!
//! Correlates BI-catalog records (keyed by catalog-native IDs) with warehouse
//! records (keyed by schema/table/column names). Matching is pure: no client
//! calls happen in here, so every join policy can be tested without a network.
//!
//! # Join policy
//!
//! - **Inner join**: records without a counterpart on the other side are
//!   counted as unmatched and dropped.
//! - **Keyed lookup**: the warehouse side is indexed by normalized key, then
//!   looked up once per BI record, in BI listing order.
//! - **First-seen wins**: when several warehouse records share a key, the one
//!   that appeared first in the input is kept and a [`MatchWarning`] is raised.
//!   Each warehouse record is claimed by at most one BI record; later BI
//!   records probing an already-claimed key are dropped with a warning.

pub mod columns;
pub mod normalize;
pub mod tables;

pub use columns::{match_columns, ColumnMatch, MatchedColumn, WarehouseColumn};
pub use normalize::{IdentifierCase, TableKey};
pub use tables::{match_tables, MatchedTable, TableMatch};

use serde::Serialize;
use std::fmt;

/// Data-quality condition found while joining. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchWarning {
    /// Several warehouse tables share one `(schema, table)` key
    DuplicateWarehouseTable { table: String, occurrences: usize },
    /// A second BI asset matched a warehouse table already claimed by another asset
    DuplicateCatalogTable {
        table: String,
        catalog_table_id: String,
    },
    /// Several warehouse rows share one column name within a table
    DuplicateWarehouseColumn {
        table: String,
        column: String,
        occurrences: usize,
    },
    /// A second BI column matched a warehouse column already claimed
    DuplicateCatalogColumn {
        table: String,
        column: String,
        catalog_column_id: String,
    },
}

impl fmt::Display for MatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateWarehouseTable { table, occurrences } => write!(
                f,
                "warehouse table {} appears {} times; kept first-seen record",
                table, occurrences
            ),
            Self::DuplicateCatalogTable {
                table,
                catalog_table_id,
            } => write!(
                f,
                "catalog table {} ({}) maps to an already matched warehouse table; skipped",
                table, catalog_table_id
            ),
            Self::DuplicateWarehouseColumn {
                table,
                column,
                occurrences,
            } => write!(
                f,
                "warehouse column {}.{} appears {} times; kept first-seen record",
                table, column, occurrences
            ),
            Self::DuplicateCatalogColumn {
                table,
                column,
                catalog_column_id,
            } => write!(
                f,
                "catalog column {}.{} ({}) maps to an already matched warehouse column; skipped",
                table, column, catalog_column_id
            ),
        }
    }
}

/// Index rows by key, keeping the first-seen position for each key.
///
/// Returns the lookup plus `(key, occurrences)` for every key seen more than
/// once, in order of first appearance.
pub(crate) fn first_seen_index<K, T, F>(
    rows: &[T],
    key_of: F,
) -> (std::collections::HashMap<K, usize>, Vec<(K, usize)>)
where
    K: std::hash::Hash + Eq + Clone,
    F: Fn(&T) -> K,
{
    use std::collections::HashMap;

    let mut lookup: HashMap<K, usize> = HashMap::with_capacity(rows.len());
    let mut occurrences: HashMap<K, usize> = HashMap::new();
    let mut duplicate_order: Vec<K> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let key = key_of(row);
        if lookup.contains_key(&key) {
            let count = occurrences.entry(key.clone()).or_insert_with(|| {
                duplicate_order.push(key.clone());
                1
            });
            *count += 1;
        } else {
            lookup.insert(key, idx);
        }
    }

    let duplicates = duplicate_order
        .into_iter()
        .map(|key| {
            let count = occurrences.get(&key).copied().unwrap_or(1);
            (key, count)
        })
        .collect();

    (lookup, duplicates)
}
