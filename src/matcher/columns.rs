//! Column-level join, run once per [`MatchedTable`]
//!
//! The BI side is always a set of [`ColumnAsset`]s; the warehouse side is any
//! row type that names a column and the table it belongs to. The description
//! flow joins [`ColumnRecord`]s (comments), the label flow joins
//! [`ColumnTag`]s (governance tags). Both use the same scoping and
//! first-seen rules.

use super::normalize::{IdentifierCase, TableKey};
use super::tables::MatchedTable;
use super::{first_seen_index, MatchWarning};
use catalog_types::{ColumnAsset, ColumnRecord, ColumnTag};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Warehouse-side row that can be joined to a BI column asset
pub trait WarehouseColumn {
    fn column_name(&self) -> &str;

    /// `(schema, table)` owning this column
    fn owner(&self) -> (&str, &str);
}

impl WarehouseColumn for ColumnRecord {
    fn column_name(&self) -> &str {
        &self.column_name
    }

    fn owner(&self) -> (&str, &str) {
        (&self.schema_name, &self.table_name)
    }
}

impl WarehouseColumn for ColumnTag {
    fn column_name(&self) -> &str {
        &self.column_name
    }

    fn owner(&self) -> (&str, &str) {
        (&self.schema_name, &self.object_name)
    }
}

/// One BI column joined to one warehouse row of the same table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedColumn<P> {
    /// Always equals `asset.parent_table_id`
    pub catalog_table_id: String,
    /// Warehouse `SCHEMA.TABLE`
    pub table: String,
    pub asset: ColumnAsset,
    pub payload: P,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnMatch<P> {
    pub matched: Vec<MatchedColumn<P>>,
    pub unmatched_assets: usize,
    pub unmatched_records: usize,
    /// Assets whose parent is another table, or rows owned by another table
    pub out_of_scope: usize,
    pub warnings: Vec<MatchWarning>,
}

impl<P> Default for ColumnMatch<P> {
    fn default() -> Self {
        Self {
            matched: Vec::new(),
            unmatched_assets: 0,
            unmatched_records: 0,
            out_of_scope: 0,
            warnings: Vec::new(),
        }
    }
}

/// Join the BI columns of one matched table to warehouse rows for it.
///
/// Assets not parented by `table` and rows not owned by `table`'s warehouse
/// `(schema, table)` are excluded before the join, so a result never crosses
/// tables even when a client returns more than was asked for.
pub fn match_columns<P>(
    table: &MatchedTable,
    assets: &[ColumnAsset],
    rows: &[P],
    case: IdentifierCase,
) -> ColumnMatch<P>
where
    P: WarehouseColumn + Clone,
{
    let mut result = ColumnMatch::default();
    let table_key = TableKey::new(case, &table.record.schema_name, &table.record.table_name);
    let table_name = table.display_name();

    let scoped_rows: Vec<&P> = rows
        .iter()
        .filter(|row| {
            let (schema, owner) = row.owner();
            TableKey::new(case, schema, owner) == table_key
        })
        .collect();
    result.out_of_scope += rows.len() - scoped_rows.len();

    let (lookup, duplicates) = first_seen_index(&scoped_rows, |row| case.key(row.column_name()));

    for (column, occurrences) in duplicates {
        warn!(table = %table_name, column = %column, occurrences, "duplicate warehouse column, keeping first-seen row");
        result.warnings.push(MatchWarning::DuplicateWarehouseColumn {
            table: table_name.clone(),
            column,
            occurrences,
        });
    }

    let mut claimed: HashSet<usize> = HashSet::with_capacity(lookup.len());

    for asset in assets {
        if asset.parent_table_id != table.asset.catalog_table_id {
            result.out_of_scope += 1;
            continue;
        }

        let Some(&row_idx) = lookup.get(&case.key(&asset.name)) else {
            result.unmatched_assets += 1;
            continue;
        };

        if !claimed.insert(row_idx) {
            warn!(
                table = %table_name,
                column = %asset.name,
                catalog_column_id = %asset.catalog_column_id,
                "catalog column maps to an already matched warehouse column"
            );
            result.warnings.push(MatchWarning::DuplicateCatalogColumn {
                table: table_name.clone(),
                column: asset.name.clone(),
                catalog_column_id: asset.catalog_column_id.clone(),
            });
            continue;
        }

        result.matched.push(MatchedColumn {
            catalog_table_id: asset.parent_table_id.clone(),
            table: table_name.clone(),
            asset: asset.clone(),
            payload: scoped_rows[row_idx].clone(),
        });
    }

    result.unmatched_records = scoped_rows.len() - result.matched.len();
    result
}
