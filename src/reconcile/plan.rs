//! Planned updates
//!
//! Turning matched pairs into concrete update calls is pure: the driver plans
//! every update for a table first, then applies the plan. Dry runs stop after
//! planning.

use crate::matcher::{ColumnMatch, MatchedColumn, MatchedTable};
use catalog_types::{ColumnRecord, ColumnTag, LabelValue};
use serde::Serialize;
use std::fmt;

/// Build the BI description text for a warehouse table.
///
/// A row count is appended on its own line. Returns `None` when there is
/// nothing to write.
///
/// # Examples
///
/// ```
/// use catalog_sync::reconcile::build_description;
///
/// assert_eq!(
///     build_description(Some("Customer data"), Some(1000)).as_deref(),
///     Some("Customer data\nTotal table rows is 1000.")
/// );
/// assert_eq!(
///     build_description(Some("Customer data"), None).as_deref(),
///     Some("Customer data")
/// );
/// ```
pub fn build_description(comment: Option<&str>, row_count: Option<u64>) -> Option<String> {
    let annotation = row_count.map(|n| format!("Total table rows is {}.", n));
    match (comment, annotation) {
        (Some(comment), Some(annotation)) => Some(format!("{}\n{}", comment, annotation)),
        (Some(comment), None) => Some(comment.to_string()),
        (None, Some(annotation)) => Some(annotation),
        (None, None) => None,
    }
}

/// What an update call changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    TableDescription,
    ColumnDescription,
    LabelValue,
    ColumnLabel,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TableDescription => "table description",
            Self::ColumnDescription => "column description",
            Self::LabelValue => "label value",
            Self::ColumnLabel => "column label",
        };
        f.write_str(s)
    }
}

/// One BI update call, fully resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedUpdate {
    TableDescription {
        table_id: String,
        /// Warehouse `SCHEMA.TABLE`
        table: String,
        text: String,
    },
    ColumnDescription {
        table_id: String,
        column_id: String,
        table: String,
        column: String,
        text: String,
    },
    LabelValue {
        label: LabelValue,
    },
    ColumnLabel {
        column_id: String,
        table: String,
        column: String,
        label_value: String,
        message: String,
    },
}

impl PlannedUpdate {
    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::TableDescription { .. } => UpdateKind::TableDescription,
            Self::ColumnDescription { .. } => UpdateKind::ColumnDescription,
            Self::LabelValue { .. } => UpdateKind::LabelValue,
            Self::ColumnLabel { .. } => UpdateKind::ColumnLabel,
        }
    }

    /// Identifying key for reports: warehouse names plus the catalog ID
    pub fn key(&self) -> String {
        match self {
            Self::TableDescription {
                table_id, table, ..
            } => format!("{} ({})", table, table_id),
            Self::ColumnDescription {
                column_id,
                table,
                column,
                ..
            } => format!("{}.{} ({})", table, column, column_id),
            Self::LabelValue { label } => label.name.clone(),
            Self::ColumnLabel {
                column_id,
                table,
                column,
                label_value,
                ..
            } => format!("{}.{} ({}) <- {}", table, column, column_id, label_value),
        }
    }
}

/// Table description update, when the warehouse has anything to say
pub fn plan_table_description(table: &MatchedTable) -> Option<PlannedUpdate> {
    let text = build_description(table.record.comment.as_deref(), table.record.row_count)?;
    Some(PlannedUpdate::TableDescription {
        table_id: table.catalog_table_id().to_string(),
        table: table.display_name(),
        text,
    })
}

/// One update per matched column that carries a comment
pub fn plan_column_descriptions(columns: &ColumnMatch<ColumnRecord>) -> Vec<PlannedUpdate> {
    columns
        .matched
        .iter()
        .filter_map(|m| {
            let text = m.payload.comment.clone()?;
            Some(PlannedUpdate::ColumnDescription {
                table_id: m.catalog_table_id.clone(),
                column_id: m.asset.catalog_column_id.clone(),
                table: m.table.clone(),
                column: m.payload.column_name.clone(),
                text,
            })
        })
        .collect()
}

/// One label assignment per matched tagged column
pub fn plan_column_labels(columns: &ColumnMatch<ColumnTag>, message: &str) -> Vec<PlannedUpdate> {
    columns
        .matched
        .iter()
        .map(|m: &MatchedColumn<ColumnTag>| PlannedUpdate::ColumnLabel {
            column_id: m.asset.catalog_column_id.clone(),
            table: m.table.clone(),
            column: m.payload.column_name.clone(),
            label_value: m.payload.tag_value.clone(),
            message: message.to_string(),
        })
        .collect()
}

/// Label value definitions needed by `assignments`, one per distinct value,
/// in order of first use
pub fn plan_label_values(assignments: &[PlannedUpdate], message: &str) -> Vec<PlannedUpdate> {
    let mut seen = std::collections::HashSet::new();
    assignments
        .iter()
        .filter_map(|update| match update {
            PlannedUpdate::ColumnLabel { label_value, .. } if seen.insert(label_value.clone()) => {
                Some(PlannedUpdate::LabelValue {
                    label: LabelValue::sensitivity(label_value.clone(), message),
                })
            }
            _ => None,
        })
        .collect()
}
