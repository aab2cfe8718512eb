//! In-memory catalog stubs for driving the whole pipeline without a network
//!
//! `RecordingBi` records every update call in order and can be told to fail
//! specific targets; `StubWarehouse` serves fixed listings and can fail the
//! column fetch of named tables.

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_sync::clients::{BiCatalog, WarehouseCatalog};
use catalog_sync::{Result, SyncError};
use catalog_types::{
    ColumnAsset, ColumnRecord, ColumnTag, LabelValue, TableAsset, TableRecord,
};
use std::collections::HashSet;
use std::sync::Mutex;

/// One update call as seen by the BI stub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    TableDescription {
        table_id: String,
        text: String,
    },
    ColumnDescription {
        table_id: String,
        column_id: String,
        text: String,
    },
    ColumnLabel {
        column_id: String,
        label_value: String,
        message: String,
    },
    LabelValue {
        name: String,
    },
}

#[derive(Default)]
pub struct RecordingBi {
    pub tables: Vec<TableAsset>,
    pub columns: Vec<ColumnAsset>,
    /// Update targets (table, column or label value IDs) answered with a 403
    pub failing: HashSet<String>,
    /// Update targets answered with an expired session
    pub unauthorized: HashSet<String>,
    /// Answer the table listing with an expired session
    pub session_expired: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingBi {
    pub fn new(tables: Vec<TableAsset>, columns: Vec<ColumnAsset>) -> Self {
        Self {
            tables,
            columns,
            ..Self::default()
        }
    }

    pub fn fail_on(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    pub fn expire_on(mut self, target: &str) -> Self {
        self.unauthorized.insert(target.to_string());
        self
    }

    pub fn with_expired_session(mut self) -> Self {
        self.session_expired = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, target: &str, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.unauthorized.contains(target) {
            return Err(SyncError::Authentication(format!("{} returned 401", target)));
        }
        if self.failing.contains(target) {
            return Err(SyncError::update(target, "403 Forbidden: insufficient permissions"));
        }
        Ok(())
    }
}

#[async_trait]
impl BiCatalog for RecordingBi {
    async fn list_tables(&self) -> Result<Vec<TableAsset>> {
        if self.session_expired {
            return Err(SyncError::Authentication("tableau tables returned 401".into()));
        }
        Ok(self.tables.clone())
    }

    async fn list_columns(&self, table_id: &str) -> Result<Vec<ColumnAsset>> {
        Ok(self
            .columns
            .iter()
            .filter(|c| c.parent_table_id == table_id)
            .cloned()
            .collect())
    }

    async fn update_table_description(&self, table_id: &str, text: &str) -> Result<()> {
        self.record(
            table_id,
            Call::TableDescription {
                table_id: table_id.into(),
                text: text.into(),
            },
        )
    }

    async fn update_column_description(
        &self,
        table_id: &str,
        column_id: &str,
        text: &str,
    ) -> Result<()> {
        self.record(
            column_id,
            Call::ColumnDescription {
                table_id: table_id.into(),
                column_id: column_id.into(),
                text: text.into(),
            },
        )
    }

    async fn update_column_label(
        &self,
        column_id: &str,
        label_value: &str,
        message: &str,
    ) -> Result<()> {
        self.record(
            column_id,
            Call::ColumnLabel {
                column_id: column_id.into(),
                label_value: label_value.into(),
                message: message.into(),
            },
        )
    }

    async fn ensure_label_value(&self, label: &LabelValue) -> Result<()> {
        self.record(
            &label.name,
            Call::LabelValue {
                name: label.name.clone(),
            },
        )
    }

    async fn list_label_values(&self) -> Result<Vec<LabelValue>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct StubWarehouse {
    pub tables: Vec<TableRecord>,
    pub columns: Vec<ColumnRecord>,
    pub tags: Vec<ColumnTag>,
    /// Table names whose column or tag fetch fails
    pub failing_tables: HashSet<String>,
    /// Fail the table listing itself
    pub tables_unavailable: bool,
}

impl StubWarehouse {
    fn check(&self, table: &TableRecord) -> Result<()> {
        if self.failing_tables.contains(&table.table_name) {
            return Err(SyncError::fetch(
                format!("warehouse columns of {}", table.table_name),
                "503 Service Unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WarehouseCatalog for StubWarehouse {
    async fn list_tables(&self, _database: &str, schema: &str) -> Result<Vec<TableRecord>> {
        if self.tables_unavailable {
            return Err(SyncError::fetch("warehouse tables", "503 Service Unavailable"));
        }
        Ok(self
            .tables
            .iter()
            .filter(|t| t.schema_name == schema)
            .cloned()
            .collect())
    }

    async fn list_columns(&self, table: &TableRecord) -> Result<Vec<ColumnRecord>> {
        self.check(table)?;
        Ok(self
            .columns
            .iter()
            .filter(|c| c.schema_name == table.schema_name && c.table_name == table.table_name)
            .cloned()
            .collect())
    }

    async fn list_column_tags(&self, table: &TableRecord) -> Result<Vec<ColumnTag>> {
        self.check(table)?;
        Ok(self
            .tags
            .iter()
            .filter(|t| t.schema_name == table.schema_name && t.object_name == table.table_name)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn table_record(schema: &str, table: &str, comment: Option<&str>, rows: Option<u64>) -> TableRecord {
    TableRecord {
        database: "PERSONAL".into(),
        schema_name: schema.into(),
        table_name: table.into(),
        row_count: rows,
        comment: comment.map(str::to_string),
    }
}

pub fn column_record(table: &str, column: &str, comment: Option<&str>) -> ColumnRecord {
    ColumnRecord {
        schema_name: "PUBLIC".into(),
        table_name: table.into(),
        column_name: column.into(),
        comment: comment.map(str::to_string),
    }
}

pub fn column_tag(table: &str, column: &str, value: &str) -> ColumnTag {
    ColumnTag {
        database: "PERSONAL".into(),
        schema_name: "PUBLIC".into(),
        object_name: table.into(),
        column_name: column.into(),
        tag_name: "SENSITIVITY".into(),
        tag_value: value.into(),
    }
}
