//! Catalog Clients
//!
//! Thin I/O adapters for the two catalogs. Each trait method is a single
//! remote request (or a paged sequence of them) that either returns the full
//! result or fails with a typed [`SyncError`](crate::error::SyncError); an
//! empty result always means the remote really had nothing. Retry policy does
//! not live here.

pub mod snowflake;
pub mod tableau;

use crate::error::Result;
use async_trait::async_trait;
use catalog_types::{ColumnAsset, ColumnRecord, ColumnTag, LabelValue, TableAsset, TableRecord};

pub use snowflake::{SnowflakeClient, SnowflakeSession};
pub use tableau::{TableauClient, TableauSession};

/// The BI catalog: source of external assets, target of every update.
#[async_trait]
pub trait BiCatalog: Send + Sync {
    /// All external table assets visible to the session
    async fn list_tables(&self) -> Result<Vec<TableAsset>>;

    /// Column assets of one table
    async fn list_columns(&self, table_id: &str) -> Result<Vec<ColumnAsset>>;

    async fn update_table_description(&self, table_id: &str, text: &str) -> Result<()>;

    async fn update_column_description(
        &self,
        table_id: &str,
        column_id: &str,
        text: &str,
    ) -> Result<()>;

    /// Attach a sensitivity label to a column
    async fn update_column_label(
        &self,
        column_id: &str,
        label_value: &str,
        message: &str,
    ) -> Result<()>;

    /// Create or update a label value definition so it can be assigned
    async fn ensure_label_value(&self, label: &LabelValue) -> Result<()>;

    async fn list_label_values(&self) -> Result<Vec<LabelValue>>;
}

/// The warehouse: source of truth for comments and governance tags.
#[async_trait]
pub trait WarehouseCatalog: Send + Sync {
    /// Tables of one schema, with row counts and comments
    async fn list_tables(&self, database: &str, schema: &str) -> Result<Vec<TableRecord>>;

    /// Column comments of one table
    async fn list_columns(&self, table: &TableRecord) -> Result<Vec<ColumnRecord>>;

    /// Governance tags on the columns of one table
    async fn list_column_tags(&self, table: &TableRecord) -> Result<Vec<ColumnTag>>;
}
