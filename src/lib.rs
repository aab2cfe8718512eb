//! Catalog Sync - warehouse metadata into the BI catalog
//!
//! Propagates table and column comments from the warehouse into BI catalog
//! descriptions, and column governance tags into sensitivity labels.
//!
//! ## Architecture
//! Every run is one linear pass:
//! BI + warehouse listings -> Entity Matcher (pure) -> planned updates -> BI update calls
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_sync::clients::{SnowflakeClient, SnowflakeSession, TableauClient};
//! use catalog_sync::config::SyncConfig;
//! use catalog_sync::reconcile::ReconciliationDriver;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SyncConfig::load(None)?;
//! config.validate()?;
//!
//! let bi = TableauClient::sign_in(&config.tableau).await?;
//! let token = config.warehouse.token.clone().unwrap_or_default();
//! let warehouse = SnowflakeClient::new(
//!     &config.warehouse,
//!     SnowflakeSession { token, token_type: config.warehouse.token_type },
//! )?;
//!
//! let driver = ReconciliationDriver::new(Arc::new(bi), Arc::new(warehouse), config.reconcile_config());
//! let summary = driver.run().await?;
//! println!("{} updates succeeded", summary.updates_succeeded);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Run configuration (YAML + environment)
pub mod config;

// Catalog clients: traits plus the Tableau and Snowflake adapters
pub mod clients;

// Entity Matcher - pure keyed-lookup joins
pub mod matcher;

// Reconciliation Driver, planned updates and run summary
pub mod reconcile;

pub use catalog_types::{
    ColumnAsset, ColumnRecord, ColumnTag, LabelValue, SyncFlow, TableAsset, TableRecord,
};
pub use config::{ReconcileConfig, SyncConfig};
pub use error::{Result, SyncError};
pub use reconcile::{ReconciliationDriver, SyncSummary};
