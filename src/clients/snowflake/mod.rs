//! Snowflake warehouse adapter
//!
//! # Coverage
//!
//! - **Reads:** `INFORMATION_SCHEMA.TABLES`, `INFORMATION_SCHEMA.COLUMNS`,
//!   `TAG_REFERENCES_ALL_COLUMNS`
//! - **Writes:** nothing; the warehouse is the source of truth
//! - **Session:** externally supplied OAuth or key-pair JWT bearer token

mod client;
pub mod types;

pub use client::{SnowflakeClient, SnowflakeSession, TokenType};
