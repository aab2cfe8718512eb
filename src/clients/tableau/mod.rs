//! Tableau Cloud BI catalog adapter
//!
//! # Coverage
//!
//! - **Reads:** external table assets, their column assets, label values
//! - **Writes:** table/column descriptions, column sensitivity labels, label values
//! - **Session:** personal-access-token sign-in, or an externally supplied token

mod client;
pub mod types;

pub use client::{TableauClient, TableauSession};
