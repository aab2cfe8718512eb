//! Identifier normalization for cross-catalog joins
//!
//! The warehouse folds unquoted identifiers to upper case, while the BI
//! catalog stores whatever spelling the asset was registered with. Join keys
//! on both sides go through the same [`IdentifierCase`] policy:
//! - Unicode NFC composition (so `é` typed two ways compares equal)
//! - Upper-case folding when the policy is case-insensitive

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// How schema, table and column names are compared across the two catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierCase {
    /// Compare after NFC + upper-case folding (unquoted warehouse identifiers)
    #[default]
    Insensitive,
    /// Compare raw strings byte for byte (quoted identifiers)
    Exact,
}

impl IdentifierCase {
    /// Normalize one identifier into its join-key form.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_sync::matcher::IdentifierCase;
    ///
    /// assert_eq!(IdentifierCase::Insensitive.key("Orders"), "ORDERS");
    /// assert_eq!(IdentifierCase::Exact.key("Orders"), "Orders");
    /// ```
    pub fn key(&self, identifier: &str) -> String {
        match self {
            Self::Insensitive => identifier.nfc().collect::<String>().to_uppercase(),
            Self::Exact => identifier.to_string(),
        }
    }

    /// Whether two identifiers name the same object under this policy
    pub fn same(&self, a: &str, b: &str) -> bool {
        self.key(a) == self.key(b)
    }
}

impl std::str::FromStr for IdentifierCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insensitive" | "case-insensitive" => Ok(Self::Insensitive),
            "exact" | "sensitive" | "case-sensitive" => Ok(Self::Exact),
            other => Err(format!("unknown identifier case policy '{}'", other)),
        }
    }
}

/// Join key for a table: `(schema, table)` under a case policy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub schema: String,
    pub table: String,
}

impl TableKey {
    pub fn new(case: IdentifierCase, schema: &str, table: &str) -> Self {
        Self {
            schema: case.key(schema),
            table: case.key(table),
        }
    }
}

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
