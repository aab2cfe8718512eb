//! Run configuration
//!
//! Everything a run needs is carried in one explicit [`SyncConfig`]; nothing
//! is read from ambient state once the config is built. Sources, lowest to
//! highest precedence:
//!
//! 1. YAML file (`--config sync.yaml`)
//! 2. Environment (`TABLEAU_*`, `SNOWFLAKE_*`, `SYNC_*`), including `.env`
//! 3. Command-line flags (applied by the binary)

use crate::clients::snowflake::TokenType;
use crate::error::SyncError;
use crate::matcher::IdentifierCase;
use anyhow::{Context, Result};
use catalog_types::SyncFlow;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const DEFAULT_API_VERSION: &str = "3.20";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Warehouse tag that feeds the label flow unless configured otherwise
pub const DEFAULT_TAG_NAME: &str = "SENSITIVITY";

/// `tag_name` value selecting every tag on a column
pub const ALL_TAGS: &str = "*";

/// Message attached to every sensitivity label the label flow assigns
pub const DEFAULT_CLASSIFICATION_MESSAGE: &str = "Data that must be protected from unauthorized access to prevent harm to businesses and individuals alike. This classification include personal information, private information, health information, and high-risk data, among others.";

// =============================================================================
// Settings blocks
// =============================================================================

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub tableau: TableauSettings,
    pub warehouse: WarehouseSettings,
    pub run: RunSettings,
}

/// BI catalog endpoint and credentials
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TableauSettings {
    /// Pod host, e.g. `10ax.online.tableau.com`
    pub pod: String,
    #[serde(alias = "site")]
    pub site_content_url: String,
    pub api_version: String,
    pub pat_name: Option<String>,
    pub pat_secret: Option<String>,
    /// Pre-established session token; skips sign-in when set with `site_id`
    pub session_token: Option<String>,
    pub site_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TableauSettings {
    fn default() -> Self {
        Self {
            pod: String::new(),
            site_content_url: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            pat_name: None,
            pat_secret: None,
            session_token: None,
            site_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for TableauSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableauSettings")
            .field("pod", &self.pod)
            .field("site_content_url", &self.site_content_url)
            .field("api_version", &self.api_version)
            .field("pat_name", &self.pat_name)
            .field("pat_secret", &redacted(&self.pat_secret))
            .field("session_token", &redacted(&self.session_token))
            .field("site_id", &self.site_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Warehouse endpoint, scope and session token
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Account locator, e.g. `hc16866.eu-west-1`
    pub account: String,
    pub database: String,
    pub schema: String,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub token: Option<String>,
    pub token_type: TokenType,
    pub timeout_secs: u64,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            account: String::new(),
            database: String::new(),
            schema: String::new(),
            warehouse: None,
            role: None,
            token: None,
            token_type: TokenType::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for WarehouseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSettings")
            .field("account", &self.account)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("token", &redacted(&self.token))
            .field("token_type", &self.token_type)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

/// What the run does
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub flow: SyncFlow,
    /// Only BI assets in this schema take part in matching
    pub schema_filter: Option<String>,
    pub sync_table_descriptions: bool,
    pub sync_column_descriptions: bool,
    pub classification_message: String,
    /// Only this warehouse tag feeds the label flow; all tags when unset or `*`
    pub tag_name: Option<String>,
    pub column_fetch_concurrency: usize,
    pub identifier_case: IdentifierCase,
    pub dry_run: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            flow: SyncFlow::default(),
            schema_filter: None,
            sync_table_descriptions: true,
            sync_column_descriptions: true,
            classification_message: DEFAULT_CLASSIFICATION_MESSAGE.to_string(),
            tag_name: Some(DEFAULT_TAG_NAME.to_string()),
            column_fetch_concurrency: 1,
            identifier_case: IdentifierCase::default(),
            dry_run: false,
        }
    }
}

// =============================================================================
// Driver configuration
// =============================================================================

/// The slice of configuration the reconciliation driver runs on
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub flow: SyncFlow,
    /// Warehouse database holding the target schema
    pub database: String,
    /// Warehouse schema whose tables are read
    pub schema: String,
    pub schema_filter: Option<String>,
    pub sync_table_descriptions: bool,
    pub sync_column_descriptions: bool,
    pub classification_message: String,
    pub tag_name: Option<String>,
    pub column_fetch_concurrency: usize,
    pub identifier_case: IdentifierCase,
    pub dry_run: bool,
}

impl ReconcileConfig {
    pub fn new(flow: SyncFlow, database: impl Into<String>, schema: impl Into<String>) -> Self {
        let run = RunSettings::default();
        Self {
            flow,
            database: database.into(),
            schema: schema.into(),
            schema_filter: run.schema_filter,
            sync_table_descriptions: run.sync_table_descriptions,
            sync_column_descriptions: run.sync_column_descriptions,
            classification_message: run.classification_message,
            tag_name: run.tag_name,
            column_fetch_concurrency: run.column_fetch_concurrency,
            identifier_case: run.identifier_case,
            dry_run: run.dry_run,
        }
    }

    pub fn with_schema_filter(mut self, schema: impl Into<String>) -> Self {
        self.schema_filter = Some(schema.into());
        self
    }

    pub fn with_table_descriptions(mut self, enabled: bool) -> Self {
        self.sync_table_descriptions = enabled;
        self
    }

    pub fn with_column_descriptions(mut self, enabled: bool) -> Self {
        self.sync_column_descriptions = enabled;
        self
    }

    pub fn with_classification_message(mut self, message: impl Into<String>) -> Self {
        self.classification_message = message.into();
        self
    }

    pub fn with_tag_name(mut self, tag: impl Into<String>) -> Self {
        self.tag_name = Some(tag.into());
        self
    }

    pub fn with_all_tags(mut self) -> Self {
        self.tag_name = None;
        self
    }

    /// The tag filter in effect, `None` meaning every tag
    pub fn tag_filter(&self) -> Option<&str> {
        self.tag_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != ALL_TAGS)
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.column_fetch_concurrency = n;
        self
    }

    pub fn with_identifier_case(mut self, case: IdentifierCase) -> Self {
        self.identifier_case = case;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

// =============================================================================
// Loading
// =============================================================================

impl SyncConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse sync configuration YAML")
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("In config file {}", path.display()))
    }

    /// Load the optional YAML file, then overlay the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values found by `lookup` (normally `std::env::var`)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key) {
                *target = v;
            }
        };
        set(&mut self.tableau.pod, "TABLEAU_POD");
        set(&mut self.tableau.site_content_url, "TABLEAU_SITE");
        set(&mut self.tableau.api_version, "TABLEAU_API_VERSION");
        set(&mut self.warehouse.account, "SNOWFLAKE_ACCOUNT");
        set(&mut self.warehouse.database, "SNOWFLAKE_DATABASE");
        set(&mut self.warehouse.schema, "SNOWFLAKE_SCHEMA");

        let set_opt = |target: &mut Option<String>, key: &str| {
            if let Some(v) = lookup(key) {
                *target = Some(v);
            }
        };
        set_opt(&mut self.tableau.pat_name, "TABLEAU_PAT_NAME");
        set_opt(&mut self.tableau.pat_secret, "TABLEAU_PAT_SECRET");
        set_opt(&mut self.tableau.session_token, "TABLEAU_SESSION_TOKEN");
        set_opt(&mut self.tableau.site_id, "TABLEAU_SITE_ID");
        set_opt(&mut self.warehouse.warehouse, "SNOWFLAKE_WAREHOUSE");
        set_opt(&mut self.warehouse.role, "SNOWFLAKE_ROLE");
        set_opt(&mut self.warehouse.token, "SNOWFLAKE_TOKEN");
        set_opt(&mut self.run.schema_filter, "SYNC_SCHEMA_FILTER");
        set_opt(&mut self.run.tag_name, "SYNC_TAG_NAME");

        if let Some(v) = lookup("SNOWFLAKE_TOKEN_TYPE") {
            self.warehouse.token_type = match v.trim().to_ascii_uppercase().as_str() {
                "OAUTH" => TokenType::Oauth,
                "KEYPAIR_JWT" | "JWT" => TokenType::KeypairJwt,
                other => anyhow::bail!("SNOWFLAKE_TOKEN_TYPE: unknown token type '{}'", other),
            };
        }
        if let Some(v) = lookup("SYNC_FLOW") {
            self.run.flow = v.parse().context("SYNC_FLOW")?;
        }
        if let Some(v) = lookup("SYNC_DRY_RUN") {
            self.run.dry_run = parse_bool(&v).context("SYNC_DRY_RUN")?;
        }
        Ok(())
    }

    /// Reject configurations that cannot produce a run
    pub fn validate(&self) -> std::result::Result<(), SyncError> {
        let missing = |what: &str| SyncError::Config(format!("{} is required", what));

        if self.tableau.pod.trim().is_empty() {
            return Err(missing("tableau.pod"));
        }
        let has_session = self.tableau.session_token.is_some() && self.tableau.site_id.is_some();
        let has_pat = self.tableau.pat_name.is_some() && self.tableau.pat_secret.is_some();
        if !has_session && !has_pat {
            return Err(SyncError::Config(
                "either tableau.pat_name + tableau.pat_secret or tableau.session_token + tableau.site_id is required".into(),
            ));
        }
        if has_pat && !has_session && self.tableau.site_content_url.trim().is_empty() {
            return Err(missing("tableau.site_content_url"));
        }
        if self.warehouse.account.trim().is_empty() {
            return Err(missing("warehouse.account"));
        }
        if self.warehouse.database.trim().is_empty() {
            return Err(missing("warehouse.database"));
        }
        if self.warehouse.schema.trim().is_empty() {
            return Err(missing("warehouse.schema"));
        }
        if self.warehouse.token.is_none() {
            return Err(missing("warehouse.token"));
        }
        if self.run.column_fetch_concurrency == 0 {
            return Err(SyncError::Config(
                "run.column_fetch_concurrency must be at least 1".into(),
            ));
        }
        if self.run.flow == SyncFlow::Labels && self.run.classification_message.trim().is_empty() {
            return Err(missing("run.classification_message"));
        }
        Ok(())
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            flow: self.run.flow,
            database: self.warehouse.database.clone(),
            schema: self.warehouse.schema.clone(),
            schema_filter: self.run.schema_filter.clone(),
            sync_table_descriptions: self.run.sync_table_descriptions,
            sync_column_descriptions: self.run.sync_column_descriptions,
            classification_message: self.run.classification_message.clone(),
            tag_name: self.run.tag_name.clone(),
            column_fetch_concurrency: self.run.column_fetch_concurrency,
            identifier_case: self.run.identifier_case,
            dry_run: self.run.dry_run,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const YAML: &str = r#"
tableau:
  pod: 10ax.online.tableau.com
  site: pablodevsite
  pat_name: python
warehouse:
  account: hc16866.eu-west-1
  database: PERSONAL
  schema: PUBLIC
  warehouse: COMPUTE_WH
run:
  flow: labels
  schema_filter: PUBLIC
  column_fetch_concurrency: 4
  identifier_case: exact
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn yaml_fills_blocks_and_keeps_defaults() {
        let config = SyncConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.tableau.site_content_url, "pablodevsite");
        assert_eq!(config.tableau.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.warehouse.warehouse.as_deref(), Some("COMPUTE_WH"));
        assert_eq!(config.run.flow, SyncFlow::Labels);
        assert_eq!(config.run.column_fetch_concurrency, 4);
        assert_eq!(config.run.identifier_case, IdentifierCase::Exact);
        assert!(config.run.sync_table_descriptions);
        assert_eq!(config.run.classification_message, DEFAULT_CLASSIFICATION_MESSAGE);
        assert_eq!(config.run.tag_name.as_deref(), Some(DEFAULT_TAG_NAME));
    }

    #[test]
    fn tag_filter_defaults_to_sensitivity_and_star_means_all() {
        let config = ReconcileConfig::new(SyncFlow::Labels, "PERSONAL", "PUBLIC");
        assert_eq!(config.tag_filter(), Some(DEFAULT_TAG_NAME));
        assert_eq!(config.clone().with_tag_name(ALL_TAGS).tag_filter(), None);
        assert_eq!(config.clone().with_all_tags().tag_filter(), None);

        let config = SyncConfig::from_yaml_str("run:\n  tag_name: ~\n").unwrap();
        assert_eq!(config.reconcile_config().tag_filter(), None);
    }

    #[test]
    fn env_overrides_yaml() {
        let mut config = SyncConfig::from_yaml_str(YAML).unwrap();
        config
            .apply_env(env(&[
                ("TABLEAU_PAT_SECRET", "s3cret"),
                ("SNOWFLAKE_TOKEN", "tok"),
                ("SNOWFLAKE_TOKEN_TYPE", "keypair_jwt"),
                ("SNOWFLAKE_SCHEMA", "STAGING"),
                ("SYNC_FLOW", "descriptions"),
                ("SYNC_DRY_RUN", "yes"),
            ]))
            .unwrap();

        assert_eq!(config.warehouse.schema, "STAGING");
        assert_eq!(config.warehouse.token_type, TokenType::KeypairJwt);
        assert_eq!(config.run.flow, SyncFlow::Descriptions);
        assert!(config.run.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = SyncConfig::default();
        assert!(config.apply_env(env(&[("SYNC_FLOW", "tags")])).is_err());
        assert!(config.apply_env(env(&[("SYNC_DRY_RUN", "maybe")])).is_err());
        assert!(config
            .apply_env(env(&[("SNOWFLAKE_TOKEN_TYPE", "PASSWORD")]))
            .is_err());
    }

    #[test]
    fn validate_requires_credentials() {
        let config = SyncConfig::from_yaml_str(YAML).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));

        let mut config = config;
        config.tableau.session_token = Some("token".into());
        config.tableau.site_id = Some("site-luid".into());
        config.warehouse.token = Some("tok".into());
        assert!(config.validate().is_ok());

        config.run.column_fetch_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = SyncConfig::default();
        config.tableau.pat_secret = Some("pat-secret-value".into());
        config.warehouse.token = Some("warehouse-token-value".into());

        let rendered = format!("{:?}{:?}", config.tableau, config.warehouse);
        assert!(!rendered.contains("pat-secret-value"));
        assert!(!rendered.contains("warehouse-token-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = SyncConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.warehouse.database, "PERSONAL");

        let reconcile = config.reconcile_config();
        assert_eq!(reconcile.database, "PERSONAL");
        assert_eq!(reconcile.schema, "PUBLIC");
        assert_eq!(reconcile.schema_filter.as_deref(), Some("PUBLIC"));
    }
}
