//! Snowflake SQL API client
//!
//! Runs information-schema queries through `POST /api/v2/statements`. Literal
//! values always travel as bind variables; only the database name is spliced
//! into the SQL text, as an identifier.

use super::types::{
    decode_columns, decode_tables, decode_tags, text_bindings, ResultSet, StatementRequest,
    StatementResponse,
};
use crate::clients::WarehouseCatalog;
use crate::config::WarehouseSettings;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use catalog_types::{ColumnRecord, ColumnTag, TableRecord};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

const POLL_INTERVAL_MS: u64 = 500;

/// How the bearer token was minted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    #[default]
    Oauth,
    KeypairJwt,
}

impl TokenType {
    fn header_value(&self) -> &'static str {
        match self {
            Self::Oauth => "OAUTH",
            Self::KeypairJwt => "KEYPAIR_JWT",
        }
    }
}

/// Externally supplied warehouse session handle
#[derive(Clone)]
pub struct SnowflakeSession {
    pub token: String,
    pub token_type: TokenType,
}

impl fmt::Debug for SnowflakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeSession")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Snowflake SQL API client
pub struct SnowflakeClient {
    http: Client,
    base: Url,
    session: SnowflakeSession,
    warehouse: Option<String>,
    role: Option<String>,
    statement_timeout_secs: u64,
}

impl SnowflakeClient {
    pub fn new(settings: &WarehouseSettings, session: SnowflakeSession) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base: account_base(&settings.account)?,
            session,
            warehouse: settings.warehouse.clone(),
            role: settings.role.clone(),
            statement_timeout_secs: settings.timeout_secs,
        })
    }

    /// Run one statement to completion and collect every partition
    async fn query(
        &self,
        statement: &str,
        binds: &[&str],
        database: &str,
        scope: &str,
    ) -> Result<ResultSet> {
        let url = self.statements_url(None)?;
        let body = StatementRequest {
            statement,
            timeout: self.statement_timeout_secs,
            database: Some(database),
            warehouse: self.warehouse.as_deref(),
            role: self.role.as_deref(),
            bindings: text_bindings(binds),
        };

        debug!(scope, statement, "submitting statement");
        let request = self
            .authorized(self.http.post(url))
            .query(&[("requestId", uuid::Uuid::new_v4().to_string())])
            .json(&body);
        let (mut status, mut response) = self.send(request, scope).await?;

        // 202: still running, poll the handle until it finishes
        let poll_budget = max_polls(self.statement_timeout_secs);
        let mut polls = 0;
        while status == StatusCode::ACCEPTED {
            polls += 1;
            if polls > poll_budget {
                return Err(SyncError::fetch(scope, "statement did not finish before timeout"));
            }
            let handle = response
                .statement_handle
                .clone()
                .ok_or_else(|| SyncError::Decode(format!("{}: 202 without statement handle", scope)))?;
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            let request = self.authorized(self.http.get(self.statements_url(Some(&handle))?));
            (status, response) = self.send(request, scope).await?;
        }

        let meta = response.result_set_meta_data.take().ok_or_else(|| {
            SyncError::Decode(format!("{}: response has no resultSetMetaData", scope))
        })?;
        let mut rows = std::mem::take(&mut response.data);

        if meta.partition_info.len() > 1 {
            let handle = response.statement_handle.clone().ok_or_else(|| {
                SyncError::Decode(format!("{}: partitioned result without handle", scope))
            })?;
            for partition in 1..meta.partition_info.len() {
                let mut url = self.statements_url(Some(&handle))?;
                url.query_pairs_mut()
                    .append_pair("partition", &partition.to_string());
                let (_, page) = self.send(self.authorized(self.http.get(url)), scope).await?;
                rows.extend(page.data);
            }
        }

        Ok(ResultSet::from_metadata(&meta, rows))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.session.token)
            .header(
                "X-Snowflake-Authorization-Token-Type",
                self.session.token_type.header_value(),
            )
            .header("Accept", "application/json")
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        scope: &str,
    ) -> Result<(StatusCode, StatementResponse)> {
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::fetch(scope, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::from_fetch_status(scope, status, &text));
        }

        let body: StatementResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(format!("{}: {}", scope, e)))?;
        Ok((status, body))
    }

    fn statements_url(&self, handle: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SyncError::Config(format!("'{}' cannot be a base URL", self.base)))?;
            segments.pop_if_empty().extend(["api", "v2", "statements"]);
            if let Some(handle) = handle {
                segments.push(handle);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl WarehouseCatalog for SnowflakeClient {
    async fn list_tables(&self, database: &str, schema: &str) -> Result<Vec<TableRecord>> {
        let scope = format!("warehouse tables of {}.{}", database, schema);
        let rs = self
            .query(&tables_sql(database), &[schema], database, &scope)
            .await?;
        decode_tables(&rs)
    }

    async fn list_columns(&self, table: &TableRecord) -> Result<Vec<ColumnRecord>> {
        let scope = format!("warehouse columns of {}.{}", table.schema_name, table.table_name);
        let rs = self
            .query(
                &columns_sql(&table.database),
                &[table.schema_name.as_str(), table.table_name.as_str()],
                &table.database,
                &scope,
            )
            .await?;
        decode_columns(&rs)
    }

    async fn list_column_tags(&self, table: &TableRecord) -> Result<Vec<ColumnTag>> {
        let scope = format!("warehouse column tags of {}.{}", table.schema_name, table.table_name);
        let object = qualified_name(&[&table.database, &table.schema_name, &table.table_name]);
        let rs = self
            .query(&tags_sql(&table.database), &[object.as_str()], &table.database, &scope)
            .await?;
        decode_tags(&rs)
    }
}

// =============================================================================
// SQL construction
// =============================================================================

/// `https://{account}.snowflakecomputing.com/`; a value with a scheme is used as-is
fn account_base(account: &str) -> Result<Url> {
    let account = account.trim_end_matches('/');
    let root = if account.starts_with("http://") || account.starts_with("https://") {
        format!("{}/", account)
    } else {
        format!("https://{}.snowflakecomputing.com/", account)
    };
    Url::parse(&root)
        .map_err(|e| SyncError::Config(format!("invalid Snowflake account '{}': {}", account, e)))
}

/// Render a database name for the SQL text. Plain identifiers stay bare so the
/// warehouse folds them as usual; anything else is double-quoted.
fn database_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fully quoted `"DB"."SCHEMA"."TABLE"` from stored (already folded) names
fn qualified_name(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Vec<_>>()
        .join(".")
}

/// Poll budget for a statement timeout; huge timeouts saturate instead of overflowing
fn max_polls(timeout_secs: u64) -> u64 {
    (timeout_secs.saturating_mul(1000) / POLL_INTERVAL_MS).max(1)
}

fn tables_sql(database: &str) -> String {
    format!(
        "SELECT TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, ROW_COUNT, COMMENT \
         FROM {}.INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = ? ORDER BY TABLE_NAME",
        database_ident(database)
    )
}

fn columns_sql(database: &str) -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, COMMENT \
         FROM {}.INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
         ORDER BY ORDINAL_POSITION",
        database_ident(database)
    )
}

fn tags_sql(database: &str) -> String {
    format!(
        "SELECT OBJECT_DATABASE, OBJECT_SCHEMA, OBJECT_NAME, COLUMN_NAME, TAG_NAME, TAG_VALUE \
         FROM TABLE({}.INFORMATION_SCHEMA.TAG_REFERENCES_ALL_COLUMNS(?, 'table')) \
         ORDER BY COLUMN_NAME, TAG_DATABASE, TAG_SCHEMA, TAG_NAME",
        database_ident(database)
    )
}
