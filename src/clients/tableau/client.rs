//! Tableau Cloud REST API client
//!
//! Reads external table/column assets and writes descriptions and sensitivity
//! labels. Every call carries the session token in `X-Tableau-Auth`.

use super::types::{
    ColumnsResponse, LabelValuesResponse, Pagination, SignInResponse, TablesResponse,
};
use crate::clients::BiCatalog;
use crate::config::TableauSettings;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use catalog_types::{ColumnAsset, LabelValue, TableAsset};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const AUTH_HEADER: &str = "X-Tableau-Auth";
const PAGE_SIZE: u32 = 100;

/// An established Tableau session (site-scoped token)
#[derive(Clone)]
pub struct TableauSession {
    pub token: String,
    pub site_id: String,
    pub user_id: String,
}

impl fmt::Debug for TableauSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableauSession")
            .field("token", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Tableau REST API client bound to one site session
pub struct TableauClient {
    http: Client,
    base: Url,
    session: TableauSession,
}

impl TableauClient {
    /// Create a client for an already established session
    pub fn new(settings: &TableauSettings, session: TableauSession) -> Result<Self> {
        Ok(Self {
            http: build_http(settings.timeout_secs)?,
            base: api_base(&settings.pod, &settings.api_version)?,
            session,
        })
    }

    /// Sign in with a personal access token and return a client for the session
    pub async fn sign_in(settings: &TableauSettings) -> Result<Self> {
        let http = build_http(settings.timeout_secs)?;
        let base = api_base(&settings.pod, &settings.api_version)?;
        let url = join(&base, &["auth", "signin"])?;

        let body = json!({
            "credentials": {
                "personalAccessTokenName": settings.pat_name,
                "personalAccessTokenSecret": settings.pat_secret,
                "site": { "contentUrl": settings.site_content_url }
            }
        });

        let response = http
            .post(url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Authentication(format!(
                "Tableau sign-in to site '{}' returned {}: {}",
                settings.site_content_url,
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let signed_in: SignInResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(format!("Tableau sign-in response: {}", e)))?;

        info!(site = %settings.site_content_url, "signed in to Tableau");

        let session = TableauSession {
            token: signed_in.credentials.token,
            site_id: signed_in.credentials.site.id,
            user_id: signed_in.credentials.user.id,
        };

        Ok(Self {
            http,
            base,
            session,
        })
    }

    /// Invalidate the session token. Best-effort: callers usually ignore the error.
    pub async fn sign_out(&self) -> Result<()> {
        let url = join(&self.base, &["auth", "signout"])?;
        let response = self
            .http
            .post(url)
            .header(AUTH_HEADER, &self.session.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::from_update_status("tableau sign-out", status, &text));
        }
        Ok(())
    }

    pub fn session(&self) -> &TableauSession {
        &self.session
    }

    /// `{base}/sites/{site_id}/{segments...}`
    fn site_url(&self, segments: &[&str]) -> Result<Url> {
        let mut all = vec!["sites", self.session.site_id.as_str()];
        all.extend_from_slice(segments);
        join(&self.base, &all)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, scope: &str) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header(AUTH_HEADER, &self.session.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::fetch(scope, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::from_fetch_status(scope, status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::Decode(format!("{}: {}", scope, e)))
    }

    async fn put_json(&self, url: Url, body: &Value, target: &str) -> Result<()> {
        debug!(%url, "PUT");
        let response = self
            .http
            .put(url)
            .header(AUTH_HEADER, &self.session.token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::update(target, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::from_update_status(target, status, &text));
        }
        Ok(())
    }

    /// Walk every page of a listing endpoint
    async fn paged<R, I, F>(&self, segments: &[&str], scope: &str, mut take: F) -> Result<Vec<I>>
    where
        R: DeserializeOwned,
        F: FnMut(R) -> (Vec<I>, Option<Pagination>),
    {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut url = self.site_url(segments)?;
            url.query_pairs_mut()
                .append_pair("pageSize", &PAGE_SIZE.to_string())
                .append_pair("pageNumber", &page.to_string());

            let response: R = self.get_json(url, scope).await?;
            let (batch, pagination) = take(response);
            let fetched = batch.len();
            items.extend(batch);

            match pagination {
                Some(p) if p.has_more() && fetched > 0 => page += 1,
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl BiCatalog for TableauClient {
    async fn list_tables(&self) -> Result<Vec<TableAsset>> {
        let tables = self
            .paged(&["tables"], "tableau tables", |r: TablesResponse| {
                (r.tables.table, r.pagination)
            })
            .await?;
        Ok(tables.into_iter().map(TableAsset::from).collect())
    }

    async fn list_columns(&self, table_id: &str) -> Result<Vec<ColumnAsset>> {
        let scope = format!("tableau columns of table {}", table_id);
        let columns = self
            .paged(&["tables", table_id, "columns"], &scope, |r: ColumnsResponse| {
                (r.columns.column, r.pagination)
            })
            .await?;
        Ok(columns
            .into_iter()
            .map(|c| c.into_asset(table_id))
            .collect())
    }

    async fn update_table_description(&self, table_id: &str, text: &str) -> Result<()> {
        let url = self.site_url(&["tables", table_id])?;
        let target = format!("table {}", table_id);
        self.put_json(url, &table_description_body(text), &target)
            .await
    }

    async fn update_column_description(
        &self,
        table_id: &str,
        column_id: &str,
        text: &str,
    ) -> Result<()> {
        let url = self.site_url(&["tables", table_id, "columns", column_id])?;
        let target = format!("column {}", column_id);
        self.put_json(url, &column_description_body(text), &target)
            .await
    }

    async fn update_column_label(
        &self,
        column_id: &str,
        label_value: &str,
        message: &str,
    ) -> Result<()> {
        let url = self.site_url(&["labels"])?;
        let target = format!("label of column {}", column_id);
        self.put_json(url, &column_label_body(column_id, label_value, message), &target)
            .await
    }

    async fn ensure_label_value(&self, label: &LabelValue) -> Result<()> {
        let url = self.site_url(&["labelValues"])?;
        let target = format!("label value {}", label.name);
        self.put_json(url, &label_value_body(label), &target).await
    }

    async fn list_label_values(&self) -> Result<Vec<LabelValue>> {
        let url = self.site_url(&["labelValues"])?;
        let response: LabelValuesResponse = self.get_json(url, "tableau label values").await?;
        Ok(response.label_values.label_value)
    }
}

// =============================================================================
// Request construction
// =============================================================================

fn build_http(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// `https://{pod}/api/{version}/`; a pod given with a scheme is used as-is
fn api_base(pod: &str, api_version: &str) -> Result<Url> {
    let pod = pod.trim_end_matches('/');
    let root = if pod.starts_with("http://") || pod.starts_with("https://") {
        pod.to_string()
    } else {
        format!("https://{}", pod)
    };
    Url::parse(&format!("{}/api/{}/", root, api_version))
        .map_err(|e| SyncError::Config(format!("invalid Tableau pod '{}': {}", pod, e)))
}

/// Append path segments, percent-encoding each one
fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| SyncError::Config(format!("'{}' cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn table_description_body(text: &str) -> Value {
    json!({ "table": { "description": text } })
}

fn column_description_body(text: &str) -> Value {
    json!({ "column": { "description": text } })
}

fn column_label_body(column_id: &str, label_value: &str, message: &str) -> Value {
    json!({
        "contentList": {
            "content": [{ "contentType": "column", "luid": column_id }]
        },
        "label": { "value": label_value, "message": message }
    })
}

fn label_value_body(label: &LabelValue) -> Value {
    json!({
        "labelValue": {
            "name": label.name,
            "category": label.category,
            "description": label.description.as_deref().unwrap_or_default()
        }
    })
}
