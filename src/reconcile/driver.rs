//! Reconciliation Driver
//!
//! One linear pass: fetch tables on both sides, match, then per matched table
//! fetch and match columns, plan the updates and apply them one call at a
//! time. A failing update or per-table fetch is recorded and the run moves
//! on; only fatal errors (authentication, configuration) and the two
//! top-level table listings abort.

use super::plan::{
    plan_column_descriptions, plan_column_labels, plan_label_values, plan_table_description,
    PlannedUpdate,
};
use super::summary::{SyncSummary, UpdateOutcome};
use crate::clients::{BiCatalog, WarehouseCatalog};
use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::matcher::{match_columns, match_tables, ColumnMatch, MatchedTable, TableMatch};
use catalog_types::{ColumnRecord, ColumnTag, SyncFlow};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ReconciliationDriver {
    bi: Arc<dyn BiCatalog>,
    warehouse: Arc<dyn WarehouseCatalog>,
    config: ReconcileConfig,
}

impl ReconciliationDriver {
    pub fn new(
        bi: Arc<dyn BiCatalog>,
        warehouse: Arc<dyn WarehouseCatalog>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            bi,
            warehouse,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run the configured flow to completion.
    ///
    /// `Err` means the run was aborted; per-item failures are reported in
    /// the returned summary instead.
    pub async fn run(&self) -> Result<SyncSummary> {
        let config = &self.config;
        let mut summary = SyncSummary::new(config.flow, config.dry_run);

        info!(
            flow = %config.flow,
            database = %config.database,
            schema = %config.schema,
            dry_run = config.dry_run,
            "starting catalog sync"
        );

        let tables = self.fetch_and_match_tables().await?;
        summary.tables_matched = tables.matched.len();
        summary.tables_unmatched = tables.unmatched_assets + tables.unmatched_records;
        summary.warnings.extend(tables.warnings.iter().cloned());

        match config.flow {
            SyncFlow::Descriptions => self.sync_descriptions(&tables.matched, &mut summary).await?,
            SyncFlow::Labels => self.sync_labels(&tables.matched, &mut summary).await?,
        }

        summary.finish();
        info!(
            tables_matched = summary.tables_matched,
            columns_matched = summary.columns_matched,
            succeeded = summary.updates_succeeded,
            failed = summary.updates_failed,
            skipped = summary.updates_skipped,
            "catalog sync finished"
        );
        Ok(summary)
    }

    async fn fetch_and_match_tables(&self) -> Result<TableMatch> {
        let config = &self.config;
        let assets = self.bi.list_tables().await?;
        let records = self
            .warehouse
            .list_tables(&config.database, &config.schema)
            .await?;
        debug!(
            assets = assets.len(),
            records = records.len(),
            "fetched table listings"
        );

        let tables = match_tables(
            &assets,
            &records,
            config.schema_filter.as_deref(),
            config.identifier_case,
        );
        info!(
            matched = tables.matched.len(),
            unmatched_assets = tables.unmatched_assets,
            unmatched_records = tables.unmatched_records,
            filtered_out = tables.filtered_out,
            "matched tables"
        );
        Ok(tables)
    }

    // =========================================================================
    // Flows
    // =========================================================================

    async fn sync_descriptions(
        &self,
        tables: &[MatchedTable],
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let columns = if self.config.sync_column_descriptions {
            let fetched = self
                .fetch_columns(tables, |table| self.comment_columns(table))
                .await;
            absorb_columns(tables, fetched, summary)?
        } else {
            tables.iter().map(|_| None).collect()
        };

        for (table, columns) in tables.iter().zip(columns) {
            let mut plan = Vec::new();
            if self.config.sync_table_descriptions {
                plan.extend(plan_table_description(table));
            }
            if let Some(columns) = &columns {
                plan.extend(plan_column_descriptions(columns));
            }
            debug!(table = %table.display_name(), updates = plan.len(), "planned description updates");
            self.apply_all(&plan, summary).await?;
        }
        Ok(())
    }

    async fn sync_labels(&self, tables: &[MatchedTable], summary: &mut SyncSummary) -> Result<()> {
        let message = self.config.classification_message.as_str();
        let fetched = self
            .fetch_columns(tables, |table| self.tagged_columns(table))
            .await;
        let columns = absorb_columns(tables, fetched, summary)?;

        let assignments: Vec<PlannedUpdate> = columns
            .iter()
            .flatten()
            .flat_map(|c| plan_column_labels(c, message))
            .collect();
        let label_values = plan_label_values(&assignments, message);
        info!(
            assignments = assignments.len(),
            label_values = label_values.len(),
            "planned label updates"
        );

        // A failed label value is recorded; its assignments are still attempted
        self.apply_all(&label_values, summary).await?;
        self.apply_all(&assignments, summary).await
    }

    // =========================================================================
    // Column fetch
    // =========================================================================

    /// Fetch and match columns for every table, up to
    /// `column_fetch_concurrency` tables at a time. Results keep table order.
    async fn fetch_columns<'a, P, F, Fut>(
        &self,
        tables: &'a [MatchedTable],
        fetch: F,
    ) -> Vec<Result<ColumnMatch<P>>>
    where
        F: Fn(&'a MatchedTable) -> Fut,
        Fut: Future<Output = Result<ColumnMatch<P>>>,
    {
        stream::iter(tables)
            .map(fetch)
            .buffered(self.config.column_fetch_concurrency.max(1))
            .collect()
            .await
    }

    async fn comment_columns(&self, table: &MatchedTable) -> Result<ColumnMatch<ColumnRecord>> {
        let assets = self.bi.list_columns(table.catalog_table_id()).await?;
        let rows = self.warehouse.list_columns(&table.record).await?;
        Ok(match_columns(
            table,
            &assets,
            &rows,
            self.config.identifier_case,
        ))
    }

    async fn tagged_columns(&self, table: &MatchedTable) -> Result<ColumnMatch<ColumnTag>> {
        let case = self.config.identifier_case;
        let assets = self.bi.list_columns(table.catalog_table_id()).await?;
        let mut tags = self.warehouse.list_column_tags(&table.record).await?;
        if let Some(tag_name) = self.config.tag_filter() {
            tags.retain(|tag| case.same(&tag.tag_name, tag_name));
        }
        // First-seen must not depend on the order the warehouse returned rows in
        tags.sort_by(|a, b| {
            (case.key(&a.tag_name), &a.tag_value).cmp(&(case.key(&b.tag_name), &b.tag_value))
        });
        Ok(match_columns(table, &assets, &tags, case))
    }

    // =========================================================================
    // Apply
    // =========================================================================

    async fn apply_all(&self, updates: &[PlannedUpdate], summary: &mut SyncSummary) -> Result<()> {
        for update in updates {
            if self.config.dry_run {
                info!(kind = %update.kind(), key = %update.key(), "dry run, update not sent");
                summary.record_outcome(UpdateOutcome::skipped(update));
                continue;
            }

            match self.apply(update).await {
                Ok(()) => {
                    debug!(kind = %update.kind(), key = %update.key(), "updated");
                    summary.record_outcome(UpdateOutcome::succeeded(update));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(kind = %update.kind(), key = %update.key(), error = %e, "update failed");
                    summary.record_outcome(UpdateOutcome::failed(update, &e));
                }
            }
        }
        Ok(())
    }

    async fn apply(&self, update: &PlannedUpdate) -> Result<()> {
        match update {
            PlannedUpdate::TableDescription { table_id, text, .. } => {
                self.bi.update_table_description(table_id, text).await
            }
            PlannedUpdate::ColumnDescription {
                table_id,
                column_id,
                text,
                ..
            } => {
                self.bi
                    .update_column_description(table_id, column_id, text)
                    .await
            }
            PlannedUpdate::LabelValue { label } => self.bi.ensure_label_value(label).await,
            PlannedUpdate::ColumnLabel {
                column_id,
                label_value,
                message,
                ..
            } => {
                self.bi
                    .update_column_label(column_id, label_value, message)
                    .await
            }
        }
    }
}

/// Fold per-table fetch results into the summary. Non-fatal failures leave
/// `None` for that table; a fatal one aborts.
fn absorb_columns<P>(
    tables: &[MatchedTable],
    fetched: Vec<Result<ColumnMatch<P>>>,
    summary: &mut SyncSummary,
) -> Result<Vec<Option<ColumnMatch<P>>>> {
    tables
        .iter()
        .zip(fetched)
        .map(|(table, result)| match result {
            Ok(mut columns) => {
                summary.columns_matched += columns.matched.len();
                summary.columns_unmatched += columns.unmatched_assets + columns.unmatched_records;
                summary.warnings.append(&mut columns.warnings);
                Ok(Some(columns))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let key = format!("{} ({})", table.display_name(), table.catalog_table_id());
                warn!(table = %key, error = %e, "column fetch failed, skipping table");
                summary.record_fetch_failure(key, &e);
                Ok(None)
            }
        })
        .collect()
}
