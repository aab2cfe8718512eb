//! Catalog Sync CLI
//!
//! Pushes warehouse comments and governance tags into the BI catalog.
//!
//! # Usage
//!
//! ```bash
//! # Table + column descriptions for one schema
//! catalog_sync --config sync.yaml sync --flow descriptions --schema-filter PUBLIC
//!
//! # Sensitivity labels from the SENSITIVITY tag, without sending anything
//! catalog_sync sync --flow labels --tag-name SENSITIVITY --dry-run
//!
//! # Label values defined on the site
//! catalog_sync label-values --json
//! ```
//!
//! Exit codes: 0 everything succeeded, 1 some update or per-table fetch
//! failed, 2 the run was aborted.

use anyhow::{Context, Result};
use catalog_sync::clients::{
    BiCatalog, SnowflakeClient, SnowflakeSession, TableauClient, TableauSession,
};
use catalog_sync::config::{SyncConfig, TableauSettings};
use catalog_sync::matcher::IdentifierCase;
use catalog_sync::reconcile::{OutcomeStatus, ReconciliationDriver, SyncSummary};
use catalog_sync::SyncFlow;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_ABORTED: u8 = 2;

#[derive(Parser)]
#[command(name = "catalog_sync")]
#[command(version)]
#[command(about = "Sync warehouse comments and tags into BI catalog descriptions and labels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML config file; environment variables override it
    #[arg(long, short = 'c', global = true, env = "SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation flow
    Sync {
        /// descriptions or labels
        #[arg(long)]
        flow: Option<SyncFlow>,

        /// Only BI tables in this schema take part
        #[arg(long)]
        schema_filter: Option<String>,

        /// Warehouse schema to read (overrides SNOWFLAKE_SCHEMA)
        #[arg(long)]
        schema: Option<String>,

        /// Only this warehouse tag feeds the label flow
        #[arg(long)]
        tag_name: Option<String>,

        /// Skip table-level descriptions
        #[arg(long)]
        no_table_descriptions: bool,

        /// Skip column-level descriptions
        #[arg(long)]
        no_column_descriptions: bool,

        /// Tables whose columns are fetched at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Identifier comparison: insensitive or exact
        #[arg(long)]
        identifier_case: Option<IdentifierCase>,

        /// Match and plan, but send no updates
        #[arg(long, short = 'n')]
        dry_run: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List sensitivity label values defined on the BI site
    LabelValues {
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "ERROR:".red().bold(), e);
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = SyncConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            flow,
            schema_filter,
            schema,
            tag_name,
            no_table_descriptions,
            no_column_descriptions,
            concurrency,
            identifier_case,
            dry_run,
            json,
        } => {
            let run = &mut config.run;
            if let Some(flow) = flow {
                run.flow = flow;
            }
            if schema_filter.is_some() {
                run.schema_filter = schema_filter;
            }
            if tag_name.is_some() {
                run.tag_name = tag_name;
            }
            if let Some(n) = concurrency {
                run.column_fetch_concurrency = n;
            }
            if let Some(case) = identifier_case {
                run.identifier_case = case;
            }
            run.sync_table_descriptions &= !no_table_descriptions;
            run.sync_column_descriptions &= !no_column_descriptions;
            run.dry_run |= dry_run;
            if let Some(schema) = schema {
                config.warehouse.schema = schema;
            }

            cmd_sync(&config, json).await
        }
        Commands::LabelValues { json } => cmd_label_values(&config, json).await,
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn cmd_sync(config: &SyncConfig, json: bool) -> Result<u8> {
    config.validate()?;

    let (bi, owned) = open_tableau(&config.tableau).await?;
    let bi = Arc::new(bi);

    let token = config
        .warehouse
        .token
        .clone()
        .context("warehouse.token is required")?;
    let warehouse = SnowflakeClient::new(
        &config.warehouse,
        SnowflakeSession {
            token,
            token_type: config.warehouse.token_type,
        },
    )?;

    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(warehouse),
        config.reconcile_config(),
    );
    let result = driver.run().await;

    if owned {
        close_tableau(&bi).await;
    }

    let summary = result.context("catalog sync aborted")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(summary.exit_code())
}

async fn cmd_label_values(config: &SyncConfig, json: bool) -> Result<u8> {
    if config.tableau.pod.trim().is_empty() {
        anyhow::bail!("tableau.pod is required");
    }

    let (bi, owned) = open_tableau(&config.tableau).await?;
    let result = bi.list_label_values().await;
    if owned {
        close_tableau(&bi).await;
    }
    let values = result.context("Failed to list label values")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(0);
    }

    println!("{}", "Label values".cyan().bold());
    if values.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for value in &values {
        println!(
            "  {} {} {}",
            value.name.yellow(),
            format!("[{}]", value.category).dimmed(),
            value.description.as_deref().unwrap_or_default()
        );
    }
    Ok(0)
}

/// Reuse a supplied session, or sign in with the personal access token.
/// The flag says whether this process owns the session.
async fn open_tableau(settings: &TableauSettings) -> Result<(TableauClient, bool)> {
    if let (Some(token), Some(site_id)) = (&settings.session_token, &settings.site_id) {
        info!("using supplied Tableau session");
        let session = TableauSession {
            token: token.clone(),
            site_id: site_id.clone(),
            user_id: String::new(),
        };
        return Ok((TableauClient::new(settings, session)?, false));
    }

    let client = TableauClient::sign_in(settings)
        .await
        .context("Tableau sign-in failed")?;
    Ok((client, true))
}

async fn close_tableau(client: &TableauClient) {
    if let Err(e) = client.sign_out().await {
        warn!(error = %e, "Tableau sign-out failed");
    }
}

// =============================================================================
// REPORT
// =============================================================================

fn print_summary(summary: &SyncSummary) {
    println!("\n{}", "═".repeat(60));
    println!(
        "{}",
        format!("CATALOG SYNC SUMMARY ({})", summary.flow)
            .cyan()
            .bold()
    );
    println!("{}", "═".repeat(60));
    if summary.dry_run {
        println!("{}", "DRY-RUN: no updates were sent".yellow());
    }
    println!(
        "Tables:       {} matched, {} unmatched",
        summary.tables_matched, summary.tables_unmatched
    );
    println!(
        "Columns:      {} matched, {} unmatched",
        summary.columns_matched, summary.columns_unmatched
    );
    println!(
        "Succeeded:    {}",
        summary.updates_succeeded.to_string().green()
    );
    println!("Failed:       {}", summary.updates_failed.to_string().red());
    println!(
        "Skipped:      {}",
        summary.updates_skipped.to_string().yellow()
    );
    if let Some(secs) = summary.duration_secs() {
        println!("Duration:     {:.2}s", secs);
    }

    if !summary.warnings.is_empty() {
        println!("\n{}", "Warnings:".yellow().bold());
        for warning in &summary.warnings {
            println!("  {}", warning);
        }
    }

    if !summary.failures.is_empty() {
        println!("\n{}", "Failures:".red().bold());
        for failure in &summary.failures {
            let what = failure
                .kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "column fetch".to_string());
            println!("  {} {}: {}", what.red(), failure.key, failure.cause);
        }
    }

    if summary.dry_run {
        println!("\n{}", "Planned updates:".cyan().bold());
        for outcome in &summary.outcomes {
            if outcome.status == OutcomeStatus::Skipped {
                println!("  {} {}", outcome.kind.to_string().dimmed(), outcome.key);
            }
        }
    }
}
