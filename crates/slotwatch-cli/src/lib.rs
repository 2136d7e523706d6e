//! Command surface for the visa slot watch tracker.
//!
//! `sw` exposes the core contract over a SQLite-backed store:
//! - `sw alert add|list|set-status|delete` for the record operations.
//! - `sw insights` for the best-effort AI trend summary.
//!
//! [`run_cli`] executes a fully parsed command graph; [`run_alert`] runs
//! a single alert command against an already-opened service, which is
//! what the tests drive.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use slotwatch_core::{
    format_rfc3339, page_count, page_slice, summarize_alerts, AlertDraft, AlertFilters,
    AlertService, AlertStatus, VisaAlert, VisaType, INSIGHTS_FALLBACK_MESSAGE, NO_DATA_MESSAGE,
};
use slotwatch_insights_gemini::{GeminiSummarizer, DEFAULT_MODEL};
use slotwatch_store_sqlite::SqliteAlertStore;
use tracing::{info, warn};

/// Environment variable consulted when `--api-key` is not given.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Parser)]
#[command(name = "sw")]
#[command(about = "Visa slot watch tracker CLI")]
pub struct Cli {
    #[arg(long, default_value = "./slotwatch.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Alert {
        #[command(subcommand)]
        command: Box<AlertCommand>,
    },
    Insights(InsightsArgs),
}

#[derive(Debug, Subcommand)]
pub enum AlertCommand {
    Add(AddArgs),
    List(ListArgs),
    SetStatus(SetStatusArgs),
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    country: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    visa_type: VisaTypeArg,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    status: Option<StatusArg>,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct SetStatusArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    status: StatusArg,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
pub struct InsightsArgs {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, default_value_t = 30)]
    timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VisaTypeArg {
    Tourist,
    Business,
    Student,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Active,
    Booked,
    Expired,
}

/// Executes the parsed top-level CLI command graph.
///
/// # Errors
/// Returns an error when store open/migrate or command execution fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let store = SqliteAlertStore::open(&cli.db)?;
    store.migrate()?;
    let mut service = AlertService::new(store);

    match cli.command {
        Command::Alert { command } => run_alert(*command, &mut service),
        Command::Insights(args) => run_insights(&args, &service),
    }
}

/// Executes a single alert command against an opened service.
///
/// # Errors
/// Returns validation, not-found, and storage errors from the lifecycle
/// service.
pub fn run_alert(
    command: AlertCommand,
    service: &mut AlertService<SqliteAlertStore>,
) -> Result<()> {
    match command {
        AlertCommand::Add(args) => {
            let draft = AlertDraft {
                country: args.country,
                city: args.city,
                visa_type: Some(map_visa_type(args.visa_type)),
            };
            let alert = service.create(&draft)?;
            info!(id = %alert.id, "created alert");
            println!("{}", serde_json::to_string_pretty(&alert)?);
            Ok(())
        }
        AlertCommand::List(args) => {
            let filters = AlertFilters {
                country: args.country,
                status: args.status.map(map_status),
            };
            let alerts = service.list(&filters)?;
            if args.json {
                let payload = build_list_json_payload(args.page, &alerts);
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_alert_table(args.page, &alerts);
            }
            Ok(())
        }
        AlertCommand::SetStatus(args) => {
            let updated = service.set_status(&args.id, map_status(args.status))?;
            info!(id = %updated.id, status = updated.status.as_str(), "updated alert status");
            println!("{}", serde_json::to_string_pretty(&updated)?);
            Ok(())
        }
        AlertCommand::Delete(args) => {
            service.delete(&args.id)?;
            info!(id = %args.id, "deleted alert");
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "message": "Alert deleted successfully",
                    "id": args.id
                }))?
            );
            Ok(())
        }
    }
}

fn run_insights(args: &InsightsArgs, service: &AlertService<SqliteAlertStore>) -> Result<()> {
    let alerts = service.list(&AlertFilters::default())?;
    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .unwrap_or_default();

    let summary = match GeminiSummarizer::new(api_key, Duration::from_secs(args.timeout_seconds)) {
        Ok(summarizer) => {
            summarize_alerts(&alerts, &summarizer.with_model(args.model.clone()))
        }
        Err(err) => {
            warn!("failed to build summarizer: {err}");
            if alerts.is_empty() {
                NO_DATA_MESSAGE.to_string()
            } else {
                INSIGHTS_FALLBACK_MESSAGE.to_string()
            }
        }
    };

    println!("{summary}");
    Ok(())
}

fn map_visa_type(value: VisaTypeArg) -> VisaType {
    match value {
        VisaTypeArg::Tourist => VisaType::Tourist,
        VisaTypeArg::Business => VisaType::Business,
        VisaTypeArg::Student => VisaType::Student,
    }
}

fn map_status(value: StatusArg) -> AlertStatus {
    match value {
        StatusArg::Active => AlertStatus::Active,
        StatusArg::Booked => AlertStatus::Booked,
        StatusArg::Expired => AlertStatus::Expired,
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AlertsListJsonPayload {
    contract_version: String,
    page: usize,
    page_count: usize,
    total: usize,
    alerts: Vec<VisaAlert>,
}

fn build_list_json_payload(page: usize, alerts: &[VisaAlert]) -> AlertsListJsonPayload {
    // Page 0 serves page 1's slice, so report it as page 1.
    let page = page.max(1);
    AlertsListJsonPayload {
        contract_version: "alerts_list.v1".to_string(),
        page,
        page_count: page_count(alerts.len()),
        total: alerts.len(),
        alerts: page_slice(alerts, page).to_vec(),
    }
}

fn print_alert_table(page: usize, alerts: &[VisaAlert]) {
    let page = page.max(1);
    let total = alerts.len();
    let pages = page_count(total).max(1);

    println!(
        "{:<34} {:<16} {:<16} {:<9} {:<8} created_at",
        "id", "country", "city", "type", "status"
    );
    println!("{}", "-".repeat(110));

    for alert in page_slice(alerts, page) {
        println!(
            "{:<34} {:<16} {:<16} {:<9} {:<8} {}",
            alert.id,
            alert.country,
            alert.city,
            alert.visa_type.as_str(),
            alert.status.as_str(),
            format_rfc3339(alert.created_at).unwrap_or_else(|_| "invalid".to_string())
        );
    }

    println!("page {page}/{pages} ({total} alerts)");
}
