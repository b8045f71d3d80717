//! Command surface of the `sl` binary.
//!
//! Hosts that already hold a [`SupplierLedger`] can skip argument parsing and
//! call [`run_command`] directly; [`run_cli`] builds the ledger from the
//! parsed global options first.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use supplier_ledger_core::{parse_target_percent, EntryInput, LedgerError};
use supplier_ledger_store_csv::{
    AddKind, RowId, StoreConfig, StoredRecord, SupplierDashboard, SupplierLedger,
};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "sl")]
#[command(about = "Supplier delivery performance ledger")]
pub struct Cli {
    /// Directory holding the yearly partition files.
    #[arg(long, env = "SUPPLIER_LEDGER_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Default on-time target, in percent, for entries that carry none.
    #[arg(long, env = "SUPPLIER_LEDGER_TARGET_DELIVERY", default_value = "90")]
    target_delivery: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Suppliers {
        #[command(subcommand)]
        command: SuppliersCommand,
    },
    Entries {
        #[command(subcommand)]
        command: EntriesCommand,
    },
    History(HistoryArgs),
    Dashboard(DashboardArgs),
    Upload(UploadArgs),
}

#[derive(Debug, Subcommand)]
pub enum SuppliersCommand {
    List(ListArgs),
    Exists(ExistsArgs),
    Add(AddSupplierArgs),
}

#[derive(Debug, Subcommand)]
pub enum EntriesCommand {
    Add(AddEntryArgs),
    Edit(EditEntryArgs),
    Delete(DeleteEntryArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct ExistsArgs {
    #[arg(long)]
    name: String,
}

/// Entry fields shared by add and edit. Values stay textual so the ledger
/// reports which field failed to parse.
#[derive(Debug, Args)]
pub struct EntryArgs {
    /// `YYYY-MM` or `YYYY-MM-DD`.
    #[arg(long)]
    month: String,
    #[arg(long = "total-delivery")]
    total_delivery: String,
    #[arg(long)]
    on_time: String,
    #[arg(long)]
    minus: String,
    #[arg(long)]
    purchase_amount: String,
    /// Per-entry target in percent; overrides the configured default.
    #[arg(long)]
    target: Option<String>,
    #[arg(long)]
    item_delay: Option<String>,
}

impl From<EntryArgs> for EntryInput {
    fn from(args: EntryArgs) -> Self {
        Self {
            month: args.month,
            total_delivery_item: args.total_delivery,
            on_time: args.on_time,
            minus: args.minus,
            purchase_amount: args.purchase_amount,
            target_delivery: args.target,
            item_delay: args.item_delay,
        }
    }
}

#[derive(Debug, Args)]
pub struct AddSupplierArgs {
    #[arg(long)]
    name: String,
    #[command(flatten)]
    entry: EntryArgs,
}

#[derive(Debug, Args)]
pub struct AddEntryArgs {
    #[arg(long)]
    supplier: String,
    #[command(flatten)]
    entry: EntryArgs,
}

#[derive(Debug, Args)]
pub struct EditEntryArgs {
    #[arg(long)]
    row_id: String,
    #[command(flatten)]
    entry: EntryArgs,
}

#[derive(Debug, Args)]
pub struct DeleteEntryArgs {
    #[arg(long)]
    row_id: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[arg(long)]
    supplier: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[arg(long)]
    supplier: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// CSV batch with at least the mandatory upload columns.
    #[arg(long)]
    file: PathBuf,
}

/// Builds the ledger from the global options and executes the command.
///
/// # Errors
/// Returns an error when the configuration is invalid or the command fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let target = parse_target_percent(&cli.target_delivery)
        .context("invalid --target-delivery value")?;
    let config = StoreConfig::new(&cli.data_dir).with_target_delivery(target);
    let ledger = SupplierLedger::open(config)
        .with_context(|| format!("failed to open ledger at {}", cli.data_dir.display()))?;
    debug!(data_dir = %cli.data_dir.display(), target_delivery = target, "ledger opened");
    run_command(cli.command, &ledger)
}

/// Executes one command against an existing ledger handle.
///
/// # Errors
/// Returns an error when input validation, storage, or output encoding fails.
pub fn run_command(command: Command, ledger: &SupplierLedger) -> Result<()> {
    match command {
        Command::Suppliers { command } => run_suppliers(command, ledger),
        Command::Entries { command } => run_entries(command, ledger),
        Command::History(args) => {
            let history = ledger.supplier_history(&args.supplier);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print_history_table(&history);
            }
            Ok(())
        }
        Command::Dashboard(args) => {
            let dashboard = ledger.dashboard(&args.supplier)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print_dashboard(&dashboard);
            }
            Ok(())
        }
        Command::Upload(args) => {
            let report = ledger
                .upload_file(&args.file)
                .with_context(|| format!("upload of {} rejected", args.file.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn run_suppliers(command: SuppliersCommand, ledger: &SupplierLedger) -> Result<()> {
    match command {
        SuppliersCommand::List(args) => {
            let suppliers = ledger.list_suppliers();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&suppliers)?);
            } else {
                for supplier in suppliers {
                    println!("{supplier}");
                }
            }
            Ok(())
        }
        SuppliersCommand::Exists(args) => {
            let payload = json!({
                "supplier_name": args.name.trim(),
                "exists": ledger.supplier_exists(&args.name),
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        SuppliersCommand::Add(args) => {
            let stored =
                ledger.add_record(AddKind::NewSupplier, &args.name, &args.entry.into())?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
    }
}

fn run_entries(command: EntriesCommand, ledger: &SupplierLedger) -> Result<()> {
    match command {
        EntriesCommand::Add(args) => {
            let stored =
                ledger.add_record(AddKind::MonthlyEntry, &args.supplier, &args.entry.into())?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
        EntriesCommand::Edit(args) => {
            let row_id = parse_row_id(&args.row_id)?;
            let stored = ledger.edit_record(row_id, &args.entry.into())?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
        EntriesCommand::Delete(args) => {
            let row_id = parse_row_id(&args.row_id)?;
            let removed = ledger.delete_record(row_id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "deleted": removed }))?
            );
            Ok(())
        }
    }
}

fn parse_row_id(raw: &str) -> Result<RowId> {
    raw.parse::<RowId>()
        .context("invalid --row-id value")
}

/// Machine-readable form of a failed command, keyed by the ledger error code
/// when one is present in the chain.
#[must_use]
pub fn error_envelope(err: &anyhow::Error) -> Value {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<LedgerError>())
        .map_or("cli.failure", LedgerError::code);
    json!({
        "code": code,
        "message": format!("{err:#}"),
    })
}

fn print_history_table(history: &[StoredRecord]) {
    println!(
        "{:<20} {:<12} {:>8} {:>8} {:>6} {:>8} {:>6} {:>16} {:>5}",
        "row_id", "month", "total", "on_time", "minus", "achieve", "target", "purchase", "delay"
    );
    println!("{}", "-".repeat(100));

    for row in history {
        let record = &row.record;
        let month = record.closing_month.to_string();
        println!(
            "{:<20} {:<12} {:>8} {:>8} {:>6} {:>7.2}% {:>5.0}% {:>16.2} {:>5}",
            row.row_id,
            month,
            record.total_delivery_item,
            record.on_time,
            record.minus,
            record.achievement * 100.0,
            record.target_delivery * 100.0,
            record.purchase_amount,
            record.item_delay
        );
    }
}

fn print_dashboard(dashboard: &SupplierDashboard) {
    println!("supplier: {}", dashboard.supplier_name);
    println!(
        "total_purchase={} avg_achievement={} total_delivery={}",
        dashboard.kpi_display.total_purchase,
        dashboard.kpi_display.avg_achievement,
        dashboard.kpi_display.total_delivery
    );
    for degraded in &dashboard.degraded {
        println!("degraded: {} ({})", degraded.file_name, degraded.reason);
    }
    println!(
        "{:<20} {:<16} {:>10} {:>8} {:>20}",
        "row_id", "month", "achieve", "target", "purchase"
    );
    println!("{}", "-".repeat(78));

    for row in &dashboard.table {
        println!(
            "{:<20} {:<16} {:>10} {:>8} {:>20}",
            row.row_id,
            row.record.closing_month.label(),
            row.achievement_formatted,
            row.target_formatted,
            row.purchase_formatted
        );
    }
}
