use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,supplier_ledger_store_csv=info,supplier_ledger_cli=info";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = supplier_ledger_cli::Cli::parse();
    match supplier_ledger_cli::run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", supplier_ledger_cli::error_envelope(&err));
            ExitCode::FAILURE
        }
    }
}
