#![forbid(unsafe_code)]

mod config;
mod ops;
mod stdio;
mod view;

use config::{Command, ServerConfig};
use ops::Server;
use pm_storage::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SERVER_NAME: &str = "pm_server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage() -> &'static str {
    "pm_server - polymorphic main store (newline-delimited JSON over stdio)\n\n\
USAGE:\n\
  pm_server [--storage-dir DIR] [--busy-timeout-ms N] [--op-timeout-ms N]\n\
\n\
FLAGS:\n\
  -h, --help       Print this help and exit\n\
  -V, --version    Print version and exit\n\
\n\
ENV:\n\
  PM_STORAGE_DIR, PM_BUSY_TIMEOUT_MS, PM_OP_TIMEOUT_MS  (flags win)\n\
  RUST_LOG         Log filter, default info; logs go to stderr\n"
}

fn version_line() -> String {
    format!("{SERVER_NAME} {SERVER_VERSION}")
}

// stdout carries the protocol, so logs must stay on stderr.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let command = ServerConfig::parse(std::env::args().skip(1), |key| std::env::var(key).ok())?;
    let config = match command {
        Command::Help => {
            print!("{}", usage());
            return Ok(());
        }
        Command::Version => {
            println!("{}", version_line());
            return Ok(());
        }
        Command::Run(config) => config,
    };

    init_tracing()?;

    let store = SqliteStore::open_with(config.store_config())?;
    info!(
        storage_dir = %config.storage_dir.display(),
        busy_timeout_ms = config.busy_timeout.as_millis() as u64,
        op_timeout_ms = config.op_timeout.map(|t| t.as_millis() as u64),
        "{} ready",
        version_line()
    );

    let mut server = Server::new(store, config.op_timeout);
    let stdin = std::io::stdin();
    stdio::run_stdio(&mut server, stdin.lock(), std::io::stdout().lock())?;

    info!("stdin closed; shutting down");
    Ok(())
}
