#![forbid(unsafe_code)]

mod cancel;
mod children;
mod coordinator;
mod error;
mod mains;
mod requests;
mod resolver;
mod schema;

pub use cancel::CancelToken;
pub use error::StoreError;
pub use requests::*;
pub use resolver::MainResolver;

use pm_core::now_ms;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DB_FILE_NAME: &str = "polymain.db";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub storage_dir: PathBuf,
    pub db_file_name: String,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.db_file_name)
    }
}

/// Owns the single SQLite connection behind every store operation. Nothing is
/// cached between calls; each operation reads fresh rows.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(StoreConfig::new(storage_dir.as_ref()))
    }

    pub fn open_with(config: StoreConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.storage_dir)?;

        let db_path = config.db_path();
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(config.busy_timeout)?;

        schema::preflight_gate(&conn)?;
        schema::install_schema(&conn, now_ms())?;

        tracing::debug!(
            path = %db_path.display(),
            schema_version = schema::SCHEMA_VERSION,
            "store opened"
        );

        Ok(Self {
            conn,
            storage_dir: config.storage_dir,
            busy_timeout: config.busy_timeout,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Runs a read-only unit of work with cancellation armed on the connection.
    pub(crate) fn guarded_read<T>(
        &self,
        cancel: &CancelToken,
        work: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        cancel.check()?;
        self.arm(cancel)?;
        let result = work(&self.conn);
        self.disarm();
        settle(cancel, result)
    }

    /// Runs a unit of work that may open a transaction. A transaction left open
    /// by a failed step is rolled back after cancellation is disarmed, so the
    /// rollback itself cannot be interrupted.
    pub(crate) fn guarded<T>(
        &mut self,
        cancel: &CancelToken,
        work: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        cancel.check()?;
        self.arm(cancel)?;
        let result = work(&mut self.conn);
        self.disarm();
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        settle(cancel, result)
    }

    // Long statements are interrupted through the progress handler; lock waits
    // are cut by shrinking the busy timeout to the token's remaining time.
    fn arm(&self, cancel: &CancelToken) -> Result<(), StoreError> {
        let token = cancel.clone();
        self.conn
            .progress_handler(PROGRESS_INTERVAL_OPS, Some(move || token.is_cancelled()));
        let wait = cancel.remaining().map_or(self.busy_timeout, |left| {
            (left + LOCK_WAIT_SLACK).min(self.busy_timeout)
        });
        self.conn.busy_timeout(wait)?;
        Ok(())
    }

    fn disarm(&self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
        if let Err(err) = self.conn.busy_timeout(self.busy_timeout) {
            tracing::warn!(error = %err, "failed to restore busy timeout");
        }
    }
}

const PROGRESS_INTERVAL_OPS: std::os::raw::c_int = 1_000;

// SQLite counts the busy timeout in whole milliseconds; the slack keeps a lock
// wait from giving up just before the deadline it was sized for.
const LOCK_WAIT_SLACK: Duration = Duration::from_millis(25);

// Engine errors raised after the token fired (interrupt, busy after a shortened
// wait) are reported as cancellation.
fn settle<T>(cancel: &CancelToken, result: Result<T, StoreError>) -> Result<T, StoreError> {
    match result {
        Err(StoreError::Sql(err)) if cancel.is_cancelled() => {
            tracing::debug!(error = %err, "statement cut short by cancellation");
            Err(StoreError::Cancelled)
        }
        other => other,
    }
}
