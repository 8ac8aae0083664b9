#![forbid(unsafe_code)]

use pm_storage::{DEFAULT_BUSY_TIMEOUT, StoreConfig};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const DEFAULT_STORAGE_DIR: &str = ".polymain";

const ENV_STORAGE_DIR: &str = "PM_STORAGE_DIR";
const ENV_BUSY_TIMEOUT_MS: &str = "PM_BUSY_TIMEOUT_MS";
const ENV_OP_TIMEOUT_MS: &str = "PM_OP_TIMEOUT_MS";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("missing value for {flag}")]
    MissingValue { flag: &'static str },
    #[error("invalid value for {name}: {value:?} (expected {expected})")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Run(ServerConfig),
    Help,
    Version,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ServerConfig {
    pub(crate) storage_dir: PathBuf,
    pub(crate) busy_timeout: Duration,
    /// Per-request deadline; `None` lets requests run to completion.
    pub(crate) op_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            op_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Flags win over environment variables; both win over defaults. `args`
    /// excludes the program name.
    pub(crate) fn parse<I, F>(args: I, env: F) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut storage_dir: Option<String> = None;
        let mut busy_timeout_ms: Option<(&'static str, String)> = None;
        let mut op_timeout_ms: Option<(&'static str, String)> = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(Command::Help),
                "-V" | "--version" => return Ok(Command::Version),
                "--storage-dir" => storage_dir = Some(flag_value(&mut args, "--storage-dir")?),
                "--busy-timeout-ms" => {
                    busy_timeout_ms = Some((
                        "--busy-timeout-ms",
                        flag_value(&mut args, "--busy-timeout-ms")?,
                    ));
                }
                "--op-timeout-ms" => {
                    op_timeout_ms = Some((
                        "--op-timeout-ms",
                        flag_value(&mut args, "--op-timeout-ms")?,
                    ));
                }
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        let storage_dir = storage_dir
            .or_else(|| env_value(&env, ENV_STORAGE_DIR))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

        let busy_timeout = match busy_timeout_ms
            .or_else(|| env_value(&env, ENV_BUSY_TIMEOUT_MS).map(|v| (ENV_BUSY_TIMEOUT_MS, v)))
        {
            Some((name, raw)) => Duration::from_millis(parse_millis(name, &raw, false)?),
            None => DEFAULT_BUSY_TIMEOUT,
        };

        let op_timeout = op_timeout_ms
            .or_else(|| env_value(&env, ENV_OP_TIMEOUT_MS).map(|v| (ENV_OP_TIMEOUT_MS, v)))
            .map(|(name, raw)| parse_millis(name, &raw, true).map(Duration::from_millis))
            .transpose()?;

        Ok(Command::Run(Self {
            storage_dir,
            busy_timeout,
            op_timeout,
        }))
    }

    pub(crate) fn store_config(&self) -> StoreConfig {
        StoreConfig {
            busy_timeout: self.busy_timeout,
            ..StoreConfig::new(&self.storage_dir)
        }
    }
}

fn flag_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue { flag })
}

// Blank variables count as unset.
fn env_value<F: Fn(&str) -> Option<String>>(env: &F, key: &str) -> Option<String> {
    env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_millis(name: &'static str, raw: &str, positive: bool) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
        expected: if positive {
            "a positive number of milliseconds"
        } else {
            "a number of milliseconds"
        },
    };
    let value = raw.trim().parse::<u64>().map_err(|_| invalid())?;
    if positive && value == 0 {
        return Err(invalid());
    }
    Ok(value)
}
