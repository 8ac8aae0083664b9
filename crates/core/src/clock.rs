#![forbid(unsafe_code)]

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClockError {
    InvalidTimestamp(String),
    OutOfRange,
}

impl ClockError {
    pub fn message(&self) -> String {
        match self {
            Self::InvalidTimestamp(value) => format!("bad timestamp (expected RFC3339): {value}"),
            Self::OutOfRange => "timestamp is out of range".to_string(),
        }
    }
}

impl std::fmt::Display for ClockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ClockError {}

pub fn now_ms() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let ms = nanos / 1_000_000i128;
    if ms <= 0 {
        0
    } else if ms >= i64::MAX as i128 {
        i64::MAX
    } else {
        ms as i64
    }
}

/// Parses an RFC3339 timestamp into unix milliseconds. Offsets are honoured,
/// sub-millisecond precision is truncated.
pub fn parse_rfc3339_ms(value: &str) -> Result<i64, ClockError> {
    let parsed = OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|_| ClockError::InvalidTimestamp(value.to_string()))?;
    let ms = parsed.unix_timestamp_nanos() / 1_000_000i128;
    i64::try_from(ms).map_err(|_| ClockError::OutOfRange)
}

pub fn format_rfc3339_ms(ts_ms: i64) -> String {
    let nanos = (ts_ms as i128) * 1_000_000i128;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
