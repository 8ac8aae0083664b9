#![forbid(unsafe_code)]

/// Row identifiers are SQLite rowids: positive, generated by storage.
pub type RowId = i64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowIdError {
    NotPositive { field: &'static str, value: i64 },
}

impl RowIdError {
    pub fn message(&self) -> String {
        match self {
            Self::NotPositive { field, value } => {
                format!("{field} must be a positive integer (got {value})")
            }
        }
    }
}

impl std::fmt::Display for RowIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for RowIdError {}

pub fn row_id(field: &'static str, value: i64) -> Result<RowId, RowIdError> {
    if value <= 0 {
        return Err(RowIdError::NotPositive { field, value });
    }
    Ok(value)
}
