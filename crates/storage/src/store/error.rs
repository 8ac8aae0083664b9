#![forbid(unsafe_code)]

use pm_core::RowId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("resource not found: {entity} {id}")]
    NotFound { entity: &'static str, id: RowId },
    #[error("corrupt row: {0}")]
    Corrupt(&'static str),
    #[error("{0}")]
    ResetRequired(&'static str),
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn main_not_found(id: RowId) -> Self {
        Self::NotFound { entity: "main", id }
    }

    /// Stable machine-readable code for the error taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Cancelled => "CANCELLED",
            Self::ResetRequired(_) => "RESET_REQUIRED",
            Self::Io(_) | Self::Sql(_) | Self::Corrupt(_) => "STORAGE_FAILURE",
        }
    }

    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Sql(_) | Self::Corrupt(_) | Self::ResetRequired(_)
        )
    }

    /// Message safe to show to callers: engine-specific text never leaves the store.
    pub fn public_message(&self) -> String {
        if self.is_storage_failure() {
            "internal storage error".to_string()
        } else {
            self.to_string()
        }
    }
}
