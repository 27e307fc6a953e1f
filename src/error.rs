//! The error taxonomy surfaced by the trend engine.

use crate::types::ValidationError;

/// Failures a caller of [`crate::TrendEngine`] can observe.
///
/// Cache failures never appear here: they are logged and degrade to a miss.
/// Blocked upstream exhaustion is merged into `ProviderUnavailable` for the
/// caller and distinguished by the `blocked` flag in logs.
#[derive(Debug, thiserror::Error)]
pub enum TrendError {
    #[error("invalid query: {0}")]
    Validation(#[from] ValidationError),

    #[error("no trend data found for keyword {keyword:?}")]
    DataNotFound { keyword: String },

    #[error("trends provider unavailable after {attempts} attempts: {last_error}")]
    ProviderUnavailable {
        attempts: u32,
        blocked: bool,
        last_error: String,
    },

    #[error("query store failure: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TrendError {
    /// HTTP status the framing layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            TrendError::Validation(_) => 400,
            TrendError::DataNotFound { .. } => 404,
            TrendError::ProviderUnavailable { .. } => 503,
            TrendError::Storage(_) | TrendError::Internal(_) => 500,
        }
    }

    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, TrendError::ProviderUnavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TrendError::DataNotFound { .. })
    }
}
