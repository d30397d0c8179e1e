//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// `start` called on a source that is running or stopped
    #[error("data source {source_id} was already started")]
    AlreadyStarted {
        /// Source ID
        source_id: String,
    },

    /// Source parameter missing or malformed
    #[error("data source {source_id}: invalid parameter '{key}': {message}")]
    InvalidParam {
        /// Source ID
        source_id: String,
        /// Parameter key
        key: String,
        /// Error message
        message: String,
    },

    /// Worker thread could not be spawned
    #[error("failed to spawn worker for data source {source_id}: {source}")]
    Spawn {
        /// Source ID
        source_id: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport or format failure
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl IngestionError {
    pub(crate) fn invalid_param(
        source_id: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            source_id: source_id.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
