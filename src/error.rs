//! Error taxonomy for the gold-label pipeline.
//!
//! Every failure is fail-fast: nothing here is retried, and a stage either
//! completes over its whole input or the run aborts with one of these.

use thiserror::Error;

/// Errors raised anywhere between raw export ingestion and learning-set assembly.
#[derive(Debug, Error)]
pub enum GoldError {
    /// The input data contradicts itself (duplicate judgements, missing fields,
    /// estimator output that does not line up with its input).
    #[error("data inconsistency: {message}")]
    DataInconsistency { message: String },

    /// A precondition of the pipeline was violated. Indicates a logic bug upstream.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// The external consensus estimator failed or produced unusable output.
    #[error("external estimator failure: {message}")]
    ExternalTool { message: String },

    /// A timestamp, number or identifier could not be parsed.
    #[error("malformed {what}: {value:?}")]
    Malformed { what: &'static str, value: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl GoldError {
    pub fn inconsistency(message: impl Into<String>) -> Self {
        Self::DataInconsistency {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalTool {
            message: message.into(),
        }
    }

    pub fn malformed(what: &'static str, value: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            value: value.into(),
        }
    }

    /// Short stable code for logs and CLI exit messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DataInconsistency { .. } => "data_inconsistency",
            Self::InvalidState { .. } => "invalid_state",
            Self::ExternalTool { .. } => "external_tool",
            Self::Malformed { .. } => "malformed",
            Self::Io(_) => "io_error",
            Self::Csv(_) => "csv_error",
            Self::Serde(_) => "serde_error",
        }
    }

    /// True for failures caused by the input data rather than by the pipeline itself.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::DataInconsistency { .. } | Self::Malformed { .. } | Self::Csv(_)
        )
    }
}

impl From<serde_json::Error> for GoldError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
