//! Adjudicator error types.

use thiserror::Error;

pub type AdjudicatorResult<T> = Result<T, AdjudicatorError>;

#[derive(Debug, Error)]
pub enum AdjudicatorError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("LLM API error: HTTP {status}")]
    Api { status: u16, body: String },

    #[error("LLM returned non-JSON content")]
    NonJson(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AdjudicatorError {
    /// Errors worth surfacing to operators verbatim, as opposed to bugs.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdjudicatorError::Timeout | AdjudicatorError::Network(_) | AdjudicatorError::Api { .. }
        )
    }
}
