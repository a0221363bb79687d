use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while resolving a single mention.
///
/// None of these escape the per-mention boundary in [`crate::resolve`]:
/// provider failures trigger a fallback, budget and cancellation map to an
/// explicit unresolved reason, and anything else becomes `processing_error`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("external call budget exhausted")]
    RateLimitExceeded,

    #[error("run cancelled")]
    Cancelled,

    #[error("invalid mention: {0}")]
    InvalidMention(String),
}

impl ResolveError {
    pub fn provider(provider: &'static str, err: &anyhow::Error) -> Self {
        Self::ProviderUnavailable {
            provider,
            reason: format!("{err:#}"),
        }
    }
}

/// Gazetteer load failures. `Open` and `Read` are fatal to the run;
/// `MalformedRow` only ever drops the offending row.
#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("failed to open gazetteer table {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read header of gazetteer table {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
}
