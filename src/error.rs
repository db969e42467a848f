// src/error.rs
// =============================================================================
// Error kinds for the crawl core.
//
// The binary itself uses anyhow (see main.rs), but the crawler needs to tell
// failures apart: a credential failure blocks the next round, a transport
// failure is retried on the next round, a bad page only aborts that fetch.
// thiserror gives us a typed enum with Display impls for free.
// =============================================================================

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrawlError>;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The token-acquisition flow failed at some step
    #[error("credential fetch failed: {0}")]
    CredentialFetch(String),

    /// Network failure or a non-success HTTP status
    #[error("transport error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The page came back but its JSON did not have the expected structure
    #[error("unexpected payload shape: {0}")]
    PayloadShape(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A cooperative stop was observed between round trips
    #[error("crawl cancelled")]
    Cancelled,
}

impl CrawlError {
    // Whether the next scheduled round may succeed where this one failed.
    // Storage, config and cancellation are not worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrawlError::CredentialFetch(_) | CrawlError::Transport { .. } | CrawlError::PayloadShape(_)
        )
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CrawlError {
    fn from(err: std::io::Error) -> Self {
        CrawlError::Storage(err.to_string())
    }
}
