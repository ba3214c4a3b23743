use thiserror::Error;

/// Failures surfaced by storefront requests.
///
/// Polling loops branch on these: transport problems and bad statuses are
/// retried with backoff, while validation errors are permanent and reported
/// to the caller immediately.
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {code} from {url}")]
    Status { code: u16, url: String },

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),
}

impl StorefrontError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when the storefront told us to slow down (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status { code: 429, .. })
    }

    /// Validation errors are not worth retrying; everything else is
    /// assumed to be transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}
