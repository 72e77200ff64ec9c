use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Cache encoding error: {0}")]
    Encode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing cache: {0}")]
    MissingCache(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Rate limited by external service: {0}")]
    RateLimited(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Only this class of failure is retried by [`crate::retry::with_retry`].
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::DimensionMismatch { .. })
    }

    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Error::ExternalService(_) | Error::RateLimited(_) | Error::Reqwest(_)
        )
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::RateLimited("openai".into()).is_rate_limited());
        assert!(Error::RateLimited("openai".into()).is_external());
        assert!(!Error::ExternalService("boom".into()).is_rate_limited());
        assert!(Error::DimensionMismatch { expected: 3, actual: 4 }.is_validation());
        assert!(!Error::MissingCache("keyword".into()).is_validation());
    }
}
