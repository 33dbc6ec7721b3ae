use thiserror::Error;

/// Application-wide error types for the scout pipeline.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP transport failed before a status was available.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// A fetch completed with a non-success status (after the retry budget).
    #[error("fetch failed with status {status}: {message}")]
    FetchError { status: u16, message: String },

    /// The target's robots.txt disallows this path for our user-agent.
    #[error("blocked by robots.txt: {0}")]
    RobotsDisallowed(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// HTML/XML/JSON content could not be interpreted.
    #[error("parse error: {0}")]
    ParseError(String),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A URL could not be parsed or normalized.
    #[error("invalid url: {0}")]
    UrlError(String),

    /// Request timed out.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded after exhausting retries.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    ConfigError(String),

    /// A stats-history request named a metric that is not tracked.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// The operation was cancelled by the ambient shutdown signal.
    #[error("cancelled")]
    Cancelled,

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::FetchError { status, .. } => *status == 429 || *status >= 500,
            AppError::LlmError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// The error kind recorded on source rows and counted in stats.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::classify(self)
    }
}

/// Coarse error taxonomy persisted on sources and used as counter labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    RateLimit,
    Parsing,
    Ai,
    Store,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Parsing => "parsing",
            ErrorKind::Ai => "ai",
            ErrorKind::Store => "store",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Map an error to its stored kind.
    ///
    /// 429 after the retry budget is `rate_limit`; 5xx, transport failures,
    /// and deadline overruns are `network`; decode failures are `parsing`.
    pub fn classify(err: &AppError) -> ErrorKind {
        match err {
            AppError::FetchError { status, .. } if *status == 429 => ErrorKind::RateLimit,
            AppError::RateLimitExceeded => ErrorKind::RateLimit,
            AppError::FetchError { .. }
            | AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::RobotsDisallowed(_) => ErrorKind::Network,
            AppError::ParseError(_) | AppError::SerializationError(_) | AppError::UrlError(_) => {
                ErrorKind::Parsing
            }
            AppError::LlmError { .. } => ErrorKind::Ai,
            AppError::DatabaseError(_) => ErrorKind::Store,
            AppError::HttpError(msg) | AppError::Generic(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("decode")
                    || lower.contains("unmarshal")
                    || lower.contains("invalid character")
                    || lower.contains("parse")
                {
                    ErrorKind::Parsing
                } else if lower.contains("timeout") || lower.contains("connect") {
                    ErrorKind::Network
                } else {
                    ErrorKind::Unknown
                }
            }
            _ => ErrorKind::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_status_maps_to_rate_limit_kind() {
        let err = AppError::FetchError {
            status: 429,
            message: "too many requests".into(),
        };
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert!(err.is_retryable());
    }

    #[test]
    fn server_errors_map_to_network() {
        let err = AppError::FetchError {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn decode_messages_map_to_parsing() {
        assert_eq!(
            AppError::Generic("remoteok decode failed: invalid character".into()).kind(),
            ErrorKind::Parsing
        );
        assert_eq!(
            AppError::ParseError("bad jsonld".into()).kind(),
            ErrorKind::Parsing
        );
    }

    #[test]
    fn llm_and_store_kinds() {
        let llm = AppError::LlmError {
            message: "overloaded".into(),
            status_code: 503,
            retryable: true,
        };
        assert_eq!(llm.kind(), ErrorKind::Ai);
        assert_eq!(
            AppError::DatabaseError("pool closed".into()).kind(),
            ErrorKind::Store
        );
    }

    #[test]
    fn unknown_fallback() {
        assert_eq!(
            AppError::Generic("something odd".into()).kind(),
            ErrorKind::Unknown
        );
    }
}
