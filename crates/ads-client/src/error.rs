//! Error types for ads-client.

use std::time::Duration;

/// Result type alias for ads-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ads-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if the request that produced this error may be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimited { .. })
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication(_))
    }

    /// Returns the retry-after hint if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.kind {
            ErrorKind::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Failure class used for error tags and process exit codes.
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Credential exchange failed, or the API rejected a freshly refreshed token.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited after {attempts} attempt(s){}", retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimited {
        retry_after: Option<Duration>,
        attempts: u32,
    },

    /// Server-side failure (5xx) or a network failure with no status.
    #[error("Server error{} after {attempts} attempt(s): {message}", status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Server {
        status: Option<u16>,
        message: String,
        attempts: u32,
    },

    /// Timeout, connection refused or reset.
    #[error("Network error: {0}")]
    Network(String),

    /// The API rejected the request (4xx other than 401/404/429).
    #[error("Validation error: HTTP {status} {message}")]
    Validation { status: u16, message: String },

    /// Resource not found (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown region, missing profile, or other configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable by the backoff loop.
    ///
    /// 401 is handled separately by the credential refresh path.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited { .. } | ErrorKind::Server { .. } | ErrorKind::Network(_)
        )
    }

    /// Map this kind onto the shared failure taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::Authentication(_) => ErrorCategory::Auth,
            ErrorKind::RateLimited { .. } => ErrorCategory::RateLimit,
            ErrorKind::Server { .. } | ErrorKind::Network(_) => ErrorCategory::Server,
            ErrorKind::Validation { .. } => ErrorCategory::Validation,
            ErrorKind::NotFound(_) => ErrorCategory::NotFound,
            ErrorKind::Config(_) | ErrorKind::InvalidUrl(_) => ErrorCategory::Config,
            ErrorKind::Json(_) | ErrorKind::Other(_) => ErrorCategory::Other,
        }
    }
}

/// Failure classes shared by every crate in the workspace.
///
/// Automated callers branch on [`ErrorCategory::tag`] or the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Auth,
    RateLimit,
    Server,
    Validation,
    NotFound,
    QueueCorruption,
    Config,
    Other,
}

impl ErrorCategory {
    /// Stable error-kind tag for structured error payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorCategory::Auth => "AUTH_ERROR",
            ErrorCategory::RateLimit => "RATE_LIMITED",
            ErrorCategory::Server => "SERVER_ERROR",
            ErrorCategory::Validation => "VALIDATION_ERROR",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::QueueCorruption => "QUEUE_CORRUPTION",
            ErrorCategory::Config => "CONFIG_ERROR",
            ErrorCategory::Other => "ERROR",
        }
    }

    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::Other => 1,
            ErrorCategory::Config => 2,
            ErrorCategory::Auth => 3,
            ErrorCategory::RateLimit => 4,
            ErrorCategory::Server => 5,
            ErrorCategory::Validation => 6,
            ErrorCategory::NotFound => 7,
            ErrorCategory::QueueCorruption => 8,
        }
    }

    /// Short remediation hint shown next to the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ErrorCategory::Auth => Some("Token may be expired or revoked; check the refresh token for this auth region"),
            ErrorCategory::RateLimit => Some("Rate limited; wait a moment and retry, or reduce batch size"),
            ErrorCategory::Server => Some("The API or network is failing; try again later"),
            ErrorCategory::Config => Some("Check your environment and profiles file region mappings"),
            ErrorCategory::QueueCorruption => Some("The report queue document is unreadable; inspect or restore it"),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Network("request timed out".to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ErrorKind::Network(err.to_string())
        } else if err.is_decode() {
            ErrorKind::Json(err.to_string())
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::InvalidUrl(err.to_string()), err)
    }
}
