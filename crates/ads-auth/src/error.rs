//! Error types for ads-auth.
//!
//! Error messages are designed to avoid exposing sensitive credential data.

use adkit_ads_client::{sanitize_error_message, ErrorCategory};

/// Result type alias for ads-auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ads-auth operations.
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

    /// Every failure to obtain a credential is an auth failure, except a
    /// malformed configuration.
    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            ErrorKind::Config(_) => ErrorCategory::Config,
            _ => ErrorCategory::Auth,
        }
    }
}

/// The kind of error that occurred.
///
/// Error messages avoid including credential values.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Error response from the token endpoint.
    #[error("Token refresh failed (HTTP {status}): {error} - {description}")]
    OAuth {
        status: u16,
        error: String,
        description: String,
    },

    /// No refresh token configured for an auth region.
    #[error("No refresh token configured for auth region '{0}'")]
    MissingCredentials(String),

    /// HTTP error during the exchange.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Malformed token response.
    #[error("JSON error: {0}")]
    Json(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = sanitize_error_message(&err.to_string());
        Error::with_source(ErrorKind::Http(message), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Serialization(err.to_string()), err)
    }
}

impl From<Error> for adkit_ads_client::Error {
    fn from(err: Error) -> Self {
        use adkit_ads_client::ErrorKind as ClientKind;

        let kind = match err.category() {
            ErrorCategory::Config => ClientKind::Config(err.to_string()),
            _ => ClientKind::Authentication(sanitize_error_message(&err.to_string())),
        };
        adkit_ads_client::Error::with_source(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        let err = ErrorKind::OAuth {
            status: 400,
            error: "invalid_grant".to_string(),
            description: "The request has an invalid grant parameter".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Token refresh failed (HTTP 400): invalid_grant - The request has an invalid grant parameter"
        );

        let err = ErrorKind::MissingCredentials("EU".to_string());
        assert!(err.to_string().contains("'EU'"));
    }

    #[test]
    fn test_conversion_into_client_error_is_auth() {
        let err = Error::new(ErrorKind::MissingCredentials("FE".to_string()));
        assert_eq!(err.category(), ErrorCategory::Auth);

        let client_err: adkit_ads_client::Error = err.into();
        assert!(client_err.is_auth_error());
        assert_eq!(client_err.category().tag(), "AUTH_ERROR");
    }

    #[test]
    fn test_config_error_keeps_config_category() {
        let client_err: adkit_ads_client::Error =
            Error::new(ErrorKind::Config("bad token url".to_string())).into();
        assert_eq!(client_err.category().tag(), "CONFIG_ERROR");
    }
}
