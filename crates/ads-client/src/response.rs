//! Response wrapper and Advertising API error parsing.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{Error, ErrorKind, Result};
use crate::request::WouldSend;

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Synthesized because the call was a dry-run mutation.
    DryRun,
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
    source: ResponseSource,
    would_send: Option<WouldSend>,
}

impl Response {
    pub(crate) fn from_network(status: u16, headers: HashMap<String, String>, body: Bytes) -> Self {
        // Header names are stored lowercase for case-insensitive lookups.
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status,
            headers,
            body,
            source: ResponseSource::Network,
            would_send: None,
        }
    }

    pub(crate) fn from_cache(body: Bytes) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body,
            source: ResponseSource::Cache,
            would_send: None,
        }
    }

    pub(crate) fn dry_run(would_send: WouldSend) -> Self {
        let body = serde_json::to_vec(&serde_json::json!({
            "dryRun": true,
            "wouldSend": &would_send,
        }))
        .map(Bytes::from)
        .unwrap_or_default();

        Self {
            status: 200,
            headers: HashMap::new(),
            body,
            source: ResponseSource::DryRun,
            would_send: Some(would_send),
        }
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn source(&self) -> ResponseSource {
        self.source
    }

    /// The request that dry-run suppressed, if any.
    pub fn would_send(&self) -> Option<&WouldSend> {
        self.would_send.as_ref()
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Get the Retry-After header as a Duration.
    ///
    /// Only the delta-seconds form is understood; the API does not send HTTP dates.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.header("retry-after")?)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| {
            Error::with_source(
                ErrorKind::Other("Failed to decode response as UTF-8".to_string()),
                e,
            )
        })
    }

    /// Deserialize the response body as JSON. An empty body reads as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return serde_json::from_value(serde_json::Value::Null).map_err(Into::into);
        }
        serde_json::from_slice(&self.body).map_err(Into::into)
    }
}

pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Advertising API error body. v2 endpoints use `code`/`details`, v3 endpoints
/// use `code`/`message`, and some wrap a list under `errors`.
#[derive(Debug, Default, serde::Deserialize)]
struct AdsErrorResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<AdsErrorResponse>,
}

impl AdsErrorResponse {
    fn summary(&self) -> Option<String> {
        let text = self
            .details
            .as_deref()
            .or(self.message.as_deref())
            .map(str::to_string)
            .or_else(|| self.errors.first().and_then(|e| e.summary()))?;

        Some(match &self.code {
            Some(code) if !text.starts_with(code.as_str()) => format!("{}: {}", code, text),
            _ => text,
        })
    }
}

/// Build the error for a non-success response.
///
/// `attempts` is the number of network attempts made for the logical request.
pub(crate) fn parse_error_response(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
    attempts: u32,
) -> Error {
    let message = serde_json::from_str::<AdsErrorResponse>(body)
        .ok()
        .and_then(|e| e.summary())
        .unwrap_or_else(|| body.to_string());
    let message = sanitize_error_message(&message);

    let kind = match status {
        401 => ErrorKind::Authentication(message),
        429 => ErrorKind::RateLimited {
            retry_after,
            attempts,
        },
        404 => ErrorKind::NotFound(message),
        500..=599 => ErrorKind::Server {
            status: Some(status),
            message,
            attempts,
        },
        _ => ErrorKind::Validation { status, message },
    };

    Error::new(kind)
}

static REDACTIONS: LazyLock<Vec<(regex_lite::Regex, &'static str)>> = LazyLock::new(|| {
    [
        // LWA access and refresh tokens
        (r"Atz[ar]\|[A-Za-z0-9_\-+/=.|]+", "[REDACTED_TOKEN]"),
        (r"(?i)bearer\s+[A-Za-z0-9_\-+/=.|]+", "Bearer [REDACTED]"),
        // LWA client secrets
        (r"amzn1\.oa2-cs\.v1\.[A-Za-z0-9]+", "[REDACTED_SECRET]"),
        (r"(refresh_token|client_secret|access_token)=[^&\s]+", "$1=[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| {
        regex_lite::Regex::new(pattern)
            .ok()
            .map(|re| (re, replacement))
    })
    .collect()
});

/// Sanitize an error message before it reaches logs or users.
///
/// Token-like strings are redacted and messages longer than 500 bytes are
/// truncated on a character boundary.
pub fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let mut sanitized = message.to_string();
    for (pattern, replacement) in REDACTIONS.iter() {
        sanitized = pattern.replace_all(&sanitized, *replacement).to_string();
    }

    if sanitized.len() > MAX_LENGTH {
        let mut cut = MAX_LENGTH;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}
