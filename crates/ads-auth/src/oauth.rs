//! Login with Amazon refresh-token exchange.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use adkit_ads_client::sanitize_error_message;

use crate::error::{Error, ErrorKind, Result};

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

/// OAuth client for the LWA token endpoint.
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl OAuthClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http_client,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchange a refresh token for an access token.
    ///
    /// The refresh_token parameter is not logged to prevent credential exposure.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(&self, token_url: &str, refresh_token: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let body = serde_urlencoded::to_string(params)?;

        let response = self
            .http_client
            .post(token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(oauth_error(status, &text));
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        if token.access_token.is_empty() {
            return Err(Error::new(ErrorKind::Json(
                "token response has an empty access_token".to_string(),
            )));
        }
        Ok(token)
    }
}

fn oauth_error(status: u16, body: &str) -> Error {
    let (error, description) = match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(e) => (e.error, e.error_description.unwrap_or_default()),
        Err(_) => ("http_error".to_string(), body.to_string()),
    };

    Error::new(ErrorKind::OAuth {
        status,
        error,
        description: sanitize_error_message(&description),
    })
}

/// Token response from LWA.
///
/// Tokens are redacted in Debug output.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
