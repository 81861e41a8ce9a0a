//! Per-realm access token cache with expiry buffer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use adkit_ads_client::{AuthRegion, Clock, Credential, SystemClock, TokenSource};

use crate::error::{Error, ErrorKind, Result};
use crate::oauth::OAuthClient;

/// Refresh credentials this many seconds before they expire.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 300;

// Longer lifetimes from the token endpoint are clamped to a year.
const MAX_LIFETIME_SECS: u64 = 365 * 24 * 3600;

/// Refresh token and endpoint for one auth realm.
#[derive(Clone)]
pub struct RealmCredentials {
    pub token_url: String,
    refresh_token: String,
}

impl std::fmt::Debug for RealmCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmCredentials")
            .field("token_url", &self.token_url)
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl RealmCredentials {
    /// Credentials against the realm's default LWA endpoint.
    pub fn new(region: AuthRegion, refresh_token: impl Into<String>) -> Self {
        Self {
            token_url: region.default_token_url().to_string(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

/// Immutable configuration for [`TokenManager`].
#[derive(Clone)]
pub struct AuthConfig {
    pub client_id: String,
    client_secret: String,
    pub realms: HashMap<AuthRegion, RealmCredentials>,
    pub expiry_buffer: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("realms", &self.realms)
            .field("expiry_buffer", &self.expiry_buffer)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            realms: HashMap::new(),
            expiry_buffer: Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECS),
        }
    }

    pub fn with_realm(mut self, region: AuthRegion, credentials: RealmCredentials) -> Self {
        self.realms.insert(region, credentials);
        self
    }

    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }
}

/// Snapshot of the cached credential for one realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub auth_region: AuthRegion,
    pub has_token: bool,
    pub is_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<i64>,
}

/// Holds one live credential per auth realm and refreshes it on demand.
///
/// Marketplaces in the same realm share the credential. The lock is held
/// across the exchange, so concurrent callers wait for a single refresh.
pub struct TokenManager {
    config: AuthConfig,
    oauth: OAuthClient,
    clock: Arc<dyn Clock>,
    credentials: Mutex<HashMap<AuthRegion, Credential>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AuthConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let oauth = OAuthClient::new(config.client_id.clone(), config.client_secret.clone())?;
        Ok(Self {
            config,
            oauth,
            clock,
            credentials: Mutex::new(HashMap::new()),
        })
    }

    /// Return a credential valid for at least the expiry buffer, refreshing if needed.
    #[instrument(skip(self))]
    pub async fn token(&self, region: AuthRegion) -> Result<Credential> {
        let mut credentials = self.credentials.lock().await;

        if let Some(credential) = credentials.get(&region) {
            if credential.is_valid_at(self.clock.now(), self.config.expiry_buffer) {
                debug!(%region, "Using cached credential");
                return Ok(credential.clone());
            }
        }

        let credential = self.exchange(region).await?;
        credentials.insert(region, credential.clone());
        Ok(credential)
    }

    /// Exchange the refresh token regardless of the cached credential.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self, region: AuthRegion) -> Result<Credential> {
        let mut credentials = self.credentials.lock().await;
        let credential = self.exchange(region).await?;
        credentials.insert(region, credential.clone());
        Ok(credential)
    }

    /// Describe the cached credential without refreshing it.
    pub async fn status(&self, region: AuthRegion) -> TokenStatus {
        let credentials = self.credentials.lock().await;
        let now = self.clock.now();

        match credentials.get(&region) {
            None => TokenStatus {
                auth_region: region,
                has_token: false,
                is_expired: true,
                expires_at: None,
                seconds_remaining: None,
            },
            Some(credential) => {
                let is_expired = now >= credential.expires_at;
                TokenStatus {
                    auth_region: region,
                    has_token: true,
                    is_expired,
                    expires_at: Some(credential.expires_at),
                    seconds_remaining: (!is_expired)
                        .then(|| (credential.expires_at - now).num_seconds()),
                }
            }
        }
    }

    async fn exchange(&self, region: AuthRegion) -> Result<Credential> {
        let realm = self
            .config
            .realms
            .get(&region)
            .filter(|r| !r.refresh_token.is_empty())
            .ok_or_else(|| Error::new(ErrorKind::MissingCredentials(region.to_string())))?;

        let response = self
            .oauth
            .refresh_token(&realm.token_url, &realm.refresh_token)
            .await?;

        let lifetime = Duration::seconds(response.expires_in.min(MAX_LIFETIME_SECS) as i64);
        let expires_at = self.clock.now() + lifetime;
        info!(%region, expires_in = response.expires_in, "Refreshed access token");

        Ok(Credential::new(region, response.access_token, expires_at))
    }
}

impl TokenSource for TokenManager {
    fn token(&self, region: AuthRegion) -> BoxFuture<'_, adkit_ads_client::Result<Credential>> {
        Box::pin(async move { TokenManager::token(self, region).await.map_err(Into::into) })
    }

    fn force_refresh(&self, region: AuthRegion) -> BoxFuture<'_, adkit_ads_client::Result<Credential>> {
        Box::pin(async move {
            TokenManager::force_refresh(self, region)
                .await
                .map_err(Into::into)
        })
    }
}
