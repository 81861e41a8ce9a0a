//! Access credentials and the token source seam.
//!
//! The client does not know how tokens are obtained. It asks a [`TokenSource`]
//! for the credential of the call's auth region and, after a 401, asks it to
//! refresh. `adkit-ads-auth` provides the OAuth implementation.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::error::Result;
use crate::region::AuthRegion;

/// A bearer token for one auth region.
///
/// The access token is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub region: AuthRegion,
    access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("region", &self.region)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    pub fn new(region: AuthRegion, access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            region,
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// True when the credential is still valid `buffer` from `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        !self.access_token.is_empty() && now + buffer < self.expires_at
    }
}

/// Provider of per-auth-region credentials.
pub trait TokenSource: Send + Sync {
    /// Return a usable credential, refreshing only if the cached one expired.
    fn token(&self, region: AuthRegion) -> BoxFuture<'_, Result<Credential>>;

    /// Unconditionally exchange the refresh token for a new credential.
    fn force_refresh(&self, region: AuthRegion) -> BoxFuture<'_, Result<Credential>>;
}

/// A fixed token, for tests and tools that already hold an access token.
#[derive(Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl TokenSource for StaticTokenSource {
    fn token(&self, region: AuthRegion) -> BoxFuture<'_, Result<Credential>> {
        let credential = Credential::new(region, self.token.clone(), DateTime::<Utc>::MAX_UTC);
        Box::pin(async move { Ok(credential) })
    }

    fn force_refresh(&self, region: AuthRegion) -> BoxFuture<'_, Result<Credential>> {
        self.token(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_credential_debug_redacts_token() {
        let cred = Credential::new(AuthRegion::Na, "Atza|secret-value", Utc::now());
        let debug = format!("{:?}", cred);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-value"));
    }

    #[test]
    fn test_credential_validity_respects_buffer() {
        let now = Utc::now();
        let cred = Credential::new(AuthRegion::Eu, "tok", now + Duration::minutes(4));
        assert!(cred.is_valid_at(now, Duration::zero()));
        assert!(!cred.is_valid_at(now, Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_static_source_returns_token_for_requested_region() {
        let source = StaticTokenSource::new("fixed");
        let cred = source.token(AuthRegion::Fe).await.unwrap();
        assert_eq!(cred.region, AuthRegion::Fe);
        assert_eq!(cred.access_token(), "fixed");
    }
}
