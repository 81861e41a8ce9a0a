//! # adkit-ads-auth
//!
//! Login with Amazon credentials for the Advertising API.
//!
//! ## Security
//!
//! - Client secrets, refresh tokens and access tokens are redacted in Debug output
//! - Tracing spans skip credential parameters
//! - Token endpoint error bodies are sanitized before they reach error messages
//!
//! ## Example
//!
//! ```rust,ignore
//! use adkit_ads_auth::{AuthConfig, RealmCredentials, TokenManager};
//! use adkit_ads_client::AuthRegion;
//!
//! let config = AuthConfig::new(client_id, client_secret)
//!     .with_realm(AuthRegion::Na, RealmCredentials::new(AuthRegion::Na, refresh_token));
//! let manager = TokenManager::new(config)?;
//!
//! // Cached until five minutes before expiry.
//! let credential = manager.token(AuthRegion::Na).await?;
//! ```

mod error;
mod manager;
mod oauth;

pub use error::{Error, ErrorKind, Result};
pub use manager::{AuthConfig, RealmCredentials, TokenManager, TokenStatus, DEFAULT_EXPIRY_BUFFER_SECS};
pub use oauth::{OAuthClient, TokenResponse, DEFAULT_EXPIRES_IN};
