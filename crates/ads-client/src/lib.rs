//! # adkit-ads-client
//!
//! Resilient HTTP access to the Amazon Advertising API.
//!
//! This crate provides:
//! - Retry with exponential backoff and jitter for 429, 5xx and network failures
//! - One forced credential refresh on 401 through the [`TokenSource`] seam
//! - A region-partitioned response cache with mutation-driven invalidation
//! - Per-request and client-wide dry-run for mutations
//! - Batch splitting for bulk write endpoints
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │        (adkit-ads-reports, domain services, CLI)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AdsClient                            │
//! │  - TokenSource + RegionTable + ResponseCache                │
//! │  - Typed JSON methods (get_json, post_json, ...)            │
//! │  - 401 refresh-and-replay, cache, dry-run                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      AdsHttpClient                          │
//! │  - Raw HTTP with retry and error classification             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adkit_ads_client::{AdsClient, ClientConfig, Region, RegionProfile, RegionTable};
//!
//! let regions = RegionTable::new()
//!     .with_profile(Region::Us, RegionProfile::new(Region::Us, "1234567890"));
//! let client = AdsClient::new(ClientConfig::default(), Arc::new(token_manager), regions)?;
//!
//! let campaigns: serde_json::Value = client
//!     .post_json("/sp/campaigns/list", Region::Us, &serde_json::json!({}))
//!     .await?;
//! ```

mod ads_client;
pub mod cache;
pub mod chunk;
mod client;
pub mod clock;
mod config;
mod credential;
mod error;
pub mod region;
mod request;
mod response;
mod retry;

pub use ads_client::AdsClient;
pub use cache::ResponseCache;
pub use chunk::{chunk, DEFAULT_CHUNK_SIZE};
pub use client::{AdsHttpClient, HttpRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use credential::{Credential, StaticTokenSource, TokenSource};
pub use error::{Error, ErrorCategory, ErrorKind, Result};
pub use region::{AuthRegion, Region, RegionProfile, RegionTable};
pub use request::{
    is_read, RequestMethod, RequestOptions, WouldSend, CREATE_REPORT_CONTENT_TYPE,
    GET_REPORT_ACCEPT,
};
pub use response::{sanitize_error_message, Response, ResponseSource};
pub use retry::{BackoffStrategy, RecordingSleeper, RetryConfig, RetryPolicy, Sleeper, TokioSleeper};

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("adkit-ads-api/", env!("CARGO_PKG_VERSION"));
