//! # adkit-ads-api
//!
//! Resilient access to the Amazon Advertising API.
//!
//! ## Security
//!
//! - Sensitive data (tokens, secrets) are redacted in Debug output
//! - Tracing skips credential parameters
//! - Error messages sanitize any credential data
//!
//! ## Crates
//!
//! - **adkit-ads-client** - HTTP client with retry, credential refresh, response cache and dry-run
//! - **adkit-ads-auth** - Login with Amazon token management per auth realm
//! - **adkit-ads-reports** - Persistent asynchronous report queue
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use adkit_ads_api::config::{Profiles, Settings};
//! use adkit_ads_api::reports::{DateRange, JobFilter, ReportRequest, ReportType};
//! use adkit_ads_api::client::Region;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let profiles = Profiles::load(&settings.profiles_path)?;
//!     let queue = settings.report_queue(profiles)?;
//!
//!     let range = DateRange::parse("2026-01-01", "2026-01-31")?;
//!     queue
//!         .submit(ReportRequest::new(ReportType::SpCampaigns, Region::Us, range))
//!         .await?;
//!
//!     for job in queue.poll(JobFilter::all(), true).await? {
//!         println!("{} {}", job.job_id, job.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;

// Re-export all crates for convenient access
pub use adkit_ads_auth as auth;
pub use adkit_ads_client as client;
pub use adkit_ads_reports as reports;

// Re-export commonly used types at the top level
pub use adkit_ads_auth::{AuthConfig, TokenManager};
pub use adkit_ads_client::{AdsClient, ClientConfig, ErrorCategory, Region};
pub use adkit_ads_reports::ReportQueueManager;
pub use config::{Profiles, Settings};
