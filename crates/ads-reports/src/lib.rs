//! # adkit-ads-reports
//!
//! Asynchronous Sponsored Products reports with a crash-safe local queue.
//!
//! Reports are created remotely, tracked in `report_queue.json`, polled
//! until the API finishes them, and downloaded into `reports/`.
//!
//! ```text
//! SUBMITTED -> PROCESSING -> COMPLETED -> DOWNLOADED
//!     |             |
//!     +-------------+------> FAILED
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use adkit_ads_reports::{DateRange, JobFilter, QueueConfig, ReportQueueManager, ReportRequest, ReportType};
//! use adkit_ads_client::Region;
//!
//! let queue = ReportQueueManager::new(client, QueueConfig::new("./data"));
//!
//! let range = DateRange::parse("2026-01-01", "2026-01-31")?;
//! queue.submit(ReportRequest::new(ReportType::SpCampaigns, Region::Us, range)).await?;
//!
//! // Later: refresh pending jobs and download whatever finished.
//! let jobs = queue.poll(JobFilter::all(), true).await?;
//! ```

mod error;
mod queue;
mod store;
mod types;

pub use error::{Error, ErrorKind, Result};
pub use queue::{QueueConfig, ReportQueueManager, DEFAULT_POLL_CONCURRENCY, REPORTS_PATH};
pub use store::{QueueStore, QUEUE_FILE_NAME, REPORTS_DIR_NAME};
pub use types::{
    summary_columns, CleanFilter, CreateReportBody, DateRange, JobFilter, JobStatus,
    QueueDocument, RemoteStatus, ReportConfiguration, ReportFilter, ReportJob, ReportParams,
    ReportRequest, ReportStatusResponse, ReportType, SubmitOutcome, TimeUnit,
    QUEUE_DOCUMENT_VERSION,
};
