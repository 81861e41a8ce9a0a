//! Report jobs, their lifecycle, and the wire shapes of the reporting API.

use std::fmt;
use std::str::FromStr;

use adkit_ads_client::Region;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Version written into the queue document.
pub const QUEUE_DOCUMENT_VERSION: u32 = 1;

/// Ad product every report is requested for.
pub const AD_PRODUCT: &str = "SPONSORED_PRODUCTS";

/// Payload format requested from the reporting API.
pub const REPORT_FORMAT: &str = "GZIP_JSON";

const SUMMARY_COLUMNS: &[&str] = &[
    "campaignId",
    "campaignName",
    "impressions",
    "clicks",
    "cost",
    "sales1d",
];

// ============================================================================
// Report Type
// ============================================================================

/// Sponsored Products report types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "spCampaigns")]
    SpCampaigns,
    #[serde(rename = "spKeywords")]
    SpKeywords,
    #[serde(rename = "spSearchTerm")]
    SpSearchTerm,
    #[serde(rename = "spTargeting")]
    SpTargeting,
    #[serde(rename = "spAdvertisedProduct")]
    SpAdvertisedProduct,
}

impl ReportType {
    pub const ALL: &'static [ReportType] = &[
        ReportType::SpCampaigns,
        ReportType::SpKeywords,
        ReportType::SpSearchTerm,
        ReportType::SpTargeting,
        ReportType::SpAdvertisedProduct,
    ];

    /// The `reportTypeId` sent to the API.
    pub fn code(&self) -> &'static str {
        match self {
            ReportType::SpCampaigns => "spCampaigns",
            ReportType::SpKeywords => "spKeywords",
            ReportType::SpSearchTerm => "spSearchTerm",
            ReportType::SpTargeting => "spTargeting",
            ReportType::SpAdvertisedProduct => "spAdvertisedProduct",
        }
    }

    pub fn default_group_by(&self) -> &'static [&'static str] {
        match self {
            ReportType::SpCampaigns => &["campaign"],
            ReportType::SpKeywords => &["keyword"],
            ReportType::SpSearchTerm => &["searchTerm"],
            ReportType::SpTargeting => &["targeting"],
            ReportType::SpAdvertisedProduct => &["advertiser"],
        }
    }

    pub fn default_columns(&self) -> &'static [&'static str] {
        match self {
            ReportType::SpCampaigns => &[
                "date",
                "campaignName",
                "campaignId",
                "impressions",
                "clicks",
                "cost",
                "sales1d",
                "purchases1d",
                "unitsSoldClicks1d",
                "attributedSalesSameSku1d",
                "unitsSoldSameSku1d",
                "clickThroughRate",
                "costPerClick",
                "campaignStatus",
            ],
            ReportType::SpKeywords => &[
                "date",
                "campaignName",
                "campaignId",
                "adGroupName",
                "adGroupId",
                "keywordId",
                "keyword",
                "matchType",
                "impressions",
                "clicks",
                "cost",
                "sales1d",
                "purchases1d",
                "clickThroughRate",
                "costPerClick",
                "keywordBid",
                "keywordStatus",
            ],
            ReportType::SpSearchTerm => &[
                "date",
                "campaignName",
                "campaignId",
                "adGroupName",
                "adGroupId",
                "keywordId",
                "keyword",
                "matchType",
                "searchTerm",
                "impressions",
                "clicks",
                "cost",
                "sales1d",
                "purchases1d",
                "clickThroughRate",
                "costPerClick",
            ],
            ReportType::SpTargeting => &[
                "date",
                "campaignName",
                "campaignId",
                "adGroupName",
                "adGroupId",
                "targetId",
                "targetingExpression",
                "targetingType",
                "impressions",
                "clicks",
                "cost",
                "sales1d",
                "purchases1d",
                "clickThroughRate",
                "costPerClick",
            ],
            ReportType::SpAdvertisedProduct => &[
                "date",
                "campaignName",
                "campaignId",
                "adGroupName",
                "adGroupId",
                "advertisedAsin",
                "advertisedSku",
                "impressions",
                "clicks",
                "cost",
                "sales1d",
                "purchases1d",
                "unitsSoldClicks1d",
                "clickThroughRate",
                "costPerClick",
            ],
        }
    }

    /// Default columns for the given time unit. Summary reports have no
    /// `date` column.
    pub fn columns_for(&self, time_unit: TimeUnit) -> Vec<String> {
        self.default_columns()
            .iter()
            .filter(|c| time_unit == TimeUnit::Daily || **c != "date")
            .map(|c| c.to_string())
            .collect()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ReportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ReportType::ALL
            .iter()
            .copied()
            .find(|t| t.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidRequest(format!(
                    "unknown report type '{}'",
                    s
                )))
            })
    }
}

/// Aggregation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    #[default]
    Daily,
    Summary,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Daily => "DAILY",
            TimeUnit::Summary => "SUMMARY",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(TimeUnit::Daily),
            "SUMMARY" => Ok(TimeUnit::Summary),
            other => Err(Error::new(ErrorKind::InvalidRequest(format!(
                "unknown time unit '{}'",
                other
            )))),
        }
    }
}

// ============================================================================
// Job Status
// ============================================================================

/// Local lifecycle of a queued report.
///
/// ```text
/// SUBMITTED -> PROCESSING -> COMPLETED -> DOWNLOADED
///     |             |
///     +-------------+------> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Downloaded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Downloaded => "DOWNLOADED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Waiting on the remote side.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Submitted | JobStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Downloaded | JobStatus::Failed)
    }

    /// Transitions only move forward. Skipping PROCESSING is allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Submitted, Processing)
                | (Submitted, Completed)
                | (Submitted, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Downloaded)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" => Ok(JobStatus::Submitted),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "DOWNLOADED" => Ok(JobStatus::Downloaded),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(Error::new(ErrorKind::InvalidRequest(format!(
                "unknown job status '{}'",
                other
            )))),
        }
    }
}

/// Status as reported by the reporting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub fn parse(code: &str) -> Result<Self> {
        match code {
            "PENDING" => Ok(RemoteStatus::Pending),
            "PROCESSING" | "IN_PROGRESS" => Ok(RemoteStatus::Processing),
            "COMPLETED" | "SUCCESS" => Ok(RemoteStatus::Completed),
            "FAILED" | "FAILURE" | "CANCELLED" => Ok(RemoteStatus::Failed),
            other => Err(Error::new(ErrorKind::UnknownStatus(other.to_string()))),
        }
    }

    pub fn job_status(&self) -> JobStatus {
        match self {
            RemoteStatus::Pending => JobStatus::Submitted,
            RemoteStatus::Processing => JobStatus::Processing,
            RemoteStatus::Completed => JobStatus::Completed,
            RemoteStatus::Failed => JobStatus::Failed,
        }
    }
}

// ============================================================================
// Report Parameters
// ============================================================================

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::new(ErrorKind::InvalidRequest(format!(
                "start date {} is after end date {}",
                start, end
            ))));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
                Error::new(ErrorKind::InvalidRequest(format!("invalid date '{}': {}", s, e)))
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }
}

/// Restricts a report to specific entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub field: String,
    pub values: Vec<String>,
}

impl ReportFilter {
    pub fn new(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            values,
        }
    }

    pub fn campaign_ids(ids: Vec<String>) -> Self {
        Self::new("campaignId", ids)
    }

    pub fn ad_group_ids(ids: Vec<String>) -> Self {
        Self::new("adGroupId", ids)
    }
}

/// Parameters a job was submitted with, kept for display and re-submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub time_unit: TimeUnit,
    pub columns: Vec<String>,
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ReportFilter>,
}

/// Input to [`ReportQueueManager::submit`](crate::ReportQueueManager::submit).
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub report_type: ReportType,
    pub region: Region,
    pub date_range: DateRange,
    pub time_unit: TimeUnit,
    pub columns: Option<Vec<String>>,
    pub group_by: Option<Vec<String>>,
    pub filters: Vec<ReportFilter>,
    pub dry_run: bool,
}

impl ReportRequest {
    pub fn new(report_type: ReportType, region: Region, date_range: DateRange) -> Self {
        Self {
            report_type,
            region,
            date_range,
            time_unit: TimeUnit::Daily,
            columns: None,
            group_by: None,
            filters: Vec::new(),
            dry_run: false,
        }
    }

    pub fn with_time_unit(mut self, time_unit: TimeUnit) -> Self {
        self.time_unit = time_unit;
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_group_by(mut self, group_by: Vec<String>) -> Self {
        self.group_by = Some(group_by);
        self
    }

    /// Add a filter. Filters with no values are dropped.
    pub fn with_filter(mut self, filter: ReportFilter) -> Self {
        if !filter.values.is_empty() {
            self.filters.push(filter);
        }
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Resolve defaults into the parameters stored on the job.
    pub fn params(&self) -> ReportParams {
        ReportParams {
            start_date: self.date_range.start,
            end_date: self.date_range.end,
            time_unit: self.time_unit,
            columns: self
                .columns
                .clone()
                .unwrap_or_else(|| self.report_type.columns_for(self.time_unit)),
            group_by: self.group_by.clone().unwrap_or_else(|| {
                self.report_type
                    .default_group_by()
                    .iter()
                    .map(|g| g.to_string())
                    .collect()
            }),
            filters: self.filters.clone(),
        }
    }

    /// Body for `POST /reporting/reports`.
    pub fn create_body(&self) -> CreateReportBody {
        let params = self.params();
        CreateReportBody {
            name: format!("report-{}-{}", self.region.code(), params.start_date),
            start_date: params.start_date,
            end_date: params.end_date,
            configuration: ReportConfiguration {
                ad_product: AD_PRODUCT.to_string(),
                group_by: params.group_by,
                columns: params.columns,
                report_type_id: self.report_type.code().to_string(),
                time_unit: self.time_unit,
                filters: params.filters,
                format: REPORT_FORMAT.to_string(),
            },
        }
    }
}

/// Summary columns for quick campaign-level reports.
pub fn summary_columns() -> Vec<String> {
    SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect()
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportBody {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub configuration: ReportConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfiguration {
    pub ad_product: String,
    pub group_by: Vec<String>,
    pub columns: Vec<String>,
    pub report_type_id: String,
    pub time_unit: TimeUnit,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ReportFilter>,
    pub format: String,
}

/// Response of report creation and status lookups.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatusResponse {
    pub report_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

// ============================================================================
// Report Job
// ============================================================================

/// One tracked report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJob {
    pub job_id: String,
    pub report_type: ReportType,
    pub region: Region,
    pub params: ReportParams,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ReportJob {
    /// Move to `next` if the lifecycle allows it. Returns whether the status changed.
    pub fn advance(&mut self, next: JobStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == JobStatus::Completed {
            self.completed_at = Some(now);
        }
        true
    }

    /// Fail unless the job was submitted for `region`. `None` accepts any.
    pub fn ensure_region(&self, region: Option<Region>) -> Result<()> {
        match region {
            Some(region) if region != self.region => Err(Error::new(ErrorKind::InvalidRequest(
                format!("report {} was submitted for {}, not {}", self.job_id, self.region, region),
            ))),
            _ => Ok(()),
        }
    }

    /// File name for the downloaded payload.
    pub fn file_name(&self) -> String {
        let short_id: String = self
            .job_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .take(8)
            .collect();
        format!(
            "{}-{}-{}-{}.json",
            self.region.code(),
            self.report_type.code(),
            self.params.start_date,
            short_id
        )
    }
}

/// The whole persisted queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDocument {
    pub version: u32,
    pub jobs: Vec<ReportJob>,
}

impl Default for QueueDocument {
    fn default() -> Self {
        Self {
            version: QUEUE_DOCUMENT_VERSION,
            jobs: Vec::new(),
        }
    }
}

impl QueueDocument {
    /// Check structural invariants after loading.
    pub fn validate(&self) -> Result<()> {
        if self.version != QUEUE_DOCUMENT_VERSION {
            return Err(Error::new(ErrorKind::QueueCorruption(format!(
                "unsupported version {}",
                self.version
            ))));
        }

        let mut seen = std::collections::HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.job_id.as_str()) {
                return Err(Error::new(ErrorKind::QueueCorruption(format!(
                    "duplicate job {}",
                    job.job_id
                ))));
            }
            if (job.status == JobStatus::Downloaded) != job.local_path.is_some() {
                return Err(Error::new(ErrorKind::QueueCorruption(format!(
                    "job {} is {} with localPath {}",
                    job.job_id,
                    job.status,
                    if job.local_path.is_some() { "set" } else { "missing" }
                ))));
            }
        }
        Ok(())
    }

    pub fn find(&self, job_id: &str) -> Option<&ReportJob> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    pub fn find_mut(&mut self, job_id: &str) -> Option<&mut ReportJob> {
        self.jobs.iter_mut().find(|j| j.job_id == job_id)
    }
}

// ============================================================================
// Filters and Outcomes
// ============================================================================

/// Selects jobs by region and status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub region: Option<Region>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, job: &ReportJob) -> bool {
        self.region.is_none_or(|r| r == job.region) && self.status.is_none_or(|s| s == job.status)
    }
}

/// Which terminal jobs to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanFilter {
    /// Terminal jobs submitted more than this many days ago.
    OlderThanDays(u32),
    /// Every terminal job.
    All,
}

/// Result of a submission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SubmitOutcome {
    Submitted { job: ReportJob },
    DryRun { would_send: adkit_ads_client::WouldSend },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> ReportJob {
        let request = ReportRequest::new(
            ReportType::SpKeywords,
            Region::Us,
            DateRange::parse("2026-01-01", "2026-01-07").unwrap(),
        );
        ReportJob {
            job_id: "a1b2c3d4-e5f6-7890".to_string(),
            report_type: request.report_type,
            region: request.region,
            params: request.params(),
            status,
            submitted_at: Utc::now(),
            last_polled_at: None,
            completed_at: None,
            download_url: None,
            local_path: None,
            row_count: None,
            last_error: None,
        }
    }

    #[test]
    fn test_transitions_only_move_forward() {
        use JobStatus::*;
        assert!(Submitted.can_transition_to(Processing));
        assert!(Submitted.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Downloaded));

        assert!(!Processing.can_transition_to(Submitted));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Downloaded.can_transition_to(Completed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn test_remote_status_mapping() {
        assert_eq!(RemoteStatus::parse("PENDING").unwrap().job_status(), JobStatus::Submitted);
        assert_eq!(RemoteStatus::parse("PROCESSING").unwrap().job_status(), JobStatus::Processing);
        assert_eq!(RemoteStatus::parse("COMPLETED").unwrap().job_status(), JobStatus::Completed);
        assert_eq!(RemoteStatus::parse("FAILURE").unwrap().job_status(), JobStatus::Failed);
        assert_eq!(RemoteStatus::parse("CANCELLED").unwrap().job_status(), JobStatus::Failed);

        let err = RemoteStatus::parse("ARCHIVED").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownStatus(ref s) if s == "ARCHIVED"));
    }

    #[test]
    fn test_advance_sets_completed_at() {
        let mut job = job(JobStatus::Processing);
        let now = Utc::now();
        assert!(job.advance(JobStatus::Completed, now));
        assert_eq!(job.completed_at, Some(now));
        assert!(!job.advance(JobStatus::Processing, now));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_ensure_region() {
        let job = job(JobStatus::Completed);
        assert!(job.ensure_region(None).is_ok());
        assert!(job.ensure_region(Some(Region::Us)).is_ok());

        let err = job.ensure_region(Some(Region::De)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidRequest(_)));
        assert_eq!(err.category().tag(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(job(JobStatus::Completed).file_name(), "US-spKeywords-2026-01-01-a1b2c3d4.json");
    }

    #[test]
    fn test_create_body_shape() {
        let request = ReportRequest::new(
            ReportType::SpCampaigns,
            Region::De,
            DateRange::parse("2026-02-01", "2026-02-28").unwrap(),
        )
        .with_filter(ReportFilter::campaign_ids(vec!["111".into(), "222".into()]))
        .with_filter(ReportFilter::ad_group_ids(Vec::new()));

        let body = serde_json::to_value(request.create_body()).unwrap();
        assert_eq!(body["startDate"], "2026-02-01");
        assert_eq!(body["endDate"], "2026-02-28");
        assert_eq!(body["configuration"]["adProduct"], "SPONSORED_PRODUCTS");
        assert_eq!(body["configuration"]["reportTypeId"], "spCampaigns");
        assert_eq!(body["configuration"]["timeUnit"], "DAILY");
        assert_eq!(body["configuration"]["format"], "GZIP_JSON");
        assert_eq!(body["configuration"]["groupBy"], serde_json::json!(["campaign"]));
        assert_eq!(
            body["configuration"]["filters"],
            serde_json::json!([{"field": "campaignId", "values": ["111", "222"]}])
        );
    }

    #[test]
    fn test_summary_columns_drop_date() {
        let columns = ReportType::SpCampaigns.columns_for(TimeUnit::Summary);
        assert!(!columns.iter().any(|c| c == "date"));
        assert!(ReportType::SpCampaigns
            .columns_for(TimeUnit::Daily)
            .iter()
            .any(|c| c == "date"));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let err = DateRange::parse("2026-03-10", "2026-03-01").unwrap_err();
        assert_eq!(err.category().tag(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_document_rejects_downloaded_without_path() {
        let doc = QueueDocument {
            version: QUEUE_DOCUMENT_VERSION,
            jobs: vec![job(JobStatus::Downloaded)],
        };
        let err = doc.validate().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::QueueCorruption(_)));
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let mut job = job(JobStatus::Downloaded);
        job.local_path = Some("/tmp/x.json".into());
        job.row_count = Some(12);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["jobId"], "a1b2c3d4-e5f6-7890");
        assert_eq!(value["reportType"], "spKeywords");
        assert_eq!(value["region"], "US");
        assert_eq!(value["status"], "DOWNLOADED");
        assert_eq!(value["rowCount"], 12);
        assert_eq!(value["params"]["timeUnit"], "DAILY");
        assert!(value.get("lastError").is_none());
    }
}
