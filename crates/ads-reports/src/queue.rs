//! Asynchronous report lifecycle backed by a persistent queue.

use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use adkit_ads_client::{
    AdsClient, Clock, ErrorCategory, Region, RequestMethod, RequestOptions, SystemClock,
    CREATE_REPORT_CONTENT_TYPE, GET_REPORT_ACCEPT,
};
use flate2::read::GzDecoder;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::store::QueueStore;
use crate::types::{
    CleanFilter, JobFilter, JobStatus, RemoteStatus, ReportJob, ReportRequest,
    ReportStatusResponse, SubmitOutcome,
};

/// Reporting API resource.
pub const REPORTS_PATH: &str = "/reporting/reports";

/// Status lookups in flight during one poll pass.
pub const DEFAULT_POLL_CONCURRENCY: usize = 4;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Queue location and polling settings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub queue_dir: PathBuf,
    pub poll_concurrency: usize,
}

impl QueueConfig {
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
            poll_concurrency: DEFAULT_POLL_CONCURRENCY,
        }
    }

    pub fn with_poll_concurrency(mut self, n: usize) -> Self {
        self.poll_concurrency = n.max(1);
        self
    }
}

/// Submits reports, tracks them in a JSON document on disk, and downloads
/// finished payloads.
///
/// Every read-modify-write of the document happens under one mutex, so
/// concurrent calls on the same manager never lose updates. Separate
/// processes sharing a queue directory are not coordinated.
pub struct ReportQueueManager {
    client: AdsClient,
    store: QueueStore,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for ReportQueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportQueueManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReportQueueManager {
    pub fn new(client: AdsClient, config: QueueConfig) -> Self {
        Self::with_clock(client, config, Arc::new(SystemClock))
    }

    pub fn with_clock(client: AdsClient, config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            store: QueueStore::new(config.queue_dir.clone()),
            config,
            clock,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn client(&self) -> &AdsClient {
        &self.client
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Create a report and record it as SUBMITTED.
    ///
    /// In dry-run the request is described and the queue is left untouched.
    #[instrument(skip(self, request), fields(report_type = %request.report_type, region = %request.region))]
    pub async fn submit(&self, request: ReportRequest) -> Result<SubmitOutcome> {
        let _guard = self.lock.lock().await;
        let mut doc = self.store.load().await?;

        let opts = RequestOptions::new()
            .json(&request.create_body())?
            .content_type(CREATE_REPORT_CONTENT_TYPE)
            .accept(CREATE_REPORT_CONTENT_TYPE)
            .mutating(true)
            .dry_run(request.dry_run);

        let response = self
            .client
            .request(RequestMethod::Post, REPORTS_PATH, request.region, opts)
            .await?;

        if let Some(would_send) = response.would_send() {
            return Ok(SubmitOutcome::DryRun {
                would_send: would_send.clone(),
            });
        }

        let created: ReportStatusResponse = response.json()?;
        let mut job = ReportJob {
            job_id: created.report_id,
            report_type: request.report_type,
            region: request.region,
            params: request.params(),
            status: JobStatus::Submitted,
            submitted_at: self.clock.now(),
            last_polled_at: None,
            completed_at: None,
            download_url: None,
            local_path: None,
            row_count: None,
            last_error: None,
        };

        if let Some(code) = created.status.as_deref() {
            match RemoteStatus::parse(code) {
                Ok(RemoteStatus::Failed) => {
                    job.status = JobStatus::Failed;
                    job.last_error = Some(
                        created
                            .failure_reason
                            .unwrap_or_else(|| format!("report {}", code)),
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(job_id = %job.job_id, error = %e, "Ignoring creation status"),
            }
        }

        // Statuses only move forward, so a known id keeps its entry.
        if let Some(existing) = doc.find(&job.job_id) {
            warn!(job_id = %job.job_id, status = %existing.status, "Report id already queued, keeping entry");
            return Ok(SubmitOutcome::Submitted {
                job: existing.clone(),
            });
        }
        doc.jobs.push(job.clone());
        self.store.save(&doc).await?;

        info!(job_id = %job.job_id, status = %job.status, "Report submitted");
        Ok(SubmitOutcome::Submitted { job })
    }

    // =========================================================================
    // Poll
    // =========================================================================

    /// Refresh every pending job matching `filter`.
    ///
    /// Failures are recorded per job in `lastError` and never abort the pass.
    /// With `download`, completed jobs are downloaded in the same pass.
    /// Returns the touched jobs in queue order.
    #[instrument(skip(self))]
    pub async fn poll(&self, filter: JobFilter, download: bool) -> Result<Vec<ReportJob>> {
        let _guard = self.lock.lock().await;
        let mut doc = self.store.load().await?;

        let selected: Vec<ReportJob> = doc
            .jobs
            .iter()
            .filter(|job| filter.matches(job))
            .filter(|job| job.status.is_pending() || (download && job.status == JobStatus::Completed))
            .cloned()
            .collect();

        if selected.is_empty() {
            debug!("Nothing to poll");
            return Ok(Vec::new());
        }

        let updated: Vec<ReportJob> = stream::iter(selected)
            .map(|job| self.refresh_job(job, download))
            .buffer_unordered(self.config.poll_concurrency)
            .collect()
            .await;

        let touched: HashSet<String> = updated.iter().map(|j| j.job_id.clone()).collect();
        for job in updated {
            if let Some(slot) = doc.find_mut(&job.job_id) {
                *slot = job;
            }
        }
        self.store.save(&doc).await?;

        let errors = doc
            .jobs
            .iter()
            .filter(|j| touched.contains(&j.job_id) && j.last_error.is_some())
            .count();
        info!(polled = touched.len(), errors, "Poll pass finished");

        Ok(doc
            .jobs
            .into_iter()
            .filter(|j| touched.contains(&j.job_id))
            .collect())
    }

    async fn refresh_job(&self, mut job: ReportJob, download: bool) -> ReportJob {
        if job.status.is_pending() {
            let result = match self.fetch_status(&job.job_id, job.region).await {
                Ok(remote) => self.apply_status(&mut job, remote),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(job_id = %job.job_id, error = %e, "Status check failed");
                job.last_error = Some(e.to_string());
            }
            job.last_polled_at = Some(self.clock.now());
        }

        if download && job.status == JobStatus::Completed {
            if let Err(e) = self.download_job(&mut job).await {
                warn!(job_id = %job.job_id, error = %e, "Download failed");
                job.last_error = Some(e.to_string());
            }
        }

        job
    }

    async fn fetch_status(&self, job_id: &str, region: Region) -> Result<ReportStatusResponse> {
        let path = format!("{}/{}", REPORTS_PATH, urlencoding::encode(job_id));
        let opts = RequestOptions::new().accept(GET_REPORT_ACCEPT).bypass_cache();
        let response = self
            .client
            .request(RequestMethod::Get, &path, region, opts)
            .await?;
        Ok(response.json()?)
    }

    fn apply_status(&self, job: &mut ReportJob, remote: ReportStatusResponse) -> Result<()> {
        let code = remote
            .status
            .as_deref()
            .ok_or_else(|| Error::new(ErrorKind::UnknownStatus("<missing>".to_string())))?;
        let next = RemoteStatus::parse(code)?.job_status();

        if job.advance(next, self.clock.now()) {
            info!(job_id = %job.job_id, status = %next, "Report status changed");
        }

        job.last_error = None;
        if let Some(url) = remote.url {
            job.download_url = Some(url);
        }
        if job.status == JobStatus::Failed {
            job.last_error = Some(
                remote
                    .failure_reason
                    .unwrap_or_else(|| format!("report {}", code)),
            );
        }
        Ok(())
    }

    // =========================================================================
    // Download
    // =========================================================================

    /// Download a COMPLETED report and mark it DOWNLOADED.
    ///
    /// On failure the job stays COMPLETED with the error recorded.
    pub async fn download(&self, job_id: &str) -> Result<ReportJob> {
        self.download_for(job_id, None).await
    }

    /// [`download`](Self::download), refusing a job submitted for another
    /// region than `region`.
    #[instrument(skip(self))]
    pub async fn download_for(&self, job_id: &str, region: Option<Region>) -> Result<ReportJob> {
        let _guard = self.lock.lock().await;
        let mut doc = self.store.load().await?;

        let job = doc
            .find_mut(job_id)
            .ok_or_else(|| Error::new(ErrorKind::JobNotFound(job_id.to_string())))?;
        job.ensure_region(region)?;

        if job.status != JobStatus::Completed {
            return Err(Error::new(ErrorKind::InvalidState {
                job_id: job_id.to_string(),
                status: job.status,
                expected: JobStatus::Completed,
            }));
        }

        let result = self.download_job(job).await;
        if let Err(e) = &result {
            job.last_error = Some(e.to_string());
        }
        let snapshot = job.clone();

        self.store.save(&doc).await?;
        result.map(|_| snapshot)
    }

    async fn download_job(&self, job: &mut ReportJob) -> Result<()> {
        let url = match job.download_url.clone() {
            Some(url) => url,
            None => self.refresh_download_url(job).await?,
        };

        let response = match self.client.fetch_external(&url).await {
            Ok(response) => response,
            // Presigned URLs expire; ask for a fresh one once.
            Err(e) if matches!(e.category(), ErrorCategory::Validation | ErrorCategory::NotFound) => {
                debug!(job_id = %job.job_id, error = %e, "Download URL rejected, refreshing");
                let url = self.refresh_download_url(job).await?;
                self.client.fetch_external(&url).await?
            }
            Err(e) => return Err(e.into()),
        };

        let payload = decode_payload(response.bytes())?;
        let row_count = count_rows(&payload)?;
        let path = self.store.write_report(&job.file_name(), &payload).await?;

        job.local_path = Some(path.display().to_string());
        job.row_count = row_count;
        job.advance(JobStatus::Downloaded, self.clock.now());
        job.last_error = None;

        info!(job_id = %job.job_id, path = %path.display(), rows = ?row_count, "Report downloaded");
        Ok(())
    }

    async fn refresh_download_url(&self, job: &mut ReportJob) -> Result<String> {
        let remote = self.fetch_status(&job.job_id, job.region).await?;
        let url = remote.url.ok_or_else(|| {
            Error::new(ErrorKind::Download(format!(
                "no download URL for report {}",
                job.job_id
            )))
        })?;
        job.download_url = Some(url.clone());
        Ok(url)
    }

    // =========================================================================
    // Queries and Maintenance
    // =========================================================================

    /// Jobs matching `filter`, in submission order.
    pub async fn list(&self, filter: JobFilter) -> Result<Vec<ReportJob>> {
        self.store.list(&filter).await
    }

    pub async fn get(&self, job_id: &str) -> Result<ReportJob> {
        self.store.get(job_id).await
    }

    /// Remove terminal jobs. Downloaded files are left on disk.
    #[instrument(skip(self))]
    pub async fn clean(&self, filter: CleanFilter) -> Result<Vec<ReportJob>> {
        let _guard = self.lock.lock().await;
        self.store.clean(filter, self.clock.now()).await
    }
}

/// Gunzip when the payload carries the gzip magic bytes.
fn decode_payload(bytes: &[u8]) -> Result<Vec<u8>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::with_source(ErrorKind::Download(format!("gzip decode failed: {}", e)), e))?;
    Ok(decompressed)
}

/// Row count of a JSON array payload. Other JSON shapes have no row count.
fn count_rows(payload: &[u8]) -> Result<Option<u64>> {
    let value: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
        Error::with_source(
            ErrorKind::Download(format!("report payload is not JSON: {}", e)),
            e,
        )
    })?;
    Ok(value.as_array().map(|rows| rows.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decode_plain_payload() {
        assert_eq!(decode_payload(b"[1,2]").unwrap(), b"[1,2]");
    }

    #[test]
    fn test_decode_gzip_payload() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"[{\"clicks\":3}]").unwrap();
        let gz = encoder.finish().unwrap();

        assert_eq!(decode_payload(&gz).unwrap(), b"[{\"clicks\":3}]");
    }

    #[test]
    fn test_truncated_gzip_is_download_error() {
        let err = decode_payload(&[0x1f, 0x8b, 0x08, 0x00]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Download(_)));
    }

    #[test]
    fn test_count_rows() {
        assert_eq!(count_rows(b"[{}, {}, {}]").unwrap(), Some(3));
        assert_eq!(count_rows(b"{\"rows\": []}").unwrap(), None);
        assert!(count_rows(b"not json").is_err());
    }

    #[test]
    fn test_poll_concurrency_floor() {
        assert_eq!(QueueConfig::new("/tmp/q").with_poll_concurrency(0).poll_concurrency, 1);
    }
}
