//! On-disk queue document and report files.
//!
//! Every write goes to a sibling `.tmp` file, is synced, and then renamed
//! over the target, so readers never observe a partially written file.
//!
//! Listing and cleaning only touch the document, so they are available here
//! without an API client.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::types::{CleanFilter, JobFilter, QueueDocument, ReportJob};

pub const QUEUE_FILE_NAME: &str = "report_queue.json";
pub const REPORTS_DIR_NAME: &str = "reports";

/// Location of the queue document and downloaded reports.
#[derive(Debug, Clone)]
pub struct QueueStore {
    dir: PathBuf,
}

impl QueueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn queue_path(&self) -> PathBuf {
        self.dir.join(QUEUE_FILE_NAME)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.dir.join(REPORTS_DIR_NAME)
    }

    /// Read the queue. A missing file is an empty queue; a file that cannot
    /// be read or understood is corruption.
    pub async fn load(&self) -> Result<QueueDocument> {
        let path = self.queue_path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No queue file, starting empty");
                return Ok(QueueDocument::default());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Queue file unreadable");
                return Err(corruption(&path, "cannot read", e));
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::new(ErrorKind::QueueCorruption(format!(
                "{} is empty",
                path.display()
            ))));
        }

        let doc: QueueDocument = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Queue file failed to parse");
            corruption(&path, "cannot parse", e)
        })?;
        doc.validate()?;

        debug!(jobs = doc.jobs.len(), "Loaded report queue");
        Ok(doc)
    }

    /// Replace the queue document atomically.
    pub async fn save(&self, doc: &QueueDocument) -> Result<()> {
        let path = self.queue_path();
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| corruption(&path, "cannot serialize", e))?;
        write_atomic(&path, &json).await.map_err(|e| {
            warn!(path = %path.display(), error = %e, "Queue file not written");
            corruption(&path, "cannot write", e)
        })?;
        debug!(jobs = doc.jobs.len(), "Saved report queue");
        Ok(())
    }

    /// Write a downloaded report under `reports/` and return its path.
    pub async fn write_report(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.reports_dir().join(file_name);
        write_atomic(&path, contents).await?;
        Ok(path)
    }

    /// Jobs matching `filter`, in submission order.
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<ReportJob>> {
        let doc = self.load().await?;
        let mut jobs: Vec<ReportJob> = doc.jobs.into_iter().filter(|j| filter.matches(j)).collect();
        jobs.sort_by_key(|j| j.submitted_at);
        Ok(jobs)
    }

    pub async fn get(&self, job_id: &str) -> Result<ReportJob> {
        let doc = self.load().await?;
        doc.find(job_id)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::JobNotFound(job_id.to_string())))
    }

    /// Remove terminal jobs submitted before the filter's cutoff relative to
    /// `now`. Downloaded files are left on disk. Returns the removed jobs.
    pub async fn clean(&self, filter: CleanFilter, now: DateTime<Utc>) -> Result<Vec<ReportJob>> {
        let mut doc = self.load().await?;

        let cutoff = match filter {
            CleanFilter::OlderThanDays(days) => Some(
                now.checked_sub_signed(Duration::days(i64::from(days)))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
            CleanFilter::All => None,
        };

        let (removed, kept): (Vec<ReportJob>, Vec<ReportJob>) =
            std::mem::take(&mut doc.jobs).into_iter().partition(|job| {
                job.status.is_terminal() && cutoff.is_none_or(|c| job.submitted_at < c)
            });
        doc.jobs = kept;

        if !removed.is_empty() {
            self.save(&doc).await?;
        }
        info!(removed = removed.len(), remaining = doc.jobs.len(), "Queue cleaned");
        Ok(removed)
    }
}

fn corruption(
    path: &Path,
    what: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> Error {
    Error::with_source(
        ErrorKind::QueueCorruption(format!("{} {}: {}", what, path.display(), source)),
        source,
    )
}

async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).await?;

    let temp_path = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;

    // Persist the rename itself.
    #[cfg(unix)]
    fs::File::open(parent).await?.sync_all().await?;

    Ok(())
}
