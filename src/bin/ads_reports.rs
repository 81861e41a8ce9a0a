//! Submit, track and download Amazon Ads reports.
//!
//! ```sh
//! ads-reports submit --region US --report-type spCampaigns --start-date 2026-01-01 --end-date 2026-01-31
//! ads-reports poll
//! ads-reports queue --status COMPLETED
//! ads-reports download --report-id <id>
//! ads-reports clean --days 30
//! ```
//!
//! Results are printed as JSON on stdout. Failures are printed as
//! `{"error": true, "kind": ..., "message": ...}` on stderr and the exit code
//! reflects the failure class.
//!
//! `queue` and `clean` only read the local queue and need no credentials.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use adkit_ads_api::client::{sanitize_error_message, Clock, ErrorCategory, Region, SystemClock};
use adkit_ads_api::config::{Profiles, Settings};
use adkit_ads_api::reports::{
    CleanFilter, DateRange, JobFilter, JobStatus, QueueStore, ReportFilter, ReportQueueManager,
    ReportRequest, ReportType, TimeUnit,
};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const DEFAULT_CLEAN_DAYS: u32 = 30;

#[derive(Parser, Debug)]
#[command(name = "ads-reports")]
#[command(version, about = "Submit, track and download Amazon Ads reports", long_about = None)]
struct Cli {
    /// Describe report submissions instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Queue directory (overrides AMAZON_ADS_QUEUE_DIR)
    #[arg(long, global = true)]
    queue_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a report and add it to the queue
    Submit(SubmitArgs),
    /// List queued reports
    Queue(QueueArgs),
    /// Check pending reports and download finished ones
    Poll(PollArgs),
    /// Download a completed report
    Download(DownloadArgs),
    /// Remove finished reports from the queue
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// Marketplace code
    #[arg(long, short = 'r', default_value = "US")]
    region: String,

    /// spCampaigns, spKeywords, spSearchTerm, spTargeting or spAdvertisedProduct
    #[arg(long, default_value = "spCampaigns")]
    report_type: String,

    /// First day (YYYY-MM-DD)
    #[arg(long)]
    start_date: String,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end_date: String,

    /// DAILY or SUMMARY
    #[arg(long, default_value = "DAILY")]
    time_unit: String,

    /// Restrict to these campaigns (comma separated)
    #[arg(long, value_delimiter = ',')]
    campaign_ids: Vec<String>,

    /// Restrict to these ad groups (comma separated)
    #[arg(long, value_delimiter = ',')]
    ad_group_ids: Vec<String>,

    /// Override the report type's default columns (comma separated)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,
}

#[derive(Args, Debug)]
struct QueueArgs {
    /// Only jobs in this status
    #[arg(long)]
    status: Option<String>,

    /// Only jobs for this marketplace
    #[arg(long, short = 'r')]
    region: Option<String>,
}

#[derive(Args, Debug)]
struct PollArgs {
    /// Only jobs for this marketplace
    #[arg(long, short = 'r')]
    region: Option<String>,

    /// Leave completed reports on the server
    #[arg(long)]
    no_download: bool,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    #[arg(long)]
    report_id: String,

    /// Marketplace the report was submitted for
    #[arg(long, short = 'r')]
    region: Option<String>,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Remove finished jobs submitted more than this many days ago
    #[arg(long, conflicts_with = "all")]
    days: Option<u32>,

    /// Remove every finished job
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let category = category_of(&err);
            eprintln!("{}", error_payload(&err, category));
            ExitCode::from(u8::try_from(category.exit_code()).unwrap_or(1))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = match cli.command {
        // Local commands: only the queue file is touched.
        Command::Queue(args) => {
            let store = local_store(cli.queue_dir)?;
            let filter = job_filter(args.region.as_deref(), args.status.as_deref())?;
            serde_json::to_value(store.list(&filter).await?)?
        }
        Command::Clean(args) => {
            let store = local_store(cli.queue_dir)?;
            let filter = if args.all {
                CleanFilter::All
            } else {
                CleanFilter::OlderThanDays(args.days.unwrap_or(DEFAULT_CLEAN_DAYS))
            };
            let removed = store.clean(filter, SystemClock.now()).await?;
            let ids: Vec<&str> = removed.iter().map(|j| j.job_id.as_str()).collect();
            json!({ "removed": removed.len(), "jobIds": ids })
        }
        Command::Submit(args) => {
            let (settings, queue) = connect(cli.dry_run, cli.queue_dir)?;
            let range = DateRange::parse(&args.start_date, &args.end_date)?;
            let mut request = ReportRequest::new(
                ReportType::from_str(&args.report_type)?,
                Region::from_str(&args.region)?,
                range,
            )
            .with_time_unit(TimeUnit::from_str(&args.time_unit)?)
            .with_filter(ReportFilter::campaign_ids(args.campaign_ids))
            .with_filter(ReportFilter::ad_group_ids(args.ad_group_ids))
            .with_dry_run(settings.dry_run);
            if !args.columns.is_empty() {
                request = request.with_columns(args.columns);
            }
            serde_json::to_value(queue.submit(request).await?)?
        }
        Command::Poll(args) => {
            let (_, queue) = connect(cli.dry_run, cli.queue_dir)?;
            let filter = job_filter(args.region.as_deref(), None)?;
            let jobs = queue.poll(filter, !args.no_download).await?;
            let errors = jobs.iter().filter(|j| j.last_error.is_some()).count();
            json!({ "polled": jobs.len(), "errors": errors, "jobs": jobs })
        }
        Command::Download(args) => {
            let (_, queue) = connect(cli.dry_run, cli.queue_dir)?;
            let region = args.region.as_deref().map(Region::from_str).transpose()?;
            serde_json::to_value(queue.download_for(&args.report_id, region).await?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn local_store(queue_dir: Option<PathBuf>) -> anyhow::Result<QueueStore> {
    let dir = match queue_dir {
        Some(dir) => dir,
        None => Settings::queue_dir_from_env()?,
    };
    Ok(QueueStore::new(dir))
}

/// Full settings, profiles and an API-backed queue.
fn connect(
    dry_run: bool,
    queue_dir: Option<PathBuf>,
) -> anyhow::Result<(Settings, ReportQueueManager)> {
    let mut settings = Settings::from_env()?;
    settings.dry_run |= dry_run;
    if let Some(dir) = queue_dir {
        settings.queue_dir = dir;
    }

    let profiles = Profiles::load(&settings.profiles_path)?;
    let queue = settings.report_queue(profiles)?;
    Ok((settings, queue))
}

fn job_filter(region: Option<&str>, status: Option<&str>) -> anyhow::Result<JobFilter> {
    let mut filter = JobFilter::all();
    if let Some(region) = region {
        filter = filter.with_region(Region::from_str(region)?);
    }
    if let Some(status) = status {
        filter = filter.with_status(JobStatus::from_str(status)?);
    }
    Ok(filter)
}

fn category_of(err: &anyhow::Error) -> ErrorCategory {
    if let Some(e) = err.downcast_ref::<adkit_ads_api::reports::Error>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<adkit_ads_api::client::Error>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<adkit_ads_api::auth::Error>() {
        e.category()
    } else {
        ErrorCategory::Other
    }
}

fn error_payload(err: &anyhow::Error, category: ErrorCategory) -> Value {
    let mut payload = json!({
        "error": true,
        "kind": category.tag(),
        "message": sanitize_error_message(&err.to_string()),
    });
    if let Some(hint) = category.hint() {
        payload["hint"] = json!(hint);
    }
    payload
}
