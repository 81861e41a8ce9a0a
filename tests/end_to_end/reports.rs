use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use adkit_ads_api::client::Region;
use adkit_ads_api::reports::{
    CleanFilter, DateRange, JobFilter, JobStatus, ReportRequest, ReportType, SubmitOutcome,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common;

fn request(region: Region) -> ReportRequest {
    ReportRequest::new(
        ReportType::SpCampaigns,
        region,
        DateRange::parse("2026-01-01", "2026-01-31").unwrap(),
    )
}

#[tokio::test]
async fn test_submit_poll_download_clean() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    common::mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/reporting/reports"))
        .and(header("Authorization", "Bearer Atza|gen0"))
        .and(header("Amazon-Advertising-API-ClientId", "amzn1.application-oa2-client.e2e"))
        .and(header("Amazon-Advertising-API-Scope", "1001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reportId": "e2e-report-0001",
            "status": "PENDING"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/e2e-report-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reportId": "e2e-report-0001",
            "status": "COMPLETED",
            "url": format!("{}/s3/e2e-report-0001.json.gz", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/s3/e2e-report-0001.json.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::gzip(
            br#"[{"campaignId":1,"cost":2.5},{"campaignId":2,"cost":0.0},{"campaignId":3,"cost":1.0}]"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let queue = common::queue(&server, &dir, &[]);

    let SubmitOutcome::Submitted { job } = queue.submit(request(Region::Us)).await.unwrap() else {
        panic!("expected a submitted job");
    };
    assert_eq!(job.job_id, "e2e-report-0001");

    // The queue survives a new manager over the same directory.
    let queue = common::queue(&server, &dir, &[]);
    let pending = queue
        .list(JobFilter::all().with_status(JobStatus::Submitted))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let polled = queue.poll(JobFilter::all(), true).await.unwrap();
    assert_eq!(polled[0].status, JobStatus::Downloaded);
    assert_eq!(polled[0].row_count, Some(3));

    let file = dir.path().join("reports").join("US-spCampaigns-2026-01-01-e2e-repo.json");
    assert!(file.exists(), "missing {}", file.display());

    let removed = queue.clean(CleanFilter::All).await.unwrap();
    assert_eq!(removed.len(), 1);
    assert!(queue.list(JobFilter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    common::mount_token_endpoint(&server, 2).await;

    Mock::given(method("POST"))
        .and(path("/reporting/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reportId": "eu-report-0001"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/eu-report-0001"))
        .and(header("Authorization", "Bearer Atza|gen0"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/eu-report-0001"))
        .and(header("Authorization", "Bearer Atza|gen1"))
        .and(header("Amazon-Advertising-API-Scope", "2002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reportId": "eu-report-0001",
            "status": "PROCESSING"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let queue = common::queue(&server, &dir, &[]);
    queue.submit(request(Region::De)).await.unwrap();

    let polled = queue.poll(JobFilter::all(), true).await.unwrap();
    assert_eq!(polled[0].status, JobStatus::Processing);
    assert!(polled[0].last_error.is_none());
}

#[tokio::test]
async fn test_rate_limited_status_check_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    common::mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/reporting/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reportId": "busy-report"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/busy-report"))
        .respond_with({
            let calls = Arc::new(AtomicU32::new(0));
            move |_: &Request| match calls.fetch_add(1, Ordering::SeqCst) {
                0 => ResponseTemplate::new(429).insert_header("Retry-After", "0"),
                _ => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "reportId": "busy-report",
                    "status": "PROCESSING"
                })),
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    let queue = common::queue(&server, &dir, &[]);
    queue.submit(request(Region::Us)).await.unwrap();

    let polled = queue.poll(JobFilter::all(), false).await.unwrap();
    assert_eq!(polled[0].status, JobStatus::Processing);
}

#[tokio::test]
async fn test_dry_run_setting_skips_network_and_queue() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    common::mount_token_endpoint(&server, 0).await;

    Mock::given(method("POST"))
        .and(path("/reporting/reports"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let queue = common::queue(&server, &dir, &[("AMAZON_ADS_DRY_RUN", "true")]);
    let outcome = queue.submit(request(Region::Us)).await.unwrap();

    let SubmitOutcome::DryRun { would_send } = outcome else {
        panic!("expected a dry run");
    };
    assert_eq!(
        would_send.body.unwrap()["configuration"]["reportTypeId"],
        "spCampaigns"
    );
    assert!(!dir.path().join("report_queue.json").exists());
}
