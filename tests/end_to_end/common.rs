use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use adkit_ads_api::config::{Profiles, Settings};
use adkit_ads_api::ReportQueueManager;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN_PATH: &str = "/auth/o2/token";

/// Settings as they would come from `.env`, pointed at `queue_dir`.
pub fn settings(queue_dir: &TempDir, extra: &[(&str, &str)]) -> Settings {
    let mut vars: HashMap<String, String> = [
        ("AMAZON_ADS_CLIENT_ID", "amzn1.application-oa2-client.e2e"),
        ("AMAZON_ADS_CLIENT_SECRET", "amzn1.oa2-cs.v1.e2e-secret"),
        ("AMAZON_ADS_REFRESH_TOKEN", "Atzr|na-refresh"),
        ("AMAZON_ADS_REFRESH_TOKEN_EU", "Atzr|eu-refresh"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert(
        "AMAZON_ADS_QUEUE_DIR".to_string(),
        queue_dir.path().display().to_string(),
    );
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }

    Settings::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// US and DE profiles served by the mock server, tokens from the same server.
pub fn profiles(server: &MockServer) -> Profiles {
    let json = serde_json::json!({
        "regions": {
            "US": {
                "profileId": "1001",
                "apiEndpoint": server.uri(),
                "authEndpoint": format!("{}{}", server.uri(), TOKEN_PATH)
            },
            "DE": {
                "profileId": "2002",
                "apiEndpoint": server.uri(),
                "authEndpoint": format!("{}{}", server.uri(), TOKEN_PATH)
            }
        }
    });
    Profiles::parse(&json.to_string()).unwrap()
}

pub fn queue(server: &MockServer, dir: &TempDir, extra: &[(&str, &str)]) -> ReportQueueManager {
    settings(dir, extra).report_queue(profiles(server)).unwrap()
}

/// Token endpoint handing out `Atza|gen0`, `Atza|gen1`, ... on each exchange.
pub async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    let calls = Arc::new(AtomicU32::new(0));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(move |_: &Request| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": format!("Atza|gen{n}"),
                "token_type": "bearer",
                "expires_in": 3600
            }))
        })
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}
