//! Environment-driven settings.
//!
//! This is the only place the workspace reads the process environment. The
//! core crates take explicit configuration values built from [`Settings`].
//!
//! Sources, highest priority first:
//! 1. Process environment (`AMAZON_ADS_*`, then legacy camelCase names)
//! 2. `.env` in the working directory, loaded with `dotenvy`
//! 3. Built-in defaults

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use adkit_ads_auth::{AuthConfig, RealmCredentials, TokenManager};
use adkit_ads_client::{
    AdsClient, AuthRegion, ClientConfig, Error, ErrorKind, Region, RegionProfile, RegionTable,
    Result, RetryConfig,
};
use adkit_ads_reports::{QueueConfig, ReportQueueManager};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_QUEUE_DIR: &str = "./data";
pub const DEFAULT_PROFILES_PATH: &str = "./config/profiles.json";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Resolved application settings.
#[derive(Clone)]
pub struct Settings {
    pub client_id: String,
    client_secret: String,
    refresh_tokens: HashMap<AuthRegion, String>,
    pub cache_ttl: Duration,
    pub cache_enabled: bool,
    pub queue_dir: PathBuf,
    pub profiles_path: PathBuf,
    pub max_attempts: u32,
    pub dry_run: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut realms: Vec<&AuthRegion> = self.refresh_tokens.keys().collect();
        realms.sort();
        f.debug_struct("Settings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token_realms", &realms)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_enabled", &self.cache_enabled)
            .field("queue_dir", &self.queue_dir)
            .field("profiles_path", &self.profiles_path)
            .field("max_attempts", &self.max_attempts)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Settings {
    /// Load `.env` if present, then read the environment.
    pub fn from_env() -> Result<Self> {
        load_dotenv()?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Queue directory alone, for commands that never call the API and so
    /// need no credentials or profiles.
    pub fn queue_dir_from_env() -> Result<PathBuf> {
        load_dotenv()?;
        Ok(Self::queue_dir_from_lookup(|key| std::env::var(key).ok()))
    }

    pub fn queue_dir_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
        resolve(&lookup, &["AMAZON_ADS_QUEUE_DIR"])
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUEUE_DIR))
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |keys: &[&str]| resolve(&lookup, keys);

        let client_id = var(&["AMAZON_ADS_CLIENT_ID", "clientId"])
            .ok_or_else(|| missing("AMAZON_ADS_CLIENT_ID"))?;
        let client_secret = var(&["AMAZON_ADS_CLIENT_SECRET", "clientSecret"])
            .ok_or_else(|| missing("AMAZON_ADS_CLIENT_SECRET"))?;

        // One refresh token usually serves NA and FE; EU needs its own.
        let shared = var(&["AMAZON_ADS_REFRESH_TOKEN", "refreshToken"]);
        let mut refresh_tokens = HashMap::new();
        let realm_tokens = [
            (AuthRegion::Na, var(&["AMAZON_ADS_REFRESH_TOKEN_NA"]).or_else(|| shared.clone())),
            (AuthRegion::Eu, var(&["AMAZON_ADS_REFRESH_TOKEN_EU", "refreshTokenEU"])),
            (AuthRegion::Fe, var(&["AMAZON_ADS_REFRESH_TOKEN_FE"]).or_else(|| shared.clone())),
        ];
        for (realm, token) in realm_tokens {
            if let Some(token) = token {
                refresh_tokens.insert(realm, token);
            }
        }
        if refresh_tokens.is_empty() {
            return Err(missing("AMAZON_ADS_REFRESH_TOKEN"));
        }

        let cache_ttl = match var(&["AMAZON_ADS_CACHE_TTL"]) {
            Some(v) => Duration::from_secs(parse_number("AMAZON_ADS_CACHE_TTL", &v)?),
            None => Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        };
        let max_attempts = match var(&["AMAZON_ADS_MAX_ATTEMPTS"]) {
            Some(v) => parse_number("AMAZON_ADS_MAX_ATTEMPTS", &v)?,
            None => DEFAULT_MAX_ATTEMPTS,
        };

        Ok(Self {
            client_id,
            client_secret,
            refresh_tokens,
            cache_ttl,
            cache_enabled: var(&["AMAZON_ADS_CACHE_ENABLED"]).is_none_or(|v| parse_flag(&v)),
            queue_dir: Self::queue_dir_from_lookup(&lookup),
            profiles_path: var(&["AMAZON_ADS_PROFILES"])
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILES_PATH)),
            max_attempts,
            dry_run: var(&["AMAZON_ADS_DRY_RUN"]).is_some_and(|v| parse_flag(&v)),
        })
    }

    pub fn has_refresh_token(&self, realm: AuthRegion) -> bool {
        self.refresh_tokens.contains_key(&realm)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .with_client_id(self.client_id.clone())
            .with_retry(RetryConfig::default().with_max_attempts(self.max_attempts))
            .with_cache(self.cache_enabled)
            .with_cache_ttl(self.cache_ttl)
            .with_dry_run(self.dry_run)
            .build()
    }

    /// Token manager configuration, using token endpoints from the profiles file
    /// where given.
    pub fn auth_config(&self, profiles: &Profiles) -> AuthConfig {
        self.refresh_tokens
            .iter()
            .fold(
                AuthConfig::new(self.client_id.clone(), self.client_secret.clone()),
                |config, (realm, token)| {
                    let mut credentials = RealmCredentials::new(*realm, token.clone());
                    if let Some(url) = profiles.token_urls.get(realm) {
                        credentials = credentials.with_token_url(url.clone());
                    }
                    config.with_realm(*realm, credentials)
                },
            )
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.queue_dir.clone())
    }

    /// Wire token manager, client and report queue together.
    pub fn report_queue(&self, profiles: Profiles) -> Result<ReportQueueManager> {
        let tokens = TokenManager::new(self.auth_config(&profiles))?;
        let client = AdsClient::new(self.client_config(), Arc::new(tokens), profiles.regions)?;
        Ok(ReportQueueManager::new(client, self.queue_config()))
    }
}

fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => {
            return Err(Error::new(ErrorKind::Config(format!(
                "failed to read .env: {}",
                e
            ))))
        }
    }
    Ok(())
}

/// First non-empty value among `keys`, with surrounding quotes removed.
fn resolve(lookup: &dyn Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        lookup(key)
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

fn missing(name: &str) -> Error {
    Error::new(ErrorKind::Config(format!("{} is not set", name)))
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        Error::new(ErrorKind::Config(format!(
            "{} must be a non-negative integer, got '{}'",
            name, value
        )))
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

// ============================================================================
// Profiles File
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    regions: BTreeMap<String, ProfileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEntry {
    profile_id: String,
    #[serde(default)]
    api_endpoint: Option<String>,
    #[serde(default)]
    auth_endpoint: Option<String>,
    #[serde(default)]
    auth_region: Option<AuthRegion>,
}

/// Marketplace profiles loaded from the profiles file.
#[derive(Debug, Clone, Default)]
pub struct Profiles {
    pub regions: RegionTable,
    /// Token endpoint overrides per realm.
    pub token_urls: HashMap<AuthRegion, String>,
}

impl Profiles {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(
                ErrorKind::Config(format!("cannot read profiles file {}: {}", path.display(), e)),
                e,
            )
        })?;
        Self::parse(&contents)
    }

    /// Parse `{"regions": {"US": {"profileId": "...", ...}}}`.
    pub fn parse(json: &str) -> Result<Self> {
        let file: ProfilesFile = serde_json::from_str(json).map_err(|e| {
            Error::with_source(ErrorKind::Config(format!("invalid profiles file: {}", e)), e)
        })?;

        let mut regions = RegionTable::new();
        let mut token_urls = HashMap::new();

        for (code, entry) in file.regions {
            let region = Region::from_str(&code)?;
            let mut profile = RegionProfile::new(region, entry.profile_id);
            if let Some(auth_region) = entry.auth_region {
                profile.auth_region = auth_region;
                profile.api_endpoint = auth_region.default_api_endpoint().to_string();
            }
            if let Some(endpoint) = entry.api_endpoint {
                profile = profile.with_api_endpoint(endpoint);
            }
            if let Some(url) = entry.auth_endpoint {
                token_urls.insert(profile.auth_region, url);
            }
            regions = regions.with_profile(region, profile);
        }

        if regions.is_empty() {
            return Err(Error::new(ErrorKind::Config(
                "profiles file defines no regions".to_string(),
            )));
        }

        Ok(Self {
            regions,
            token_urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("AMAZON_ADS_CLIENT_ID", "cid"),
            ("AMAZON_ADS_CLIENT_SECRET", "secret"),
            ("AMAZON_ADS_REFRESH_TOKEN", "Atzr|na"),
        ]))
        .unwrap();

        assert_eq!(settings.cache_ttl, Duration::from_secs(300));
        assert!(settings.cache_enabled);
        assert!(!settings.dry_run);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.queue_dir, PathBuf::from("./data"));
        assert!(settings.has_refresh_token(AuthRegion::Na));
        assert!(settings.has_refresh_token(AuthRegion::Fe));
        assert!(!settings.has_refresh_token(AuthRegion::Eu));
    }

    #[test]
    fn test_queue_dir_needs_no_credentials() {
        assert_eq!(
            Settings::queue_dir_from_lookup(lookup(&[])),
            PathBuf::from(DEFAULT_QUEUE_DIR)
        );
        assert_eq!(
            Settings::queue_dir_from_lookup(lookup(&[("AMAZON_ADS_QUEUE_DIR", "\"/var/ads\"")])),
            PathBuf::from("/var/ads")
        );
        assert!(Settings::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn test_legacy_names_and_quotes() {
        let settings = Settings::from_lookup(lookup(&[
            ("clientId", "\"cid\""),
            ("clientSecret", "secret"),
            ("refreshTokenEU", "Atzr|eu"),
            ("AMAZON_ADS_CACHE_ENABLED", "no"),
            ("AMAZON_ADS_DRY_RUN", "YES"),
        ]))
        .unwrap();

        assert_eq!(settings.client_id, "cid");
        assert!(settings.has_refresh_token(AuthRegion::Eu));
        assert!(!settings.has_refresh_token(AuthRegion::Na));
        assert!(!settings.cache_enabled);
        assert!(settings.dry_run);
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let err = Settings::from_lookup(lookup(&[("AMAZON_ADS_CLIENT_ID", "cid")])).unwrap_err();
        assert_eq!(err.category().tag(), "CONFIG_ERROR");
        assert!(err.to_string().contains("AMAZON_ADS_CLIENT_SECRET"));

        let err = Settings::from_lookup(lookup(&[
            ("AMAZON_ADS_CLIENT_ID", "cid"),
            ("AMAZON_ADS_CLIENT_SECRET", "secret"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("AMAZON_ADS_REFRESH_TOKEN"));
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = Settings::from_lookup(lookup(&[
            ("AMAZON_ADS_CLIENT_ID", "cid"),
            ("AMAZON_ADS_CLIENT_SECRET", "secret"),
            ("AMAZON_ADS_REFRESH_TOKEN", "Atzr|na"),
            ("AMAZON_ADS_CACHE_TTL", "five minutes"),
        ]))
        .unwrap_err();
        assert_eq!(err.category().exit_code(), 2);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = Settings::from_lookup(lookup(&[
            ("AMAZON_ADS_CLIENT_ID", "cid"),
            ("AMAZON_ADS_CLIENT_SECRET", "very-secret"),
            ("AMAZON_ADS_REFRESH_TOKEN", "Atzr|hidden"),
        ]))
        .unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("Atzr|hidden"));
    }

    #[test]
    fn test_parse_profiles() {
        let profiles = Profiles::parse(
            r#"{"regions": {
                "us": {"profileId": "111"},
                "UK": {"profileId": "222", "authEndpoint": "https://lwa.example/eu"},
                "DE": {"profileId": "333", "apiEndpoint": "http://localhost:9000/"}
            }}"#,
        )
        .unwrap();

        let us = profiles.regions.get(Region::Us).unwrap();
        assert_eq!(us.api_endpoint, "https://advertising-api.amazon.com");
        assert_eq!(us.auth_region, AuthRegion::Na);

        let gb = profiles.regions.get(Region::Gb).unwrap();
        assert_eq!(gb.profile_id, "222");
        assert_eq!(
            profiles.token_urls.get(&AuthRegion::Eu).map(String::as_str),
            Some("https://lwa.example/eu")
        );

        let de = profiles.regions.get(Region::De).unwrap();
        assert_eq!(de.api_endpoint, "http://localhost:9000");
    }

    #[test]
    fn test_unknown_region_in_profiles() {
        let err = Profiles::parse(r#"{"regions": {"XX": {"profileId": "1"}}}"#).unwrap_err();
        assert_eq!(err.category().tag(), "CONFIG_ERROR");
    }
}
