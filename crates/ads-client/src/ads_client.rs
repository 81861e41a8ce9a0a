//! High-level Advertising API client.
//!
//! `AdsClient` combines a [`TokenSource`], the marketplace [`RegionTable`] and
//! the response cache with [`AdsHttpClient`], and is what domain code calls.
//!
//! ## Request flow
//!
//! 1. Reads not marked `bypass_cache` are served from the cache when live.
//! 2. Mutations in dry-run mode return a description instead of being sent.
//! 3. The call is executed with retries for 429, 5xx and network failures.
//!    A 401 triggers one forced credential refresh and a replay that shares
//!    the same attempt budget.
//! 4. Successful mutations invalidate their resource family in the same
//!    region; successful reads are stored.
//!
//! ## Security
//!
//! Credentials never appear in Debug output or tracing spans.

use std::sync::Arc;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cache::{cache_key, resource_prefix, ResponseCache};
use crate::chunk::chunk;
use crate::client::{AdsHttpClient, HttpRequest};
use crate::config::ClientConfig;
use crate::credential::{Credential, TokenSource};
use crate::error::{Error, ErrorKind, Result};
use crate::region::{Region, RegionProfile, RegionTable};
use crate::request::{is_read, RequestMethod, RequestOptions, WouldSend};
use crate::response::Response;
use crate::retry::Sleeper;

const CLIENT_ID_HEADER: &str = "Amazon-Advertising-API-ClientId";
const SCOPE_HEADER: &str = "Amazon-Advertising-API-Scope";

/// Token-aware, cached, retrying client for the Advertising API.
#[derive(Clone)]
pub struct AdsClient {
    http: AdsHttpClient,
    tokens: Arc<dyn TokenSource>,
    regions: Arc<RegionTable>,
    cache: Arc<ResponseCache>,
}

impl std::fmt::Debug for AdsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsClient")
            .field("regions", &self.regions.regions())
            .field("cache_entries", &self.cache.len())
            .field("dry_run", &self.http.config().dry_run)
            .finish_non_exhaustive()
    }
}

impl AdsClient {
    /// Create a client. The cache is built from `config`.
    pub fn new(
        config: ClientConfig,
        tokens: Arc<dyn TokenSource>,
        regions: RegionTable,
    ) -> Result<Self> {
        let cache = if config.cache_enabled {
            ResponseCache::new(config.cache_ttl)
        } else {
            ResponseCache::disabled()
        };

        Ok(Self {
            http: AdsHttpClient::new(config)?,
            tokens,
            regions: Arc::new(regions),
            cache: Arc::new(cache),
        })
    }

    /// Use a caller-provided cache (for example one driven by a manual clock).
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.http = self.http.with_sleeper(sleeper);
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    pub fn http(&self) -> &AdsHttpClient {
        &self.http
    }

    pub fn is_dry_run(&self) -> bool {
        self.http.config().dry_run
    }

    /// Build the full URL for a path in a region.
    pub fn url(&self, region: Region, path: &str) -> Result<Url> {
        let profile = self.regions.get(region)?;
        endpoint_url(profile, path)
    }

    /// Perform one logical request.
    #[instrument(skip(self, opts), fields(method = %method, region = %region))]
    pub async fn request(
        &self,
        method: RequestMethod,
        path: &str,
        region: Region,
        opts: RequestOptions,
    ) -> Result<Response> {
        let profile = self.regions.get(region)?;
        let base_url = endpoint_url(profile, path)?;
        let mutating = opts.is_mutating(method, path);

        let key = (!mutating && is_read(method, path))
            .then(|| cache_key(method, path, &opts.query, opts.body.as_ref()));

        if let Some(ref key) = key {
            if !opts.bypass_cache {
                if let Some(body) = self.cache.get(region, key) {
                    debug!(path, "Cache hit");
                    return Ok(Response::from_cache(body));
                }
            }
        }

        if mutating && (opts.dry_run || self.is_dry_run()) {
            info!(path, "Dry run, mutation not sent");
            return Ok(Response::dry_run(WouldSend {
                method,
                url: base_url.to_string(),
                query: opts.query.clone(),
                body: opts.body.clone(),
            }));
        }

        let mut url = base_url;
        if !opts.query.is_empty() {
            url.query_pairs_mut().extend_pairs(opts.query.iter());
        }

        let body = opts
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()?
            .map(Bytes::from);

        let generation = self.cache.generation(region);
        let mut policy = self.http.retry_policy();
        let mut credential = self.tokens.token(profile.auth_region).await?;
        let mut refreshed = false;

        let response = loop {
            let request = self.build_request(method, &url, profile, &credential, body.clone(), &opts);

            match self.http.execute(&request, &mut policy).await {
                Ok(response) => break response,
                Err(err) if err.is_auth_error() && !refreshed => {
                    warn!(auth_region = %profile.auth_region, "Credential rejected, refreshing");
                    credential = self.tokens.force_refresh(profile.auth_region).await?;
                    refreshed = true;
                }
                Err(err) if err.is_auth_error() => {
                    return Err(Error::with_source(
                        ErrorKind::Authentication(format!(
                            "request rejected after credential refresh for {}",
                            profile.auth_region
                        )),
                        err,
                    ));
                }
                Err(err) => return Err(err),
            }
        };

        if mutating {
            self.cache.invalidate(region, &resource_prefix(path));
        } else if let Some(key) = key {
            self.cache.set_if_generation(
                region,
                generation,
                key,
                path,
                response.bytes().clone(),
                None,
            );
        }

        Ok(response)
    }

    fn build_request(
        &self,
        method: RequestMethod,
        url: &Url,
        profile: &RegionProfile,
        credential: &Credential,
        body: Option<Bytes>,
        opts: &RequestOptions,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(method, url.clone())
            .header(
                "Authorization",
                format!("Bearer {}", credential.access_token()),
            )
            .header(CLIENT_ID_HEADER, self.http.config().client_id.as_str())
            .header(
                "Accept",
                opts.accept.as_deref().unwrap_or("application/json"),
            );

        if !profile.profile_id.is_empty() {
            request = request.header(SCOPE_HEADER, profile.profile_id.as_str());
        }

        if let Some(body) = body {
            request = request
                .header(
                    "Content-Type",
                    opts.content_type.as_deref().unwrap_or("application/json"),
                )
                .body(body);
        }

        request
    }

    /// GET a presigned URL with the client's retry policy and no credentials.
    pub async fn fetch_external(&self, url: &str) -> Result<Response> {
        self.http.fetch_external(url).await
    }

    // =========================================================================
    // Typed JSON Methods
    // =========================================================================

    /// GET and deserialize.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, region: Region) -> Result<T> {
        self.request(RequestMethod::Get, path, region, RequestOptions::new())
            .await?
            .json()
    }

    /// POST a JSON body and deserialize the response.
    ///
    /// Paths ending in `/list` are reads and go through the cache.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        region: Region,
        body: &B,
    ) -> Result<T> {
        let opts = RequestOptions::new().json(body)?;
        self.request(RequestMethod::Post, path, region, opts)
            .await?
            .json()
    }

    /// PUT a JSON body and deserialize the response.
    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        region: Region,
        body: &B,
    ) -> Result<T> {
        let opts = RequestOptions::new().json(body)?;
        self.request(RequestMethod::Put, path, region, opts)
            .await?
            .json()
    }

    /// DELETE and deserialize the response.
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str, region: Region) -> Result<T> {
        self.request(RequestMethod::Delete, path, region, RequestOptions::new())
            .await?
            .json()
    }

    /// Send `items` as `{field: [...]}` bodies in batches of at most `max_size`.
    ///
    /// One mutating call per batch, in order. Stops at the first failing batch.
    pub async fn send_chunked<T: Serialize>(
        &self,
        method: RequestMethod,
        path: &str,
        region: Region,
        field: &str,
        items: Vec<T>,
        max_size: usize,
    ) -> Result<Vec<Response>> {
        let batches = chunk(items, max_size);
        let total = batches.len();
        let mut responses = Vec::with_capacity(total);

        for (index, batch) in batches.into_iter().enumerate() {
            debug!(batch = index + 1, total, size = batch.len(), "Sending batch");
            let mut body = serde_json::Map::new();
            body.insert(field.to_string(), serde_json::to_value(&batch)?);
            let opts = RequestOptions::new()
                .json_value(serde_json::Value::Object(body))
                .mutating(true);
            responses.push(self.request(method, path, region, opts).await?);
        }

        Ok(responses)
    }
}

fn endpoint_url(profile: &RegionProfile, path: &str) -> Result<Url> {
    let endpoint = profile.api_endpoint.trim_end_matches('/');
    let url = if path.starts_with('/') {
        format!("{}{}", endpoint, path)
    } else {
        format!("{}/{}", endpoint, path)
    };
    Ok(Url::parse(&url)?)
}
