//! Request description types.

use serde::Serialize;

use crate::error::Result;

/// Content type for report creation requests.
pub const CREATE_REPORT_CONTENT_TYPE: &str = "application/vnd.createasyncreportrequest.v3+json";

/// Accept type for report status responses.
pub const GET_REPORT_ACCEPT: &str = "application/vnd.getasyncreportresponse.v3+json";

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl RequestMethod {
    /// Convert to reqwest::Method.
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Patch => reqwest::Method::PATCH,
            RequestMethod::Delete => reqwest::Method::DELETE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when the call only reads state.
///
/// The v3 API lists entities with `POST .../list`, so those count as reads.
pub fn is_read(method: RequestMethod, path: &str) -> bool {
    match method {
        RequestMethod::Get => true,
        RequestMethod::Post => path
            .split('?')
            .next()
            .unwrap_or(path)
            .trim_end_matches('/')
            .ends_with("/list"),
        _ => false,
    }
}

/// Per-request options for [`crate::AdsClient::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Override the method-derived mutating classification.
    pub mutating: Option<bool>,
    /// Describe instead of sending when the call mutates.
    pub dry_run: bool,
    /// Skip the cache lookup and always hit the network.
    pub bypass_cache: bool,
    pub content_type: Option<String>,
    pub accept: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set a raw JSON body.
    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn mutating(mut self, mutating: bool) -> Self {
        self.mutating = Some(mutating);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Whether the call changes remote state.
    pub fn is_mutating(&self, method: RequestMethod, path: &str) -> bool {
        self.mutating.unwrap_or_else(|| !is_read(method, path))
    }
}

/// Description of a request that was not sent because of dry-run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WouldSend {
    pub method: RequestMethod,
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_classification() {
        assert!(is_read(RequestMethod::Get, "/v2/profiles"));
        assert!(is_read(RequestMethod::Post, "/sp/campaigns/list"));
        assert!(is_read(RequestMethod::Post, "/sp/campaigns/list/"));
        assert!(!is_read(RequestMethod::Post, "/sp/campaigns"));
        assert!(!is_read(RequestMethod::Post, "/sp/campaigns/delete"));
        assert!(!is_read(RequestMethod::Put, "/sp/campaigns"));
        assert!(!is_read(RequestMethod::Delete, "/sp/campaigns/123"));
    }

    #[test]
    fn test_mutating_override() {
        let opts = RequestOptions::new();
        assert!(opts.is_mutating(RequestMethod::Post, "/reporting/reports"));
        assert!(!opts.is_mutating(RequestMethod::Get, "/reporting/reports/abc"));

        let opts = RequestOptions::new().mutating(false);
        assert!(!opts.is_mutating(RequestMethod::Post, "/sp/targets/bid/recommendations"));
    }

    #[test]
    fn test_would_send_serialization() {
        let would = WouldSend {
            method: RequestMethod::Post,
            url: "https://advertising-api.amazon.com/sp/campaigns".into(),
            query: vec![],
            body: Some(serde_json::json!({"campaigns": []})),
        };
        let json = serde_json::to_value(&would).unwrap();
        assert_eq!(json["method"], "POST");
        assert!(json.get("query").is_none());
        assert_eq!(json["body"]["campaigns"], serde_json::json!([]));
    }
}
