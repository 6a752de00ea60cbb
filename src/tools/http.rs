//! Configurable HTTP API wrappers registered per tenant

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{truncate_chars, Tool, BUILTIN_TOOL_NAMES};
use crate::error::{DeskError, Result};

/// Successful response bodies are cut to this many characters
pub const MAX_RESPONSE_CHARS: usize = 4000;

/// Error response bodies are cut to this many characters
pub const MAX_ERROR_CHARS: usize = 800;

pub const USER_AGENT: &str = "SupportDesk/1.0";

/// Longest accepted minimum interval between calls (one day)
pub const MAX_RATE_LIMIT_SECS: f64 = 86_400.0;

static TOOL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").unwrap());

/// Seconds as a call interval, capped at [`MAX_RATE_LIMIT_SECS`]; NaN and negatives mean none
pub fn interval_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(secs.min(MAX_RATE_LIMIT_SECS))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    fn default_timeout_secs(&self) -> u64 {
        match self {
            HttpMethod::Get => 20,
            HttpMethod::Post => 30,
        }
    }

    fn default_rate_limit_seconds(&self) -> f64 {
        match self {
            HttpMethod::Get => 0.5,
            HttpMethod::Post => 1.0,
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            _ => Err(format!("Unsupported HTTP method: {}", s)),
        }
    }
}

/// Registration of an HTTP tool
///
/// The base URL is given directly or read from an environment variable at
/// call time; the API key is always read from the environment so it never
/// lands in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub base_url_env: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Headers sent with every call
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub rate_limit_seconds: Option<f64>,
}

impl HttpToolSpec {
    pub fn get(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_method(name, description, HttpMethod::Get)
    }

    pub fn post(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_method(name, description, HttpMethod::Post)
    }

    fn with_method(name: impl Into<String>, description: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            method,
            base_url: None,
            base_url_env: None,
            api_key_env: None,
            headers: BTreeMap::new(),
            timeout_secs: None,
            rate_limit_seconds: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn base_url_env(mut self, var: impl Into<String>) -> Self {
        self.base_url_env = Some(var.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !TOOL_NAME.is_match(&self.name) {
            return Err(DeskError::InvalidInput(format!(
                "Invalid tool name '{}': use lowercase letters, digits and underscores",
                self.name
            )));
        }
        if BUILTIN_TOOL_NAMES.contains(&self.name.as_str()) {
            return Err(DeskError::Conflict(format!(
                "'{}' is a built-in tool",
                self.name
            )));
        }
        if self.description.trim().is_empty() {
            return Err(DeskError::InvalidInput(
                "Tool description cannot be empty".to_string(),
            ));
        }
        if self.base_url.is_none() && self.base_url_env.is_none() {
            return Err(DeskError::InvalidInput(
                "Tool needs base_url or base_url_env".to_string(),
            ));
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DeskError::InvalidInput(format!(
                    "base_url must be http(s): {}",
                    url
                )));
            }
        }
        if matches!(self.rate_limit_seconds, Some(r) if !(0.0..=MAX_RATE_LIMIT_SECS).contains(&r)) {
            return Err(DeskError::InvalidInput(format!(
                "rate_limit_seconds must be between 0 and {}",
                MAX_RATE_LIMIT_SECS
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .unwrap_or_else(|| self.method.default_timeout_secs())
                .max(1),
        )
    }

    /// Minimum seconds between two calls
    pub fn min_interval(&self) -> f64 {
        self.rate_limit_seconds
            .unwrap_or_else(|| self.method.default_rate_limit_seconds())
    }

    fn resolve_base_url(&self) -> Result<String> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        let var = self.base_url_env.as_deref().unwrap_or_default();
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                DeskError::Tool(format!(
                    "HTTP {} tool misconfigured: missing env {}",
                    self.method.as_str(),
                    var
                ))
            })
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Join base and path with exactly one slash
fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

fn string_map(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = value else {
        return vec![];
    };
    map.iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// Live HTTP tool built from a spec
pub struct HttpTool {
    spec: HttpToolSpec,
    client: reqwest::Client,
}

impl HttpTool {
    pub fn new(spec: HttpToolSpec, client: reqwest::Client) -> Self {
        Self { spec, client }
    }

    pub fn spec(&self) -> &HttpToolSpec {
        &self.spec
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters(&self) -> Value {
        match self.spec.method {
            HttpMethod::Get => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "URL path appended to the base URL, starting with '/'"},
                    "query": {"type": "object", "description": "Query parameters as key-value map"},
                    "headers": {"type": "object", "description": "Additional headers"}
                },
                "required": ["path"]
            }),
            HttpMethod::Post => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "URL path appended to the base URL"},
                    "data": {"type": "object", "description": "JSON body"},
                    "headers": {"type": "object", "description": "Additional headers"}
                },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, _tenant_id: &str, args: Value) -> Result<String> {
        let method = self.spec.method.as_str();
        let base = self.spec.resolve_base_url()?;
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");
        let url = join_url(&base, path);
        let empty_body = json!({});

        let mut request = match self.spec.method {
            HttpMethod::Get => self
                .client
                .get(&url)
                .query(&string_map(args.get("query"))),
            HttpMethod::Post => self
                .client
                .post(&url)
                .json(args.get("data").unwrap_or(&empty_body)),
        }
        .timeout(self.spec.timeout())
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::USER_AGENT, USER_AGENT);

        if let Some(key) = self.spec.resolve_api_key() {
            request = request.bearer_auth(key);
        }
        for (k, v) in &self.spec.headers {
            request = request.header(k.as_str(), v.as_str());
        }
        for (k, v) in string_map(args.get("headers")) {
            request = request.header(k, v);
        }

        tracing::info!("HTTP {} {} for tool {}", method, url, self.spec.name);
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeskError::Tool(format!(
                    "HTTP {} timeout after {}s",
                    method,
                    self.spec.timeout().as_secs()
                ))
            } else {
                DeskError::Tool(format!("HTTP {} error: {}", method, e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeskError::Tool(format!("HTTP {} error: {}", method, e)))?;

        if status.is_success() {
            Ok(truncate_chars(&body, MAX_RESPONSE_CHARS))
        } else {
            tracing::warn!("HTTP {} failed for {}: {}", method, self.spec.name, status);
            Err(DeskError::Tool(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_chars(&body, MAX_ERROR_CHARS)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults_by_method() {
        let get = HttpToolSpec::get("orders", "Order lookup").base_url("https://api.example.com");
        assert_eq!(get.timeout(), Duration::from_secs(20));
        assert_eq!(get.min_interval(), 0.5);

        let post = HttpToolSpec::post("create_lead", "CRM").base_url_env("CRM_URL");
        assert_eq!(post.timeout(), Duration::from_secs(30));
        assert_eq!(post.min_interval(), 1.0);
    }

    #[test]
    fn test_spec_validation() {
        let ok = HttpToolSpec::get("orders", "Order lookup").base_url("https://api.example.com");
        assert!(ok.validate().is_ok());

        assert!(HttpToolSpec::get("Bad Name", "x").base_url("https://a").validate().is_err());
        assert!(HttpToolSpec::get("orders", "x").validate().is_err());
        assert!(HttpToolSpec::get("orders", "x").base_url("ftp://a").validate().is_err());
        assert!(matches!(
            HttpToolSpec::get("search_web", "x").base_url("https://a").validate(),
            Err(DeskError::Conflict(_))
        ));

        let limited = |secs: f64| HttpToolSpec {
            rate_limit_seconds: Some(secs),
            ..HttpToolSpec::get("orders", "x").base_url("https://a")
        };
        assert!(limited(0.0).validate().is_ok());
        assert!(limited(MAX_RATE_LIMIT_SECS).validate().is_ok());
        assert!(limited(MAX_RATE_LIMIT_SECS + 1.0).validate().is_err());
        assert!(limited(1e300).validate().is_err());
        assert!(limited(f64::INFINITY).validate().is_err());
        assert!(limited(f64::NAN).validate().is_err());
        assert!(limited(-1.0).validate().is_err());
    }

    #[test]
    fn test_interval_duration_is_bounded() {
        assert_eq!(interval_duration(0.5), Duration::from_millis(500));
        assert_eq!(interval_duration(1e300), Duration::from_secs(86_400));
        assert_eq!(interval_duration(f64::INFINITY), Duration::from_secs(86_400));
        assert_eq!(interval_duration(f64::NAN), Duration::ZERO);
        assert_eq!(interval_duration(-3.0), Duration::ZERO);
    }

    #[test]
    fn test_spec_json_shape() {
        let spec: HttpToolSpec = serde_json::from_value(json!({
            "name": "crm",
            "description": "CRM lookups",
            "method": "POST",
            "base_url_env": "CRM_URL",
            "api_key_env": "CRM_KEY"
        }))
        .unwrap();
        assert_eq!(spec.method, HttpMethod::Post);
        assert!(spec.headers.is_empty());
        assert_eq!(serde_json::to_value(&spec).unwrap()["method"], "POST");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.com/", "/v1/x"), "https://a.com/v1/x");
        assert_eq!(join_url("https://a.com", "v1"), "https://a.com/v1");
        assert_eq!(join_url("https://a.com/", ""), "https://a.com");
    }

    #[tokio::test]
    async fn test_missing_base_url_env() {
        let spec = HttpToolSpec::get("orders", "Orders").base_url_env("SUPPORTDESK_TEST_UNSET_BASE");
        let tool = HttpTool::new(spec, reqwest::Client::new());
        let err = tool.call("acme", json!({"path": "/x"})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tool error: HTTP GET tool misconfigured: missing env SUPPORTDESK_TEST_UNSET_BASE"
        );
    }

    #[test]
    fn test_string_map_stringifies_values() {
        let pairs = string_map(Some(&json!({"page": 2, "q": "refund"})));
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
        assert!(pairs.contains(&("q".to_string(), "refund".to_string())));
        assert!(string_map(None).is_empty());
    }
}
