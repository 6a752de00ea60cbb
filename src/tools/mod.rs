//! Tool registry
//!
//! Every tenant sees the built-in tools plus the HTTP tools registered for
//! it. Registrations are persisted and reloaded on startup; call counters
//! and rate-limit clocks live in memory.

mod builtin;
mod http;

pub use builtin::{
    format_weather, summarize_instant_answer, DocumentStatsTool, SearchWebTool, WeatherTool,
};
pub use http::{
    interval_duration, HttpMethod, HttpTool, HttpToolSpec, MAX_ERROR_CHARS, MAX_RATE_LIMIT_SECS,
    MAX_RESPONSE_CHARS,
};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeskError, Result};
use crate::index::VectorIndex;
use crate::storage::{tool_queries, Storage};
use crate::tenants::TenantRegistry;

/// Names reserved by the built-in tools
pub const BUILTIN_TOOL_NAMES: [&str; 3] = ["search_web", "get_weather", "get_document_stats"];

/// Interval used when neither the tool nor the tenant sets one
pub const DEFAULT_MIN_INTERVAL_SECS: f64 = 0.5;

/// Retries advertised in tool metadata
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const HOUR: Duration = Duration::from_secs(3600);

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    async fn call(&self, tenant_id: &str, args: Value) -> Result<String>;
}

/// Cut a string to at most `max` chars
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Registry metadata reported with stats
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub builtin: bool,
    pub enabled: bool,
    pub registered_at: Option<DateTime<Utc>>,
    pub rate_limit_seconds: f64,
    pub max_retries: u32,
}

/// Usage counters for one tool of one tenant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUsage {
    pub tenant_id: String,
    pub name: String,
    pub call_count: u64,
    pub error_count: u64,
    pub last_called: Option<DateTime<Utc>>,
    pub metadata: ToolMetadata,
}

/// Listing entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub builtin: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<HttpToolSpec>,
}

struct Registered {
    spec: HttpToolSpec,
    tool: Arc<HttpTool>,
    enabled: bool,
    registered_at: DateTime<Utc>,
}

#[derive(Default)]
struct Usage {
    call_count: u64,
    error_count: u64,
    last_called: Option<DateTime<Utc>>,
    last_instant: Option<Instant>,
}

struct HourWindow {
    started: Instant,
    calls: i64,
}

type UsageKey = (String, String);

/// Built-in and per-tenant tools with rate limiting and usage stats
#[derive(Clone)]
pub struct ToolRegistry {
    storage: Storage,
    tenants: TenantRegistry,
    client: reqwest::Client,
    builtins: Arc<Vec<Arc<dyn Tool>>>,
    dynamic: Arc<DashMap<String, BTreeMap<String, Registered>>>,
    usage: Arc<DashMap<UsageKey, Usage>>,
    hourly: Arc<DashMap<String, HourWindow>>,
}

impl ToolRegistry {
    /// Build the registry and load persisted registrations
    pub fn new(storage: Storage, tenants: TenantRegistry, index: VectorIndex) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(http::USER_AGENT)
            .build()?;
        let builtins: Vec<Arc<dyn Tool>> = vec![
            Arc::new(SearchWebTool::new(client.clone())),
            Arc::new(WeatherTool::new(client.clone())),
            Arc::new(DocumentStatsTool::new(index)),
        ];

        let registry = Self {
            storage,
            tenants,
            client,
            builtins: Arc::new(builtins),
            dynamic: Arc::new(DashMap::new()),
            usage: Arc::new(DashMap::new()),
            hourly: Arc::new(DashMap::new()),
        };
        let loaded = registry.load()?;
        if loaded > 0 {
            tracing::info!("Loaded {} tool registrations", loaded);
        }
        Ok(registry)
    }

    fn load(&self) -> Result<usize> {
        let stored = self.storage.with_connection(tool_queries::list_tools)?;
        let count = stored.len();
        for row in stored {
            let tool = Arc::new(HttpTool::new(row.spec.clone(), self.client.clone()));
            self.dynamic.entry(row.tenant_id).or_default().insert(
                row.spec.name.clone(),
                Registered {
                    spec: row.spec,
                    tool,
                    enabled: row.enabled,
                    registered_at: row.registered_at,
                },
            );
        }
        Ok(count)
    }

    /// Register an HTTP tool, replacing one of the same name
    ///
    /// Returns true when an existing registration was replaced.
    pub fn register(&self, tenant_id: &str, spec: HttpToolSpec) -> Result<bool> {
        spec.validate()?;
        self.tenants.get(tenant_id)?;

        let now = Utc::now();
        self.storage
            .with_connection(|conn| tool_queries::upsert_tool(conn, tenant_id, &spec, true, now))?;

        let name = spec.name.clone();
        let tool = Arc::new(HttpTool::new(spec.clone(), self.client.clone()));
        let replaced = self
            .dynamic
            .entry(tenant_id.to_string())
            .or_default()
            .insert(
                name.clone(),
                Registered {
                    spec,
                    tool,
                    enabled: true,
                    registered_at: now,
                },
            )
            .is_some();

        tracing::info!("Registered tool '{}' for tenant '{}'", name, tenant_id);
        Ok(replaced)
    }

    /// Remove a tenant tool; false when it was not registered
    pub fn unregister(&self, tenant_id: &str, name: &str) -> Result<bool> {
        let deleted = self
            .storage
            .with_connection(|conn| tool_queries::delete_tool(conn, tenant_id, name))?;
        let removed = self
            .dynamic
            .get_mut(tenant_id)
            .map(|mut tools| tools.remove(name).is_some())
            .unwrap_or(false);
        self.usage.remove(&(tenant_id.to_string(), name.to_string()));

        let removed = removed || deleted;
        if removed {
            tracing::info!("Unregistered tool '{}' from tenant '{}'", name, tenant_id);
        }
        Ok(removed)
    }

    pub fn set_enabled(&self, tenant_id: &str, name: &str, enabled: bool) -> Result<()> {
        let changed = self.storage.with_connection(|conn| {
            tool_queries::set_tool_enabled(conn, tenant_id, name, enabled)
        })?;
        if !changed {
            return Err(DeskError::not_found("Tool", name));
        }
        if let Some(mut tools) = self.dynamic.get_mut(tenant_id) {
            if let Some(entry) = tools.get_mut(name) {
                entry.enabled = enabled;
            }
        }
        Ok(())
    }

    /// Built-ins followed by the tenant's enabled tools
    pub fn tools_for_tenant(&self, tenant_id: &str) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self.builtins.iter().cloned().collect();
        if let Some(registered) = self.dynamic.get(tenant_id) {
            tools.extend(
                registered
                    .values()
                    .filter(|r| r.enabled)
                    .map(|r| r.tool.clone() as Arc<dyn Tool>),
            );
        }
        tools
    }

    /// Every tool visible to the tenant, disabled ones included
    pub fn list(&self, tenant_id: &str) -> Vec<ToolInfo> {
        let mut out: Vec<ToolInfo> = self
            .builtins
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
                builtin: true,
                enabled: true,
                spec: None,
            })
            .collect();
        if let Some(registered) = self.dynamic.get(tenant_id) {
            out.extend(registered.values().map(|r| ToolInfo {
                name: r.spec.name.clone(),
                description: r.spec.description.clone(),
                parameters: r.tool.parameters(),
                builtin: false,
                enabled: r.enabled,
                spec: Some(r.spec.clone()),
            }));
        }
        out
    }

    fn is_builtin(name: &str) -> bool {
        BUILTIN_TOOL_NAMES.contains(&name)
    }

    /// Call a tool for a tenant
    ///
    /// Fails with `RateLimited` when called again inside the tool's minimum
    /// interval or past the tenant's hourly quota.
    pub async fn invoke(&self, tenant_id: &str, name: &str, args: Value) -> Result<String> {
        let tenant = self.tenants.get_active(tenant_id)?;

        let (tool, interval) = if Self::is_builtin(name) {
            let tool = self
                .builtins
                .iter()
                .find(|t| t.name() == name)
                .cloned()
                .ok_or_else(|| DeskError::not_found("Tool", name))?;
            let interval = tenant
                .rate_limit_for(name)
                .unwrap_or(DEFAULT_MIN_INTERVAL_SECS);
            (tool, interval)
        } else {
            let registered = self
                .dynamic
                .get(tenant_id)
                .ok_or_else(|| DeskError::not_found("Tool", name))?;
            let entry = registered
                .get(name)
                .ok_or_else(|| DeskError::not_found("Tool", name))?;
            if !entry.enabled {
                return Err(DeskError::InvalidInput(format!("Tool '{}' is disabled", name)));
            }
            (entry.tool.clone() as Arc<dyn Tool>, entry.spec.min_interval())
        };

        let key = (tenant_id.to_string(), name.to_string());
        {
            let mut usage = self.usage.entry(key.clone()).or_default();
            usage.call_count += 1;
            let now = Instant::now();
            if let Some(last) = usage.last_instant {
                let min = interval_duration(interval);
                let elapsed = now.duration_since(last);
                if elapsed < min {
                    let wait = (min - elapsed).as_millis() as u64;
                    tracing::debug!("Tool {} rate limited for tenant {}", name, tenant_id);
                    return Err(DeskError::RateLimited(wait.max(1)));
                }
            }
            // only calls that pass the interval count against the hourly quota
            self.check_hourly_quota(tenant_id, tenant.max_api_calls_per_hour)?;
            usage.last_instant = Some(now);
            usage.last_called = Some(Utc::now());
        }

        let result = tool.call(tenant_id, args).await;
        if let Err(e) = &result {
            tracing::warn!("Tool {} failed for tenant {}: {}", name, tenant_id, e);
            if let Some(mut usage) = self.usage.get_mut(&key) {
                usage.error_count += 1;
            }
        }
        result
    }

    fn check_hourly_quota(&self, tenant_id: &str, max_calls: i64) -> Result<()> {
        let mut window = self
            .hourly
            .entry(tenant_id.to_string())
            .or_insert_with(|| HourWindow {
                started: Instant::now(),
                calls: 0,
            });
        let elapsed = window.started.elapsed();
        if elapsed >= HOUR {
            window.started = Instant::now();
            window.calls = 0;
        } else if window.calls >= max_calls {
            let wait = (HOUR - elapsed).as_millis() as u64;
            return Err(DeskError::RateLimited(wait));
        }
        window.calls += 1;
        Ok(())
    }

    fn metadata_for(&self, tenant_id: &str, name: &str) -> ToolMetadata {
        if Self::is_builtin(name) {
            let rate = self
                .tenants
                .find(tenant_id)
                .ok()
                .flatten()
                .and_then(|t| t.rate_limit_for(name))
                .unwrap_or(DEFAULT_MIN_INTERVAL_SECS);
            return ToolMetadata {
                builtin: true,
                enabled: true,
                registered_at: None,
                rate_limit_seconds: rate,
                max_retries: DEFAULT_MAX_RETRIES,
            };
        }
        let registered = self
            .dynamic
            .get(tenant_id)
            .and_then(|tools| tools.get(name).map(|r| (r.enabled, r.registered_at, r.spec.min_interval())));
        match registered {
            Some((enabled, registered_at, rate)) => ToolMetadata {
                builtin: false,
                enabled,
                registered_at: Some(registered_at),
                rate_limit_seconds: rate,
                max_retries: DEFAULT_MAX_RETRIES,
            },
            None => ToolMetadata {
                builtin: false,
                enabled: false,
                registered_at: None,
                rate_limit_seconds: DEFAULT_MIN_INTERVAL_SECS,
                max_retries: DEFAULT_MAX_RETRIES,
            },
        }
    }

    /// Usage for one tenant's visible tools, or for everything ever used or registered
    pub fn stats(&self, tenant_id: Option<&str>) -> Vec<ToolUsage> {
        let keys: BTreeSet<UsageKey> = match tenant_id {
            Some(tenant) => self
                .tools_for_tenant(tenant)
                .iter()
                .map(|t| (tenant.to_string(), t.name().to_string()))
                .collect(),
            None => {
                let mut keys: BTreeSet<UsageKey> =
                    self.usage.iter().map(|e| e.key().clone()).collect();
                for entry in self.dynamic.iter() {
                    for name in entry.value().keys() {
                        keys.insert((entry.key().clone(), name.clone()));
                    }
                }
                keys
            }
        };

        keys.into_iter()
            .map(|(tenant, name)| {
                let (call_count, error_count, last_called) = self
                    .usage
                    .get(&(tenant.clone(), name.clone()))
                    .map(|u| (u.call_count, u.error_count, u.last_called))
                    .unwrap_or((0, 0, None));
                let metadata = self.metadata_for(&tenant, &name);
                ToolUsage {
                    tenant_id: tenant,
                    name,
                    call_count,
                    error_count,
                    last_called,
                    metadata,
                }
            })
            .collect()
    }

    /// Register a few public APIs so a new tenant has something to try
    pub fn setup_sample_tools(&self, tenant_id: &str) -> Result<Vec<String>> {
        let samples = vec![
            HttpToolSpec::get(
                "public_holidays",
                "Public holidays by country. Path: /PublicHolidays/{year}/{country_code}",
            )
            .base_url("https://date.nager.at/api/v3"),
            HttpToolSpec::get(
                "country_info",
                "Facts about a country. Path: /name/{country}",
            )
            .base_url("https://restcountries.com/v3.1"),
            HttpToolSpec::post(
                "echo_post",
                "Echo a JSON payload back, for testing integrations. Path: /post",
            )
            .base_url("https://httpbin.org"),
        ];

        let mut names = Vec::with_capacity(samples.len());
        for spec in samples {
            names.push(spec.name.clone());
            self.register(tenant_id, spec)?;
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use crate::tenants::{NewTenant, DEFAULT_MAX_API_CALLS_PER_HOUR};
    use serde_json::json;

    fn registry() -> (Storage, ToolRegistry) {
        let storage = Storage::open_in_memory().unwrap();
        let tenants = TenantRegistry::new(storage.clone());
        tenants.create_tenant(NewTenant::new("acme", "Acme")).unwrap();
        tenants.create_tenant(NewTenant::new("globex", "Globex")).unwrap();
        let index = VectorIndex::new(storage.clone(), Arc::new(HashedEmbedder::new(64)));
        let registry = ToolRegistry::new(storage.clone(), tenants, index).unwrap();
        (storage, registry)
    }

    fn orders_spec() -> HttpToolSpec {
        HttpToolSpec::get("orders", "Order lookup").base_url("https://api.example.com")
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_builtins_visible_to_every_tenant() {
        let (_, registry) = registry();
        let names: Vec<String> = registry
            .tools_for_tenant("acme")
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["search_web", "get_weather", "get_document_stats"]);
    }

    #[test]
    fn test_register_replaces_and_isolates() {
        let (_, registry) = registry();
        assert!(!registry.register("acme", orders_spec()).unwrap());
        assert!(registry.register("acme", orders_spec()).unwrap());

        assert_eq!(registry.tools_for_tenant("acme").len(), 4);
        assert_eq!(registry.tools_for_tenant("globex").len(), 3);

        assert!(registry.unregister("acme", "orders").unwrap());
        assert!(!registry.unregister("acme", "orders").unwrap());
        assert!(registry.register("ghost", orders_spec()).is_err());
    }

    #[test]
    fn test_registrations_survive_reload() {
        let (storage, registry) = registry();
        registry.register("acme", orders_spec()).unwrap();
        registry.set_enabled("acme", "orders", false).unwrap();

        let index = VectorIndex::new(storage.clone(), Arc::new(HashedEmbedder::new(64)));
        let reloaded =
            ToolRegistry::new(storage.clone(), TenantRegistry::new(storage), index).unwrap();
        let listed = reloaded.list("acme");
        let orders = listed.iter().find(|t| t.name == "orders").unwrap();
        assert!(!orders.enabled);
        assert_eq!(reloaded.tools_for_tenant("acme").len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_and_unknown_tools() {
        let (_, registry) = registry();
        registry.register("acme", orders_spec()).unwrap();
        registry.set_enabled("acme", "orders", false).unwrap();

        let err = registry.invoke("acme", "orders", json!({})).await.unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput(_)));

        let err = registry.invoke("acme", "nope", json!({})).await.unwrap_err();
        assert!(matches!(err, DeskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_and_error_counting() {
        let (_, registry) = registry();

        // no documents: the stats tool fails, which counts as an error
        let first = registry.invoke("acme", "get_document_stats", json!({})).await;
        assert!(matches!(first, Err(DeskError::Tool(_))));

        let second = registry
            .invoke("acme", "get_document_stats", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(second, DeskError::RateLimited(_)));
        assert_eq!(second.to_string(), "Rate limited. Please retry shortly.");

        // limits are per tenant
        assert!(matches!(
            registry.invoke("globex", "get_document_stats", json!({})).await,
            Err(DeskError::Tool(_))
        ));

        let stats = registry.stats(Some("acme"));
        let doc_stats = stats.iter().find(|s| s.name == "get_document_stats").unwrap();
        assert_eq!(doc_stats.call_count, 2);
        assert_eq!(doc_stats.error_count, 1);
        assert!(doc_stats.last_called.is_some());
        assert!(doc_stats.metadata.builtin);
        assert_eq!(doc_stats.metadata.rate_limit_seconds, 0.5);
    }

    #[tokio::test]
    async fn test_hourly_quota() {
        let (_, registry) = registry();
        registry.check_hourly_quota("acme", 2).unwrap();
        registry.check_hourly_quota("acme", 2).unwrap();
        assert!(matches!(
            registry.check_hourly_quota("acme", 2),
            Err(DeskError::RateLimited(_))
        ));
        registry.check_hourly_quota("globex", 2).unwrap();
    }

    #[tokio::test]
    async fn test_invoke_charges_quota_only_for_admitted_calls() {
        let (_, registry) = registry();

        let _ = registry.invoke("acme", "get_document_stats", json!({})).await;
        let limited = registry.invoke("acme", "get_document_stats", json!({})).await;
        assert!(matches!(limited, Err(DeskError::RateLimited(_))));
        assert_eq!(registry.hourly.get("acme").unwrap().calls, 1);

        // an exhausted hourly window rejects calls the interval would admit
        registry.hourly.insert(
            "globex".to_string(),
            HourWindow {
                started: Instant::now(),
                calls: DEFAULT_MAX_API_CALLS_PER_HOUR,
            },
        );
        match registry.invoke("globex", "get_document_stats", json!({})).await {
            Err(DeskError::RateLimited(wait)) => assert!(wait > 60_000),
            other => panic!("expected hourly limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_interval_does_not_panic() {
        let (storage, registry) = registry();
        let spec = HttpToolSpec {
            rate_limit_seconds: Some(1e300),
            ..orders_spec()
        };
        assert!(matches!(registry.register("acme", spec), Err(DeskError::InvalidInput(_))));

        // a stored spec that bypassed validation is capped at invoke time
        storage
            .with_connection(|conn| {
                conn.execute(
                    "UPDATE tenants SET rate_limits = ?1 WHERE tenant_id = 'acme'",
                    [r#"{"get_document_stats": 1e300}"#],
                )?;
                Ok(())
            })
            .unwrap();
        let _ = registry.invoke("acme", "get_document_stats", json!({})).await;
        let second = registry.invoke("acme", "get_document_stats", json!({})).await;
        match second {
            Err(DeskError::RateLimited(wait)) => assert!(wait <= 86_400_000),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_sample_tools_and_global_stats() {
        let (_, registry) = registry();
        let names = registry.setup_sample_tools("acme").unwrap();
        assert_eq!(names, vec!["public_holidays", "country_info", "echo_post"]);

        let all = registry.stats(None);
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|u| u.tenant_id == "acme" && u.call_count == 0));
        let echo = all.iter().find(|u| u.name == "echo_post").unwrap();
        assert_eq!(echo.metadata.rate_limit_seconds, 1.0);
    }
}
