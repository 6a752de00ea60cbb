//! Tools every tenant gets

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::error::{DeskError, Result};
use crate::index::VectorIndex;

const BUILTIN_TIMEOUT: Duration = Duration::from_secs(12);

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DeskError::InvalidInput(format!("Missing required argument '{}'", key)))
}

/// DuckDuckGo instant answers
pub struct SearchWebTool {
    client: reqwest::Client,
    endpoint: String,
}

impl SearchWebTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: "https://api.duckduckgo.com/".to_string(),
        }
    }
}

/// Abstract, else up to three related topics, else a definition
pub fn summarize_instant_answer(data: &Value) -> String {
    if let Some(text) = data["AbstractText"].as_str().filter(|s| !s.is_empty()) {
        return format!("Abstract: {}", text);
    }

    let mut snippets: Vec<&str> = Vec::new();
    if let Some(topics) = data["RelatedTopics"].as_array() {
        for topic in topics {
            if let Some(text) = topic["Text"].as_str() {
                snippets.push(text);
            } else if let Some(nested) = topic["Topics"].as_array() {
                snippets.extend(nested.iter().filter_map(|t| t["Text"].as_str()));
            }
            if snippets.len() >= 3 {
                break;
            }
        }
    }
    if !snippets.is_empty() {
        snippets.truncate(3);
        return format!("Related info: {}", snippets.join(" | "));
    }

    if let Some(def) = data["Definition"].as_str().filter(|s| !s.is_empty()) {
        return format!("Definition: {}", def);
    }

    "No quick answer found. Try rephrasing your query.".to_string()
}

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Web search via DuckDuckGo instant answers; returns a brief summary or snippets"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string", "description": "Search query"}},
            "required": ["query"]
        })
    }

    async fn call(&self, _tenant_id: &str, args: Value) -> Result<String> {
        let query = required_str(&args, "query")?;
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .timeout(BUILTIN_TIMEOUT)
            .send()
            .await
            .map_err(|e| DeskError::Tool(format!("Search failed: {}", e)))?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| DeskError::Tool(format!("Search failed: {}", e)))?;
        Ok(summarize_instant_answer(&data))
    }
}

/// Open-Meteo current conditions
pub struct WeatherTool {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(BUILTIN_TIMEOUT)
            .send()
            .await
            .map_err(|e| DeskError::Tool(format!("Weather lookup failed: {}", e)))?;
        if !response.status().is_success() {
            return Ok(Value::Null);
        }
        response
            .json()
            .await
            .map_err(|e| DeskError::Tool(format!("Weather lookup failed: {}", e)))
    }
}

fn number(v: &Value) -> String {
    match v {
        Value::Null => "n/a".to_string(),
        other => other.to_string(),
    }
}

/// One-line weather report from Open-Meteo's `current` block
pub fn format_weather(place: &str, current: &Value) -> String {
    let is_day = current["is_day"].as_i64().unwrap_or(1) != 0;
    let mut out = format!(
        "Weather in {} ({}): temp {}°C (feels like {}°C), humidity {}%, wind {} km/h",
        place,
        if is_day { "day" } else { "night" },
        number(&current["temperature_2m"]),
        number(&current["apparent_temperature"]),
        number(&current["relative_humidity_2m"]),
        current["wind_speed_10m"].as_f64().unwrap_or(0.0),
    );
    let precipitation = current["precipitation"].as_f64().unwrap_or(0.0);
    if precipitation > 0.0 {
        out.push_str(&format!(", precipitation {} mm", precipitation));
    }
    out
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Current weather for a city using the Open-Meteo API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"city": {"type": "string", "description": "City name"}},
            "required": ["city"]
        })
    }

    async fn call(&self, _tenant_id: &str, args: Value) -> Result<String> {
        let city = required_str(&args, "city")?;

        let geo = self
            .get_json(
                &self.geocoding_url,
                &[
                    ("name", city.to_string()),
                    ("count", "1".to_string()),
                    ("language", "en".to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;
        let Some(loc) = geo["results"].as_array().and_then(|r| r.first()) else {
            return Ok(format!(
                "Could not find city '{}'. Please check the spelling.",
                city
            ));
        };

        let (Some(lat), Some(lon)) = (loc["latitude"].as_f64(), loc["longitude"].as_f64()) else {
            return Err(DeskError::Tool(
                "Weather lookup failed: geocoding result without coordinates".to_string(),
            ));
        };
        let place = format!(
            "{}, {}",
            loc["name"].as_str().unwrap_or(city),
            loc["country_code"].as_str().unwrap_or("")
        )
        .trim_end_matches([',', ' '])
        .to_string();

        let forecast = self
            .get_json(
                &self.forecast_url,
                &[
                    ("latitude", lat.to_string()),
                    ("longitude", lon.to_string()),
                    (
                        "current",
                        "temperature_2m,precipitation,relative_humidity_2m,apparent_temperature,is_day,weather_code,wind_speed_10m"
                            .to_string(),
                    ),
                    ("timezone", "auto".to_string()),
                ],
            )
            .await?;

        Ok(format_weather(&place, &forecast["current"]))
    }
}

/// Index statistics for the calling tenant
pub struct DocumentStatsTool {
    index: VectorIndex,
}

impl DocumentStatsTool {
    pub fn new(index: VectorIndex) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for DocumentStatsTool {
    fn name(&self) -> &str {
        "get_document_stats"
    }

    fn description(&self) -> &str {
        "Statistics about the documents indexed for the current tenant"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, tenant_id: &str, _args: Value) -> Result<String> {
        match self.index.stats(tenant_id)? {
            Some(stats) => Ok(stats.report(tenant_id)),
            None => Err(DeskError::Tool(
                "Error getting document stats: No index found for tenant".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_answer_abstract() {
        let data = json!({"AbstractText": "Rust is a language", "RelatedTopics": [{"Text": "x"}]});
        assert_eq!(summarize_instant_answer(&data), "Abstract: Rust is a language");
    }

    #[test]
    fn test_instant_answer_related_topics_with_nesting() {
        let data = json!({
            "AbstractText": "",
            "RelatedTopics": [
                {"Text": "First"},
                {"Name": "Group", "Topics": [{"Text": "Second"}, {"Text": "Third"}, {"Text": "Fourth"}]}
            ]
        });
        assert_eq!(
            summarize_instant_answer(&data),
            "Related info: First | Second | Third"
        );
    }

    #[test]
    fn test_instant_answer_definition_and_miss() {
        let data = json!({"AbstractText": "", "RelatedTopics": [], "Definition": "A word"});
        assert_eq!(summarize_instant_answer(&data), "Definition: A word");
        assert_eq!(
            summarize_instant_answer(&json!({})),
            "No quick answer found. Try rephrasing your query."
        );
    }

    #[test]
    fn test_format_weather() {
        let current = json!({
            "temperature_2m": 12.5,
            "apparent_temperature": 10.1,
            "relative_humidity_2m": 80,
            "wind_speed_10m": 14.2,
            "is_day": 0,
            "precipitation": 0.4
        });
        assert_eq!(
            format_weather("Oslo, NO", &current),
            "Weather in Oslo, NO (night): temp 12.5°C (feels like 10.1°C), humidity 80%, wind 14.2 km/h, precipitation 0.4 mm"
        );

        let dry = json!({"temperature_2m": 20, "apparent_temperature": 21, "relative_humidity_2m": 40, "wind_speed_10m": 3.0, "is_day": 1, "precipitation": 0.0});
        assert!(format_weather("Lisbon, PT", &dry).ends_with("wind 3 km/h"));
    }

    #[test]
    fn test_required_str() {
        assert_eq!(required_str(&json!({"city": " Oslo "}), "city").unwrap(), "Oslo");
        assert!(required_str(&json!({"city": ""}), "city").is_err());
        assert!(required_str(&json!({}), "city").is_err());
    }
}
