//! ServiceNow scripted REST incident source.
//!
//! The endpoint returns `{"result": [...], "count": n, "timestamp": "..."}`.
//! Two variants seen in the wild are accepted as well:
//! - the list nested one level deeper (`{"result": {"result": [...], ...}}`)
//! - records delivered as JSON-encoded strings instead of objects

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de, Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::types::{IncidentBatch, IncidentRecord};
use super::{FetchError, IncidentSource};
use crate::config::ServiceNowConfig;

/// Incident source backed by a ServiceNow instance.
pub struct ServiceNowSource {
    client: Client,
    url: String,
    username: String,
    password: String,
    timeout: Duration,
    max_incidents: usize,
}

impl ServiceNowSource {
    /// Create a new ServiceNow source.
    pub fn new(config: &ServiceNowConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(u64::from(config.timeout_secs));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.endpoint(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout,
            max_incidents: config.max_incidents,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IncidentSource for ServiceNowSource {
    fn name(&self) -> &str {
        "servicenow"
    }

    async fn fetch(&self) -> Result<IncidentBatch, FetchError> {
        info!("Fetching high-priority incidents from ServiceNow");
        debug!("ServiceNow endpoint: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(FetchError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if status == 404 {
                format!("API endpoint not found, check servicenow.api_path ({})", body)
            } else {
                body
            };
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let parsed = parse_incident_response(&body)?;
        let fetched = parsed.records.len();

        if parsed.count != fetched as u64 {
            warn!(
                "ServiceNow reported count={} but returned {} records",
                parsed.count, fetched
            );
        }
        debug!("ServiceNow response timestamp: {}", parsed.timestamp);

        let (batch, dropped) = IncidentBatch::bounded(parsed.records, self.max_incidents);
        if dropped > 0 {
            warn!(
                "Fetched {} incidents, processing the first {} ({} dropped)",
                fetched,
                batch.len(),
                dropped
            );
        } else {
            info!("Successfully fetched {} incidents", fetched);
        }

        Ok(batch)
    }
}

/// Parsed incident endpoint response.
#[derive(Debug, Clone)]
pub struct IncidentResponse {
    pub records: Vec<IncidentRecord>,
    /// `count` as reported by the endpoint.
    pub count: u64,
    /// `timestamp` as reported by the endpoint.
    pub timestamp: String,
}

/// Parse and validate an incident endpoint response body.
///
/// The envelope carrying the record array must hold exactly `result`,
/// `count` and `timestamp`. Any deviation from that, or any record missing
/// a required field, fails the whole response.
pub fn parse_incident_response(body: &str) -> Result<IncidentResponse, FetchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("invalid JSON: {}", e)))?;

    let mut envelope = match value {
        Value::Object(envelope) => envelope,
        other => {
            return Err(FetchError::Malformed(format!(
                "expected a JSON object at the top level, got {}",
                json_type(&other)
            )))
        }
    };

    let result = envelope
        .remove("result")
        .ok_or_else(|| FetchError::Malformed("missing 'result' field".to_string()))?;

    let (items, meta) = match result {
        Value::Array(items) => (items, envelope),
        Value::Object(mut inner) => {
            debug!("Detected nested result envelope, extracting inner result array");
            reject_unexpected_keys(&envelope, "top-level envelope")?;
            match inner.remove("result") {
                Some(Value::Array(items)) => (items, inner),
                Some(other) => {
                    return Err(FetchError::Malformed(format!(
                        "nested 'result' must be an array, got {}",
                        json_type(&other)
                    )))
                }
                None => {
                    return Err(FetchError::Malformed(
                        "'result' is an object without a nested 'result' array".to_string(),
                    ))
                }
            }
        }
        other => {
            return Err(FetchError::Malformed(format!(
                "'result' must be an array, got {}",
                json_type(&other)
            )))
        }
    };

    let count = parse_count(&meta)?;
    let timestamp = match meta.get("timestamp") {
        None | Some(Value::Null) => {
            return Err(FetchError::Malformed(
                "missing 'timestamp' field".to_string(),
            ))
        }
        Some(Value::String(ts)) => ts.clone(),
        Some(other) => {
            return Err(FetchError::Malformed(format!(
                "'timestamp' must be a string, got {}",
                json_type(other)
            )))
        }
    };
    reject_unexpected_keys(&meta, "result envelope")?;

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_record(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(IncidentResponse {
        records,
        count,
        timestamp,
    })
}

fn parse_count(meta: &Map<String, Value>) -> Result<u64, FetchError> {
    match meta.get("count") {
        None | Some(Value::Null) => Err(FetchError::Malformed("missing 'count' field".to_string())),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            FetchError::Malformed(format!("'count' must be a non-negative integer, got {}", n))
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| {
            FetchError::Malformed(format!("'count' must be a non-negative integer, got '{}'", s))
        }),
        Some(other) => Err(FetchError::Malformed(format!(
            "'count' must be a number, got {}",
            json_type(other)
        ))),
    }
}

/// Keys other than `count` and `timestamp` left after `result` was taken.
fn reject_unexpected_keys(meta: &Map<String, Value>, what: &str) -> Result<(), FetchError> {
    let unexpected: Vec<&str> = meta
        .keys()
        .map(String::as_str)
        .filter(|key| !matches!(*key, "count" | "timestamp"))
        .collect();
    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(FetchError::Malformed(format!(
            "unexpected key(s) in {}: {}",
            what,
            unexpected.join(", ")
        )))
    }
}

fn parse_record(index: usize, item: Value) -> Result<IncidentRecord, FetchError> {
    let object = match item {
        Value::Object(_) => item,
        Value::String(encoded) => {
            let decoded: Value = serde_json::from_str(&encoded).map_err(|e| {
                FetchError::Malformed(format!("record {}: invalid JSON string: {}", index, e))
            })?;
            if !decoded.is_object() {
                return Err(FetchError::Malformed(format!(
                    "record {}: encoded value is {}, not an object",
                    index,
                    json_type(&decoded)
                )));
            }
            decoded
        }
        other => {
            return Err(FetchError::Malformed(format!(
                "record {}: expected an object, got {}",
                index,
                json_type(&other)
            )))
        }
    };

    let raw: RawIncident = serde_json::from_value(object)
        .map_err(|e| FetchError::Malformed(format!("record {}: {}", index, e)))?;

    if raw.number.trim().is_empty() {
        return Err(FetchError::Malformed(format!(
            "record {}: 'number' is empty",
            index
        )));
    }

    Ok(raw.into())
}

/// Wire shape of a ServiceNow incident.
#[derive(Debug, Deserialize)]
struct RawIncident {
    #[serde(deserialize_with = "scalar")]
    number: String,
    #[serde(deserialize_with = "scalar")]
    short_description: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    description: String,
    #[serde(deserialize_with = "scalar")]
    state: String,
    #[serde(alias = "opened_at", deserialize_with = "scalar")]
    sys_created_on: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    assignment_group: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    cmdb_ci: String,
    #[serde(deserialize_with = "scalar")]
    priority: String,
    #[serde(deserialize_with = "scalar")]
    urgency: String,
    #[serde(deserialize_with = "scalar")]
    impact: String,
}

impl From<RawIncident> for IncidentRecord {
    fn from(raw: RawIncident) -> Self {
        Self {
            identifier: raw.number,
            short_description: raw.short_description,
            full_description: raw.description,
            state: raw.state,
            created_on: raw.sys_created_on,
            assignment_group: raw.assignment_group,
            configuration_item: raw.cmdb_ci,
            priority: raw.priority,
            urgency: raw.urgency,
            impact: raw.impact,
        }
    }
}

/// Text of a scalar field. Reference fields (`{"display_value", "value"}`)
/// resolve to their display value.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map
            .get("display_value")
            .or_else(|| map.get("value"))
            .and_then(scalar_text),
        Value::Null | Value::Array(_) => None,
    }
}

fn scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_text(&value).ok_or_else(|| {
        de::Error::custom(format!(
            "expected a string or number, got {}",
            json_type(&value)
        ))
    })
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(String::new());
    }
    scalar_text(&value).ok_or_else(|| {
        de::Error::custom(format!(
            "expected a string, number or null, got {}",
            json_type(&value)
        ))
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
