// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Typed client for the monitoring agent's read-only REST API (info, charts, data).

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const INFO_PATH: &str = "/api/v1/info";
const CHARTS_PATH: &str = "/api/v1/charts";
const DATA_PATH: &str = "/api/v1/data";

#[derive(Clone)]
pub struct AgentClient {
    client: reqwest::Client,
}

impl AgentClient {
    pub fn new(timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("netdash/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|source| AgentError::Network {
                context: "failed to build http client",
                source,
            })?;
        Ok(Self { client })
    }

    /// Liveness probe used by connection tests.
    pub async fn info(&self, base_url: &str) -> Result<Value, AgentError> {
        let url = format!("{}{}", base_url, INFO_PATH);
        let body = self.get_json(&url, "Failed to connect to instance").await?;
        Ok(body)
    }

    pub async fn charts(&self, base_url: &str) -> Result<ChartCatalog, AgentError> {
        let url = format!("{}{}", base_url, CHARTS_PATH);
        let body = self.get_json(&url, "Failed to fetch metrics").await?;
        serde_json::from_value(body)
            .map_err(|err| AgentError::Malformed(format!("invalid chart catalog: {err}")))
    }

    pub async fn data(&self, base_url: &str, query: &DataQuery) -> Result<Vec<DataRow>, AgentError> {
        let url = format!("{}{}", base_url, DATA_PATH);
        let res = self
            .client
            .get(url)
            .query(&[
                ("chart", query.chart.clone()),
                ("format", "json".to_string()),
                ("after", query.after.to_string()),
                ("before", query.before.to_string()),
                ("points", query.points.to_string()),
            ])
            .send()
            .await
            .map_err(|source| AgentError::Network {
                context: "Failed to fetch data",
                source,
            })?;
        let body = decode_body(res, "Failed to fetch data").await?;
        parse_data_rows(&body)
    }

    async fn get_json(&self, url: &str, context: &'static str) -> Result<Value, AgentError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| AgentError::Network { context, source })?;
        decode_body(res, context).await
    }
}

async fn decode_body(res: reqwest::Response, context: &'static str) -> Result<Value, AgentError> {
    let status = res.status();
    if !status.is_success() {
        return Err(AgentError::Status { context, status });
    }
    let text = res
        .text()
        .await
        .map_err(|source| AgentError::Network { context, source })?;
    serde_json::from_str(&text)
        .map_err(|err| AgentError::Malformed(format!("response is not valid JSON: {err}")))
}

/// Query for `/api/v1/data`; `after` and `before` are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQuery {
    pub chart: String,
    pub after: i64,
    pub before: i64,
    pub points: u32,
}

/// One `[timestamp, dim1, dim2, ...]` row of a data response.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    /// Unix seconds.
    pub timestamp: i64,
    pub dimensions: Vec<Option<f64>>,
}

impl DataRow {
    /// Value at a raw row index, where index 0 is the timestamp column.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        match index {
            0 => Some(self.timestamp as f64),
            n => self.dimensions.get(n - 1).copied().flatten(),
        }
    }
}

pub fn parse_data_rows(body: &Value) -> Result<Vec<DataRow>, AgentError> {
    let rows = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| AgentError::Malformed("Invalid data format received".into()))?;

    rows.iter()
        .map(|row| {
            let cells = row
                .as_array()
                .ok_or_else(|| AgentError::Malformed("Invalid data row received".into()))?;
            let timestamp = cells
                .first()
                .and_then(as_timestamp)
                .ok_or_else(|| AgentError::Malformed("Invalid data row timestamp".into()))?;
            Ok(DataRow {
                timestamp,
                dimensions: cells.iter().skip(1).map(Value::as_f64).collect(),
            })
        })
        .collect()
}

/// Unix seconds that still fit in i64 once scaled to milliseconds.
fn as_timestamp(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.trunc() as i64))
        .filter(|secs| secs.checked_mul(1000).is_some())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartCatalog {
    pub charts: BTreeMap<String, ChartDefinition>,
}

impl ChartCatalog {
    pub fn units_for(&self, chart: &str) -> Option<&str> {
        self.charts
            .get(chart)
            .and_then(|definition| definition.units.as_deref())
            .filter(|units| !units.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartDefinition {
    #[serde(default)]
    pub units: Option<String>,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{context}: {status}")]
    Status {
        context: &'static str,
        status: StatusCode,
    },
    #[error("{0}")]
    Malformed(String),
}
