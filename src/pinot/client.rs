//! HTTP client for the Pinot broker SQL endpoint.

use super::QueryExecutor;
use crate::error::DashboardError;
use crate::models::ResultTable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the broker.
#[derive(Debug, Clone)]
pub struct PinotClientConfig {
    /// Broker base URL, e.g. `http://localhost:8099`.
    pub broker_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

/// Broker SQL request body.
#[derive(Debug, Serialize)]
struct SqlRequest<'a> {
    sql: &'a str,
}

/// Broker SQL response, limited to the fields we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrokerResponse {
    #[serde(default)]
    result_table: Option<BrokerResultTable>,
    #[serde(default)]
    exceptions: Vec<BrokerException>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrokerResultTable {
    data_schema: DataSchema,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSchema {
    #[serde(default)]
    column_names: Vec<String>,
    #[serde(default)]
    column_data_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrokerException {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
}

/// Owned connection handle to one Pinot broker.
///
/// Holds a pooled `reqwest::Client`; connections are released when the
/// handle is dropped.
pub struct PinotClient {
    config: PinotClientConfig,
    http_client: reqwest::Client,
}

impl PinotClient {
    /// Create a client for the configured broker.
    pub fn new(config: PinotClientConfig) -> Result<Self, DashboardError> {
        info!("Connecting to Pinot broker at {}", config.broker_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DashboardError::Request(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Broker base URL without a trailing slash.
    pub fn broker_url(&self) -> &str {
        self.config.broker_url.trim_end_matches('/')
    }

    fn map_send_error(&self, e: reqwest::Error) -> DashboardError {
        if e.is_timeout() {
            DashboardError::Timeout {
                seconds: self.config.timeout_seconds,
            }
        } else if e.is_connect() {
            DashboardError::Connect {
                url: self.config.broker_url.clone(),
            }
        } else {
            DashboardError::Request(e.to_string())
        }
    }
}

impl QueryExecutor for PinotClient {
    async fn execute(&self, sql: &str) -> Result<ResultTable, DashboardError> {
        let url = format!("{}/query/sql", self.broker_url());
        debug!("Executing query: {}", sql);

        let response = self
            .http_client
            .post(&url)
            .json(&SqlRequest { sql })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Http { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;

        parse_broker_response(&body)
    }

    async fn ping(&self) -> Result<(), DashboardError> {
        let url = format!("{}/health", self.broker_url());

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(DashboardError::Http { status, body })
        }
    }
}

/// Decode a broker response body into a [`ResultTable`].
///
/// The first reported exception wins over any partial result. A response
/// without a result table is an empty table.
pub fn parse_broker_response(body: &str) -> Result<ResultTable, DashboardError> {
    let response: BrokerResponse =
        serde_json::from_str(body).map_err(|e| DashboardError::Decode(e.to_string()))?;

    if let Some(exception) = response.exceptions.into_iter().next() {
        return Err(DashboardError::Broker {
            code: exception.error_code,
            message: exception.message,
        });
    }

    let Some(table) = response.result_table else {
        return Ok(ResultTable::default());
    };

    let width = table.data_schema.column_names.len();
    if let Some(bad) = table.rows.iter().find(|row| row.len() != width) {
        return Err(DashboardError::Decode(format!(
            "row has {} values but schema has {} columns",
            bad.len(),
            width
        )));
    }

    Ok(ResultTable {
        columns: table.data_schema.column_names,
        column_types: table.data_schema.column_data_types,
        rows: table.rows,
    })
}
