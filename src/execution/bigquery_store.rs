//! BigQuery Store
//!
//! Managed warehouse reached through the REST `jobs.query` endpoint.

use crate::execution::result::{unique_column_names, QueryResult, Row};
use crate::execution::store::{DataStore, SqlDialect, StoreError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// BigQuery REST API: POST /projects/{project}/queries, then
/// GET /projects/{project}/queries/{jobId} for further pages
pub struct BigQueryStore {
    project_id: String,
    access_token: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Option<Vec<TableRow>>,
    #[serde(default)]
    page_token: Option<String>,
    #[serde(default)]
    errors: Option<Vec<ErrorProto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    fields: Vec<TableField>,
}

#[derive(Debug, Deserialize)]
struct TableField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl BigQueryStore {
    pub fn new(project_id: String, access_token: String) -> Result<Self, StoreError> {
        Self::with_base_url(project_id, access_token, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(project_id: String, access_token: String, base_url: String) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create HTTP client for BigQuery: {}", e)))?;

        Ok(Self {
            project_id,
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<QueryResponse, StoreError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Query(format!("BigQuery request timed out: {}", e))
                } else {
                    StoreError::Unavailable(format!("BigQuery request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(StoreError::Query(format!("BigQuery returned {}: {}", status, message)));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to parse BigQuery response: {}", e)))?;

        if let Some(errors) = body.errors.as_ref().filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| match e.reason {
                    Some(ref reason) => format!("{} ({})", e.message, reason),
                    None => e.message.clone(),
                })
                .collect();
            return Err(StoreError::Query(messages.join("; ")));
        }

        Ok(body)
    }

    async fn run(&self, sql: &str, timeout: Duration, start: Instant) -> Result<QueryResult, StoreError> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let body = serde_json::json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": timeout.as_millis() as u64,
        });

        let mut page = self.send(self.client.post(&url).json(&body).timeout(timeout)).await?;
        if page.job_complete != Some(true) {
            return Err(StoreError::Timeout(timeout));
        }

        let fields = page
            .schema
            .take()
            .map(|s| s.fields)
            .ok_or_else(|| StoreError::Query("BigQuery response has no schema".to_string()))?;
        let job = page.job_reference.take();
        let columns = unique_column_names(fields.iter().map(|f| f.name.as_str()));

        let mut rows = Vec::new();
        loop {
            for table_row in page.rows.take().unwrap_or_default() {
                rows.push(convert_row(&columns, &fields, table_row));
            }

            let Some(token) = page.page_token.take() else { break };
            let Some(job) = job.as_ref() else { break };
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(StoreError::Timeout(timeout));
            }

            debug!(job_id = %job.job_id, "Fetching next BigQuery result page");
            let mut query: Vec<(&str, String)> = vec![
                ("pageToken", token),
                ("timeoutMs", remaining.as_millis().to_string()),
            ];
            if let Some(ref location) = job.location {
                query.push(("location", location.clone()));
            }
            let page_url = format!("{}/projects/{}/queries/{}", self.base_url, self.project_id, job.job_id);
            page = self
                .send(self.client.get(&page_url).query(&query).timeout(remaining))
                .await?;
        }

        let elapsed = start.elapsed().as_millis() as u64;
        info!(rows = rows.len(), elapsed_ms = elapsed, "BigQuery query finished");
        Ok(QueryResult::new(columns, rows, elapsed))
    }
}

fn convert_row(columns: &[String], fields: &[TableField], row: TableRow) -> Row {
    columns
        .iter()
        .zip(fields)
        .zip(row.f)
        .map(|((column, field), cell)| (column.clone(), convert_cell(field, cell.v)))
        .collect()
}

/// Scalars arrive as strings; type them by the schema
fn convert_cell(field: &TableField, value: Value) -> Value {
    if field.mode.as_deref() == Some("REPEATED") {
        return value;
    }
    let Value::String(raw) = value else { return value };

    match field.field_type.as_str() {
        "INTEGER" | "INT64" => raw.parse::<i64>().map(Value::from).unwrap_or(Value::String(raw)),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(raw)),
        "BOOLEAN" | "BOOL" if raw == "true" || raw == "false" => Value::Bool(raw == "true"),
        _ => Value::String(raw),
    }
}

#[async_trait]
impl DataStore for BigQueryStore {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::BigQuery
    }

    async fn query(&self, sql: &str, timeout: Duration) -> Result<QueryResult, StoreError> {
        let start = Instant::now();
        match tokio::time::timeout(timeout, self.run(sql, timeout, start)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }
}
