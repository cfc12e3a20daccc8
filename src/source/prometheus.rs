//! Prometheus HTTP API client.
//!
//! Uses two endpoints:
//! - `GET /api/v1/label/__name__/values` for metric discovery
//! - `GET /api/v1/query_range` for raw samples

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::{MetricsSource, QueryData, SourceError};
use crate::models::{RawSample, SeriesResult, TimeRange};

/// Label holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

const STATUS_SUCCESS: &str = "success";
const RESULT_TYPE_MATRIX: &str = "matrix";

/// Body is truncated to this many bytes when reported in an error.
const ERROR_BODY_LIMIT: usize = 512;

/// Response envelope shared by every API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeData {
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

/// Prometheus-backed [`MetricsSource`].
#[derive(Debug, Clone)]
pub struct PrometheusSource {
    client: Client,
    base_url: String,
}

impl PrometheusSource {
    /// Builds a client for `base_url` (e.g. `http://127.0.0.1:9090`).
    /// Every request is bounded by `request_timeout`.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(params)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        // Prometheus reports bad queries as 4xx/5xx with a JSON error envelope.
        match decode_envelope::<serde_json::Value>(&body) {
            Err(e @ SourceError::Api { .. }) => Err(e),
            _ => Err(SourceError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT).to_string(),
            }),
        }
    }
}

#[async_trait]
impl MetricsSource for PrometheusSource {
    #[instrument(skip(self), fields(source = %self.base_url, operation = "list_series_names"))]
    async fn list_series_names(&self) -> Result<Vec<String>, SourceError> {
        let body = self
            .get(&format!("/api/v1/label/{METRIC_NAME_LABEL}/values"), &[])
            .await?;
        parse_label_values(&body)
    }

    #[instrument(skip(self, range), fields(source = %self.base_url, operation = "query_range"))]
    async fn query_range(
        &self,
        selector: &str,
        range: &TimeRange,
    ) -> Result<QueryData, SourceError> {
        let params = [
            ("query", selector.to_string()),
            ("start", range.start().to_rfc3339()),
            ("end", range.end().to_rfc3339()),
            ("step", range.step().as_secs().to_string()),
        ];
        let body = self.get("/api/v1/query_range", &params).await?;
        parse_query_range(&body)
    }
}

/// Decodes the body of a label-values response.
pub fn parse_label_values(body: &str) -> Result<Vec<String>, SourceError> {
    decode_envelope::<Vec<String>>(body)
}

/// Decodes the body of a range-query response.
/// Non-matrix results come back as [`QueryData::Other`] rather than an error.
pub fn parse_query_range(body: &str) -> Result<QueryData, SourceError> {
    let data: RangeData = decode_envelope(body)?;
    if data.result_type != RESULT_TYPE_MATRIX {
        return Ok(QueryData::Other {
            result_type: data.result_type,
        });
    }
    let matrix: Vec<MatrixSeries> =
        serde_json::from_value(data.result).map_err(|e| SourceError::Decode(e.to_string()))?;

    let mut out = Vec::with_capacity(matrix.len());
    for series in matrix {
        let mut samples = Vec::with_capacity(series.values.len());
        for (ts_secs, raw) in &series.values {
            let value: f64 = raw
                .parse()
                .map_err(|_| SourceError::Decode(format!("invalid sample value {raw:?}")))?;
            samples.push(RawSample::new((ts_secs * 1000.0).round() as i64, value));
        }
        out.push(SeriesResult::new(series_identifier(&series.metric), samples));
    }
    Ok(QueryData::Matrix(out))
}

/// Renders a label set as `name{a="x",b="y"}`; labels sorted, `__name__` used as the prefix.
pub fn series_identifier(labels: &BTreeMap<String, String>) -> String {
    let name = labels
        .get(METRIC_NAME_LABEL)
        .map(String::as_str)
        .unwrap_or("");
    let pairs: Vec<String> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();
    if pairs.is_empty() {
        name.to_string()
    } else {
        format!("{}{{{}}}", name, pairs.join(","))
    }
}

fn escape_label_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, SourceError> {
    let resp: ApiResponse<T> =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    if resp.status != STATUS_SUCCESS {
        return Err(SourceError::Api {
            error_type: resp.error_type.unwrap_or_else(|| "unknown".into()),
            error: resp.error.unwrap_or_default(),
        });
    }
    resp.data
        .ok_or_else(|| SourceError::Decode("missing data field".into()))
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
