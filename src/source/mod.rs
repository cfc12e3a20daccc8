//! Metrics source abstraction.
//!
//! The collection pipeline only talks to a [`MetricsSource`]; the Prometheus HTTP
//! API client lives in [`prometheus`].

pub mod prometheus;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{SeriesResult, TimeRange};

pub use prometheus::PrometheusSource;

/// Errors returned by a metrics source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status without a decodable API error body.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The API answered with `status: "error"`.
    #[error("api error ({error_type}): {error}")]
    Api { error_type: String, error: String },

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Payload of a range query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    /// One entry per matched series.
    Matrix(Vec<SeriesResult>),
    /// Any other result type (vector, scalar, string); not usable for downsampling.
    Other { result_type: String },
}

/// Capability the collection pipeline needs from a remote metrics store.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Names of every metric the source knows about.
    async fn list_series_names(&self) -> Result<Vec<String>, SourceError>;

    /// Raw samples of every series matching `selector` within `range`.
    async fn query_range(
        &self,
        selector: &str,
        range: &TimeRange,
    ) -> Result<QueryData, SourceError>;
}
