// Bounded fan-out query executor.
// At most `concurrency` range queries are in flight; failures degrade to an empty result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::models::{SeriesResult, TimeRange};
use crate::source::{MetricsSource, QueryData};

pub struct QueryExecutor {
    source: Arc<dyn MetricsSource>,
    permits: Arc<Semaphore>,
    query_timeout: Duration,
}

impl QueryExecutor {
    /// `concurrency` is clamped to at least one permit.
    pub fn new(source: Arc<dyn MetricsSource>, concurrency: usize, query_timeout: Duration) -> Self {
        Self {
            source,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            query_timeout,
        }
    }

    /// Number of queries that may start right now.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Raw samples of every series named `series_name` in `range`.
    /// Source errors, non-matrix responses and timeouts are logged and yield an empty Vec.
    pub async fn query(&self, series_name: &str, range: &TimeRange) -> Vec<SeriesResult> {
        let Ok(permit) = self.permits.acquire().await else {
            error!(target_label = series_name, "query semaphore closed");
            return Vec::new();
        };
        let outcome =
            tokio::time::timeout(self.query_timeout, self.source.query_range(series_name, range))
                .await;
        drop(permit);

        match outcome {
            Ok(Ok(QueryData::Matrix(series))) => series,
            Ok(Ok(QueryData::Other { result_type })) => {
                warn!(
                    target_label = series_name,
                    result_type = %result_type,
                    "query result is not a matrix; ignoring"
                );
                Vec::new()
            }
            Ok(Err(e)) => {
                error!(
                    error = %e,
                    target_label = series_name,
                    operation = "query_range",
                    "get metric failed"
                );
                Vec::new()
            }
            Err(_) => {
                error!(
                    target_label = series_name,
                    timeout_secs = self.query_timeout.as_secs_f64(),
                    operation = "query_range",
                    "query timed out"
                );
                Vec::new()
            }
        }
    }
}
