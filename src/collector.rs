// One collection run: discover metric names, query each one with bounded concurrency,
// downsample every series and publish the result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::downsample::{base_metric_name, bucket};
use crate::models::{DownsampledPoint, RunOutput, TimeRange};
use crate::publisher::{PublishError, Publisher};
use crate::query::QueryExecutor;
use crate::source::{MetricsSource, SourceError};

/// Run-level failures. Per-series query failures never surface here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("can't list series names: {0}")]
    Discovery(#[source] SourceError),

    #[error("source reported no series names")]
    NoSeries,

    #[error("invalid collect interval {0:?}")]
    InvalidInterval(Duration),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub series_discovered: usize,
    pub metrics_published: usize,
    pub points_published: usize,
    pub elapsed: Duration,
}

/// Collector settings taken from the app config.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub collect_interval: Duration,
    pub concurrency: usize,
    pub query_timeout: Duration,
}

pub struct Collector {
    source: Arc<dyn MetricsSource>,
    executor: QueryExecutor,
    publisher: Publisher,
    collect_interval: Duration,
}

impl Collector {
    pub fn new(source: Arc<dyn MetricsSource>, publisher: Publisher, config: CollectorConfig) -> Self {
        let executor = QueryExecutor::new(source.clone(), config.concurrency, config.query_timeout);
        Self {
            source,
            executor,
            publisher,
            collect_interval: config.collect_interval,
        }
    }

    pub fn collect_interval(&self) -> Duration {
        self.collect_interval
    }

    /// Collects the last complete interval before now.
    pub async fn run_once(&self) -> Result<RunSummary, RunError> {
        let range = TimeRange::last_complete(Utc::now(), self.collect_interval)
            .ok_or(RunError::InvalidInterval(self.collect_interval))?;
        self.run_for_range(&range).await
    }

    /// Full pass over `range`: discovery, fan-out, downsampling, publish.
    #[instrument(skip_all, fields(timerange = %range))]
    pub async fn run_for_range(&self, range: &TimeRange) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        info!(start_time = %Utc::now().to_rfc3339(), "collection run started");

        let names = self
            .source
            .list_series_names()
            .await
            .map_err(RunError::Discovery)?;
        debug!(number_labels = names.len(), "downloaded series names");
        if names.is_empty() {
            return Err(RunError::NoSeries);
        }

        let output = self.collect(&names, range).await?;
        info!(
            metrics = output.len(),
            time_elapsed_ms = started.elapsed().as_millis() as u64,
            "metrics downloaded"
        );

        let metrics_published = output.len();
        let points_published = self.publisher.publish_blocking(output).await?;
        let elapsed = started.elapsed();
        info!(
            number_metrics = points_published,
            time_elapsed_ms = elapsed.as_millis() as u64,
            "collection run finished"
        );

        Ok(RunSummary {
            series_discovered: names.len(),
            metrics_published,
            points_published,
            elapsed,
        })
    }

    /// Queries every name and joins on all of them before folding into a [`RunOutput`].
    pub async fn collect(&self, names: &[String], range: &TimeRange) -> Result<RunOutput, RunError> {
        let interval_ms = i64::try_from(self.collect_interval.as_millis())
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(RunError::InvalidInterval(self.collect_interval))?;

        let per_name = join_all(
            names
                .iter()
                .map(|name| self.downsample_one(name, range, interval_ms)),
        )
        .await;

        let mut output = RunOutput::new();
        for points in per_name {
            for p in points {
                output
                    .entry(base_metric_name(&p.series).to_string())
                    .or_default()
                    .push(p);
            }
        }
        Ok(output)
    }

    async fn downsample_one(
        &self,
        name: &str,
        range: &TimeRange,
        interval_ms: i64,
    ) -> Vec<DownsampledPoint> {
        self.executor
            .query(name, range)
            .await
            .into_iter()
            .filter(|s| !s.is_empty())
            .flat_map(|s| bucket(&s.series, &s.samples, interval_ms))
            .collect()
    }
}
