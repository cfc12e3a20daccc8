// Shared test helpers: an in-memory metrics source with call counters

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use prom_downsampler::models::{RawSample, SeriesResult, TimeRange};
use prom_downsampler::source::{MetricsSource, QueryData, SourceError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub enum FakeResponse {
    Matrix(Vec<SeriesResult>),
    Error(String),
    Other(String),
    Hang,
}

pub struct FakeSource {
    names: Result<Vec<String>, String>,
    responses: HashMap<String, FakeResponse>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    list_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: Ok(names.into_iter().map(Into::into).collect()),
            responses: HashMap::new(),
            delay: Duration::ZERO,
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_discovery(message: &str) -> Self {
        let mut s = Self::new(Vec::<String>::new());
        s.names = Err(message.to_string());
        s
    }

    pub fn with_series(mut self, name: &str, series: Vec<SeriesResult>) -> Self {
        self.responses
            .insert(name.to_string(), FakeResponse::Matrix(series));
        self
    }

    pub fn with_response(mut self, name: &str, response: FakeResponse) -> Self {
        self.responses.insert(name.to_string(), response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queries block until the gate has permits.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for FakeSource {
    async fn list_series_names(&self) -> Result<Vec<String>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.names.clone().map_err(|e| SourceError::Api {
            error_type: "unavailable".into(),
            error: e,
        })
    }

    async fn query_range(
        &self,
        selector: &str,
        _range: &TimeRange,
    ) -> Result<QueryData, SourceError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = self
            .responses
            .get(selector)
            .cloned()
            .unwrap_or(FakeResponse::Matrix(vec![]));
        if matches!(response, FakeResponse::Hang) {
            std::future::pending::<()>().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match response {
            FakeResponse::Matrix(series) => Ok(QueryData::Matrix(series)),
            FakeResponse::Error(e) => Err(SourceError::Api {
                error_type: "execution".into(),
                error: e,
            }),
            FakeResponse::Other(result_type) => Ok(QueryData::Other { result_type }),
            FakeResponse::Hang => unreachable!(),
        }
    }
}

/// `count` samples starting at `start_ms`, one every `step_ms`, all with `value`.
pub fn samples(start_ms: i64, step_ms: i64, count: usize, value: f64) -> Vec<RawSample> {
    (0..count)
        .map(|i| RawSample::new(start_ms + i as i64 * step_ms, value))
        .collect()
}

/// One-interval window starting at the epoch.
pub fn epoch_range(interval: Duration) -> TimeRange {
    let start = Utc.timestamp_millis_opt(0).unwrap();
    let end = Utc
        .timestamp_millis_opt(interval.as_millis() as i64 - 1000)
        .unwrap();
    TimeRange::new(start, end, Duration::from_secs(60)).unwrap()
}
