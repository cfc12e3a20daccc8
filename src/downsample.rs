// Downsampling: pure bucket-average logic.
// Each raw sample lands in the epoch-aligned bucket that starts at or before it.

use std::collections::HashMap;

use crate::models::{DownsampledPoint, RawSample};

/// Delimiter between the metric name and its label set in a series identifier.
const LABEL_SET_START: char = '{';

#[derive(Default)]
struct Bucket {
    sum: f64,
    count: u64,
}

/// Start of the bucket containing `timestamp_ms` (floor, never round or ceiling).
pub fn bucket_start(timestamp_ms: i64, interval_ms: i64) -> i64 {
    timestamp_ms - timestamp_ms.rem_euclid(interval_ms)
}

/// Averages `samples` of one series into `interval_ms` wide buckets.
/// Returns one point per non-empty bucket in no particular order; no samples gives no points.
pub fn bucket(series: &str, samples: &[RawSample], interval_ms: i64) -> Vec<DownsampledPoint> {
    if samples.is_empty() || interval_ms <= 0 {
        return Vec::new();
    }

    let mut by_start: HashMap<i64, Bucket> = HashMap::new();
    for s in samples {
        let b = by_start
            .entry(bucket_start(s.timestamp_ms, interval_ms))
            .or_default();
        b.sum += s.value;
        b.count += 1;
    }

    by_start
        .into_iter()
        .map(|(timestamp_ms, b)| DownsampledPoint {
            series: series.to_string(),
            value: b.sum / b.count as f64,
            timestamp_ms,
        })
        .collect()
}

/// Metric name without the label set: `http_requests{code="200"}` -> `http_requests`.
pub fn base_metric_name(series: &str) -> &str {
    series
        .split_once(LABEL_SET_START)
        .map_or(series, |(name, _)| name)
}
