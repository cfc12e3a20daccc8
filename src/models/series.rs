// Raw and downsampled series models

use std::collections::HashMap;

/// One raw sample as returned by the metrics source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl RawSample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// All samples of a single series (identifier includes the label set) for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesResult {
    pub series: String,
    pub samples: Vec<RawSample>,
}

impl SeriesResult {
    pub fn new(series: impl Into<String>, samples: Vec<RawSample>) -> Self {
        Self {
            series: series.into(),
            samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Mean of all raw samples that fell into one bucket; timestamp is the bucket start.
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampledPoint {
    pub series: String,
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Base metric name -> points of every series of that metric. Point order is unspecified.
pub type RunOutput = HashMap<String, Vec<DownsampledPoint>>;
