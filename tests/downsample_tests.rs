// Bucketing tests: floor boundaries, averaging, order independence, label-set stripping

mod common;

use prom_downsampler::downsample::{base_metric_name, bucket, bucket_start};
use prom_downsampler::models::{DownsampledPoint, RawSample};

const FIVE_MIN_MS: i64 = 300_000;

fn sorted(mut points: Vec<DownsampledPoint>) -> Vec<DownsampledPoint> {
    points.sort_by_key(|p| p.timestamp_ms);
    points
}

#[test]
fn six_one_minute_samples_split_into_two_five_minute_buckets() {
    let input = common::samples(0, 60_000, 6, 1.0);
    let out = sorted(bucket("up", &input, FIVE_MIN_MS));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].timestamp_ms, 0);
    assert_eq!(out[0].value, 1.0);
    assert_eq!(out[1].timestamp_ms, 300_000);
    assert_eq!(out[1].value, 1.0);
    assert!(out.iter().all(|p| p.series == "up"));
}

#[test]
fn sample_on_boundary_belongs_to_that_bucket() {
    for k in [1_i64, 2, 7, 1_000] {
        assert_eq!(bucket_start(k * FIVE_MIN_MS, FIVE_MIN_MS), k * FIVE_MIN_MS);
        assert_eq!(
            bucket_start(k * FIVE_MIN_MS - 1, FIVE_MIN_MS),
            (k - 1) * FIVE_MIN_MS
        );
    }
}

#[test]
fn bucket_start_floors_negative_timestamps() {
    assert_eq!(bucket_start(-1, FIVE_MIN_MS), -FIVE_MIN_MS);
    assert_eq!(bucket_start(-FIVE_MIN_MS, FIVE_MIN_MS), -FIVE_MIN_MS);
}

#[test]
fn value_is_mean_of_bucket_samples() {
    let input = vec![
        RawSample::new(300_000, 10.0),
        RawSample::new(360_000, 20.0),
        RawSample::new(420_000, 30.0),
        RawSample::new(600_000, 5.0),
    ];
    let out = sorted(bucket("load", &input, FIVE_MIN_MS));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].timestamp_ms, 300_000);
    assert_eq!(out[0].value, 20.0);
    assert_eq!(out[1].timestamp_ms, 600_000);
    assert_eq!(out[1].value, 5.0);
}

#[test]
fn permuted_input_gives_same_points() {
    let input = vec![
        RawSample::new(1_000, 1.0),
        RawSample::new(299_999, 3.0),
        RawSample::new(300_000, 4.0),
        RawSample::new(450_000, 8.0),
        RawSample::new(900_001, 2.0),
    ];
    let expected = sorted(bucket("m", &input, FIVE_MIN_MS));

    let mut reversed = input.clone();
    reversed.reverse();
    assert_eq!(sorted(bucket("m", &reversed, FIVE_MIN_MS)), expected);

    for shift in 1..input.len() {
        let mut rotated = input.clone();
        rotated.rotate_left(shift);
        assert_eq!(sorted(bucket("m", &rotated, FIVE_MIN_MS)), expected);
    }
}

#[test]
fn no_samples_gives_no_points() {
    assert!(bucket("empty", &[], FIVE_MIN_MS).is_empty());
}

#[test]
fn non_positive_interval_gives_no_points() {
    let input = common::samples(0, 1_000, 3, 1.0);
    assert!(bucket("m", &input, 0).is_empty());
}

#[test]
fn base_metric_name_strips_label_set() {
    assert_eq!(base_metric_name("up"), "up");
    assert_eq!(
        base_metric_name(r#"http_requests_total{code="200",job="api"}"#),
        "http_requests_total"
    );
    assert_eq!(base_metric_name(r#"{job="x"}"#), "");
}
