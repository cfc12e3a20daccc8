// Domain models: query window, raw samples, downsampled points

mod series;
mod time_range;

pub use series::{DownsampledPoint, RawSample, RunOutput, SeriesResult};
pub use time_range::TimeRange;
