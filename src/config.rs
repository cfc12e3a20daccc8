use std::path::Path;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

pub const DEFAULT_SOURCE_URL: &str = "http://127.0.0.1:9090";
pub const DEFAULT_OUTPUT_PATH: &str = "/tmp/prometheus_downsample_output.txt";
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Config file read when `--config` / `PDS_CONFIG` is not given; missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Read metrics from Prometheus and downsample them to a file.
#[derive(Parser, Debug, Default)]
#[command(name = "prom-downsampler", version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "PDS_CONFIG")]
    pub config: Option<String>,

    /// Source Prometheus endpoint
    #[arg(short, long, env = "PDS_SOURCE")]
    pub source: Option<String>,

    /// Output file path
    #[arg(short, long, env = "PDS_OUTPUT")]
    pub output: Option<String>,

    /// Max concurrent queries against the source Prometheus
    #[arg(short, long, env = "PDS_CONCURRENT")]
    pub concurrency: Option<usize>,

    /// Collection interval, also the bucket width (e.g. "5m")
    #[arg(short, long, env = "PDS_INTERVAL", value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Deadline for a single range query (e.g. "30s")
    #[arg(long, env = "PDS_QUERY_TIMEOUT", value_parser = parse_duration)]
    pub query_timeout: Option<Duration>,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub collection: CollectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    /// Deadline for each range query; also the HTTP request timeout.
    pub query_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.into(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_OUTPUT_PATH.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Max range queries in flight at once.
    pub concurrency: usize,
    /// Tick period and bucket width.
    pub interval_secs: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl AppConfig {
    /// File (if any) first, then CLI flags / env vars on top, then validation.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::parse_file(Path::new(path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::parse_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("config file {}: {}", path.display(), e))?;
        Ok(toml::from_str(&s)?)
    }

    /// Overrides file values with whatever was given on the command line or in the env.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.source {
            self.source.url = url.clone();
        }
        if let Some(path) = &cli.output {
            self.output.path = path.clone();
        }
        if let Some(c) = cli.concurrency {
            self.collection.concurrency = c;
        }
        if let Some(i) = cli.interval {
            self.collection.interval_secs = i.as_secs();
        }
        if let Some(t) = cli.query_timeout {
            self.source.query_timeout_secs = t.as_secs();
        }
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collection.interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.source.query_timeout_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.source.url.is_empty(), "source.url must be non-empty");
        anyhow::ensure!(
            self.source.url.starts_with("http://") || self.source.url.starts_with("https://"),
            "source.url must start with http:// or https://, got {}",
            self.source.url
        );
        anyhow::ensure!(
            self.source.query_timeout_secs > 0,
            "source.query_timeout_secs must be > 0, got {}",
            self.source.query_timeout_secs
        );
        anyhow::ensure!(!self.output.path.is_empty(), "output.path must be non-empty");
        anyhow::ensure!(
            self.collection.concurrency > 0,
            "collection.concurrency must be > 0, got {}",
            self.collection.concurrency
        );
        anyhow::ensure!(
            self.collection.interval_secs > 0,
            "collection.interval_secs must be > 0 (at least one second), got {}",
            self.collection.interval_secs
        );
        Ok(())
    }
}
