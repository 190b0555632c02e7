use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use traces::{ShuffleConfig, DEFAULT_CHUNK_ROWS};
use utility::AggregationMethod;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub original_file: PathBuf,
    pub artifact_dir: PathBuf,

    pub workers: usize,
    /// Wall-clock bound per evaluation, including time spent waiting for a
    /// free worker.
    pub timeout: Duration,

    pub shuffle_chunk_rows: usize,
    pub shuffle_seed: Option<u64>,
    pub aggregation: AggregationMethod,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("ORCH_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let original_file = PathBuf::from(get("ORIGINAL_FILE_PATH")?);
        let artifact_dir = PathBuf::from(
            std::env::var("EVAL_ARTIFACT_DIR").unwrap_or_else(|_| "data/artifacts".to_string()),
        );

        let workers: usize = parse_or("EVAL_WORKERS", 4)?;
        let timeout_secs: u64 = parse_or("EVAL_TIMEOUT_SECS", 3600)?;
        let shuffle_chunk_rows: usize = parse_or("EVAL_SHUFFLE_CHUNK_ROWS", DEFAULT_CHUNK_ROWS)?;
        let shuffle_seed = match std::env::var("EVAL_SHUFFLE_SEED") {
            Ok(v) => Some(v.parse::<u64>().context("EVAL_SHUFFLE_SEED must be an unsigned integer")?),
            Err(_) => None,
        };

        let aggregation = match std::env::var("EVAL_AGGREGATION") {
            Ok(v) => match AggregationMethod::parse(v.trim()) {
                Some(m) => m,
                None => bail!("EVAL_AGGREGATION must be one of mean, median, min, max"),
            },
            Err(_) => AggregationMethod::Mean,
        };

        // fail fast
        if workers == 0 {
            bail!("EVAL_WORKERS must be at least 1");
        }
        if timeout_secs == 0 {
            bail!("EVAL_TIMEOUT_SECS must be at least 1");
        }
        if shuffle_chunk_rows == 0 {
            bail!("EVAL_SHUFFLE_CHUNK_ROWS must be at least 1");
        }
        if !original_file.is_file() {
            bail!("ORIGINAL_FILE_PATH does not point to a file: {}", original_file.display());
        }

        Ok(Self {
            bind_addr,
            original_file,
            artifact_dir,
            workers,
            timeout: Duration::from_secs(timeout_secs),
            shuffle_chunk_rows,
            shuffle_seed,
            aggregation,
        })
    }

    /// Defaults for everything but the reference trace.
    pub fn for_original(original_file: impl Into<PathBuf>, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            original_file: original_file.into(),
            artifact_dir: artifact_dir.into(),
            workers: 4,
            timeout: Duration::from_secs(3600),
            shuffle_chunk_rows: DEFAULT_CHUNK_ROWS,
            shuffle_seed: None,
            aggregation: AggregationMethod::Mean,
        }
    }

    pub fn shuffle(&self) -> ShuffleConfig {
        ShuffleConfig {
            chunk_rows: self.shuffle_chunk_rows,
            seed: self.shuffle_seed,
        }
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v.trim().parse::<T>().with_context(|| format!("Invalid value for {key}: {v}")),
        Err(_) => Ok(default),
    }
}
