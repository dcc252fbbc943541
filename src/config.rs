//! Job configuration and credential loading
//!
//! The job is described by a TOML file: remote endpoint, compliance framework
//! and cloud-platform scope, the prompt template, and the batching/retry
//! knobs. The bearer token lives in a separate secret file so the job config
//! can be checked in.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

fn default_batch_size() -> usize {
    20
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

/// Exponential backoff policy for retryable remote failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the backoff delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given failed attempt (1-based).
    ///
    /// Doubles per attempt, capped at `max_delay_ms`. The shift is clamped so
    /// large attempt counts cannot overflow.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// One classification job: what to classify, against what, and how hard to
/// push the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Chat-completion endpoint URL
    pub endpoint: String,

    /// Compliance framework being mapped (e.g. "iso", "hipaa")
    pub framework: String,

    /// Cloud-platform scope a row must match to be classified
    pub scope: String,

    /// Natural-language prompt template. Placeholders `{name}`, `{scan_item}`,
    /// `{rules}`, `{cloud_platform}`, `{scan_type}`, `{content_description}`
    /// and `{description}` are replaced with the row's field values.
    pub prompt_template: String,

    /// Rows per batch; a batch is the atomic unit of progress
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Worker budget per batch. Defaults to the batch size, but is tunable
    /// independently of it.
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retry policy for transient remote failures
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl JobConfig {
    /// Load and validate a job config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: JobConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid job config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.concurrency == Some(0) {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.endpoint.is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        Ok(())
    }

    /// Effective worker budget per batch
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(self.batch_size)
    }

    /// Name of the column appended to the output table
    pub fn output_column(&self) -> String {
        format!("{}{}Standard", self.framework, self.scope)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Load the bearer token from a local secret file.
///
/// An unreadable or empty file is a fatal startup error.
pub fn load_token(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read token file {}: {}", path.display(), e)))?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(Error::Config(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    Ok(token)
}
