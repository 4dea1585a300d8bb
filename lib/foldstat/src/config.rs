//! Environment variable names, defaults and the resolved pipeline settings.

use crate::utils::{default_workers, parse_positive};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

// Environment variable names
pub const ENV_WORKERS: &str = "FOLDSTAT_WORKERS";
pub const ENV_BLOCK_BYTES: &str = "FOLDSTAT_BLOCK_BYTES";
pub const ENV_QUEUE_CAP: &str = "FOLDSTAT_QUEUE_CAP";
pub const ENV_ON_MALFORMED: &str = "FOLDSTAT_ON_MALFORMED";

// Large enough to amortise per-read syscalls; memory use is roughly
// (queue capacity + workers + 1) blocks.
pub const DEFAULT_BLOCK_BYTES: usize = 128 * 1024 * 1024; // 128 MiB
// One queued block keeps the chunker a step ahead without multiplying the
// block size by the worker count.
pub const DEFAULT_QUEUE_CAP: usize = 1;

/// What a worker does with a line that is not `key;number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Drop the line and count it.
    #[default]
    Skip,
    /// Fail the whole run on the first one.
    Abort,
}

impl FromStr for MalformedPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(MalformedPolicy::Skip),
            "abort" => Ok(MalformedPolicy::Abort),
            other => Err(anyhow::anyhow!("unknown malformed-record policy {:?}, expected skip or abort", other)),
        }
    }
}

impl fmt::Display for MalformedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedPolicy::Skip => f.write_str("skip"),
            MalformedPolicy::Abort => f.write_str("abort"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    pub workers: usize,
    pub block_bytes: usize,
    /// Chunk queue capacity in blocks.
    pub queue_capacity: usize,
    pub malformed: MalformedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            block_bytes: DEFAULT_BLOCK_BYTES,
            queue_capacity: DEFAULT_QUEUE_CAP,
            malformed: MalformedPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self { Self::default() }

    /// Defaults overlaid with the `FOLDSTAT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(n) = lookup(ENV_WORKERS).and_then(|v| parse_positive(ENV_WORKERS, &v)) {
            cfg.workers = n;
        }
        if let Some(n) = lookup(ENV_BLOCK_BYTES).and_then(|v| parse_positive(ENV_BLOCK_BYTES, &v)) {
            cfg.block_bytes = n;
        }
        if let Some(n) = lookup(ENV_QUEUE_CAP).and_then(|v| parse_positive(ENV_QUEUE_CAP, &v)) {
            cfg.queue_capacity = n;
        }
        if let Some(raw) = lookup(ENV_ON_MALFORMED) {
            match raw.parse() {
                Ok(policy) => cfg.malformed = policy,
                Err(e) => warn!(setting = ENV_ON_MALFORMED, error = %e, "ignoring invalid value"),
            }
        }
        cfg
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_block_bytes(mut self, block_bytes: usize) -> Self {
        self.block_bytes = block_bytes;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Every numeric setting clamped to at least 1.
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.block_bytes = self.block_bytes.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }
}
