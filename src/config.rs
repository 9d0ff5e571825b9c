//! Scan configuration
//!
//! Defines the normalized option set the scanner core consumes, plus the
//! per-scanner tuning record derived from it. All cross-flag validation
//! happens here, before any scanning starts.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Result, ScannerError};

/// Operating profile for a scan.
///
/// `Fast` is the throughput-oriented default. `Ghost` trades speed for a
/// low-noise footprint: fewer workers, a rate limit, per-dial jitter, no
/// active probes and a narrower discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    Fast,
    Ghost,
}

impl ScanMode {
    /// Default worker pool size for single-host scans
    pub fn default_workers(self) -> usize {
        match self {
            Self::Fast => 200,
            Self::Ghost => 10,
        }
    }

    /// Default base dial timeout
    pub fn default_timeout(self) -> Duration {
        match self {
            Self::Fast => Duration::from_millis(500),
            Self::Ghost => Duration::from_secs(2),
        }
    }

    /// Default upper clamp for the adaptive timeout controller
    pub fn default_max_timeout(self) -> Duration {
        match self {
            Self::Fast => Duration::from_secs(4),
            Self::Ghost => Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Jsonl,
    Csv,
}

impl OutputFormat {
    pub fn is_machine(self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Jsonl => write!(f, "jsonl"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Normalized scan options, produced by the CLI layer and consumed by the
/// orchestration in [`crate::app`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Target expression: host, comma list, or CIDR block
    pub target: String,
    /// Explicit port spec (`-`, list, range, single); `None` selects the
    /// curated top-1000 list
    pub ports: Option<String>,
    /// Port spec subtracted from the final scan set
    pub exclude_ports: Option<String>,
    /// Take first N ports from the curated top-1000 list
    pub top_ports: Option<usize>,
    /// Enable banner acquisition and parsing
    pub service_detect: bool,
    /// Low-noise stealth profile
    pub ghost_mode: bool,
    /// Skip host discovery even for multi-host inputs
    pub no_discovery: bool,
    /// Ports per second per host; 0 = unlimited
    pub rate: u32,
    /// Worker pool size override; 0 = auto by mode
    pub workers: usize,
    /// Base dial timeout in milliseconds; 0 = auto by mode
    pub timeout_ms: u64,
    /// Extra dial attempts per port
    pub retries: u32,
    /// Exponential-backoff base between retries
    pub backoff_ms: u64,
    /// Enable the adaptive timeout controller
    pub adaptive_timeout: bool,
    /// Upper clamp for adaptive timeouts in milliseconds; 0 = auto by mode
    pub max_timeout_ms: u64,
    /// Cap on hosts scanned after discovery; 0 = unlimited
    pub max_hosts: usize,
    /// Randomize the HTTP User-Agent per probe
    pub random_agent: bool,
    /// Emit spoofed X-Forwarded-For / X-Real-IP headers from the target CIDR
    pub random_ip: bool,
    /// Output format
    pub format: OutputFormat,
    /// Write machine output to this file instead of stdout
    pub out_path: Option<PathBuf>,
    /// Include latency/confidence/evidence columns in the text table
    pub details: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            target: String::new(),
            ports: None,
            exclude_ports: None,
            top_ports: None,
            service_detect: false,
            ghost_mode: false,
            no_discovery: false,
            rate: 0,
            workers: 0,
            timeout_ms: 0,
            retries: 0,
            backoff_ms: 25,
            adaptive_timeout: true,
            max_timeout_ms: 0,
            max_hosts: 0,
            random_agent: false,
            random_ip: false,
            format: OutputFormat::Text,
            out_path: None,
            details: false,
        }
    }
}

impl ScanOptions {
    pub fn mode(&self) -> ScanMode {
        if self.ghost_mode {
            ScanMode::Ghost
        } else {
            ScanMode::Fast
        }
    }

    /// Validate cross-flag constraints. Called once, before scanning.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(ScannerError::validation("target", "no target specified"));
        }
        if self.ports.is_some() && self.top_ports.is_some() {
            return Err(ScannerError::validation(
                "top-ports",
                "use either an explicit port spec or --top-ports, not both",
            ));
        }
        if let Some(n) = self.top_ports {
            if n == 0 {
                return Err(ScannerError::validation(
                    "top-ports",
                    "must be a positive number",
                ));
            }
        }
        if self.random_ip && !self.service_detect {
            return Err(ScannerError::validation(
                "random-ip",
                "requires service detection (-s)",
            ));
        }
        if self.details && self.format.is_machine() {
            return Err(ScannerError::validation(
                "details",
                "only valid with text output",
            ));
        }
        Ok(())
    }

    /// Base dial timeout, resolved against the mode default
    pub fn timeout(&self) -> Duration {
        if self.timeout_ms > 0 {
            Duration::from_millis(self.timeout_ms)
        } else {
            self.mode().default_timeout()
        }
    }

    /// Upper adaptive-timeout clamp; 0 means auto by mode
    pub fn max_timeout(&self) -> Option<Duration> {
        (self.max_timeout_ms > 0).then(|| Duration::from_millis(self.max_timeout_ms))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_ms.max(1))
    }
}

/// Runtime tuning for a single-host scanner, derived from [`ScanOptions`].
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    pub workers: usize,
    pub rate: u32,
    pub timeout: Option<Duration>,
    pub retries: u32,
    pub adaptive_timeout: bool,
    pub backoff_base: Option<Duration>,
    pub max_timeout: Option<Duration>,
    pub random_agent: bool,
    pub random_ip: bool,
    /// CIDR pool for spoofed forwarding headers; falls back to a /24 around
    /// the target when absent
    pub target_cidr: Option<String>,
}

impl ScannerConfig {
    /// Build scanner tuning from validated options. `target_cidr` is only
    /// forwarded when the original target expression was a CIDR block.
    pub fn from_options(opts: &ScanOptions, target_is_cidr: bool) -> Self {
        Self {
            workers: opts.workers,
            rate: opts.rate,
            timeout: (opts.timeout_ms > 0).then(|| Duration::from_millis(opts.timeout_ms)),
            retries: opts.retries,
            adaptive_timeout: opts.adaptive_timeout,
            backoff_base: (opts.backoff_ms > 0).then(|| Duration::from_millis(opts.backoff_ms)),
            max_timeout: opts.max_timeout(),
            random_agent: opts.random_agent,
            random_ip: opts.random_ip,
            target_cidr: (opts.random_ip && target_is_cidr).then(|| opts.target.clone()),
        }
    }
}
