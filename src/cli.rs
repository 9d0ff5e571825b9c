//! Command-line interface definition
//!
//! Parses and validates all command-line arguments, then normalizes them
//! into [`ScanOptions`] for the orchestration layer. Cross-flag conflicts
//! are rejected here, before anything touches the network.

use std::path::PathBuf;

use clap::Parser;

use crate::{
    config::{OutputFormat, ScanOptions},
    error::Result,
};

#[derive(Parser, Debug)]
#[command(
    name = "rmap",
    version,
    about = "Fast TCP scanner with service detection and stealth profiles",
    long_about = "A concurrent TCP connect scanner with active service and version \
fingerprinting, host discovery for CIDR targets, and a low-noise ghost profile."
)]
pub struct Cli {
    /// Target host, comma list, or CIDR block (e.g. 10.0.0.1, 10.0.0.0/24)
    pub target: String,

    // Target & scan
    /// Ports to scan (e.g. 80,443 | 1-1024 | - for all ports)
    #[arg(short = 'p', long = "ports", value_name = "PORTS")]
    pub ports: Option<String>,

    /// Remove ports from the final scan set
    #[arg(long = "exclude-ports", value_name = "PORTS")]
    pub exclude_ports: Option<String>,

    /// Scan the first N ports of the curated top-1000 list
    #[arg(long = "top-ports", value_name = "N")]
    pub top_ports: Option<usize>,

    /// Enable service and version detection
    #[arg(short = 's', long = "service")]
    pub service_detect: bool,

    /// Ghost mode: slower, stealthier scanning
    #[arg(short = 'g', long = "ghost")]
    pub ghost_mode: bool,

    /// Disable host discovery (scan all hosts in a CIDR even if inactive)
    #[arg(long = "no-discovery")]
    pub no_discovery: bool,

    // Performance & robustness
    /// Concurrent workers per host (0 = auto by mode)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub workers: usize,

    /// Max ports per second per host (0 = unlimited)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub rate: u32,

    /// Dial timeout per attempt in milliseconds (0 = auto by mode)
    #[arg(long = "timeout", value_name = "MS", default_value_t = 0)]
    pub timeout_ms: u64,

    /// Retry attempts per port on timeout or error
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: u32,

    /// Exponential-backoff base between retries, in milliseconds
    #[arg(long = "backoff-ms", value_name = "MS", default_value_t = 25)]
    pub backoff_ms: u64,

    /// Disable adaptive timeout tuning during the scan
    #[arg(long = "no-adaptive-timeout")]
    pub no_adaptive_timeout: bool,

    /// Maximum adaptive timeout in milliseconds (0 = automatic)
    #[arg(long = "max-timeout", value_name = "MS", default_value_t = 0)]
    pub max_timeout_ms: u64,

    /// Cap the number of hosts scanned after discovery (0 = unlimited)
    #[arg(long = "max-hosts", value_name = "N", default_value_t = 0)]
    pub max_hosts: usize,

    // Stealth identity (HTTP probes)
    /// Randomize the HTTP User-Agent on each request
    #[arg(long = "random-agent")]
    pub random_agent: bool,

    /// Send randomized X-Forwarded-For/X-Real-IP headers from the target CIDR
    #[arg(long = "random-ip")]
    pub random_ip: bool,

    // Output
    /// Output format
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(long = "out", value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Include latency/confidence/evidence columns (text output only)
    #[arg(long)]
    pub details: bool,
}

impl Cli {
    /// Normalize into validated scan options.
    pub fn into_options(self) -> Result<ScanOptions> {
        let options = ScanOptions {
            target: self.target,
            ports: self.ports,
            exclude_ports: self.exclude_ports,
            top_ports: self.top_ports,
            service_detect: self.service_detect,
            ghost_mode: self.ghost_mode,
            no_discovery: self.no_discovery,
            rate: self.rate,
            workers: self.workers,
            timeout_ms: self.timeout_ms,
            retries: self.retries,
            backoff_ms: self.backoff_ms,
            adaptive_timeout: !self.no_adaptive_timeout,
            max_timeout_ms: self.max_timeout_ms,
            max_hosts: self.max_hosts,
            random_agent: self.random_agent,
            random_ip: self.random_ip,
            format: self.format,
            out_path: self.out,
            details: self.details,
        };
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let cli = Cli::parse_from(["rmap", "10.0.11.6"]);
        let options = cli.into_options().unwrap();
        assert_eq!(options.target, "10.0.11.6");
        assert!(!options.service_detect);
        assert!(options.adaptive_timeout);
        assert_eq!(options.backoff_ms, 25);
        assert_eq!(options.format, OutputFormat::Text);
    }

    #[test]
    fn test_full_invocation() {
        let cli = Cli::parse_from([
            "rmap",
            "-s",
            "-g",
            "--ports",
            "21,22,80,445",
            "--rate",
            "16",
            "--workers",
            "4",
            "--timeout",
            "750",
            "--retries",
            "2",
            "--format",
            "json",
            "10.0.11.0/24",
        ]);
        let options = cli.into_options().unwrap();
        assert!(options.service_detect);
        assert!(options.ghost_mode);
        assert_eq!(options.ports.as_deref(), Some("21,22,80,445"));
        assert_eq!(options.rate, 16);
        assert_eq!(options.workers, 4);
        assert_eq!(options.timeout_ms, 750);
        assert_eq!(options.retries, 2);
        assert_eq!(options.format, OutputFormat::Json);
    }

    #[test]
    fn test_random_ip_without_service_detect_rejected() {
        let cli = Cli::parse_from(["rmap", "--random-ip", "10.0.11.6"]);
        assert!(cli.into_options().is_err());
    }

    #[test]
    fn test_top_ports_conflicts_with_ports() {
        let cli = Cli::parse_from(["rmap", "-p", "80", "--top-ports", "100", "10.0.11.6"]);
        assert!(cli.into_options().is_err());
    }

    #[test]
    fn test_details_requires_text_output() {
        let cli = Cli::parse_from(["rmap", "--details", "--format", "csv", "10.0.11.6"]);
        assert!(cli.into_options().is_err());
    }

    #[test]
    fn test_negative_numbers_rejected_by_parser() {
        assert!(Cli::try_parse_from(["rmap", "--rate", "-1", "10.0.11.6"]).is_err());
        assert!(Cli::try_parse_from(["rmap", "--retries", "-2", "10.0.11.6"]).is_err());
    }

    #[test]
    fn test_missing_target_rejected() {
        assert!(Cli::try_parse_from(["rmap"]).is_err());
    }
}
