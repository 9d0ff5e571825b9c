//! Scan executor
//!
//! Drives the per-host port scan: a bounded worker pool pulls ports from a
//! shared queue, dials each with the adaptive timeout, retries with
//! exponential backoff, and hands open connections to the banner acquirer.
//! Ghost mode shuffles the port order, sleeps a random jitter before every
//! dial, caps the pool at 4 workers and imposes a default rate limit.

use std::{
    collections::VecDeque,
    net::Ipv4Addr,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use ipnet::Ipv4Net;
use rand::{seq::SliceRandom, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpStream,
    sync::Mutex as AsyncMutex,
    task::JoinSet,
    time::{interval, sleep, timeout, Instant, MissedTickBehavior},
};
use tracing::debug;

use crate::{
    config::{ScanMode, ScannerConfig},
    services,
    timing::{retry_backoff, AdaptiveTimeout},
};

/// Coarse trust level of a service identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Strategy that produced a service identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionPath {
    #[serde(rename = "banner-parser")]
    BannerParser,
    #[serde(rename = "smb-specialized")]
    SmbSpecialized,
    #[serde(rename = "protocol-fingerprint")]
    ProtocolFingerprint,
    #[serde(rename = "portmap")]
    PortMap,
    #[serde(rename = "portmap-fallback")]
    PortMapFallback,
    #[serde(rename = "portmap+heuristic")]
    PortMapHeuristic,
}

impl DetectionPath {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BannerParser => "banner-parser",
            Self::SmbSpecialized => "smb-specialized",
            Self::ProtocolFingerprint => "protocol-fingerprint",
            Self::PortMap => "portmap",
            Self::PortMapFallback => "portmap-fallback",
            Self::PortMapHeuristic => "portmap+heuristic",
        }
    }
}

impl std::fmt::Display for DetectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scanned port, open or closed. Closed reports are discarded before
/// aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortReport {
    pub port: u16,
    pub open: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub version: String,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub evidence: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detection_path: Option<DetectionPath>,
}

impl PortReport {
    fn closed(port: u16, latency: Duration) -> Self {
        Self {
            port,
            open: false,
            service: String::new(),
            version: String::new(),
            latency_ms: latency.as_millis() as u64,
            confidence: None,
            evidence: String::new(),
            detection_path: None,
        }
    }

    fn open(port: u16, latency_ms: u64) -> Self {
        Self {
            port,
            open: true,
            service: String::new(),
            version: String::new(),
            latency_ms,
            confidence: None,
            evidence: String::new(),
            detection_path: None,
        }
    }
}

/// Single-host scanner. One instance is created per target; the adaptive
/// timeout state it owns lives and dies with it.
#[derive(Debug)]
pub struct Scanner {
    host: String,
    mode: ScanMode,
    workers: usize,
    rate: u32,
    retries: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    random_agent: bool,
    random_ip: bool,
    header_pool: Option<Ipv4Net>,
    adaptive: AdaptiveTimeout,
}

impl Scanner {
    pub fn new(host: impl Into<String>, mode: ScanMode) -> Self {
        let base = mode.default_timeout();
        Self {
            host: host.into(),
            mode,
            workers: mode.default_workers(),
            rate: 0,
            retries: 0,
            backoff_base: Duration::from_millis(25),
            backoff_max: Duration::from_millis(600),
            random_agent: false,
            random_ip: false,
            header_pool: None,
            adaptive: AdaptiveTimeout::new(true, base, mode.default_max_timeout()),
        }
    }

    /// Override scanner defaults with validated tuning values.
    pub fn configure(&mut self, cfg: ScannerConfig) {
        if cfg.workers > 0 {
            self.workers = cfg.workers;
        }
        self.rate = cfg.rate;
        self.retries = cfg.retries;
        if let Some(base) = cfg.backoff_base {
            self.backoff_base = base;
        }
        self.backoff_max = self.backoff_max.max(self.backoff_base * 4);
        self.random_agent = cfg.random_agent;
        self.random_ip = cfg.random_ip;
        if self.random_ip {
            self.header_pool = header_pool(cfg.target_cidr.as_deref(), &self.host);
        }

        let base = cfg.timeout.unwrap_or_else(|| self.mode.default_timeout());
        let max = cfg
            .max_timeout
            .unwrap_or_else(|| self.mode.default_max_timeout());
        self.adaptive = AdaptiveTimeout::new(cfg.adaptive_timeout, base, max);

        if self.is_ghost() {
            // Conservative defaults in ghost mode reduce traffic spikes.
            if self.rate == 0 {
                self.rate = 8;
            }
            self.workers = self.workers.min(4);
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_ghost(&self) -> bool {
        self.mode == ScanMode::Ghost
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub(crate) fn adaptive(&self) -> &AdaptiveTimeout {
        &self.adaptive
    }

    pub(crate) fn random_agent(&self) -> bool {
        self.random_agent
    }

    /// Scan the given ports and return the open ones, sorted by port number.
    pub async fn scan(self: &Arc<Self>, mut ports: Vec<u16>, detect_services: bool) -> Vec<PortReport> {
        if self.is_ghost() {
            ports.shuffle(&mut thread_rng());
        }

        let queue = Arc::new(StdMutex::new(VecDeque::from(ports)));
        let limiter = (self.rate > 0).then(|| {
            let period = (Duration::from_secs(1) / self.rate).max(Duration::from_millis(1));
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Arc::new(AsyncMutex::new(ticker))
        });

        let mut tasks: JoinSet<Vec<PortReport>> = JoinSet::new();
        for _ in 0..self.workers.max(1) {
            let scanner = Arc::clone(self);
            let queue = Arc::clone(&queue);
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let mut results = Vec::new();
                loop {
                    let port = queue.lock().unwrap().pop_front();
                    let Some(port) = port else { break };
                    if scanner.is_ghost() {
                        sleep(ghost_jitter()).await;
                    }
                    if let Some(limiter) = &limiter {
                        limiter.lock().await.tick().await;
                    }
                    results.push(scanner.scan_port(port, detect_services).await);
                }
                results
            });
        }

        let mut open = Vec::new();
        while let Some(worker_results) = tasks.join_next().await {
            if let Ok(results) = worker_results {
                open.extend(results.into_iter().filter(|r| r.open));
            }
        }
        open.sort_by_key(|r| r.port);
        debug!(host = %self.host, open = open.len(), "host scan complete");
        open
    }

    /// Dial one port with retries and, when open, run identification.
    async fn scan_port(&self, port: u16, detect_services: bool) -> PortReport {
        let start = Instant::now();
        let mut stream = None;

        for attempt in 0..=self.retries {
            let dial_timeout = self.adaptive.current_timeout();
            let attempt_start = Instant::now();
            match timeout(dial_timeout, TcpStream::connect((self.host.as_str(), port))).await {
                Ok(Ok(conn)) => {
                    self.adaptive.record_outcome(true, attempt_start.elapsed());
                    stream = Some(conn);
                    break;
                }
                _ => {
                    self.adaptive.record_outcome(false, attempt_start.elapsed());
                    if attempt < self.retries && !self.is_ghost() {
                        sleep(retry_backoff(self.backoff_base, self.backoff_max, attempt)).await;
                    }
                }
            }
        }

        let latency = start.elapsed();
        let Some(stream) = stream else {
            return PortReport::closed(port, latency);
        };

        let latency_ms = (latency.as_millis() as u64).max(1);
        let mut report = PortReport::open(port, latency_ms);

        if !detect_services {
            report.service = services::service_for_port(port).unwrap_or_default().into();
            report.confidence = Some(Confidence::Low);
            report.evidence = "port map".into();
            report.detection_path = Some(DetectionPath::PortMap);
            return report;
        }

        self.grab_banner(stream, port, &mut report).await;
        report
    }

    /// Random IPv4 drawn from the spoofed-header pool, excluding the
    /// network and broadcast addresses.
    pub(crate) fn random_header_ip(&self) -> Option<String> {
        let pool = self.header_pool?;
        if pool.prefix_len() >= 31 {
            return None;
        }
        let host_bits = 32 - u32::from(pool.prefix_len());
        let host_count = 1u64 << host_bits;
        if host_count <= 2 {
            return None;
        }
        let offset = thread_rng().gen_range(1..host_count - 1) as u32;
        let addr = Ipv4Addr::from(u32::from(pool.network()) + offset);
        Some(addr.to_string())
    }
}

/// Random per-dial delay used in ghost mode.
pub(crate) fn ghost_jitter() -> Duration {
    Duration::from_millis(220 + thread_rng().gen_range(0..=900))
}

/// Resolve the spoofed-header address pool: the target CIDR when the scan
/// covers one, otherwise a /24 approximation around the single host.
fn header_pool(cidr: Option<&str>, host: &str) -> Option<Ipv4Net> {
    if let Some(cidr) = cidr {
        if let Ok(net) = cidr.parse::<Ipv4Net>() {
            return Some(net.trunc());
        }
    }
    let ip: Ipv4Addr = host.parse().ok()?;
    Ipv4Net::new(ip, 24).ok().map(|net| net.trunc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{io::AsyncWriteExt, net::TcpListener};

    async fn banner_server(banner: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if let Ok((mut conn, _)) = listener.accept().await {
                    let _ = conn.write_all(banner.as_bytes()).await;
                }
            }
        });
        port
    }

    fn test_scanner() -> Scanner {
        let mut scanner = Scanner::new("127.0.0.1", ScanMode::Fast);
        scanner.configure(ScannerConfig {
            workers: 8,
            timeout: Some(Duration::from_millis(400)),
            adaptive_timeout: true,
            ..Default::default()
        });
        scanner
    }

    #[tokio::test]
    async fn test_scan_reports_open_ports_sorted() {
        let ssh_port = banner_server("SSH-2.0-OpenSSH_7.4p1 Ubuntu\r\n").await;
        let ftp_port = banner_server("220 ProFTPD 1.3.5c Server ready\r\n").await;
        // a port nothing listens on
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };

        let scanner = Arc::new(test_scanner());
        let results = scanner.scan(vec![ssh_port, ftp_port, closed], true).await;

        assert_eq!(results.len(), 2);
        assert!(results.windows(2).all(|w| w[0].port < w[1].port));
        for report in &results {
            assert!(report.open);
            assert!(report.latency_ms >= 1);
            assert_eq!(report.confidence, Some(Confidence::High));
            assert_eq!(report.detection_path, Some(DetectionPath::BannerParser));
        }
        let ssh = results.iter().find(|r| r.port == ssh_port).unwrap();
        assert_eq!(ssh.service, "ssh");
        assert_eq!(ssh.version, "SSH-2.0 - OpenSSH 7.4p1");
        let ftp = results.iter().find(|r| r.port == ftp_port).unwrap();
        assert_eq!(ftp.service, "ftp");
        assert_eq!(ftp.version, "ProFTPD 1.3.5c");
    }

    #[tokio::test]
    async fn test_closed_ports_are_not_reported() {
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let scanner = Arc::new(test_scanner());
        let results = scanner.scan(vec![closed], false).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_port_map_used_without_service_detection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let scanner = Arc::new(test_scanner());
        let results = scanner.scan(vec![port], false).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence, Some(Confidence::Low));
        assert_eq!(results[0].evidence, "port map");
        assert_eq!(results[0].detection_path, Some(DetectionPath::PortMap));
    }

    #[test]
    fn test_ghost_mode_caps_workers_and_rate() {
        let mut scanner = Scanner::new("10.0.0.1", ScanMode::Ghost);
        scanner.configure(ScannerConfig {
            workers: 64,
            ..Default::default()
        });
        assert_eq!(scanner.workers(), 4);
        assert_eq!(scanner.rate(), 8);
    }

    #[test]
    fn test_ghost_rate_override_respected() {
        let mut scanner = Scanner::new("10.0.0.1", ScanMode::Ghost);
        scanner.configure(ScannerConfig {
            rate: 2,
            ..Default::default()
        });
        assert_eq!(scanner.rate(), 2);
    }

    #[test]
    fn test_ghost_jitter_window() {
        for _ in 0..200 {
            let jitter = ghost_jitter();
            assert!(jitter >= Duration::from_millis(220));
            assert!(jitter <= Duration::from_millis(1120));
        }
    }

    #[test]
    fn test_header_pool_single_host_approximation() {
        let pool = header_pool(None, "192.168.1.77").unwrap();
        assert_eq!(pool.to_string(), "192.168.1.0/24");
        assert_eq!(header_pool(None, "not-an-ip"), None);
    }

    #[test]
    fn test_random_header_ip_stays_inside_pool() {
        let mut scanner = Scanner::new("192.168.1.77", ScanMode::Fast);
        scanner.configure(ScannerConfig {
            random_ip: true,
            ..Default::default()
        });
        for _ in 0..100 {
            let ip: Ipv4Addr = scanner.random_header_ip().unwrap().parse().unwrap();
            assert!(ip > Ipv4Addr::new(192, 168, 1, 0));
            assert!(ip < Ipv4Addr::new(192, 168, 1, 255));
        }
    }
}
