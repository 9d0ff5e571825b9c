//! Result aggregation and machine-readable reports
//!
//! Collects per-host open-port results in target order, derives the
//! per-host exposure summary, and renders the JSON/JSONL/CSV formats.
//! Closed ports never appear in any output; an empty report is valid
//! machine output.

use std::{collections::HashMap, io::Write, time::Duration};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::{
    error::{Result, ScannerError},
    scanner::{Confidence, DetectionPath, PortReport},
};

/// Version stamp carried in every machine-readable payload.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Services whose exposure materially raises the risk of a host.
const CRITICAL_SERVICES: &[&str] = &[
    "ssh",
    "ftp",
    "microsoft-ds",
    "msrpc",
    "ms-wbt-server",
    "winrm",
    "mysql",
    "mssql",
    "postgresql",
    "redis",
    "ldap",
    "ldaps",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ExposureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Exposure rating from open-port and critical-service counts.
pub fn exposure_level(open_ports: usize, critical_count: usize) -> ExposureLevel {
    if critical_count >= 3 || open_ports >= 10 {
        ExposureLevel::High
    } else if critical_count >= 1 || open_ports >= 4 {
        ExposureLevel::Medium
    } else {
        ExposureLevel::Low
    }
}

/// Sorted, deduplicated critical services present in a host's results.
pub fn critical_services(results: &[PortReport]) -> Vec<&'static str> {
    let mut found: Vec<&'static str> = CRITICAL_SERVICES
        .iter()
        .copied()
        .filter(|svc| results.iter().any(|r| r.service == *svc))
        .collect();
    found.sort_unstable();
    found
}

/// Aggregated scan results for one run.
#[derive(Debug)]
pub struct ScanReport {
    target: String,
    service_detect: bool,
    ports_requested: usize,
    targets: Vec<String>,
    results: HashMap<String, Vec<PortReport>>,
    duration: Duration,
}

impl ScanReport {
    pub fn new(target: impl Into<String>, service_detect: bool, ports_requested: usize) -> Self {
        Self {
            target: target.into(),
            service_detect,
            ports_requested,
            targets: Vec::new(),
            results: HashMap::new(),
            duration: Duration::ZERO,
        }
    }

    /// Record the scanned hosts in target-expansion order.
    pub fn set_targets(&mut self, targets: Vec<String>) {
        self.targets = targets;
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Append one host's open-port results. Hosts without open ports are
    /// tracked through `targets` only.
    pub fn insert(&mut self, host: impl Into<String>, results: Vec<PortReport>) {
        if !results.is_empty() {
            self.results.insert(host.into(), results);
        }
    }

    pub fn host_results(&self, host: &str) -> &[PortReport] {
        self.results.get(host).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn total_open(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// Render the JSON document format.
    pub fn write_json<W: Write>(&self, writer: &mut W) -> Result<()> {
        #[derive(Serialize)]
        struct JsonHost<'a> {
            host: &'a str,
            open_ports: usize,
            results: &'a [PortReport],
        }

        #[derive(Serialize)]
        struct JsonDocument<'a> {
            schema_version: &'a str,
            generated_at: String,
            target: &'a str,
            service_scan: bool,
            hosts_scanned: usize,
            ports_requested: usize,
            total_open_ports: usize,
            duration_ms: u64,
            hosts: Vec<JsonHost<'a>>,
        }

        let hosts: Vec<JsonHost<'_>> = self
            .targets
            .iter()
            .map(|host| {
                let results = self.host_results(host);
                JsonHost {
                    host,
                    open_ports: results.len(),
                    results,
                }
            })
            .collect();

        let document = JsonDocument {
            schema_version: SCHEMA_VERSION,
            generated_at: timestamp(),
            target: &self.target,
            service_scan: self.service_detect,
            hosts_scanned: self.targets.len(),
            ports_requested: self.ports_requested,
            total_open_ports: self.total_open(),
            duration_ms: self.duration.as_millis() as u64,
            hosts,
        };

        serde_json::to_writer_pretty(&mut *writer, &document)?;
        writer.write_all(b"\n").map_err(|e| ScannerError::output("json", e.to_string()))
    }

    /// Render one JSON object per open port.
    pub fn write_jsonl<W: Write>(&self, writer: &mut W) -> Result<()> {
        #[derive(Serialize)]
        struct JsonlRecord<'a> {
            schema_version: &'a str,
            generated_at: &'a str,
            target: &'a str,
            host: &'a str,
            port: u16,
            state: &'a str,
            #[serde(skip_serializing_if = "str::is_empty")]
            service: &'a str,
            #[serde(skip_serializing_if = "str::is_empty")]
            version: &'a str,
            latency_ms: u64,
            #[serde(skip_serializing_if = "Option::is_none")]
            confidence: Option<Confidence>,
            #[serde(skip_serializing_if = "str::is_empty")]
            evidence: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            detection_path: Option<DetectionPath>,
        }

        let generated_at = timestamp();
        for host in &self.targets {
            for result in self.host_results(host) {
                let record = JsonlRecord {
                    schema_version: SCHEMA_VERSION,
                    generated_at: &generated_at,
                    target: &self.target,
                    host,
                    port: result.port,
                    state: "open",
                    service: &result.service,
                    version: &result.version,
                    latency_ms: result.latency_ms,
                    confidence: result.confidence,
                    evidence: &result.evidence,
                    detection_path: result.detection_path,
                };
                serde_json::to_writer(&mut *writer, &record)?;
                writer
                    .write_all(b"\n")
                    .map_err(|e| ScannerError::output("jsonl", e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Render a CSV table: header plus one row per open port.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut emit = |row: &[String]| -> Result<()> {
            let line = row
                .iter()
                .map(|field| csv_escape(field))
                .collect::<Vec<_>>()
                .join(",");
            writeln!(writer, "{line}").map_err(|e| ScannerError::output("csv", e.to_string()))
        };

        emit(&[
            "host".into(),
            "port".into(),
            "state".into(),
            "service".into(),
            "version".into(),
            "latency_ms".into(),
            "confidence".into(),
            "evidence".into(),
            "detection_path".into(),
        ])?;

        for host in &self.targets {
            for result in self.host_results(host) {
                emit(&[
                    host.clone(),
                    result.port.to_string(),
                    "open".into(),
                    result.service.clone(),
                    result.version.clone(),
                    result.latency_ms.to_string(),
                    result.confidence.map(|c| c.to_string()).unwrap_or_default(),
                    result.evidence.clone(),
                    result
                        .detection_path
                        .map(|p| p.as_str().to_string())
                        .unwrap_or_default(),
                ])?;
            }
        }
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ScanReport {
        let mut report = ScanReport::new("10.0.11.6", true, 2);
        report.set_targets(vec!["10.0.11.6".into()]);
        report.insert(
            "10.0.11.6",
            vec![
                PortReport {
                    port: 80,
                    open: true,
                    service: "http".into(),
                    version: "IIS 7.5".into(),
                    latency_ms: 2,
                    confidence: Some(Confidence::High),
                    evidence: "protocol banner".into(),
                    detection_path: Some(DetectionPath::BannerParser),
                },
                PortReport {
                    port: 445,
                    open: true,
                    service: "microsoft-ds".into(),
                    version: "Windows Server 2008 R2".into(),
                    latency_ms: 3,
                    confidence: Some(Confidence::High),
                    evidence: "nmap smb-os-discovery".into(),
                    detection_path: Some(DetectionPath::SmbSpecialized),
                },
            ],
        );
        report.set_duration(Duration::from_millis(150));
        report
    }

    #[test]
    fn test_json_report() {
        let report = sample_report();
        let mut buf = Vec::new();
        report.write_json(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains(r#""schema_version": "1.0.0""#));
        assert!(out.contains(r#""total_open_ports": 2"#));
        assert!(out.contains(r#""detection_path": "smb-specialized""#));
        assert!(out.contains(r#""duration_ms": 150"#));
    }

    #[test]
    fn test_jsonl_report() {
        let report = sample_report();
        let mut buf = Vec::new();
        report.write_jsonl(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.trim().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""state":"open""#));
        assert!(lines[0].contains(r#""confidence":"high""#));
    }

    #[test]
    fn test_csv_report() {
        let report = sample_report();
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.trim().lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("detection_path"));
        assert!(lines[2].contains("microsoft-ds"));
    }

    #[test]
    fn test_empty_report_is_valid_machine_output() {
        let report = ScanReport::new("10.0.11.0/24", false, 10);
        let mut buf = Vec::new();
        report.write_json(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains(r#""total_open_ports": 0"#));

        let mut buf = Vec::new();
        report.write_jsonl(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("has,comma"), "\"has,comma\"");
        assert_eq!(csv_escape("has\"quote"), "\"has\"\"quote\"");
    }

    #[test]
    fn test_exposure_levels() {
        assert_eq!(exposure_level(1, 0), ExposureLevel::Low);
        assert_eq!(exposure_level(5, 0), ExposureLevel::Medium);
        assert_eq!(exposure_level(1, 1), ExposureLevel::Medium);
        assert_eq!(exposure_level(2, 3), ExposureLevel::High);
        assert_eq!(exposure_level(10, 0), ExposureLevel::High);
    }

    #[test]
    fn test_critical_services_sorted_and_deduped() {
        let results = vec![
            PortReport {
                port: 22,
                open: true,
                service: "ssh".into(),
                version: String::new(),
                latency_ms: 1,
                confidence: None,
                evidence: String::new(),
                detection_path: None,
            },
            PortReport {
                port: 3306,
                open: true,
                service: "mysql".into(),
                version: String::new(),
                latency_ms: 1,
                confidence: None,
                evidence: String::new(),
                detection_path: None,
            },
            PortReport {
                port: 2222,
                open: true,
                service: "ssh".into(),
                version: String::new(),
                latency_ms: 1,
                confidence: None,
                evidence: String::new(),
                detection_path: None,
            },
            PortReport {
                port: 80,
                open: true,
                service: "http".into(),
                version: String::new(),
                latency_ms: 1,
                confidence: None,
                evidence: String::new(),
                detection_path: None,
            },
        ];
        assert_eq!(critical_services(&results), vec!["mysql", "ssh"]);
    }
}
