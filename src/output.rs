//! Text output rendering
//!
//! Colored table output for interactive use. Machine formats live in
//! [`crate::report`].

use colored::Colorize;

use crate::report::{critical_services, exposure_level, ScanReport};
use crate::scanner::PortReport;

const PORT_WIDTH: usize = 7;
const STATE_WIDTH: usize = 6;
const SERVICE_WIDTH: usize = 15;
const VERSION_WIDTH: usize = 36;

/// Formats scan results as a table on stdout.
pub struct OutputFormatter {
    include_services: bool,
    include_details: bool,
}

impl OutputFormatter {
    pub fn new(include_services: bool, include_details: bool) -> Self {
        Self {
            include_services,
            include_details,
        }
    }

    pub fn print_results(&self, results: &[PortReport]) {
        if self.include_services {
            self.print_with_services(results);
        } else {
            self.print_basic(results);
        }
    }

    fn print_basic(&self, results: &[PortReport]) {
        println!(
            "{}",
            format!("{:<PORT_WIDTH$} {:<STATE_WIDTH$}", "PORT", "STATE").bold()
        );
        for result in results {
            println!(
                "{} {}",
                format!("{:<PORT_WIDTH$}", result.port).green(),
                format!("{:<STATE_WIDTH$}", "open").bright_green()
            );
        }
    }

    fn print_with_services(&self, results: &[PortReport]) {
        if self.include_details {
            println!(
                "{}",
                format!(
                    "{:<PORT_WIDTH$} {:<STATE_WIDTH$} {:<SERVICE_WIDTH$} {:<VERSION_WIDTH$} {:<7} {:<8} {}",
                    "PORT", "STATE", "SERVICE", "VERSION", "LAT(ms)", "CONF", "EVIDENCE"
                )
                .bold()
            );
            for result in results {
                println!(
                    "{} {} {} {:<VERSION_WIDTH$} {:<7} {:<8} {}",
                    format!("{:<PORT_WIDTH$}", result.port).green(),
                    format!("{:<STATE_WIDTH$}", "open").bright_green(),
                    format!("{:<SERVICE_WIDTH$}", result.service).cyan(),
                    result.version,
                    result.latency_ms,
                    result
                        .confidence
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                    result.evidence,
                );
            }
            return;
        }

        println!(
            "{}",
            format!(
                "{:<PORT_WIDTH$} {:<STATE_WIDTH$} {:<SERVICE_WIDTH$} {}",
                "PORT", "STATE", "SERVICE", "VERSION"
            )
            .bold()
        );
        for result in results {
            println!(
                "{} {} {} {}",
                format!("{:<PORT_WIDTH$}", result.port).green(),
                format!("{:<STATE_WIDTH$}", "open").bright_green(),
                format!("{:<SERVICE_WIDTH$}", result.service).cyan(),
                result.version,
            );
        }
    }
}

/// Per-host exposure summary printed after the result tables.
pub fn print_host_summaries(report: &ScanReport) {
    println!("\n{}", "Host Exposure Summary".bold());
    for host in report.targets() {
        let results = report.host_results(host);
        let critical = critical_services(results);
        let exposure = exposure_level(results.len(), critical.len());

        let critical_str = if critical.is_empty() {
            "none".to_string()
        } else {
            critical.join(", ")
        };
        let exposure_str = match exposure {
            crate::report::ExposureLevel::High => exposure.to_string().red().to_string(),
            crate::report::ExposureLevel::Medium => exposure.to_string().yellow().to_string(),
            crate::report::ExposureLevel::Low => exposure.to_string().green().to_string(),
        };
        println!(
            "- {} | open ports: {} | critical: {} | exposure: {}",
            host.cyan(),
            results.len(),
            critical_str,
            exposure_str,
        );
    }
}

pub fn info(message: &str) {
    println!("{} {message}", "[*]".bright_blue());
}

pub fn warn(message: &str) {
    println!("{} {message}", "[!]".yellow());
}

pub fn success(message: &str) {
    println!("{} {message}", "[+]".green());
}
