//! Scan orchestration
//!
//! Runs the complete workflow: port-set construction, target expansion,
//! host discovery, per-host scans, aggregation, and rendering. Hosts are
//! scanned sequentially; parallelism lives inside each host's worker pool.

use std::{
    fs::File,
    io::{self, Write},
    sync::Arc,
    time::Instant,
};

use colored::Colorize;
use tracing::{info, warn};

use crate::{
    config::{OutputFormat, ScanOptions, ScannerConfig},
    discovery::{self, DiscoveryOptions},
    error::{Result, ScannerError},
    output::{self, OutputFormatter},
    ports,
    report::ScanReport,
    scanner::Scanner,
    targets,
};

/// Execute a full scan according to the validated options.
pub async fn run(options: ScanOptions) -> Result<()> {
    options.validate()?;
    let machine = options.format.is_machine();

    // The output file is created up front so permission problems surface
    // before any scanning happens.
    let mut out_file = match &options.out_path {
        Some(path) => Some(File::create(path).map_err(|e| {
            ScannerError::io(format!("create {}", path.display()), e.to_string())
        })?),
        None => None,
    };

    let mut ports = match options.top_ports {
        Some(n) => ports::top_ports(n),
        None => ports::ports_to_scan(options.ports.as_deref())?,
    };
    if let Some(exclude) = &options.exclude_ports {
        ports = ports::subtract(ports, exclude)?;
        if ports.is_empty() {
            return Err(ScannerError::validation(
                "exclude-ports",
                "no ports left to scan after exclusions",
            ));
        }
    }

    let mut targets = targets::parse_targets(&options.target)?;
    let target_is_cidr = targets::is_cidr(&options.target);

    if options.random_ip && !target_is_cidr && !machine {
        output::warn(
            "--random-ip is most useful with CIDR targets; using a local /24 approximation per host.",
        );
    }

    if !options.no_discovery && target_is_cidr && targets.len() > 1 {
        if !machine {
            output::info(&format!(
                "Discovering active hosts in {}...",
                options.target.cyan()
            ));
        }
        let discovery_opts = if options.ghost_mode {
            if !machine {
                output::warn(
                    "Ghost discovery profile active: low-noise probes on 443,80,22. Use --no-discovery to skip discovery completely.",
                );
            }
            DiscoveryOptions::ghost()
        } else {
            DiscoveryOptions::fast()
        };
        targets = discovery::discover_active_hosts(targets, discovery_opts).await;

        if targets.is_empty() {
            warn!(target = %options.target, "no active hosts found");
            if machine {
                let report = ScanReport::new(options.target.as_str(), options.service_detect, ports.len());
                render_machine(&report, options.format, out_file.as_mut())?;
                notify_saved(&options);
            } else {
                output::warn("No active hosts found in the specified range.");
            }
            return Ok(());
        }
        if !machine {
            output::success(&format!(
                "Found {} active hosts, starting port scan...",
                targets.len()
            ));
        }
    }

    if options.max_hosts > 0 && targets.len() > options.max_hosts {
        if !machine {
            output::warn(&format!(
                "Limiting scan to first {} host(s) due to --max-hosts.",
                options.max_hosts
            ));
        }
        targets.truncate(options.max_hosts);
    }

    if !machine {
        print_scan_header(&options, &targets, ports.len());
    }
    info!(
        hosts = targets.len(),
        ports = ports.len(),
        ghost = options.ghost_mode,
        "starting scan"
    );

    let mut report = ScanReport::new(options.target.as_str(), options.service_detect, ports.len());
    report.set_targets(targets.clone());

    let scan_start = Instant::now();
    for host in &targets {
        let mut scanner = Scanner::new(host.clone(), options.mode());
        scanner.configure(ScannerConfig::from_options(&options, target_is_cidr));
        let scanner = Arc::new(scanner);
        let open = scanner.scan(ports.clone(), options.service_detect).await;
        report.insert(host.clone(), open);
    }
    report.set_duration(scan_start.elapsed());

    if machine {
        render_machine(&report, options.format, out_file.as_mut())?;
        notify_saved(&options);
        return Ok(());
    }

    let formatter = OutputFormatter::new(options.service_detect, options.details);
    let multi_host = targets.len() > 1;
    for host in &targets {
        let results = report.host_results(host);
        if results.is_empty() {
            continue;
        }
        if multi_host {
            println!("\n{}", format!("=== {host} ===").bold());
        }
        formatter.print_results(results);
    }
    output::print_host_summaries(&report);
    output::success(&format!(
        "Completed scan in {:.2?} | hosts: {} | open ports: {}",
        report.duration(),
        targets.len(),
        report.total_open()
    ));
    Ok(())
}

fn print_scan_header(options: &ScanOptions, targets: &[String], port_count: usize) {
    let ghost_tag = if options.ghost_mode {
        format!(" - {} (stealthy)", "Ghost mode".yellow())
    } else {
        String::new()
    };
    if targets.len() == 1 {
        output::info(&format!(
            "Scanning {} ({} ports){}\n",
            targets[0].cyan(),
            port_count,
            ghost_tag
        ));
    } else {
        let range = targets::format_range(&options.target)
            .map(|(range, _)| range)
            .unwrap_or_else(|_| options.target.clone());
        output::info(&format!(
            "Scanning {} ({} active hosts, {} ports){}\n",
            range.cyan(),
            targets.len(),
            port_count,
            ghost_tag
        ));
    }
}

fn render_machine(
    report: &ScanReport,
    format: OutputFormat,
    out_file: Option<&mut File>,
) -> Result<()> {
    match out_file {
        Some(file) => {
            let mut writer: &mut dyn Write = file;
            write_format(report, format, &mut writer)
        }
        None => {
            let mut stdout = io::stdout().lock();
            let mut writer: &mut dyn Write = &mut stdout;
            write_format(report, format, &mut writer)
        }
    }
}

fn write_format(report: &ScanReport, format: OutputFormat, writer: &mut &mut dyn Write) -> Result<()> {
    match format {
        OutputFormat::Json => report.write_json(writer),
        OutputFormat::Jsonl => report.write_jsonl(writer),
        OutputFormat::Csv => report.write_csv(writer),
        OutputFormat::Text => Ok(()),
    }
}

fn notify_saved(options: &ScanOptions) {
    if let Some(path) = &options.out_path {
        output::success(&format!(
            "Saved {} output to {}",
            options.format.to_string().to_uppercase(),
            path.display()
        ));
    }
}
