//! Host discovery
//!
//! Quick liveness pass over an expanded target list before the full port
//! scan. A host counts as live when a TCP connect succeeds on any probe
//! port within the timeout; remaining probes for that host are abandoned.
//! Output order is unspecified; callers re-sort if they need to.

use std::{sync::Arc, time::Duration};

use tokio::{
    net::TcpStream,
    sync::Semaphore,
    task::JoinSet,
    time::timeout,
};
use tracing::debug;

/// Probe configuration for one discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub ports: Vec<u16>,
    pub timeout: Duration,
    pub workers: usize,
}

impl DiscoveryOptions {
    /// Wide probe set with short timeouts and high concurrency.
    pub fn fast() -> Self {
        Self {
            ports: vec![443, 80, 22, 445, 3306, 8080, 3389],
            timeout: Duration::from_millis(500),
            workers: 50,
        }
    }

    /// Low-noise profile: fewer probes, longer timeout, lower concurrency.
    pub fn ghost() -> Self {
        Self {
            ports: vec![443, 80, 22],
            timeout: Duration::from_millis(900),
            workers: 12,
        }
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::fast()
    }
}

/// Probe all hosts in parallel and return the live subset.
///
/// Discovery is skipped entirely for inputs of one host or fewer.
pub async fn discover_active_hosts(hosts: Vec<String>, opts: DiscoveryOptions) -> Vec<String> {
    if hosts.len() <= 1 {
        return hosts;
    }

    let workers = opts.workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let opts = Arc::new(opts);

    let mut tasks = JoinSet::new();
    for host in hosts {
        let semaphore = semaphore.clone();
        let opts = opts.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            is_host_active(&host, &opts.ports, opts.timeout)
                .await
                .then_some(host)
        });
    }

    let mut active = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Some(host)) = result {
            active.push(host);
        }
    }
    debug!(live = active.len(), "host discovery complete");
    active
}

async fn is_host_active(host: &str, ports: &[u16], dial_timeout: Duration) -> bool {
    for &port in ports {
        match timeout(dial_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => return true,
            _ => continue,
        }
    }
    false
}
