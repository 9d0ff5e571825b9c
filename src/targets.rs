//! Target expansion and resolution
//!
//! Parses target expressions (single host, comma list, CIDR block) into an
//! ordered list of IP strings. CIDR expansion is bounded by a hard host
//! ceiling, emits addresses in numeric order, and strips network/broadcast
//! addresses for prefixes shorter than /31. IPv4 literals bypass the
//! resolver so parsing stays free of DNS side-effects.

use std::net::{IpAddr, ToSocketAddrs};

use ipnet::Ipv4Net;

use crate::error::{Result, ScannerError};

/// Hard ceiling on CIDR expansion, counted in total addresses.
pub const MAX_CIDR_HOSTS: usize = 65_536;

/// Parse a target expression into the ordered list of host IP strings.
///
/// Comma-separated items keep user order; each item may be an IP literal,
/// a hostname, or a CIDR block.
pub fn parse_targets(expr: &str) -> Result<Vec<String>> {
    let mut all = Vec::new();
    for item in expr.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        all.extend(expand_target(item)?);
    }
    if all.is_empty() {
        return Err(ScannerError::invalid_target(expr, "no valid targets found"));
    }
    Ok(all)
}

/// Expand one target item: literal, hostname, or CIDR block.
pub fn expand_target(target: &str) -> Result<Vec<String>> {
    if !target.contains('/') {
        // Literal IPs are kept as-is to avoid DNS lookup side-effects.
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(vec![ip.to_string()]);
        }
        return resolve_hostname(target);
    }
    expand_cidr(target)
}

/// True if any comma-separated item in the expression is a CIDR block.
pub fn is_cidr(expr: &str) -> bool {
    expr.split(',').any(|t| t.trim().contains('/'))
}

/// Human-readable description of the expansion: the single address, or a
/// `first-last` range, plus the host count.
pub fn format_range(expr: &str) -> Result<(String, usize)> {
    let ips = parse_targets(expr)?;
    if ips.len() == 1 {
        return Ok((ips[0].clone(), 1));
    }
    let range = format!("{}-{}", ips[0], ips[ips.len() - 1]);
    Ok((range, ips.len()))
}

fn expand_cidr(cidr: &str) -> Result<Vec<String>> {
    let net: Ipv4Net = cidr.parse().map_err(|e| {
        ScannerError::invalid_target(cidr, format!("invalid CIDR notation: {e}"))
    })?;

    let host_bits = 32 - u32::from(net.prefix_len());
    let total = 1usize << host_bits;
    if total > MAX_CIDR_HOSTS {
        return Err(ScannerError::invalid_target(
            cidr,
            format!("CIDR range too large ({total} hosts), maximum {MAX_CIDR_HOSTS}; use a smaller prefix"),
        ));
    }

    // Ipv4Net::hosts() already omits network and broadcast addresses for
    // prefixes shorter than /31, and yields addresses in numeric order.
    Ok(net.hosts().map(|ip| ip.to_string()).collect())
}

fn resolve_hostname(host: &str) -> Result<Vec<String>> {
    let addrs: Vec<IpAddr> = (host, 0u16)
        .to_socket_addrs()
        .map_err(|_| ScannerError::invalid_target(host, "invalid IP address or hostname"))?
        .map(|sa| sa.ip())
        .collect();
    if addrs.is_empty() {
        return Err(ScannerError::invalid_target(host, "hostname resolved to no addresses"));
    }

    // Prefer IPv4; fall back to the first address for IPv6-only hosts.
    let chosen = addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .unwrap_or(&addrs[0]);
    Ok(vec![chosen.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_ipv4() {
        let ips = parse_targets("127.0.0.1").unwrap();
        assert_eq!(ips, vec!["127.0.0.1"]);
    }

    #[test]
    fn test_comma_list_preserves_order() {
        let ips = parse_targets("10.0.0.9, 10.0.0.1,10.0.0.5").unwrap();
        assert_eq!(ips, vec!["10.0.0.9", "10.0.0.1", "10.0.0.5"]);
    }

    #[test]
    fn test_cidr_slash_24_strips_boundaries() {
        let ips = expand_target("192.168.1.0/24").unwrap();
        assert_eq!(ips.len(), 254);
        assert_eq!(ips[0], "192.168.1.1");
        assert_eq!(ips[253], "192.168.1.254");
    }

    #[test]
    fn test_cidr_slash_30() {
        let ips = expand_target("10.0.0.0/30").unwrap();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_cidr_slash_31_keeps_both() {
        let ips = expand_target("10.0.0.0/31").unwrap();
        assert_eq!(ips, vec!["10.0.0.0", "10.0.0.1"]);
    }

    #[test]
    fn test_cidr_slash_32() {
        let ips = expand_target("10.0.0.7/32").unwrap();
        assert_eq!(ips, vec!["10.0.0.7"]);
    }

    #[test]
    fn test_cidr_ceiling() {
        // /16 is exactly the ceiling, /15 exceeds it
        assert!(expand_target("10.0.0.0/16").is_ok());
        assert!(expand_target("10.0.0.0/15").is_err());
    }

    #[test]
    fn test_cidr_numeric_order() {
        let ips = expand_target("172.16.0.0/29").unwrap();
        let mut sorted = ips.clone();
        sorted.sort_by_key(|s| s.parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(ips, sorted);
    }

    #[test]
    fn test_invalid_targets() {
        assert!(parse_targets("not an address").is_err());
        assert!(parse_targets("10.0.0.0/33").is_err());
        assert!(parse_targets("").is_err());
    }

    #[test]
    fn test_is_cidr() {
        assert!(is_cidr("10.0.0.0/24"));
        assert!(is_cidr("10.0.0.1,10.0.1.0/28"));
        assert!(!is_cidr("10.0.0.1,10.0.0.2"));
    }

    #[test]
    fn test_format_range() {
        let (range, count) = format_range("192.168.1.0/30").unwrap();
        assert_eq!(range, "192.168.1.1-192.168.1.2");
        assert_eq!(count, 2);

        let (single, count) = format_range("192.168.1.7").unwrap();
        assert_eq!(single, "192.168.1.7");
        assert_eq!(count, 1);
    }
}
