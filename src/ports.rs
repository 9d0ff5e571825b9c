//! Port selection
//!
//! Parses user port specifications, exposes the curated top-1000 list, and
//! applies exclusion filters. The order of the returned list is the order
//! the executor enqueues: numeric/insertion order for explicit specs, the
//! canonical curated order for top-N.

use crate::error::{Result, ScannerError};

/// Curated list of the most commonly open TCP ports, in canonical order.
const TOP_1000_PORTS: &[u16] = &[
    7, 9, 13, 21, 22, 23, 25, 26, 37, 53, 67, 68, 79, 80, 81, 88, 106, 110, 111, 113, 119, 123,
    135, 137, 138, 139, 143, 144, 161, 162, 177, 179, 199, 389, 427, 434, 443, 444, 445, 465, 513,
    514, 515, 543, 544, 548, 554, 587, 626, 631, 636, 646, 800, 873, 990, 993, 995, 1025, 1026,
    1027, 1028, 1029, 1080, 1110, 1433, 1720, 1723, 1755, 1812, 1813, 1900, 2000, 2001, 2002, 2049,
    2121, 2222, 2323, 2717, 3000, 3128, 3260, 3283, 3306, 3389, 3390, 3500, 3986, 4444, 4899, 5000,
    5001, 5002, 5009, 5051, 5060, 5101, 5190, 5222, 5223, 5269, 5357, 5432, 5631, 5632, 5666, 5667,
    5800, 5900, 5901, 5902, 5903, 5985, 5986, 6000, 6001, 6002, 6003, 6004, 6005, 6006, 6007, 6008,
    6009, 6646, 6697, 7000, 7001, 7002, 7003, 7004, 7005, 7006, 7007, 7008, 7009, 7070, 8000, 8002,
    8008, 8009, 8080, 8081, 8082, 8083, 8084, 8085, 8086, 8087, 8088, 8089, 8090, 8180, 8222, 8443,
    8800, 8888, 9000, 9090, 9091, 9100, 9418, 9999, 10000, 10001, 10002, 10003, 10004, 10005,
    10006, 10007, 10008, 10009, 10010, 11211, 11214, 11215, 12345, 15672, 20000, 20005, 27017,
    27018, 27019, 28017, 30000, 30718, 32768, 3478, 49152, 49153, 49154, 49155, 49156, 49157,
    49400, 50000,
];

/// Parse a port specification into the ordered list of ports to scan.
///
/// Accepted forms: `-` (all ports), a comma-separated list, a single
/// `start-end` range, or a single port. All values must fall in 1..=65535
/// and ranges must be non-decreasing.
pub fn ports_for(spec: &str) -> Result<Vec<u16>> {
    let spec = spec.trim();
    if spec == "-" {
        return Ok((1..=u16::MAX).collect());
    }
    if spec.contains('-') {
        return parse_range(spec);
    }
    if spec.contains(',') {
        return parse_list(spec);
    }
    Ok(vec![parse_port(spec)?])
}

/// Resolve an optional spec: explicit spec when given, curated top-1000
/// otherwise.
pub fn ports_to_scan(spec: Option<&str>) -> Result<Vec<u16>> {
    match spec {
        Some(s) => ports_for(s),
        None => Ok(TOP_1000_PORTS.to_vec()),
    }
}

/// First `n` ports of the curated top-1000 list, in canonical order.
pub fn top_ports(n: usize) -> Vec<u16> {
    TOP_1000_PORTS[..n.min(TOP_1000_PORTS.len())].to_vec()
}

/// Remove every port matched by `exclude_spec`, preserving order.
pub fn subtract(ports: Vec<u16>, exclude_spec: &str) -> Result<Vec<u16>> {
    let excluded = ports_for(exclude_spec)?;
    let excluded: std::collections::HashSet<u16> = excluded.into_iter().collect();
    Ok(ports.into_iter().filter(|p| !excluded.contains(p)).collect())
}

/// Render a port list back into a comma-separated spec.
pub fn render(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_range(spec: &str) -> Result<Vec<u16>> {
    let parts: Vec<&str> = spec.split('-').collect();
    if parts.len() != 2 {
        return Err(ScannerError::validation(
            "ports",
            format!("invalid port range: {spec}"),
        ));
    }
    let start = parse_port(parts[0])?;
    let end = parse_port(parts[1])?;
    if start > end {
        return Err(ScannerError::validation(
            "ports",
            format!("inverted port range: {start}-{end}"),
        ));
    }
    Ok((start..=end).collect())
}

fn parse_list(spec: &str) -> Result<Vec<u16>> {
    spec.split(',').map(|part| parse_port(part.trim())).collect()
}

fn parse_port(s: &str) -> Result<u16> {
    let value: u32 = s
        .parse()
        .map_err(|_| ScannerError::validation("ports", format!("invalid port number: {s}")))?;
    if !(1..=65535).contains(&value) {
        return Err(ScannerError::validation(
            "ports",
            format!("port out of range 1-65535: {value}"),
        ));
    }
    Ok(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_port() {
        assert_eq!(ports_for("80").unwrap(), vec![80]);
        assert_eq!(ports_for("1").unwrap(), vec![1]);
        assert_eq!(ports_for("65535").unwrap(), vec![65535]);
    }

    #[test]
    fn test_parse_port_list() {
        assert_eq!(ports_for("22,80,443").unwrap(), vec![22, 80, 443]);
        // user order is preserved, not re-sorted
        assert_eq!(ports_for("443,22,80").unwrap(), vec![443, 22, 80]);
    }

    #[test]
    fn test_parse_port_range() {
        assert_eq!(ports_for("1-10").unwrap(), (1..=10).collect::<Vec<u16>>());
        assert_eq!(ports_for("80-80").unwrap(), vec![80]);
    }

    #[test]
    fn test_parse_all_ports() {
        let all = ports_for("-").unwrap();
        assert_eq!(all.len(), 65535);
        assert_eq!(all[0], 1);
        assert_eq!(all[65534], 65535);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(ports_for("0").is_err());
        assert!(ports_for("65536").is_err());
        assert!(ports_for("22,0").is_err());
        assert!(ports_for("abc").is_err());
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(ports_for("1024-1").is_err());
    }

    #[test]
    fn test_round_trip() {
        for spec in ["22,80,443", "1-16", "8080"] {
            let ports = ports_for(spec).unwrap();
            assert_eq!(ports_for(&render(&ports)).unwrap(), ports);
        }
    }

    #[test]
    fn test_top_ports() {
        let top = top_ports(5);
        assert_eq!(top, vec![7, 9, 13, 21, 22]);
        // asking for more than the curated list holds returns the whole list
        assert_eq!(top_ports(100_000).len(), TOP_1000_PORTS.len());
    }

    #[test]
    fn test_subtract() {
        let ports = ports_for("1-1024").unwrap();
        let filtered = subtract(ports.clone(), "22,80").unwrap();
        assert_eq!(filtered.len(), ports.len() - 2);
        assert!(!filtered.contains(&22));
        assert!(!filtered.contains(&80));
        assert!(filtered.contains(&1));
        assert!(filtered.contains(&1024));
    }

    #[test]
    fn test_subtract_preserves_order() {
        let filtered = subtract(vec![21, 22, 80, 443, 445], "22,445").unwrap();
        assert_eq!(filtered, vec![21, 80, 443]);
    }

    #[test]
    fn test_default_is_top_1000() {
        let ports = ports_to_scan(None).unwrap();
        assert_eq!(ports, TOP_1000_PORTS);
    }
}
