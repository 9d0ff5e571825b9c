//! Well-known port to service mapping
//!
//! Fallback classification used when banner parsing yields nothing. The
//! parser always wins over this table; entries here carry `low`
//! confidence with `port map` evidence, except the special cases handled
//! in the scan pipeline (msrpc heuristic, WinRM relabeling).

/// Canonical service name for a well-known TCP port.
pub fn service_for_port(port: u16) -> Option<&'static str> {
    let name = match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 => "http",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        389 => "ldap",
        443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        631 => "ipp",
        636 => "ldaps",
        993 => "imaps",
        995 => "pop3s",
        1433 => "mssql",
        1521 => "oracle",
        1723 => "pptp",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        4848 => "http",
        5432 => "postgresql",
        5900..=5903 => "vnc",
        5985 | 5986 => "http",
        6379 => "redis",
        7676 => "jms",
        8080 => "http",
        8181 => "intermapper",
        8383 => "http-alt",
        8443 => "https-alt",
        9200 | 9300 => "elasticsearch",
        11211 => "memcached",
        27017..=27020 => "mongodb",
        49152..=49155 => "msrpc",
        50070 => "hadoop",
        _ => return None,
    };
    Some(name)
}

/// Service name from the banner when present, otherwise the port map.
pub fn service_name(port: u16, banner_service: &str) -> String {
    if !banner_service.is_empty() {
        return banner_service.to_string();
    }
    service_for_port(port).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_ports() {
        assert_eq!(service_for_port(21), Some("ftp"));
        assert_eq!(service_for_port(22), Some("ssh"));
        assert_eq!(service_for_port(445), Some("microsoft-ds"));
        assert_eq!(service_for_port(3389), Some("ms-wbt-server"));
        assert_eq!(service_for_port(5901), Some("vnc"));
        assert_eq!(service_for_port(27019), Some("mongodb"));
        assert_eq!(service_for_port(49153), Some("msrpc"));
        assert_eq!(service_for_port(54321), None);
    }

    #[test]
    fn test_banner_service_wins() {
        assert_eq!(service_name(80, "ipp"), "ipp");
        assert_eq!(service_name(80, ""), "http");
        assert_eq!(service_name(54321, ""), "");
    }
}
