//! Banner parsing rules
//!
//! Converts raw banner bytes into a `(service, version)` pair. The rules
//! form an ordered table; the first rule producing a match wins, and that
//! iteration order is part of the contract. HTTP runs first on the raw
//! banner (it needs headers beyond the first line); every other rule sees
//! a sanitized first line.

use once_cell::sync::Lazy;
use regex::Regex;

type ParseResult = Option<(String, String)>;
type Rule = fn(&str) -> ParseResult;

/// Ordered rule table applied to the sanitized banner line.
const RULES: &[Rule] = &[
    parse_ssh,
    parse_openssh_detailed,
    parse_ftp,
    parse_mysql_rule,
    parse_postgresql,
    parse_redis,
    parse_microsoft_services,
    parse_elasticsearch,
    parse_jms,
    parse_glassfish,
    parse_smb,
    parse_smtp_rule,
    parse_pop3_rule,
    parse_imap_rule,
];

/// Extract service name and version from a banner.
///
/// Returns empty strings when nothing matches; the caller falls back to
/// the port map.
pub fn parse_banner(banner: &str) -> (String, String) {
    // HTTP needs the full banner: the Server header sits past line one.
    if banner.contains("HTTP/") {
        if let Some(found) = parse_http(banner) {
            return found;
        }
    }

    let line = sanitize_banner(banner);
    if line.is_empty() {
        return (String::new(), String::new());
    }

    for rule in RULES {
        if let Some(found) = rule(&line) {
            return found;
        }
    }

    (String::new(), String::new())
}

/// Strip non-printable characters (except `\t\r\n`), then reduce to the
/// trimmed first line.
fn sanitize_banner(banner: &str) -> String {
    let printable: String = banner
        .chars()
        .filter(|&c| !c.is_control() || c == '\t' || c == '\r' || c == '\n')
        .collect();
    printable
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// HTTP

static APACHE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Apache[/-]?([\d.]+(?:[.-]\w+)?)").unwrap());
static NGINX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"nginx[/-]?([\d.]+(?:[.-]\w+)?)").unwrap());
static IIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Microsoft-IIS[/-]?([\d.]+)").unwrap());
static TOMCAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tomcat[/-]?([\d.]+(?:[.-]\w+)?)").unwrap());
static NODE_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d.]+").unwrap());

/// Parse an HTTP response banner using the status line and Server header.
pub fn parse_http(banner: &str) -> ParseResult {
    if !banner.contains("HTTP/") {
        return None;
    }

    let mut status_line = "";
    let mut server_header = "";
    for line in banner.lines() {
        let line = line.trim();
        if status_line.is_empty() && line.starts_with("HTTP/") {
            status_line = line;
        }
        if let Some(rest) = strip_prefix_ci(line, "server:") {
            server_header = rest.trim();
            break;
        }
    }

    if !server_header.is_empty() {
        // CUPS advertises over HTTP but speaks IPP.
        if server_header.contains("CUPS/") {
            return Some(("ipp".into(), server_header.to_string()));
        }
        if let Some(v) = parse_apache_version(server_header) {
            return Some(("http".into(), v));
        }
        if let Some(v) = parse_nginx_version(server_header) {
            return Some(("http".into(), v));
        }
        if let Some(v) = parse_iis_version(server_header) {
            return Some(("http".into(), v));
        }
        if let Some(v) = parse_tomcat_version(server_header) {
            return Some(("http".into(), v));
        }
        if let Some(v) = parse_node_version(server_header) {
            return Some(("http".into(), v));
        }
        // Unrecognized server products (Microsoft-HTTPAPI among them) keep
        // the header verbatim.
        return Some(("http".into(), server_header.to_string()));
    }

    if !status_line.is_empty() {
        return Some(("http".into(), String::new()));
    }
    None
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

fn parse_apache_version(server: &str) -> Option<String> {
    if !server.contains("Apache") {
        return None;
    }
    let version = APACHE_RE.captures(server)?.get(1)?.as_str();
    for distro in ["Ubuntu", "Debian", "CentOS"] {
        if server.contains(distro) {
            return Some(format!("Apache {version} ({distro})"));
        }
    }
    Some(format!("Apache {version}"))
}

fn parse_nginx_version(server: &str) -> Option<String> {
    if !server.contains("nginx") {
        return None;
    }
    let version = NGINX_RE.captures(server)?.get(1)?.as_str();
    Some(format!("Nginx {version}"))
}

fn parse_iis_version(server: &str) -> Option<String> {
    if !server.contains("IIS") {
        return None;
    }
    let version = IIS_RE.captures(server)?.get(1)?.as_str();
    let windows = match version {
        "10.0" => Some("Windows Server 2016 or later"),
        "8.5" => Some("Windows Server 2012 R2"),
        "8.0" => Some("Windows Server 2012"),
        "7.5" => Some("Windows Server 2008 R2 or Windows 7"),
        "7.0" => Some("Windows Server 2008 or Windows Vista"),
        _ => None,
    };
    Some(match windows {
        Some(desc) => format!("IIS {version} ({desc})"),
        None => format!("IIS {version}"),
    })
}

fn parse_tomcat_version(server: &str) -> Option<String> {
    if !server.contains("Tomcat") {
        return None;
    }
    let version = TOMCAT_RE.captures(server)?.get(1)?.as_str();
    Some(format!("Tomcat {version}"))
}

fn parse_node_version(server: &str) -> Option<String> {
    let is_node = ["Node.js", "nodejs", "node", "Express"]
        .iter()
        .any(|p| server.contains(p));
    if !is_node {
        return None;
    }
    let version = NODE_VERSION_RE.find(server)?.as_str();
    Some(format!("Node.js/Express {version}"))
}

// ---------------------------------------------------------------------------
// SSH

static SSH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^SSH-([\d.]+)-(.+)$").unwrap());
static OPENSSH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"OpenSSH[\s_]+([\d.]+)(?:p(\d+))?").unwrap());
static OPENSSH_DETAILED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"OpenSSH_([\d.]+)(?:p\d+)?(?:\s*\(([^)]+)\))?").unwrap());

/// Parse an SSH identification string into protocol and implementation.
pub fn parse_ssh(banner: &str) -> ParseResult {
    if !banner.contains("SSH") {
        return None;
    }
    let caps = SSH_RE.captures(banner)?;
    let protocol = caps.get(1)?.as_str();
    let implementation = caps.get(2)?.as_str().trim().replace('_', " ");
    let protocol_info = format!("SSH-{protocol}");

    if implementation.contains("OpenSSH") {
        if let Some(m) = OPENSSH_RE.captures(&implementation) {
            let version = m.get(1).map(|v| v.as_str()).unwrap_or_default();
            let mut detail = match m.get(2) {
                Some(patch) => format!("OpenSSH {version}p{}", patch.as_str()),
                None => format!("OpenSSH {version}"),
            };
            // Package revisions like "Ubuntu-2ubuntu2.13" carry real version
            // info; plain distro tags do not.
            let rest = implementation[m.get(0).unwrap().end()..].trim();
            if !rest.is_empty() && rest.chars().any(|c| c.is_ascii_digit()) {
                detail.push(' ');
                detail.push_str(rest);
            }
            return Some(("ssh".into(), format!("{protocol_info} - {detail}")));
        }
    } else if implementation.contains("libssh") {
        return Some(("ssh".into(), format!("{protocol_info} - libssh")));
    } else if implementation.contains("PuTTY") {
        return Some(("ssh".into(), format!("{protocol_info} - PuTTY")));
    }

    Some(("ssh".into(), format!("{protocol_info} - {implementation}")))
}

/// Detailed OpenSSH matcher for banners without the `SSH-` prefix,
/// e.g. `OpenSSH_7.4 (Ubuntu)`.
fn parse_openssh_detailed(banner: &str) -> ParseResult {
    if !banner.contains("OpenSSH") {
        return None;
    }
    let caps = OPENSSH_DETAILED_RE.captures(banner)?;
    let version = caps.get(1)?.as_str();
    Some(match caps.get(2) {
        Some(distro) => ("ssh".into(), format!("OpenSSH {version} ({})", distro.as_str())),
        None => ("ssh".into(), format!("OpenSSH {version}")),
    })
}

// ---------------------------------------------------------------------------
// FTP

static FTP_GREETING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^220[\s-]+([^()]+)(?:\s*\(([^)]+)\))?").unwrap());
static PROFTPD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ProFTPD\s+([\d.]+[a-z]?)").unwrap());
static VSFTPD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)vsftpd\s+([\d.]+[a-z]?)").unwrap());
static PUREFTPD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Pure[\s-]?FTPd\s+([\d.]+[a-z]?)").unwrap());
static FILEZILLA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FileZilla(?:\s+Server)?\s+([\d.]+[a-z]?)").unwrap());

fn parse_ftp(banner: &str) -> ParseResult {
    if !banner.starts_with("220") {
        return None;
    }
    // Mail servers greet with 220 too; leave those to the SMTP rule.
    if banner.contains("SMTP") || banner.contains("ESMTP") {
        return None;
    }

    if banner.contains("Microsoft") {
        let version = FTP_GREETING_RE
            .captures(banner)
            .and_then(|c| c.get(2))
            .map(|v| v.as_str().trim().to_string());
        return Some(match version {
            Some(v) if !v.is_empty() => ("ftp".into(), format!("Microsoft FTP {v}")),
            _ => ("ftp".into(), "Microsoft FTP".into()),
        });
    }
    if banner.contains("ProFTPD") {
        return Some(match PROFTPD_RE.captures(banner) {
            Some(c) => ("ftp".into(), format!("ProFTPD {}", &c[1])),
            None => ("ftp".into(), "ProFTPD".into()),
        });
    }
    if banner.to_lowercase().contains("vsftpd") {
        return Some(match VSFTPD_RE.captures(banner) {
            Some(c) => ("ftp".into(), format!("vsFTPd {}", &c[1])),
            None => ("ftp".into(), "vsFTPd".into()),
        });
    }
    if banner.contains("Pure-FTPd") || banner.contains("Pure FTPd") {
        return Some(match PUREFTPD_RE.captures(banner) {
            Some(c) => ("ftp".into(), format!("Pure-FTPd {}", &c[1])),
            None => ("ftp".into(), "Pure-FTPd".into()),
        });
    }
    if banner.contains("FileZilla") {
        return Some(match FILEZILLA_RE.captures(banner) {
            Some(c) => ("ftp".into(), format!("FileZilla {}", &c[1])),
            None => ("ftp".into(), "FileZilla".into()),
        });
    }
    if banner.contains("Gene6") || banner.contains("Gene 6") {
        return Some(("ftp".into(), "Gene6 FTP Server".into()));
    }

    let caps = FTP_GREETING_RE.captures(banner)?;
    let server_info = caps.get(1)?.as_str().trim();
    Some(("ftp".into(), server_info.to_string()))
}

// ---------------------------------------------------------------------------
// MySQL / MariaDB

static MYSQL_BINARY_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+[.\d\w-]*)").unwrap());
static MYSQL_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"((?:MySQL|MariaDB|Percona)[\s-]+)([\d.]+[\w.-]*)").unwrap());

fn parse_mysql_rule(banner: &str) -> ParseResult {
    parse_mysql(banner)
}

/// Parse MySQL handshakes: the binary initial packet payload (protocol
/// byte `0x0a` followed by a version string) or a textual product banner.
pub fn parse_mysql(banner: &str) -> ParseResult {
    if banner.as_bytes().first() == Some(&0x0a) {
        if let Some(caps) = MYSQL_BINARY_VERSION_RE.captures(banner) {
            let version = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if banner.contains("MariaDB") {
                return Some(("mysql".into(), format!("MariaDB {version}")));
            }
            if banner.contains("Percona") {
                return Some(("mysql".into(), format!("Percona MySQL {version}")));
            }
            return Some(("mysql".into(), format!("MySQL {version}")));
        }
        return Some(("mysql".into(), "MySQL".into()));
    }

    if banner.contains("MySQL") || banner.contains("MariaDB") {
        if let Some(caps) = MYSQL_TEXT_RE.captures(banner) {
            let product = caps[1].trim().replace('-', "");
            let version = &caps[2];
            return Some(("mysql".into(), format!("{product} {version}")));
        }
        return Some(("mysql".into(), String::new()));
    }
    None
}

// ---------------------------------------------------------------------------
// PostgreSQL / Redis

static POSTGRES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"PostgreSQL\s+([\d.]+[\w.-]*)").unwrap());
static REDIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"v=([\d.]+[\w.-]*)").unwrap());

fn parse_postgresql(banner: &str) -> ParseResult {
    if !banner.contains("PostgreSQL") {
        return None;
    }
    Some(match POSTGRES_RE.captures(banner) {
        Some(c) => ("postgresql".into(), format!("PostgreSQL {}", &c[1])),
        None => ("postgresql".into(), "PostgreSQL".into()),
    })
}

pub fn parse_redis(banner: &str) -> ParseResult {
    if !banner.contains("redis") && !banner.contains("Redis") {
        return None;
    }
    Some(match REDIS_RE.captures(banner) {
        Some(c) => ("redis".into(), format!("Redis {}", &c[1])),
        None => ("redis".into(), "Redis".into()),
    })
}

// ---------------------------------------------------------------------------
// Microsoft services / Elasticsearch / JMS / GlassFish

static HTTPAPI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Microsoft-HTTPAPI/([\d.]+)").unwrap());
static ES_JSON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""number"\s*:\s*"([\d.]+)""#).unwrap());
static ES_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Elasticsearch\s+([\d.]+)").unwrap());
static JMS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*\(imqbroker\)\s*(\d+)").unwrap());
static GLASSFISH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)GlassFish[\s-]+([\d.]+)").unwrap());

fn parse_microsoft_services(banner: &str) -> ParseResult {
    if !banner.contains("Microsoft-HTTPAPI") {
        return None;
    }
    Some(match HTTPAPI_RE.captures(banner) {
        Some(c) => ("http".into(), format!("Microsoft HTTPAPI {}", &c[1])),
        None => ("http".into(), "Microsoft HTTPAPI".into()),
    })
}

fn parse_elasticsearch(banner: &str) -> ParseResult {
    if !banner.contains("Elasticsearch") {
        return None;
    }
    if let Some(caps) = ES_JSON_RE.captures(banner) {
        let version = &caps[1];
        if banner.contains("OpenSearch") {
            return Some(("elasticsearch".into(), format!("OpenSearch {version}")));
        }
        return Some(("elasticsearch".into(), format!("Elasticsearch {version}")));
    }
    if let Some(caps) = ES_TEXT_RE.captures(banner) {
        return Some(("elasticsearch".into(), format!("Elasticsearch {}", &caps[1])));
    }
    Some(("elasticsearch".into(), "Elasticsearch".into()))
}

fn parse_jms(banner: &str) -> ParseResult {
    if !banner.contains("imqbroker") {
        return None;
    }
    Some(match JMS_RE.captures(banner) {
        Some(c) => ("jms".into(), format!("OpenMQ {}.{}", &c[1], &c[2])),
        None => ("jms".into(), String::new()),
    })
}

fn parse_glassfish(banner: &str) -> ParseResult {
    let caps = GLASSFISH_RE.captures(banner)?;
    Some(("http".into(), format!("GlassFish {}", &caps[1])))
}

// ---------------------------------------------------------------------------
// SMB

static SAMBA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)samba\s+smbd?\s+([\d.]+)").unwrap());
static SMB_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SMB\s+(\d+\.\d+(?:\.\d+)?)").unwrap());
static SMBV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SMBv([\d.]+(?:\s*\(Legacy\))?)").unwrap());

fn parse_smb(banner: &str) -> ParseResult {
    let lower = banner.to_lowercase();

    if lower.contains("samba") {
        if let Some(caps) = SAMBA_RE.captures(banner) {
            return Some(("microsoft-ds".into(), format!("Samba {}", &caps[1])));
        }
        if banner.contains("3.") {
            return Some(("microsoft-ds".into(), "Samba 3.X".into()));
        }
        if banner.contains("4.") {
            return Some(("microsoft-ds".into(), "Samba 4.X".into()));
        }
        return Some(("microsoft-ds".into(), "Samba".into()));
    }

    if banner.contains("Windows")
        || ["2008", "2012", "2016", "2019"].iter().any(|y| banner.contains(y))
    {
        for (marker, version) in [
            ("2008 R2", "Windows Server 2008 R2"),
            ("2008", "Windows Server 2008"),
            ("2012 R2", "Windows Server 2012 R2"),
            ("2012", "Windows Server 2012"),
            ("2016", "Windows Server 2016"),
            ("2019", "Windows Server 2019"),
            ("Windows 10", "Windows 10"),
            ("Windows 7", "Windows 7"),
        ] {
            if banner.contains(marker) {
                return Some(("microsoft-ds".into(), version.into()));
            }
        }
        // Fall through to explicit SMB version markers below; a plain
        // "Microsoft Windows SMB" banner ends up there.
        if !banner.contains("SMB") {
            return Some(("microsoft-ds".into(), "Microsoft Windows SMB".into()));
        }
    }

    if banner.contains("SMB") {
        if let Some(caps) = SMBV_RE.captures(banner) {
            return Some(("microsoft-ds".into(), format!("SMBv{}", &caps[1])));
        }
        if let Some(caps) = SMB_VERSION_RE.captures(banner) {
            return Some(("microsoft-ds".into(), format!("SMB {}", &caps[1])));
        }
        if banner.contains("SMB 1") {
            return Some(("microsoft-ds".into(), "SMB 1.0 (legacy)".into()));
        }
        if banner.contains("Windows") {
            return Some(("microsoft-ds".into(), "Windows SMB".into()));
        }
        return Some(("microsoft-ds".into(), "SMB".into()));
    }

    None
}

// ---------------------------------------------------------------------------
// Mail protocols

static EXIM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Exim\s+([\d.]+)").unwrap());

fn parse_smtp_rule(banner: &str) -> ParseResult {
    parse_smtp(banner)
}

/// Parse an SMTP greeting (`220` + SMTP/ESMTP marker).
pub fn parse_smtp(banner: &str) -> ParseResult {
    if !banner.starts_with("220") {
        return None;
    }
    if !banner.contains("SMTP") && !banner.contains("ESMTP") {
        return None;
    }

    if banner.contains("Postfix") {
        return Some(("smtp".into(), "Postfix SMTP".into()));
    }
    if banner.contains("Exim") {
        return Some(match EXIM_RE.captures(banner) {
            Some(c) => ("smtp".into(), format!("Exim {}", &c[1])),
            None => ("smtp".into(), "Exim".into()),
        });
    }
    if banner.contains("Sendmail") {
        return Some(("smtp".into(), "Sendmail".into()));
    }
    if banner.contains("Microsoft") {
        return Some(("smtp".into(), "Microsoft Exchange SMTP".into()));
    }
    Some(("smtp".into(), String::new()))
}

fn parse_pop3_rule(banner: &str) -> ParseResult {
    parse_pop3(banner)
}

/// Parse a POP3 greeting (`+OK` + product hint).
pub fn parse_pop3(banner: &str) -> ParseResult {
    if !banner.starts_with("+OK") {
        return None;
    }
    if banner.contains("Dovecot") {
        return Some(("pop3".into(), "Dovecot".into()));
    }
    if banner.contains("Courier") {
        return Some(("pop3".into(), "Courier".into()));
    }
    if banner.contains("POP3") || banner.to_lowercase().contains("pop") {
        return Some(("pop3".into(), String::new()));
    }
    None
}

fn parse_imap_rule(banner: &str) -> ParseResult {
    parse_imap(banner)
}

/// Parse an IMAP greeting (`* OK` + capability hint).
pub fn parse_imap(banner: &str) -> ParseResult {
    if !banner.starts_with("* OK") {
        return None;
    }
    if !banner.contains("IMAP") && !banner.contains("CAPABILITY") {
        return None;
    }
    if banner.contains("Dovecot") {
        return Some(("imap".into(), "Dovecot IMAP".into()));
    }
    if banner.contains("Courier") {
        return Some(("imap".into(), "Courier IMAP".into()));
    }
    Some(("imap".into(), String::new()))
}
