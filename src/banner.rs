//! Banner acquisition
//!
//! Layered identification strategies for an open port, in order:
//!
//! 1. Active HTTP request (fast mode, HTTP-looking ports; TLS where the
//!    port conventionally requires it)
//! 2. Passive read on the probe connection
//! 3. Active text probes for greeting protocols (fast mode)
//! 4. SMB specialization for port 445 (fast mode)
//! 5. Binary protocol fingerprints: MySQL, MSSQL, RDP, LDAP, WinRM
//!
//! The first non-empty buffer feeds the banner parser; everything after a
//! successful dial is best-effort and never demotes the open verdict.
//! Steps 1 and 3-5 open fresh connections because those protocols consume
//! bytes aggressively; reusing the probe socket is lossy.

use std::time::Duration;

use rand::{thread_rng, Rng};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{timeout, Instant},
};
use tokio_native_tls::{native_tls, TlsStream};
use tracing::trace;

use crate::{
    parsers,
    scanner::{Confidence, DetectionPath, PortReport, Scanner},
    services,
};

/// Ports probed with an HTTP request when service detection is on.
const HTTP_PORTS: &[u16] = &[
    80, 81, 82, 83, 443, 488, 591, 631, 3000, 3001, 3005, 4000, 4343, 4848, 5000, 5353, 5357,
    5672, 5985, 5986, 6080, 6081, 6443, 7000, 7001, 7080, 7443, 8000, 8001, 8008, 8009, 8010,
    8011, 8019, 8020, 8021, 8042, 8080, 8081, 8082, 8083, 8084, 8085, 8086, 8087, 8088, 8089,
    8090, 8091, 8092, 8093, 8097, 8099, 8100, 8180, 8181, 8191, 8192, 8200, 8222, 8254, 8290,
    8291, 8292, 8383, 8443, 8444, 8445, 8500, 8600, 8649, 8651, 8652, 8654, 8686, 8765, 8800,
    8873, 8888, 8899, 8994, 9000, 9001, 9002, 9003, 9008, 9009, 9010, 9011, 9040, 9050, 9071,
    9080, 9081, 9090, 9091, 9099, 9110, 9111, 9200, 9290, 9443, 9502, 9503, 9618, 9666, 9898,
    9900, 9917, 9943, 9944, 10000, 10001, 10002, 10008, 10009, 10012, 10024, 10025, 10160,
    10215, 11111, 11967, 12345, 13456, 15003, 16000, 16001, 16080, 18888, 19315, 20000, 30000,
    32773, 32774, 32775, 40000, 44443, 44444, 50389, 50636, 55056, 55555, 58080, 61532, 61900,
    62078, 65000, 65389,
];

/// Ports where the HTTP probe wraps the connection in TLS.
const TLS_HTTP_PORTS: &[u16] = &[443, 5986, 6443, 7443, 8443, 9443];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:134.0) Gecko/20100101 Firefox/134.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.0 Safari/605.1.15",
    "curl/8.10.1",
    "Wget/1.24.5",
];

const DEFAULT_USER_AGENT: &str = "rmap/2.x";

fn is_http_port(port: u16) -> bool {
    HTTP_PORTS.binary_search(&port).is_ok()
}

fn is_tls_http_port(port: u16) -> bool {
    TLS_HTTP_PORTS.contains(&port)
}

/// A probe connection, plain or TLS-wrapped.
pub(crate) enum ProbeConn {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ProbeConn {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Plain(s) => s.write_all(buf).await,
            Self::Tls(s) => s.write_all(buf).await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf).await,
            Self::Tls(s) => s.read(buf).await,
        }
    }
}

struct Fingerprint {
    service: &'static str,
    version: String,
    confidence: Confidence,
    evidence: &'static str,
}

impl Scanner {
    /// Identify the service behind an open port and fill the report.
    pub(crate) async fn grab_banner(&self, stream: TcpStream, port: u16, report: &mut PortReport) {
        let mut banner = Vec::new();

        if is_http_port(port) && !self.is_ghost() {
            banner = self.http_banner(port).await;
        }
        if banner.is_empty() {
            banner = self.passive_banner(stream).await;
        }
        if banner.is_empty() && !self.is_ghost() {
            banner = self.text_probe(port).await;
        }

        if banner.is_empty() && port == 445 && !self.is_ghost() {
            let (version, evidence) = self.detect_smb().await;
            report.service = "microsoft-ds".into();
            report.version = version;
            report.confidence = Some(Confidence::High);
            report.evidence = evidence.into();
            report.detection_path = Some(DetectionPath::SmbSpecialized);
            return;
        }

        if banner.is_empty() {
            self.apply_port_map(port, report);
            return;
        }

        let text = String::from_utf8_lossy(&banner).into_owned();
        let (service, version) = parsers::parse_banner(&text);

        if !service.is_empty() {
            report.service = service;
            report.version = version;
            // WinRM answers as plain HTTP; relabel when the response gives
            // it away.
            if (port == 5985 || port == 5986) && report.service == "http" {
                let lower = text.to_lowercase();
                if lower.contains("wsman") || lower.contains("microsoft-httpapi") {
                    report.service = "winrm".into();
                    if report.version.is_empty() {
                        report.version = "Microsoft WinRM".into();
                    }
                }
            }
            if report.version.is_empty() {
                report.confidence = Some(Confidence::Medium);
                report.evidence = "protocol banner (generic)".into();
            } else {
                report.confidence = Some(Confidence::High);
                report.evidence = "protocol banner".into();
            }
            report.detection_path = Some(DetectionPath::BannerParser);
            return;
        }

        if !self.is_ghost() {
            if let Some(fp) = self.protocol_fingerprint(port).await {
                report.service = fp.service.into();
                report.version = fp.version;
                report.confidence = Some(fp.confidence);
                report.evidence = fp.evidence.into();
                report.detection_path = Some(DetectionPath::ProtocolFingerprint);
                return;
            }
        }

        report.service = services::service_for_port(port).unwrap_or_default().into();
        report.confidence = Some(Confidence::Low);
        report.evidence = "port map (unparsed banner)".into();
        report.detection_path = Some(DetectionPath::PortMapFallback);
    }

    fn apply_port_map(&self, port: u16, report: &mut PortReport) {
        report.service = services::service_for_port(port).unwrap_or_default().into();
        if report.service == "msrpc" {
            report.version = "Microsoft Windows RPC".into();
            report.confidence = Some(Confidence::Medium);
            report.evidence = "port+protocol behavior".into();
            report.detection_path = Some(DetectionPath::PortMapHeuristic);
            return;
        }
        report.confidence = Some(Confidence::Low);
        report.evidence = "port map".into();
        report.detection_path = Some(DetectionPath::PortMap);
    }

    /// Read whatever the service volunteers on the probe connection.
    async fn passive_banner(&self, mut stream: TcpStream) -> Vec<u8> {
        let deadline = self.adaptive().io_timeout(Duration::from_millis(900));
        let mut buf = vec![0u8; 4096];
        match timeout(deadline, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                buf.truncate(n);
                buf
            }
            _ => Vec::new(),
        }
    }

    /// Issue a GET request on a fresh connection and collect the response.
    pub(crate) async fn http_banner(&self, port: u16) -> Vec<u8> {
        let dial_timeout = self.adaptive().io_timeout(Duration::from_millis(750));
        let mut conn = match self.connect_probe(port, is_tls_http_port(port), dial_timeout).await {
            Some(conn) => conn,
            None => return Vec::new(),
        };

        let request = self.build_http_request("GET", "/");
        if conn.write_all(request.as_bytes()).await.is_err() {
            return Vec::new();
        }
        read_until_eof(&mut conn, dial_timeout).await
    }

    /// Minimal write/read interaction for text-based greeting protocols.
    async fn text_probe(&self, port: u16) -> Vec<u8> {
        match port {
            21 => self.probe_ftp().await,
            25 | 465 | 587 | 2525 => self.probe_text_service(port, b"EHLO rmap.local\r\n").await,
            110 | 995 => self.probe_text_service(port, b"CAPA\r\n").await,
            143 | 993 => self.probe_text_service(port, b"a001 CAPABILITY\r\n").await,
            6379 => self.probe_text_service(port, b"INFO\r\n").await,
            _ => Vec::new(),
        }
    }

    async fn probe_ftp(&self) -> Vec<u8> {
        let io_timeout = self.adaptive().io_timeout(Duration::from_millis(1500));
        let Some(mut conn) = self.connect_probe(21, false, io_timeout).await else {
            return Vec::new();
        };

        let mut buf = vec![0u8; 2048];
        // The greeting alone often carries product and version.
        if let Ok(Ok(n)) = timeout(io_timeout, conn.read(&mut buf)).await {
            if n > 0 {
                let greeting = &buf[..n];
                let text = String::from_utf8_lossy(greeting);
                if text.trim_start().starts_with("220") || text.to_lowercase().contains("ftp") {
                    return greeting.to_vec();
                }
            }
        }

        // Fallback: ask for supported features.
        if conn.write_all(b"FEAT\r\n").await.is_err() {
            return Vec::new();
        }
        match timeout(io_timeout, conn.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => buf[..n].to_vec(),
            _ => Vec::new(),
        }
    }

    pub(crate) async fn probe_text_service(&self, port: u16, payload: &[u8]) -> Vec<u8> {
        let io_timeout = self.adaptive().io_timeout(Duration::from_millis(750));
        let Some(mut conn) = self.connect_probe(port, false, io_timeout).await else {
            return Vec::new();
        };

        let mut response = Vec::new();
        let mut buf = vec![0u8; 2048];

        // Greeting, if the protocol sends one
        if let Ok(Ok(n)) = timeout(io_timeout, conn.read(&mut buf)).await {
            response.extend_from_slice(&buf[..n]);
        }

        if conn.write_all(payload).await.is_err() {
            return response;
        }
        if let Ok(Ok(n)) = timeout(io_timeout, conn.read(&mut buf)).await {
            if n > 0 {
                if !response.is_empty() {
                    response.push(b'\n');
                }
                response.extend_from_slice(&buf[..n]);
            }
        }
        response
    }

    /// Protocol-aware detection for services that need active handshakes.
    async fn protocol_fingerprint(&self, port: u16) -> Option<Fingerprint> {
        match port {
            3306 => {
                let version = self.detect_mysql_handshake(port).await?;
                Some(Fingerprint {
                    service: "mysql",
                    version,
                    confidence: Confidence::High,
                    evidence: "mysql handshake",
                })
            }
            1433 => self.detect_mssql_tds(port).await.then(|| Fingerprint {
                service: "mssql",
                version: "Microsoft SQL Server (TDS)".into(),
                confidence: Confidence::Medium,
                evidence: "tds prelogin response",
            }),
            3389 => self.detect_rdp_x224(port).await.then(|| Fingerprint {
                service: "ms-wbt-server",
                version: "RDP service (X.224)".into(),
                confidence: Confidence::Medium,
                evidence: "rdp x224 response",
            }),
            389 => self.detect_ldap_bind(port, false).await.then(|| Fingerprint {
                service: "ldap",
                version: "LDAP".into(),
                confidence: Confidence::Medium,
                evidence: "ldap bind response",
            }),
            636 => self.detect_ldap_bind(port, true).await.then(|| Fingerprint {
                service: "ldaps",
                version: "LDAP over TLS".into(),
                confidence: Confidence::Medium,
                evidence: "ldap bind response (tls)",
            }),
            5985 | 5986 => {
                let version = self.detect_winrm(port).await?;
                Some(Fingerprint {
                    service: "winrm",
                    version,
                    confidence: Confidence::High,
                    evidence: "wsman/httpapi response",
                })
            }
            _ => None,
        }
    }

    /// Read the server's initial packet: 3-byte LE length, sequence byte,
    /// then a protocol-10 payload whose version string identifies the
    /// product.
    pub(crate) async fn detect_mysql_handshake(&self, port: u16) -> Option<String> {
        let io_timeout = self.adaptive().io_timeout(Duration::from_millis(1200));
        let mut conn = self.connect_probe(port, false, io_timeout).await?;

        let mut buf = [0u8; 512];
        let n = timeout(io_timeout, conn.read(&mut buf)).await.ok()?.ok()?;
        if n < 7 || buf[4] != 0x0a {
            return None;
        }

        let payload = &buf[5..n];
        let version = match payload.iter().position(|&b| b == 0x00) {
            Some(end) if end > 0 => {
                let raw = String::from_utf8_lossy(&payload[..end]).into_owned();
                let cleaned = sanitize_version(&raw);
                if raw.to_lowercase().contains("mariadb") {
                    format!("MariaDB {cleaned}")
                } else {
                    format!("MySQL {cleaned}")
                }
            }
            _ => "MySQL".to_string(),
        };
        Some(version)
    }

    async fn detect_mssql_tds(&self, port: u16) -> bool {
        let io_timeout = self.adaptive().io_timeout(Duration::from_millis(1200));
        let Some(mut conn) = self.connect_probe(port, false, io_timeout).await else {
            return false;
        };

        // TDS7 pre-login packet
        const PRELOGIN: [u8; 52] = [
            0x12, 0x01, 0x00, 0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1a, 0x00, 0x06, 0x01,
            0x00, 0x20, 0x00, 0x01, 0x02, 0x00, 0x21, 0x00, 0x01, 0x03, 0x00, 0x22, 0x00, 0x04,
            0x04, 0x00, 0x26, 0x00, 0x01, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        if conn.write_all(&PRELOGIN).await.is_err() {
            return false;
        }

        let mut buf = [0u8; 256];
        match timeout(io_timeout, conn.read(&mut buf)).await {
            // 0x04 = tabular result, 0x12 = prelogin response
            Ok(Ok(n)) if n >= 8 => buf[0] == 0x04 || buf[0] == 0x12,
            _ => false,
        }
    }

    async fn detect_rdp_x224(&self, port: u16) -> bool {
        let io_timeout = self.adaptive().io_timeout(Duration::from_millis(1200));
        let Some(mut conn) = self.connect_probe(port, false, io_timeout).await else {
            return false;
        };

        // X.224 Connection Request
        const CONNECT_REQ: [u8; 11] = [
            0x03, 0x00, 0x00, 0x0b, 0x06, 0xe0, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        if conn.write_all(&CONNECT_REQ).await.is_err() {
            return false;
        }

        let mut buf = [0u8; 128];
        match timeout(io_timeout, conn.read(&mut buf)).await {
            Ok(Ok(n)) if n >= 7 => {
                buf[0] == 0x03
                    && buf[1] == 0x00
                    && (buf[5] == 0xd0 || buf[5] == 0xe0 || buf[5] == 0xf0)
            }
            _ => false,
        }
    }

    async fn detect_ldap_bind(&self, port: u16, use_tls: bool) -> bool {
        let io_timeout = self.adaptive().io_timeout(Duration::from_millis(1200));
        let Some(mut conn) = self.connect_probe(port, use_tls, io_timeout).await else {
            return false;
        };

        // Anonymous LDAPv3 bind request
        const BIND_REQ: [u8; 14] = [
            0x30, 0x0c, 0x02, 0x01, 0x01, 0x60, 0x07, 0x02, 0x01, 0x03, 0x04, 0x00, 0x80, 0x00,
        ];
        if conn.write_all(&BIND_REQ).await.is_err() {
            return false;
        }

        let mut buf = [0u8; 256];
        match timeout(io_timeout, conn.read(&mut buf)).await {
            Ok(Ok(n)) if n >= 8 => {
                // LDAPMessage sequence + bindResponse application tag
                if buf[0] != 0x30 {
                    return false;
                }
                String::from_utf8_lossy(&buf[..n]).contains("LDAP") || buf[5] == 0x61
            }
            _ => false,
        }
    }

    pub(crate) async fn detect_winrm(&self, port: u16) -> Option<String> {
        let io_timeout = self.adaptive().io_timeout(Duration::from_millis(1500));
        let mut conn = self.connect_probe(port, port == 5986, io_timeout).await?;

        let request = self.build_http_request("OPTIONS", "/wsman");
        conn.write_all(request.as_bytes()).await.ok()?;

        let mut buf = vec![0u8; 4096];
        let n = timeout(io_timeout, conn.read(&mut buf)).await.ok()?.ok()?;
        if n == 0 {
            return None;
        }

        let response = String::from_utf8_lossy(&buf[..n]).to_lowercase();
        if response.contains("wsman")
            || response.contains("microsoft-httpapi")
            || response.contains("www-authenticate: negotiate")
        {
            return Some("Microsoft WinRM".into());
        }
        None
    }

    /// Open a fresh probe connection, optionally TLS-wrapped with
    /// verification disabled (banner grabbing only).
    async fn connect_probe(&self, port: u16, use_tls: bool, dial_timeout: Duration) -> Option<ProbeConn> {
        let tcp = timeout(dial_timeout, TcpStream::connect((self.host(), port)))
            .await
            .ok()?
            .ok()?;
        if !use_tls {
            return Some(ProbeConn::Plain(tcp));
        }

        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .ok()?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        match timeout(dial_timeout, connector.connect(self.host(), tcp)).await {
            Ok(Ok(tls)) => Some(ProbeConn::Tls(Box::new(tls))),
            _ => {
                trace!(port, "tls handshake failed, falling back to plain");
                let tcp = timeout(dial_timeout, TcpStream::connect((self.host(), port)))
                    .await
                    .ok()?
                    .ok()?;
                Some(ProbeConn::Plain(tcp))
            }
        }
    }

    pub(crate) fn build_http_request(&self, method: &str, path: &str) -> String {
        let mut headers = vec![
            format!("{method} {path} HTTP/1.1"),
            format!("Host: {}", self.host()),
            "Connection: close".to_string(),
            "Accept: */*".to_string(),
            format!("User-Agent: {}", self.http_user_agent()),
        ];
        if let Some(spoof) = self.random_header_ip() {
            headers.push(format!("X-Forwarded-For: {spoof}"));
            headers.push(format!("X-Real-IP: {spoof}"));
        }
        headers.join("\r\n") + "\r\n\r\n"
    }

    fn http_user_agent(&self) -> &'static str {
        if !self.random_agent() {
            return DEFAULT_USER_AGENT;
        }
        USER_AGENTS[thread_rng().gen_range(0..USER_AGENTS.len())]
    }
}

/// Collect response bytes until EOF or the deadline expires.
async fn read_until_eof(conn: &mut ProbeConn, overall: Duration) -> Vec<u8> {
    let deadline = Instant::now() + overall;
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, conn.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => data.extend_from_slice(&buf[..n]),
            _ => break,
        }
    }
    data
}

fn sanitize_version(version: &str) -> String {
    version
        .trim()
        .trim_matches('-')
        .replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScanMode, ScannerConfig};
    use tokio::net::TcpListener;

    fn fast_scanner(extra: ScannerConfig) -> Scanner {
        let mut scanner = Scanner::new("127.0.0.1", ScanMode::Fast);
        scanner.configure(ScannerConfig {
            timeout: Some(Duration::from_millis(400)),
            ..extra
        });
        scanner
    }

    #[test]
    fn test_http_port_classification() {
        for port in [80, 443, 8080, 9200, 5985] {
            assert!(is_http_port(port), "port {port} should be HTTP");
        }
        assert!(!is_http_port(22));
        assert!(!is_http_port(3306));
        assert!(is_tls_http_port(443));
        assert!(!is_tls_http_port(80));
    }

    #[test]
    fn test_build_http_request_headers() {
        let scanner = fast_scanner(ScannerConfig::default());
        let request = scanner.build_http_request("GET", "/");
        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
        assert!(request.contains("Host: 127.0.0.1\r\n"));
        assert!(request.contains("Connection: close\r\n"));
        assert!(request.contains("Accept: */*\r\n"));
        assert!(request.contains(&format!("User-Agent: {DEFAULT_USER_AGENT}")));
        assert!(!request.contains("X-Forwarded-For"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_build_http_request_with_spoofed_headers() {
        let scanner = fast_scanner(ScannerConfig {
            random_ip: true,
            ..Default::default()
        });
        let request = scanner.build_http_request("OPTIONS", "/wsman");
        assert!(request.starts_with("OPTIONS /wsman HTTP/1.1\r\n"));
        assert!(request.contains("X-Forwarded-For: 127.0.0."));
        assert!(request.contains("X-Real-IP: 127.0.0."));
    }

    #[tokio::test]
    async fn test_http_banner_reads_full_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if let Ok((mut conn, _)) = listener.accept().await {
                    let mut buf = [0u8; 1024];
                    let _ = conn.read(&mut buf).await;
                    let _ = conn
                        .write_all(
                            b"HTTP/1.1 200 OK\r\nServer: nginx/1.18.0\r\nContent-Length: 0\r\n\r\n",
                        )
                        .await;
                }
            }
        });

        let scanner = fast_scanner(ScannerConfig::default());
        let banner = scanner.http_banner(port).await;
        let text = String::from_utf8_lossy(&banner);
        assert!(text.contains("Server: nginx/1.18.0"));
    }

    #[tokio::test]
    async fn test_text_probe_concatenates_greeting_and_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if let Ok((mut conn, _)) = listener.accept().await {
                    let _ = conn.write_all(b"220 mail.local ESMTP Postfix\r\n").await;
                    let mut buf = [0u8; 128];
                    let _ = conn.read(&mut buf).await;
                    let _ = conn.write_all(b"250-mail.local\r\n250 STARTTLS\r\n").await;
                }
            }
        });

        let scanner = fast_scanner(ScannerConfig::default());
        let response = scanner.probe_text_service(port, b"EHLO rmap.local\r\n").await;
        let text = String::from_utf8_lossy(&response);
        assert!(text.contains("220 mail.local ESMTP Postfix"));
        assert!(text.contains("250 STARTTLS"));
    }

    #[tokio::test]
    async fn test_mysql_handshake_detection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if let Ok((mut conn, _)) = listener.accept().await {
                    // [len=0x2e][seq=0][protocol 10]["5.7.30-log\0"]...
                    let mut packet = vec![0x2e, 0x00, 0x00, 0x00, 0x0a];
                    packet.extend_from_slice(b"5.7.30-log\x00");
                    packet.extend_from_slice(&[0u8; 32]);
                    let _ = conn.write_all(&packet).await;
                }
            }
        });

        let scanner = fast_scanner(ScannerConfig::default());
        let version = scanner.detect_mysql_handshake(port).await;
        assert_eq!(version.as_deref(), Some("MySQL 5.7.30-log"));
    }

    #[tokio::test]
    async fn test_winrm_detection_on_httpapi_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if let Ok((mut conn, _)) = listener.accept().await {
                    let mut buf = [0u8; 1024];
                    let _ = conn.read(&mut buf).await;
                    let _ = conn
                        .write_all(
                            b"HTTP/1.1 401 Unauthorized\r\nServer: Microsoft-HTTPAPI/2.0\r\nWWW-Authenticate: Negotiate\r\n\r\n",
                        )
                        .await;
                }
            }
        });

        let scanner = fast_scanner(ScannerConfig::default());
        let version = scanner.detect_winrm(port).await;
        assert_eq!(version.as_deref(), Some("Microsoft WinRM"));
    }

    #[test]
    fn test_sanitize_version() {
        assert_eq!(sanitize_version(" 5.5.20-log"), "5.5.20-log");
        assert_eq!(sanitize_version("-8.0.32-"), "8.0.32");
        assert_eq!(sanitize_version("10.4\n12"), "10.4 12");
    }
}
