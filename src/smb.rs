//! SMB detection (port 445)
//!
//! Three strategies tried in order, stopping at the first hit:
//!
//! 1. External helper: `nmap --script smb-os-discovery`, when present on
//!    PATH, with a 10 second deadline. Most accurate, most expensive.
//! 2. Raw SMB1 negotiate: parse the response for Samba/Windows markers or
//!    an SMB2+/SMB1 signature, deriving the dialect where possible.
//! 3. SMB2 negotiate handshake: a well-formed negotiate exchange confirms
//!    a Windows SMB service even when the raw probe gave nothing usable.
//!
//! An open port 445 always yields at least a generic identification.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    process::Command,
    time::timeout,
};
use tracing::debug;

use crate::scanner::Scanner;

/// Deadline for the external helper invocation.
const HELPER_TIMEOUT: Duration = Duration::from_secs(10);

static SAMBA_SMBD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)samba\s+smbd?\s+([\d.]+)").unwrap());

impl Scanner {
    /// Detect the SMB implementation behind port 445.
    ///
    /// Returns `(version string, evidence tag)`; never empty — an open 445
    /// is identified as generic Windows SMB when every strategy fails.
    pub(crate) async fn detect_smb(&self) -> (String, &'static str) {
        if let Some(os) = external_smb_detection(self.host()).await {
            return (os, "nmap smb-os-discovery");
        }
        if let Some(version) = self.raw_smb_negotiate().await {
            return (version, "raw smb negotiate");
        }
        if self.smb2_negotiate_handshake().await {
            return ("Microsoft Windows SMB".into(), "smb handshake");
        }
        ("Microsoft Windows SMB".into(), "port 445 open")
    }

    /// Send an SMB1 negotiate and analyze whatever comes back.
    async fn raw_smb_negotiate(&self) -> Option<String> {
        let dial_timeout = self.adaptive().base();
        let mut conn = timeout(dial_timeout, TcpStream::connect((self.host(), 445)))
            .await
            .ok()?
            .ok()?;

        const NEGOTIATE: [u8; 52] = [
            0x00, 0x00, 0x00, 0x54, // length
            0xff, 0x53, 0x4d, 0x42, // SMB signature
            0x00, 0x00, 0x00, 0x00, // reserved
            0x00, 0x00, 0x00, 0x00, // flags
            0x00, 0x00, 0x00, 0x00, // flags2
            0x00, 0x00, 0x00, 0x00, // pid high
            0x00, 0x00, 0x00, 0x00, // signature
            0x00, 0x00, 0x00, 0x00, // reserved
            0x00, 0x00, // tree id
            0x00, 0x00, // process id
            0x00, 0x00, // user id
            0x00, 0x00, // multiplex id
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        timeout(dial_timeout, conn.write_all(&NEGOTIATE)).await.ok()?.ok()?;

        let mut buf = vec![0u8; 2048];
        let n = timeout(dial_timeout, conn.read(&mut buf)).await.ok()?.ok()?;
        if n == 0 {
            return None;
        }
        analyze_smb_response(&buf[..n])
    }

    /// Full SMB2 negotiate exchange; a signed SMB2 response confirms the
    /// service even when it advertises nothing textual.
    async fn smb2_negotiate_handshake(&self) -> bool {
        let dial_timeout = self.adaptive().base();
        let Ok(Ok(mut conn)) = timeout(dial_timeout, TcpStream::connect((self.host(), 445))).await
        else {
            return false;
        };

        let request = build_smb2_negotiate();
        if timeout(dial_timeout, conn.write_all(&request)).await.is_err() {
            return false;
        }

        let mut buf = vec![0u8; 1024];
        match timeout(dial_timeout, conn.read(&mut buf)).await {
            // NetBIOS session header, then the SMB2 protocol id
            Ok(Ok(n)) if n >= 8 => buf[4..8] == [0xfe, 0x53, 0x4d, 0x42],
            _ => false,
        }
    }
}

/// Run the external SMB helper if it is installed. Absence is not an error.
async fn external_smb_detection(host: &str) -> Option<String> {
    let output = timeout(
        HELPER_TIMEOUT,
        Command::new("nmap")
            .args(["-p", "445", "--script", "smb-os-discovery", "-n", "-Pn", host])
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        debug!(host, "smb helper exited with failure");
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    for os in [
        "Windows Server 2008 R2",
        "Windows Server 2012",
        "Windows Server 2016",
        "Windows Server 2019",
        "Windows 7",
        "Windows 10",
    ] {
        if text.contains(os) {
            return Some(os.to_string());
        }
    }
    if text.contains("Samba") {
        if text.contains("3.X - 4.X") || text.contains("3.x - 4.x") {
            return Some("Samba smbd 3.X-4.X".into());
        }
        if text.contains("3.") {
            return Some("Samba smbd 3.X".into());
        }
        if text.contains("4.") {
            return Some("Samba smbd 4.X".into());
        }
        return Some("Samba smbd".into());
    }
    Some("Microsoft Windows".into())
}

/// Derive a version string from a raw SMB negotiate response.
pub(crate) fn analyze_smb_response(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }

    let text = String::from_utf8_lossy(data).into_owned();
    let lower = text.to_lowercase();

    if lower.contains("samba") {
        if let Some(caps) = SAMBA_SMBD_RE.captures(&text) {
            return Some(format!("Samba {}", &caps[1]));
        }
        if lower.contains("3.") {
            return Some("Samba 3.X".into());
        }
        if lower.contains("4.") {
            return Some("Samba 4.X".into());
        }
        return Some("Samba".into());
    }

    if lower.contains("windows") {
        for (marker, version) in [
            ("2008 r2", "Windows Server 2008 R2"),
            ("2008r2", "Windows Server 2008 R2"),
            ("2008", "Windows Server 2008"),
            ("2012 r2", "Windows Server 2012 R2"),
            ("2012r2", "Windows Server 2012 R2"),
            ("2012", "Windows Server 2012"),
            ("2016", "Windows Server 2016"),
            ("2019", "Windows Server 2019"),
            ("windows 10", "Windows 10"),
            ("windows 7", "Windows 7"),
        ] {
            if lower.contains(marker) {
                return Some(version.into());
            }
        }
    }

    // SMB2/3 signature
    if data[0] == 0xfe && data[1] == 0x53 && data[2] == 0x4d && data[3] == 0x42 {
        if data.len() >= 38 {
            return Some(smb2_dialect(data));
        }
        return Some("SMB 2.0+".into());
    }

    // SMB1 signature
    if data[0] == 0xff && data[1] == 0x53 && data[2] == 0x4d && data[3] == 0x42 {
        return Some("SMB 1.0 (legacy)".into());
    }

    None
}

/// Map the dialect revision at bytes 36..37 (little endian) to a name.
fn smb2_dialect(data: &[u8]) -> String {
    if data.len() < 38 {
        return "SMB 2.0+".into();
    }
    let revision = u16::from_le_bytes([data[36], data[37]]);
    match revision {
        0x0202 => "SMB 2.0.2".into(),
        0x0210 => "SMB 2.1".into(),
        0x0300 => "SMB 3.0".into(),
        0x0302 => "SMB 3.0.2".into(),
        0x0310 => "SMB 3.1.0".into(),
        0x0311 => "SMB 3.1.1".into(),
        rev if (0x0202..=0x0311).contains(&rev) => {
            format!("SMB {}.{}", rev >> 8, rev & 0xff)
        }
        _ => "SMB 2.0+".into(),
    }
}

/// Build an SMB2 NEGOTIATE request offering dialects 2.0.2 through 3.0.2,
/// framed with a NetBIOS session header.
fn build_smb2_negotiate() -> Vec<u8> {
    let mut header = Vec::with_capacity(112);
    header.extend_from_slice(&[0xfe, 0x53, 0x4d, 0x42]); // protocol id
    header.extend_from_slice(&64u16.to_le_bytes()); // structure size
    header.extend_from_slice(&0u16.to_le_bytes()); // credit charge
    header.extend_from_slice(&0u32.to_le_bytes()); // status
    header.extend_from_slice(&0u16.to_le_bytes()); // command: NEGOTIATE
    header.extend_from_slice(&1u16.to_le_bytes()); // credits requested
    header.extend_from_slice(&[0u8; 48]); // flags .. signature

    let mut body = Vec::with_capacity(44);
    body.extend_from_slice(&36u16.to_le_bytes()); // structure size
    body.extend_from_slice(&4u16.to_le_bytes()); // dialect count
    body.extend_from_slice(&1u16.to_le_bytes()); // security mode: signing enabled
    body.extend_from_slice(&[0u8; 2]); // reserved
    body.extend_from_slice(&[0u8; 4]); // capabilities
    body.extend_from_slice(&[0u8; 16]); // client guid
    body.extend_from_slice(&[0u8; 8]); // client start time
    for dialect in [0x0202u16, 0x0210, 0x0300, 0x0302] {
        body.extend_from_slice(&dialect.to_le_bytes());
    }

    let total = (header.len() + body.len()) as u32;
    let mut packet = Vec::with_capacity(4 + total as usize);
    packet.extend_from_slice(&total.to_be_bytes()); // NetBIOS session header
    packet.extend_from_slice(&header);
    packet.extend_from_slice(&body);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smb2_response_with_dialect(revision: u16) -> Vec<u8> {
        let mut data = vec![0xfe, 0x53, 0x4d, 0x42];
        data.extend_from_slice(&[0u8; 32]);
        data.extend_from_slice(&revision.to_le_bytes());
        data.extend_from_slice(&[0u8; 16]);
        data
    }

    #[test]
    fn test_smb2_dialect_mapping() {
        assert_eq!(
            analyze_smb_response(&smb2_response_with_dialect(0x0311)),
            Some("SMB 3.1.1".into())
        );
        assert_eq!(
            analyze_smb_response(&smb2_response_with_dialect(0x0202)),
            Some("SMB 2.0.2".into())
        );
        assert_eq!(
            analyze_smb_response(&smb2_response_with_dialect(0x0210)),
            Some("SMB 2.1".into())
        );
        assert_eq!(
            analyze_smb_response(&smb2_response_with_dialect(0x0300)),
            Some("SMB 3.0".into())
        );
    }

    #[test]
    fn test_smb2_unknown_dialect_in_range() {
        assert_eq!(
            analyze_smb_response(&smb2_response_with_dialect(0x0305)),
            Some("SMB 3.5".into())
        );
    }

    #[test]
    fn test_short_smb2_response() {
        let data = [0xfe, 0x53, 0x4d, 0x42, 0x00];
        assert_eq!(analyze_smb_response(&data), Some("SMB 2.0+".into()));
    }

    #[test]
    fn test_smb1_signature() {
        let data = [0xff, 0x53, 0x4d, 0x42, 0x72, 0x00];
        assert_eq!(analyze_smb_response(&data), Some("SMB 1.0 (legacy)".into()));
    }

    #[test]
    fn test_samba_version_extraction() {
        assert_eq!(
            analyze_smb_response(b"unix Samba smbd 4.13.17 ready"),
            Some("Samba 4.13.17".into())
        );
        assert_eq!(
            analyze_smb_response(b"Samba here, 4.x branch"),
            Some("Samba 4.X".into())
        );
    }

    #[test]
    fn test_windows_marker_detection() {
        assert_eq!(
            analyze_smb_response(b"Windows Server 2008 R2 Standard"),
            Some("Windows Server 2008 R2".into())
        );
        assert_eq!(
            analyze_smb_response(b"Microsoft Windows Server 2016"),
            Some("Windows Server 2016".into())
        );
    }

    #[test]
    fn test_unrecognized_response() {
        assert_eq!(analyze_smb_response(b"\x00\x01\x02\x03garbage"), None);
        assert_eq!(analyze_smb_response(b"ab"), None);
    }

    #[test]
    fn test_negotiate_packet_framing() {
        let packet = build_smb2_negotiate();
        // NetBIOS length matches the SMB2 payload
        let length = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]) as usize;
        assert_eq!(length, packet.len() - 4);
        assert_eq!(&packet[4..8], &[0xfe, 0x53, 0x4d, 0x42]);
    }
}
