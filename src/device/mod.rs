//! Device classification and fingerprinting
//!
//! Best-effort parsing of user-agent strings into coarse device attributes,
//! plus the stable SHA-256 fingerprint used for new-device detection.

use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::DeviceInfo;

/// Parse a user-agent string into coarse device attributes.
///
/// Classification is intentionally shallow: it only needs to be stable and
/// human-readable for alert payloads. Unknown or empty input yields
/// "unknown" fields, never an error.
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    if user_agent.trim().is_empty() {
        return DeviceInfo::unknown();
    }

    let ua = user_agent.to_lowercase();

    let device_type = if ua.contains("tablet") || ua.contains("ipad") {
        "tablet"
    } else if ua.contains("mobile")
        || ua.contains("android")
        || ua.contains("iphone")
        || ua.contains("windows phone")
    {
        "mobile"
    } else {
        "desktop"
    };

    DeviceInfo {
        device_type: device_type.to_string(),
        os: classify_os(&ua).to_string(),
        browser: classify_browser(&ua, user_agent),
    }
}

fn classify_os(ua: &str) -> &'static str {
    if ua.contains("windows phone") {
        "Windows Phone"
    } else if ua.contains("windows nt 10") {
        "Windows 10"
    } else if ua.contains("windows nt 6.3") {
        "Windows 8.1"
    } else if ua.contains("windows nt 6.2") {
        "Windows 8"
    } else if ua.contains("windows nt 6.1") {
        "Windows 7"
    } else if ua.contains("windows") {
        "Windows"
    } else if ua.contains("mac os") {
        "macOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") {
        "iOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "unknown"
    }
}

fn classify_browser(ua: &str, original: &str) -> String {
    // Order matters: Chrome UAs also contain "safari", Edge UAs contain both.
    let (name, token) = if ua.contains("edg") {
        ("Edge", "Edg")
    } else if ua.contains("opr") || ua.contains("opera") {
        ("Opera", "OPR")
    } else if ua.contains("chrome") {
        ("Chrome", "Chrome")
    } else if ua.contains("firefox") {
        ("Firefox", "Firefox")
    } else if ua.contains("safari") {
        ("Safari", "Version")
    } else if ua.contains("trident") || ua.contains("msie") {
        ("Internet Explorer", "")
    } else {
        return "unknown".to_string();
    };

    match major_version(original, token) {
        Some(version) => format!("{} {}", name, version),
        None => name.to_string(),
    }
}

/// Extract the major version following a product token, e.g. "Chrome/120".
fn major_version(user_agent: &str, token: &str) -> Option<String> {
    if token.is_empty() {
        return None;
    }
    static VERSION_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = VERSION_RE
        .get_or_init(|| Regex::new(r"(?i)\b([a-z]+)/(\d+)").ok())
        .as_ref()?;

    for caps in re.captures_iter(user_agent) {
        if caps.get(1).map(|m| m.as_str()) == Some(token) {
            return caps.get(2).map(|m| m.as_str().to_string());
        }
    }
    None
}

/// Stable device fingerprint: SHA-256 over "ip|user_agent", hex-encoded.
pub fn fingerprint(ip: &IpAddr, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Digest stored in place of the raw session token.
///
/// Salted with random bits so two logins in the same second still get
/// distinct hashes.
pub fn session_token_hash(user_id: &str, timestamp: i64) -> String {
    let salt: u64 = rand::random();
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"_");
    hasher.update(timestamp.to_be_bytes());
    hasher.update(b"_");
    hasher.update(salt.to_be_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
         AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    #[test]
    fn test_parse_chrome_on_windows() {
        let info = parse_user_agent(CHROME_WIN);
        assert_eq!(info.device_type, "desktop");
        assert_eq!(info.os, "Windows 10");
        assert_eq!(info.browser, "Chrome 120");
    }

    #[test]
    fn test_parse_safari_on_iphone() {
        let info = parse_user_agent(SAFARI_IPHONE);
        assert_eq!(info.device_type, "mobile");
        assert_eq!(info.os, "iOS");
        assert_eq!(info.browser, "Safari 17");
    }

    #[test]
    fn test_parse_firefox_on_linux() {
        let info = parse_user_agent(FIREFOX_LINUX);
        assert_eq!(info.device_type, "desktop");
        assert_eq!(info.os, "Linux");
        assert_eq!(info.browser, "Firefox 121");
    }

    #[test]
    fn test_parse_empty_user_agent() {
        let info = parse_user_agent("");
        assert_eq!(info, DeviceInfo::unknown());

        let info = parse_user_agent("   ");
        assert_eq!(info, DeviceInfo::unknown());
    }

    #[test]
    fn test_parse_garbage_user_agent() {
        let info = parse_user_agent("definitely-not-a-browser/1.0");
        assert_eq!(info.device_type, "desktop");
        assert_eq!(info.os, "unknown");
        assert_eq!(info.browser, "unknown");
    }

    #[test]
    fn test_fingerprint_stable() {
        let ip = IpAddr::from_str("203.0.113.7").unwrap();
        let fp1 = fingerprint(&ip, CHROME_WIN);
        let fp2 = fingerprint(&ip, CHROME_WIN);
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64);
    }

    #[test]
    fn test_fingerprint_varies_with_inputs() {
        let ip1 = IpAddr::from_str("203.0.113.7").unwrap();
        let ip2 = IpAddr::from_str("203.0.113.8").unwrap();

        assert_ne!(fingerprint(&ip1, CHROME_WIN), fingerprint(&ip2, CHROME_WIN));
        assert_ne!(
            fingerprint(&ip1, CHROME_WIN),
            fingerprint(&ip1, FIREFOX_LINUX)
        );
    }

    #[test]
    fn test_token_hash_unique() {
        let h1 = session_token_hash("alice", 1700000000);
        let h2 = session_token_hash("alice", 1700000000);
        assert_eq!(h1.len(), 64);
        // Random salt keeps same-second logins distinct
        assert_ne!(h1, h2);
    }
}
