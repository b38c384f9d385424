//! IP classification and localhost-name detection (SPEC_FULL §4.2).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::UrlError;

/// True for loopback, RFC 1918, link-local (uni/multi), multicast, unspecified, and the
/// IPv4-specific reserved ranges the spec calls out: `0.0.0.0/8`, CGNAT `100.64.0.0/10`,
/// benchmarking `198.18.0.0/15`, class-E `>= 240.0.0.0/4`.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_v4_private_or_reserved(v4),
        IpAddr::V6(v6) => is_v6_private_or_reserved(v6),
    }
}

fn is_v4_private_or_reserved(ip: Ipv4Addr) -> bool {
    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
    {
        return true;
    }
    let o = ip.octets();
    // 0.0.0.0/8 - "this network"
    if o[0] == 0 {
        return true;
    }
    // CGNAT 100.64.0.0/10: ip[0]==100 && (ip[1] & 0xC0) == 64
    if o[0] == 100 && (o[1] & 0xC0) == 64 {
        return true;
    }
    // Benchmarking 198.18.0.0/15
    if o[0] == 198 && (o[1] == 18 || o[1] == 19) {
        return true;
    }
    // Class-E, reserved: >= 240.0.0.0/4
    if o[0] >= 240 {
        return true;
    }
    false
}

fn is_v6_private_or_reserved(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return true;
    }
    // Unique local addresses, fc00::/7
    if (ip.segments()[0] & 0xfe00) == 0xfc00 {
        return true;
    }
    // Link-local, fe80::/10
    if (ip.segments()[0] & 0xffc0) == 0xfe80 {
        return true;
    }
    // IPv4-mapped addresses inherit the IPv4 rules.
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_v4_private_or_reserved(v4);
    }
    false
}

pub fn validate_ip(ip: IpAddr) -> Result<(), UrlError> {
    if is_private_or_reserved(ip) {
        Err(UrlError::BlockedIp(ip))
    } else {
        Ok(())
    }
}

/// Matches `localhost`, `127.x.x.x`, `::1`, `0.0.0.0`, `::`, and `localhost.`-prefixed names,
/// case-insensitively.
pub fn is_localhost(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let lower = lower.trim();
    if lower == "localhost" || lower.starts_with("localhost.") {
        return true;
    }
    if lower == "::1" || lower == "0.0.0.0" || lower == "::" {
        return true;
    }
    if let Ok(IpAddr::V4(v4)) = lower.parse::<IpAddr>() {
        return v4.octets()[0] == 127;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    #[test]
    fn rejects_loopback_private_link_local() {
        assert!(validate_ip(ip("127.0.0.1")).is_err());
        assert!(validate_ip(ip("10.0.0.1")).is_err());
        assert!(validate_ip(ip("172.16.0.1")).is_err());
        assert!(validate_ip(ip("192.168.1.1")).is_err());
        assert!(validate_ip(ip("169.254.1.1")).is_err());
    }

    #[test]
    fn rejects_cgnat_benchmarking_class_e() {
        assert!(validate_ip(ip("100.64.0.1")).is_err());
        assert!(validate_ip(ip("100.127.255.255")).is_err());
        assert!(validate_ip(ip("100.63.255.255")).is_ok(), "just below CGNAT block");
        assert!(validate_ip(ip("198.18.0.1")).is_err());
        assert!(validate_ip(ip("198.19.255.255")).is_err());
        assert!(validate_ip(ip("240.0.0.1")).is_err());
        assert!(validate_ip(ip("255.255.255.254")).is_err());
    }

    #[test]
    fn accepts_public_unicast_addresses() {
        assert!(validate_ip(ip("1.1.1.1")).is_ok());
        assert!(validate_ip(ip("8.8.8.8")).is_ok());
        assert!(validate_ip(ip("93.184.216.34")).is_ok());
    }

    #[test]
    fn rejects_ipv6_loopback_and_unique_local() {
        assert!(validate_ip(ip("::1")).is_err());
        assert!(validate_ip(ip("fc00::1")).is_err());
        assert!(validate_ip(ip("fe80::1")).is_err());
    }

    #[test]
    fn is_localhost_is_case_insensitive() {
        assert!(is_localhost("localhost"));
        assert!(is_localhost("LOCALHOST"));
        assert!(is_localhost("LocalHost."));
        assert!(is_localhost("127.0.0.1"));
        assert!(is_localhost("::1"));
        assert!(is_localhost("0.0.0.0"));
        assert!(!is_localhost("example.com"));
    }
}
