//! DNS-over-HTTPS JSON response parsing (Google/AliDNS style, RFC 8427-ish).
//!
//! Accepts `Status` 0 (NOERROR) or 3 (NXDOMAIN); collects `Answer` entries of type 1 (A) and
//! 28 (AAAA) whose `data` parses as an IP address.

use std::net::IpAddr;

use serde::Deserialize;

use crate::error::DnsError;

#[derive(Debug, Deserialize)]
struct DohJsonResponse {
    #[serde(rename = "Status")]
    status: i32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    rtype: i32,
    data: String,
}

const DNS_STATUS_NOERROR: i32 = 0;
const DNS_STATUS_NXDOMAIN: i32 = 3;
const TYPE_A: i32 = 1;
const TYPE_AAAA: i32 = 28;

pub fn parse(provider: &str, body: &[u8]) -> Result<Vec<IpAddr>, DnsError> {
    let parsed: DohJsonResponse = serde_json::from_slice(body).map_err(|e| DnsError::MalformedResponse {
        provider: provider.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.status != DNS_STATUS_NOERROR && parsed.status != DNS_STATUS_NXDOMAIN {
        return Err(DnsError::MalformedResponse {
            provider: provider.to_string(),
            reason: format!("unexpected DNS status {}", parsed.status),
        });
    }

    let ips = parsed
        .answer
        .iter()
        .filter(|a| a.rtype == TYPE_A || a.rtype == TYPE_AAAA)
        .filter_map(|a| a.data.parse::<IpAddr>().ok())
        .collect();
    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_google_style_a_record() {
        let body = br#"{"Status":0,"Answer":[{"name":"example.com.","type":1,"TTL":300,"data":"93.184.216.34"}]}"#;
        let ips = parse("google", body).unwrap();
        assert_eq!(ips, vec!["93.184.216.34".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn parses_aaaa_and_ignores_other_types() {
        let body = br#"{"Status":0,"Answer":[
            {"name":"example.com.","type":5,"TTL":300,"data":"cname.example.com."},
            {"name":"example.com.","type":28,"TTL":300,"data":"::1"}
        ]}"#;
        let ips = parse("alidns", body).unwrap();
        assert_eq!(ips, vec!["::1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn accepts_nxdomain_status_with_empty_answers() {
        let body = br#"{"Status":3,"Answer":[]}"#;
        let ips = parse("google", body).unwrap();
        assert!(ips.is_empty());
    }

    #[test]
    fn rejects_server_failure_status() {
        let body = br#"{"Status":2,"Answer":[]}"#;
        assert!(parse("google", body).is_err());
    }

    #[test]
    fn malformed_json_does_not_panic() {
        assert!(parse("google", b"not json").is_err());
    }
}
