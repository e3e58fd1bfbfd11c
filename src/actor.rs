//! Request Actor
//!
//! Who is performing an action, and from where. Built once per request by
//! the host and passed into handlers and services.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Request headers checked for the client address, in priority order
pub const CLIENT_IP_HEADERS: [&str; 6] = [
    "client-ip",
    "x-forwarded-for",
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

/// Longest user agent kept on a log entry
const MAX_USER_AGENT_LENGTH: usize = 512;

/// Permission checked before a handler runs any core logic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Administer plugin settings, media and reports
    ManageOptions,
    /// Upload and process media
    UploadFiles,
}

/// Authenticated user as reported by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub capabilities: Vec<Capability>,
}

/// The actor behind one request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorContext {
    /// None for anonymous visitors
    pub user_id: Option<u64>,
    pub capabilities: Vec<Capability>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ActorContext {
    /// Anonymous actor with no request metadata
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Actor for CLI and scheduled maintenance
    pub fn system() -> Self {
        Self {
            user_id: None,
            capabilities: vec![Capability::ManageOptions, Capability::UploadFiles],
            ip_address: None,
            user_agent: Some("cli".to_string()),
        }
    }

    /// Authenticated user without request metadata
    pub fn user(id: u64, capabilities: Vec<Capability>) -> Self {
        Self {
            user_id: Some(id),
            capabilities,
            ..Default::default()
        }
    }

    /// Build from request headers and the connection address
    pub fn from_request(
        headers: &HeaderMap,
        remote_addr: Option<IpAddr>,
        user: Option<AuthenticatedUser>,
    ) -> Self {
        let user_agent = headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LENGTH).collect::<String>())
            .filter(|ua| !ua.is_empty());

        let (user_id, capabilities) = match user {
            Some(u) => (Some(u.id), u.capabilities),
            None => (None, Vec::new()),
        };

        Self {
            user_id,
            capabilities,
            ip_address: resolve_client_ip(headers, remote_addr),
            user_agent,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// First public address among the forwarding headers, else the connection
/// address.
pub fn resolve_client_ip(headers: &HeaderMap, remote_addr: Option<IpAddr>) -> Option<IpAddr> {
    for name in CLIENT_IP_HEADERS {
        for value in headers.get_all(name) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for candidate in value.split(',') {
                if let Some(ip) = parse_candidate(candidate) {
                    if is_public(&ip) {
                        return Some(ip);
                    }
                }
            }
        }
    }
    remote_addr
}

/// Parse one list element: a bare address, `[v6]:port`, `v4:port`, or a
/// `for=` pair from the `Forwarded` header.
fn parse_candidate(raw: &str) -> Option<IpAddr> {
    let mut value = raw.trim();

    if let Some(pair) = value
        .split(';')
        .map(str::trim)
        .find(|p| p.get(..4).is_some_and(|k| k.eq_ignore_ascii_case("for=")))
    {
        value = &pair[4..];
    }
    let value = value.trim_matches('"');

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Some((host, port)) = value.rsplit_once(':') {
        if port.chars().all(|c| c.is_ascii_digit()) {
            return host.parse::<Ipv4Addr>().ok().map(IpAddr::V4);
        }
    }
    None
}

/// Not private, loopback, link-local, documentation or otherwise reserved
pub fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(&v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || a == 0
        // 100.64.0.0/10 shared address space
        || (a == 100 && (64..128).contains(&b))
        // 192.0.0.0/24 protocol assignments
        || (a == 192 && b == 0 && c == 0)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b == 18 || b == 19))
        // 240.0.0.0/4 reserved
        || a >= 240)
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (first == 0x2001 && ip.segments()[1] == 0x0db8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_skips_private_forwarded_addresses() {
        let h = headers(&[("x-forwarded-for", "10.0.0.4, 192.168.1.1, 41.210.12.7")]);
        let ip = resolve_client_ip(&h, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(ip, Some("41.210.12.7".parse().unwrap()));
    }

    #[test]
    fn test_header_priority() {
        let h = headers(&[
            ("x-forwarded-for", "41.210.12.7"),
            ("client-ip", "102.85.3.9"),
        ]);
        assert_eq!(resolve_client_ip(&h, None), Some("102.85.3.9".parse().unwrap()));
    }

    #[test]
    fn test_falls_back_to_remote_addr() {
        let h = headers(&[("x-forwarded-for", "10.1.1.1, garbage")]);
        let remote: IpAddr = "172.16.0.9".parse().unwrap();
        assert_eq!(resolve_client_ip(&h, Some(remote)), Some(remote));
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_forwarded_header_syntax() {
        let h = headers(&[("forwarded", r#"for="[2c0f:fe38::1]:443";proto=https"#)]);
        assert_eq!(resolve_client_ip(&h, None), Some("2c0f:fe38::1".parse().unwrap()));

        let h = headers(&[("forwarded", "for=41.210.12.7:8080")]);
        assert_eq!(resolve_client_ip(&h, None), Some("41.210.12.7".parse().unwrap()));
    }

    #[test]
    fn test_reserved_ranges() {
        for ip in ["100.64.1.1", "198.18.0.1", "240.0.0.1", "fd00::1", "fe80::1", "2001:db8::1", "::ffff:10.0.0.1"] {
            assert!(!is_public(&ip.parse().unwrap()), "{} should be reserved", ip);
        }
        for ip in ["8.8.8.8", "2c0f:fe38::1"] {
            assert!(is_public(&ip.parse().unwrap()), "{} should be public", ip);
        }
    }

    #[test]
    fn test_from_request() {
        let h = headers(&[("user-agent", "Mozilla/5.0"), ("x-forwarded-for", "8.8.4.4")]);
        let user = AuthenticatedUser { id: 7, capabilities: vec![Capability::ManageOptions] };

        let actor = ActorContext::from_request(&h, None, Some(user));
        assert_eq!(actor.user_id, Some(7));
        assert!(actor.can(Capability::ManageOptions));
        assert!(!actor.can(Capability::UploadFiles));
        assert_eq!(actor.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(actor.ip_address, Some("8.8.4.4".parse().unwrap()));

        let anonymous = ActorContext::from_request(&HeaderMap::new(), None, None);
        assert!(!anonymous.is_authenticated());
        assert!(anonymous.user_agent.is_none());
    }
}
