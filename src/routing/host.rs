//! Host header helpers.
//!
//! Only used when a normalization option is switched on. By default the
//! router compares the raw header text.

use std::net::IpAddr;

/// Split `name[:port]` into its parts.
///
/// Bracketed IPv6 (`[::1]:8080`) keeps its brackets in the name. A bare IPv6
/// literal (more than one colon, no brackets) has no port.
pub fn split_port(host: &str) -> (&str, Option<&str>) {
    if host.starts_with('[') {
        if let Some(end) = host.find(']') {
            let (name, rest) = host.split_at(end + 1);
            return (name, rest.strip_prefix(':'));
        }
        return (host, None);
    }

    match host.rfind(':') {
        Some(idx) if host[..idx].contains(':') => (host, None),
        Some(idx) => (&host[..idx], Some(&host[idx + 1..])),
        None => (host, None),
    }
}

/// True when the host name (port already removed) is an IP address literal.
pub fn is_ip_literal(name: &str) -> bool {
    let name = name
        .strip_prefix('[')
        .and_then(|n| n.strip_suffix(']'))
        .unwrap_or(name);
    name.parse::<IpAddr>().is_ok()
}

/// Remove one trailing `.` from the name part, keeping any port.
pub fn strip_trailing_dot(host: &str) -> Option<String> {
    let (name, port) = split_port(host);
    let stripped = name.strip_suffix('.')?;
    Some(match port {
        Some(port) => format!("{}:{}", stripped, port),
        None => stripped.to_string(),
    })
}
