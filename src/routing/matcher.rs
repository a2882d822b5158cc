//! Host matching logic.
//!
//! # Responsibilities
//! - Match a hostname against registered domains (exact or subdomain)
//! - Pick the most specific domain when several match
//! - Normalize Host header values (strip port)
//!
//! # Design Decisions
//! - Longest domain wins, ties broken lexically so results are deterministic
//! - Matching is on label boundaries: `xsvc.localhost` does not match `svc.localhost`
//! - Case-sensitive; callers normalize case where the protocol requires it
//! - No regex to guarantee O(n) matching

/// Returns true if `host` is `domain` itself or one of its subdomains.
pub fn is_within(host: &str, domain: &str) -> bool {
    match host.strip_suffix(domain) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

/// Find the longest domain in `domains` that `host` falls within.
pub fn match_host<'a, I>(host: &str, domains: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates: Vec<&'a str> = domains.into_iter().collect();
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    candidates.into_iter().find(|domain| is_within(host, domain))
}

/// Strip an optional `:port` suffix from a Host header value.
///
/// Bracketed IPv6 literals (`[::1]:8080`) keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
