//! Path and host string helpers shared by registration and dispatch.

use std::net::IpAddr;

/// Subdomain selector that matches any single host label.
pub const DYNAMIC_SUBDOMAIN: &str = "*.";

/// Collapses repeated slashes, ensures a leading slash and strips the
/// trailing one (except on the root path).
pub fn clean_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for seg in path.split('/').filter(|s| !s.is_empty()) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(seg);
    }
    out
}

/// Reports whether `path` is already in the form [`clean_path`] produces.
pub fn is_clean(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    path.starts_with('/') && !path.ends_with('/') && !path.contains("//")
}

/// Splits a template on `/`, ignoring slashes inside `{...}` so that
/// function arguments such as `regexp(^a/b$)` survive.
pub fn split_template(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in path.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                if i > start {
                    out.push(&path[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < path.len() {
        out.push(&path[start..]);
    }
    out
}

/// Normalizes a template the way [`clean_path`] normalizes request paths,
/// leaving `{...}` segments untouched.
pub fn clean_template(path: &str) -> String {
    let segments = split_template(path);
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for seg in segments {
        out.push('/');
        out.push_str(seg);
    }
    out
}

/// Joins a party prefix and a relative path.
pub fn join_path(prefix: &str, rel: &str) -> String {
    match (prefix.trim_end_matches('/'), rel.trim_start_matches('/')) {
        ("", "") => "/".to_string(),
        ("", r) => format!("/{}", r),
        (p, "") => p.to_string(),
        (p, r) => format!("{}/{}", p, r),
    }
}

/// Separates a leading subdomain selector from the path.
///
/// `admin./users` → `("admin.", "/users")`, `*.` → `("*.", "/")`,
/// `/users` → `("", "/users")`. Returns `None` when the text before the
/// first slash is not a selector (it does not end with a dot).
pub fn split_subdomain(full: &str) -> Option<(String, String)> {
    if full.is_empty() || full.starts_with('/') {
        return Some((String::new(), full.to_string()));
    }
    let (head, rest) = match full.find('/') {
        Some(i) => (&full[..i], &full[i..]),
        None => (full, "/"),
    };
    if !head.ends_with('.') || head.len() < 2 {
        return None;
    }
    // only the leading label may be the wildcard
    if head.contains('*') && !head.starts_with(DYNAMIC_SUBDOMAIN) {
        return None;
    }
    Some((head.to_ascii_lowercase(), rest.to_string()))
}

/// Removes a `:port` suffix, keeping bracketed IPv6 literals whole.
pub fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    match host.rfind(':') {
        // a bare IPv6 literal has more than one colon
        Some(i) if host[..i].find(':').is_none() => &host[..i],
        _ => host,
    }
}

fn parse_ip(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[').trim_end_matches(']').parse().ok()
}

/// Reports whether `host` (without port) addresses the local machine.
pub fn is_loopback(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
        return true;
    }
    parse_ip(host).is_some_and(|ip| ip.is_loopback() || ip.is_unspecified())
}

/// Tests a request host against the subdomain selector of a trie.
///
/// A named selector (`admin.`) matches hosts that start with it. The
/// dynamic selector matches any single label in front of `vhost`; without
/// a configured vhost the host needs at least three labels, so the bare
/// root domain is never treated as a subdomain. Loopback hosts and IP
/// literals never carry a subdomain.
pub fn host_matches_subdomain(host: &str, subdomain: &str, vhost: Option<&str>) -> bool {
    if subdomain.is_empty() {
        return true;
    }
    let host = strip_port(host).to_ascii_lowercase();

    if subdomain == DYNAMIC_SUBDOMAIN {
        if is_loopback(&host) || parse_ip(&host).is_some() {
            return false;
        }
        return match vhost.map(|v| strip_port(v).to_ascii_lowercase()) {
            Some(vhost) => host
                .strip_suffix(vhost.as_str())
                .and_then(|label| label.strip_suffix('.'))
                .is_some_and(|label| !label.is_empty() && !label.contains('.')),
            None => host.find('.').is_some_and(|i| i > 0) && host.matches('.').count() >= 2,
        };
    }

    host.starts_with(subdomain)
}

/// Escapes the characters HTML treats specially.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(""), "/");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("//a//b/"), "/a/b");
        assert_eq!(clean_path("a/b"), "/a/b");
        assert!(is_clean("/a/b"));
        assert!(!is_clean("/a/b/"));
        assert!(!is_clean("/a//b"));
    }

    #[test]
    fn test_split_template_keeps_macro_slashes() {
        assert_eq!(
            split_template("/a/{p:string regexp(^x/y$)}/b"),
            vec!["a", "{p:string regexp(^x/y$)}", "b"]
        );
        assert_eq!(clean_template("//a/{id}/"), "/a/{id}");
        assert_eq!(clean_template(""), "/");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "/"), "/");
        assert_eq!(join_path("/api/", "/users"), "/api/users");
        assert_eq!(join_path("/api", ""), "/api");
        assert_eq!(join_path("", "users"), "/users");
    }

    #[test]
    fn test_split_subdomain() {
        assert_eq!(
            split_subdomain("admin./users"),
            Some(("admin.".into(), "/users".into()))
        );
        assert_eq!(split_subdomain("*."), Some(("*.".into(), "/".into())));
        assert_eq!(split_subdomain("/users"), Some(("".into(), "/users".into())));
        assert_eq!(split_subdomain("admin/users"), None);
        assert_eq!(split_subdomain("a.*./x"), None);
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
        assert_eq!(strip_port("::1"), "::1");
    }

    #[test]
    fn test_loopback_hosts() {
        assert!(is_loopback("localhost"));
        assert!(is_loopback("127.0.0.1"));
        assert!(is_loopback("[::1]"));
        assert!(is_loopback("0.0.0.0"));
        assert!(!is_loopback("example.com"));
    }

    #[test]
    fn test_named_subdomain_match() {
        assert!(host_matches_subdomain("admin.example.com", "admin.", None));
        assert!(host_matches_subdomain("admin.example.com:8080", "admin.", None));
        assert!(!host_matches_subdomain("example.com", "admin.", None));
    }

    #[test]
    fn test_dynamic_subdomain_with_vhost() {
        let vhost = Some("example.com:8080");
        assert!(host_matches_subdomain("user1.example.com:8080", "*.", vhost));
        assert!(!host_matches_subdomain("example.com", "*.", vhost));
        assert!(!host_matches_subdomain("a.b.example.com", "*.", vhost));
        assert!(!host_matches_subdomain("127.0.0.1", "*.", vhost));
        assert!(!host_matches_subdomain("localhost:8080", "*.", vhost));
    }

    #[test]
    fn test_dynamic_subdomain_without_vhost() {
        assert!(host_matches_subdomain("user1.example.com", "*.", None));
        assert!(!host_matches_subdomain("example.com", "*.", None));
        assert!(!host_matches_subdomain("192.168.1.10", "*.", None));
        assert!(!host_matches_subdomain(".example.com", "*.", None));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("/a?b=<c>&d"), "/a?b=&lt;c&gt;&amp;d");
    }
}
