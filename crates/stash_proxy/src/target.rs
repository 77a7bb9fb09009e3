use stash_config::ProxyConfig;
use stash_http::{ParsedRequest, ProxyError};
use tracing::debug;

/// Where a request is sent and which cache slot it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Host actually connected to (after the self-address rewrite).
    pub host: String,
    pub port: u16,
    pub path: String,
    /// `http://{authority}{path}` built from the authority the client used.
    pub canonical_url: String,
}

impl ResolvedTarget {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Turns a parsed request into a [`ResolvedTarget`].
#[derive(Debug, Clone)]
pub struct TargetResolver {
    self_address: String,
    local_origin_host: String,
    local_origin_port: u16,
    default_port: u16,
}

impl TargetResolver {
    pub fn new(cfg: &ProxyConfig) -> Self {
        Self {
            self_address: cfg.self_address.trim().to_string(),
            local_origin_host: cfg.local_origin_host.clone(),
            local_origin_port: cfg.local_origin_port,
            default_port: cfg.default_port,
        }
    }

    pub fn resolve(&self, req: &ParsedRequest) -> Result<ResolvedTarget, ProxyError> {
        let (authority, path) = match strip_http_scheme(&req.target) {
            Some(rest) => split_absolute(rest)?,
            None => {
                let host = req
                    .header("host")
                    .filter(|h| !h.is_empty())
                    .ok_or(ProxyError::MissingHost)?;
                (host.to_string(), req.target.clone())
            }
        };

        let canonical_url = format!("http://{}{}", authority.to_ascii_lowercase(), path);

        let (host, port) = if authority.eq_ignore_ascii_case(&self.self_address) {
            debug!(
                target: "stash::proxy",
                %authority,
                local_origin_host = %self.local_origin_host,
                local_origin_port = self.local_origin_port,
                "Request addressed to the proxy itself; using local origin"
            );
            (self.local_origin_host.clone(), self.local_origin_port)
        } else {
            split_host_port(&authority, self.default_port)?
        };

        Ok(ResolvedTarget {
            host,
            port,
            path,
            canonical_url,
        })
    }
}

fn strip_http_scheme(target: &str) -> Option<&str> {
    let scheme = target.get(..7)?;
    if scheme.eq_ignore_ascii_case("http://") {
        Some(&target[7..])
    } else {
        None
    }
}

/// `host[:port]/path?query` -> (authority, path). A missing path becomes `/`.
fn split_absolute(rest: &str) -> Result<(String, String), ProxyError> {
    let (authority, path) = match rest.find(['/', '?']) {
        Some(idx) if rest[idx..].starts_with('/') => (&rest[..idx], rest[idx..].to_string()),
        Some(idx) => (&rest[..idx], format!("/{}", &rest[idx..])),
        None => (rest, "/".to_string()),
    };

    if authority.is_empty() {
        return Err(ProxyError::MalformedRequest(
            "absolute target without authority".into(),
        ));
    }

    Ok((authority.to_string(), path))
}

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
fn split_host_port(authority: &str, default_port: u16) -> Result<(String, u16), ProxyError> {
    let authority = authority.trim();

    if authority.starts_with('[') {
        if let Some(end) = authority.find(']') {
            let host = authority[..=end].to_string();
            let rest = &authority[end + 1..];
            return match rest.strip_prefix(':') {
                Some(port) => Ok((host, parse_port(port, authority)?)),
                None => Ok((host, default_port)),
            };
        }
    }

    if let Some(idx) = authority.rfind(':') {
        let (left, right) = authority.split_at(idx);
        let port = &right[1..];
        if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            return Ok((left.to_string(), parse_port(port, authority)?));
        }
    }

    Ok((authority.to_string(), default_port))
}

fn parse_port(port: &str, authority: &str) -> Result<u16, ProxyError> {
    port.parse::<u16>()
        .map_err(|_| ProxyError::MalformedRequest(format!("invalid port in '{authority}'")))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use stash_config::ProxyConfig;
    use stash_http::{ParsedRequest, ProxyError};

    use super::{split_host_port, ResolvedTarget, TargetResolver};

    fn resolve(raw: &str) -> Result<ResolvedTarget, ProxyError> {
        let req = ParsedRequest::parse(Bytes::from(raw.to_string())).expect("parsed");
        TargetResolver::new(&ProxyConfig::default()).resolve(&req)
    }

    #[test]
    fn self_address_is_rewritten_to_local_origin() {
        let t = resolve("GET /test.html HTTP/1.1\r\nHost: localhost:8080\r\n\r\n").expect("ok");
        assert_eq!(t.host, "localhost");
        assert_eq!(t.port, 8000);
        assert_eq!(t.path, "/test.html");
        assert_eq!(t.canonical_url, "http://localhost:8080/test.html");
    }

    #[test]
    fn absolute_and_relative_forms_share_a_key() {
        let abs = resolve("GET http://example.com/a/b HTTP/1.1\r\n\r\n").expect("ok");
        let rel = resolve("GET /a/b HTTP/1.1\r\nHost: example.com\r\n\r\n").expect("ok");
        assert_eq!(abs.canonical_url, rel.canonical_url);
        assert_eq!(abs.canonical_url, "http://example.com/a/b");
        assert_eq!(abs.addr(), "example.com:80");
        assert_eq!(rel.addr(), "example.com:80");
    }

    #[test]
    fn absolute_self_address_is_rewritten_too() {
        let t = resolve("GET http://localhost:8080/x HTTP/1.1\r\n\r\n").expect("ok");
        assert_eq!(t.addr(), "localhost:8000");
        assert_eq!(t.canonical_url, "http://localhost:8080/x");
    }

    #[test]
    fn absolute_target_port_is_honoured() {
        let t = resolve("GET http://example.com:8081/x?y=1 HTTP/1.1\r\n\r\n").expect("ok");
        assert_eq!(t.addr(), "example.com:8081");
        assert_eq!(t.path, "/x?y=1");
    }

    #[test]
    fn absolute_target_without_path_gets_root() {
        let t = resolve("GET http://example.com HTTP/1.1\r\n\r\n").expect("ok");
        assert_eq!(t.path, "/");
        assert_eq!(t.canonical_url, "http://example.com/");
    }

    #[test]
    fn absolute_target_takes_precedence_over_host_header() {
        let t = resolve("GET http://a.example/x HTTP/1.1\r\nHost: b.example\r\n\r\n").expect("ok");
        assert_eq!(t.host, "a.example");
    }

    #[test]
    fn relative_target_without_host_fails() {
        let err = resolve("GET /x HTTP/1.1\r\nAccept: */*\r\n\r\n").unwrap_err();
        assert!(matches!(err, ProxyError::MissingHost));
    }

    #[test]
    fn empty_host_header_counts_as_missing() {
        let err = resolve("GET /x HTTP/1.1\r\nHost:\r\n\r\n").unwrap_err();
        assert!(matches!(err, ProxyError::MissingHost));
    }

    #[test]
    fn host_header_port_is_used_for_other_hosts() {
        let t = resolve("GET /x HTTP/1.1\r\nHost: example.com:8888\r\n\r\n").expect("ok");
        assert_eq!(t.addr(), "example.com:8888");
    }

    #[test]
    fn key_authority_is_lowercased() {
        let t = resolve("GET /x HTTP/1.1\r\nHost: LocalHost:8080\r\n\r\n").expect("ok");
        assert_eq!(t.canonical_url, "http://localhost:8080/x");
        assert_eq!(t.port, 8000);
    }

    #[test]
    fn split_host_port_handles_ipv6_and_bad_ports() {
        assert_eq!(
            split_host_port("[::1]:9000", 80).expect("ok"),
            ("[::1]".to_string(), 9000)
        );
        assert_eq!(split_host_port("[::1]", 80).expect("ok"), ("[::1]".to_string(), 80));
        assert!(split_host_port("example.com:99999", 80).is_err());
    }
}
