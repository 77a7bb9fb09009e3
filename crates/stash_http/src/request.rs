use bytes::Bytes;
use tracing::debug;

use crate::ProxyError;

/// Client request after the request line and headers have been split.
///
/// `raw` keeps the exact bytes received so the request can be forwarded to
/// the origin verbatim.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub http_version: String,
    pub headers: Vec<(String, String)>,
    pub raw: Bytes,
}

/// Conditional request headers dropped whenever the proxy sets its own.
const CONDITIONAL_HEADERS: [&str; 2] = ["if-modified-since", "if-none-match"];

impl ParsedRequest {
    /// Splits raw request bytes into request line and headers.
    ///
    /// Only the header block (up to the first blank line) is examined; if no
    /// blank line arrived the whole buffer is treated as the header block.
    pub fn parse(raw: Bytes) -> Result<Self, ProxyError> {
        let head_len = find_headers_end(&raw).unwrap_or(raw.len());
        let head = String::from_utf8_lossy(&raw[..head_len]).to_string();

        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or("").trim();

        let tokens: Vec<&str> = request_line.split_whitespace().collect();
        let [method, target, http_version] = tokens.as_slice() else {
            return Err(ProxyError::MalformedRequest(format!(
                "request line has {} token(s), expected 3",
                tokens.len()
            )));
        };

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        debug!(
            target: "stash::http",
            %method,
            %target,
            %http_version,
            header_count = headers.len(),
            "Parsed request"
        );

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            http_version: http_version.to_string(),
            headers,
            raw,
        })
    }

    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Bytes sent to the origin on a plain miss.
    ///
    /// Forwarded untouched unless the method token needs normalising to
    /// `GET` or the client sent its own validators. Those are dropped: with
    /// nothing cached, a 304 from the origin could not be answered.
    pub fn origin_request(&self) -> Bytes {
        let conditional = self.headers.iter().any(|(name, _)| is_conditional(name));
        if self.method == "GET" && !conditional {
            return self.raw.clone();
        }
        self.to_unconditional()
    }

    /// Request with the client's conditional headers replaced by
    /// `If-Modified-Since: {last_modified}`.
    pub fn to_conditional(&self, last_modified: &str) -> Bytes {
        self.serialize(|name| !is_conditional(name), Some(last_modified))
    }

    /// Request with every conditional header removed, so the origin has to
    /// answer with a full body.
    pub fn to_unconditional(&self) -> Bytes {
        self.serialize(|name| !is_conditional(name), None)
    }

    fn serialize<F>(&self, keep: F, if_modified_since: Option<&str>) -> Bytes
    where
        F: Fn(&str) -> bool,
    {
        let mut out = format!("GET {} {}\r\n", self.target, self.http_version);
        for (name, value) in &self.headers {
            if keep(name) {
                out.push_str(name);
                out.push_str(": ");
                out.push_str(value);
                out.push_str("\r\n");
            }
        }
        if let Some(lm) = if_modified_since {
            out.push_str("If-Modified-Since: ");
            out.push_str(lm);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        Bytes::from(out)
    }
}

fn is_conditional(name: &str) -> bool {
    CONDITIONAL_HEADERS
        .iter()
        .any(|c| name.eq_ignore_ascii_case(c))
}

/// Offset of the `\r\n\r\n` that ends a header block.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
