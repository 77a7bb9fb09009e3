use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument, warn};

const MAX_HEADERS: usize = 64;

/// Origin reply split into its parts. `raw` is exactly what arrived on the
/// wire and is what gets passed through for non-200/304 statuses.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: u16,
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub raw: Bytes,
}

impl OriginResponse {
    /// Parses a complete response. `None` when the bytes are not a
    /// status line + headers, or the body is shorter than announced.
    pub fn parse(raw: Bytes) -> Option<Self> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut resp = httparse::Response::new(&mut headers);
        let head_len = match resp.parse(&raw) {
            Ok(httparse::Status::Complete(len)) => len,
            _ => return None,
        };
        let status = resp.code?;

        let parsed_headers: Vec<(String, String)> = resp
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).trim().to_string(),
                )
            })
            .collect();

        let status_line = raw[..head_len]
            .split(|b| *b == b'\n')
            .next()
            .map(|l| String::from_utf8_lossy(l).trim_end().to_string())
            .unwrap_or_default();

        let framing = Framing::from_headers(status, &parsed_headers);
        let rest = raw.slice(head_len..);
        let body = match framing {
            Framing::Empty => Bytes::new(),
            Framing::Length(len) => {
                if rest.len() < len {
                    return None;
                }
                rest.slice(..len)
            }
            Framing::Chunked => Bytes::from(decode_chunked(&rest)?),
            Framing::UntilEof => rest,
        };

        Some(Self {
            status,
            status_line,
            headers: parsed_headers,
            body,
            raw,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified").filter(|v| !v.is_empty())
    }
}

/// How the end of a response body is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Empty,
    Length(usize),
    Chunked,
    UntilEof,
}

impl Framing {
    fn from_headers(status: u16, headers: &[(String, String)]) -> Self {
        if (100..200).contains(&status) || status == 204 || status == 304 {
            return Framing::Empty;
        }

        let mut content_length = None;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("transfer-encoding")
                && value
                    .split(',')
                    .any(|t| t.trim().eq_ignore_ascii_case("chunked"))
            {
                return Framing::Chunked;
            }
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }

        match content_length {
            Some(len) => Framing::Length(len),
            None => Framing::UntilEof,
        }
    }
}

/// Why reading from the origin stopped short.
#[derive(Debug)]
pub(crate) enum ReadError {
    /// Peer closed before sending anything.
    Empty,
    Timeout,
    Io(std::io::Error),
    TooLarge,
}

/// Reads one response from the origin.
///
/// Stops at EOF, or as soon as the headers say the body is complete
/// (`Content-Length` reached, final chunk seen, or a status without a body).
/// Bytes that never form a valid header block are returned as-is so the
/// caller can pass them through.
#[instrument(skip(stream), fields())]
pub(crate) async fn read_http_response<S>(
    stream: &mut S,
    read_timeout: Duration,
    max_bytes: usize,
) -> Result<Bytes, ReadError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 4096];
    let mut framing: Option<(usize, Framing)> = None;
    let mut malformed = false;

    loop {
        if let Some((head_len, f)) = framing
            && body_complete(&buf[head_len..], f)
        {
            break;
        }

        let n = match timeout(read_timeout, stream.read(&mut tmp)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(ReadError::Io(e)),
            // Without a length the body ends at EOF; an origin that goes
            // quiet after a full head has sent everything it is going to.
            Err(_) if matches!(framing, Some((_, Framing::UntilEof))) => {
                debug!(
                    target: "stash::proxy",
                    bytes = buf.len(),
                    "Origin went quiet without closing; using what arrived"
                );
                break;
            }
            Err(_) => return Err(ReadError::Timeout),
        };

        if n == 0 {
            if buf.is_empty() {
                return Err(ReadError::Empty);
            }
            debug!(
                target: "stash::proxy",
                bytes = buf.len(),
                "Origin closed connection"
            );
            break;
        }

        buf.extend_from_slice(&tmp[..n]);
        if max_bytes > 0 && buf.len() > max_bytes {
            return Err(ReadError::TooLarge);
        }

        if framing.is_none() && !malformed {
            match parse_head(&buf) {
                Ok(Some(head)) => {
                    debug!(
                        target: "stash::proxy",
                        head_len = head.0,
                        framing = ?head.1,
                        "Parsed origin response head"
                    );
                    framing = Some(head);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        target: "stash::proxy",
                        error = %e,
                        "Origin response head is malformed; reading until EOF"
                    );
                    malformed = true;
                }
            }
        }
    }

    Ok(Bytes::from(buf))
}

fn parse_head(buf: &[u8]) -> Result<Option<(usize, Framing)>, httparse::Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut resp = httparse::Response::new(&mut headers);
    match resp.parse(buf)? {
        httparse::Status::Complete(len) => {
            let status = resp.code.unwrap_or(0);
            let pairs: Vec<(String, String)> = resp
                .headers
                .iter()
                .map(|h| {
                    (
                        h.name.to_string(),
                        String::from_utf8_lossy(h.value).to_string(),
                    )
                })
                .collect();
            Ok(Some((len, Framing::from_headers(status, &pairs))))
        }
        httparse::Status::Partial => Ok(None),
    }
}

fn body_complete(body: &[u8], framing: Framing) -> bool {
    match framing {
        Framing::Empty => true,
        Framing::Length(len) => body.len() >= len,
        Framing::Chunked => body.ends_with(b"0\r\n\r\n") && decode_chunked(body).is_some(),
        Framing::UntilEof => false,
    }
}

/// Decodes a complete chunked body. `None` if it is truncated or malformed.
fn decode_chunked(mut data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();

    loop {
        let line_end = find_crlf(data)?;
        let size_line = std::str::from_utf8(&data[..line_end]).ok()?;
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16).ok()?;
        data = &data[line_end + 2..];

        if size == 0 {
            // Trailers end with an empty line.
            loop {
                let end = find_crlf(data)?;
                if end == 0 {
                    return Some(out);
                }
                data = &data[end + 2..];
            }
        }

        let end = size.checked_add(2)?;
        if data.get(size..end)? != b"\r\n" {
            return None;
        }
        out.extend_from_slice(&data[..size]);
        data = &data[end..];
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;
    use tokio::time::Duration;

    use super::{decode_chunked, read_http_response, OriginResponse, ReadError};

    const OK: &str = "HTTP/1.1 200 OK\r\nLast-Modified: Sun, 20 Oct 2024 19:26:00 GMT\r\nContent-Length: 2\r\n\r\nB1";

    #[test]
    fn parse_extracts_status_body_and_last_modified() {
        let resp = OriginResponse::parse(Bytes::from_static(OK.as_bytes())).expect("parsed");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
        assert_eq!(&resp.body[..], b"B1");
        assert_eq!(resp.last_modified(), Some("Sun, 20 Oct 2024 19:26:00 GMT"));
        assert_eq!(&resp.raw[..], OK.as_bytes());
    }

    #[test]
    fn parse_accepts_http10_without_length() {
        let raw = "HTTP/1.0 200 OK\r\nServer: SimpleHTTP/0.6\r\n\r\n<html></html>";
        let resp = OriginResponse::parse(Bytes::from(raw)).expect("parsed");
        assert_eq!(&resp.body[..], b"<html></html>");
        assert_eq!(resp.last_modified(), None);
    }

    #[test]
    fn parse_rejects_truncated_body() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort";
        assert!(OriginResponse::parse(Bytes::from(raw)).is_none());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(OriginResponse::parse(Bytes::from_static(b"hello world")).is_none());
    }

    #[test]
    fn parse_decodes_chunked_body() {
        let raw = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nB1\r\n3\r\n-ok\r\n0\r\n\r\n";
        let resp = OriginResponse::parse(Bytes::from(raw)).expect("parsed");
        assert_eq!(&resp.body[..], b"B1-ok");
    }

    #[test]
    fn not_modified_has_empty_body() {
        let raw = "HTTP/1.1 304 Not Modified\r\nLast-Modified: x\r\n\r\n";
        let resp = OriginResponse::parse(Bytes::from(raw)).expect("parsed");
        assert_eq!(resp.status, 304);
        assert!(resp.body.is_empty());
    }

    #[test]
    fn decode_chunked_rejects_truncation() {
        assert!(decode_chunked(b"5\r\nab").is_none());
        assert!(decode_chunked(b"2\r\nab\r\n").is_none());
        assert_eq!(decode_chunked(b"0\r\n\r\n"), Some(Vec::new()));
    }

    #[test]
    fn huge_chunk_size_is_rejected() {
        assert!(decode_chunked(b"ffffffffffffffff\r\nab\r\n0\r\n\r\n").is_none());
        let raw = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\nab\r\n0\r\n\r\n";
        assert!(OriginResponse::parse(Bytes::from(raw)).is_none());
    }

    #[tokio::test]
    async fn read_stops_after_content_length_without_eof() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        server.write_all(OK.as_bytes()).await.expect("write");
        // `server` stays open: the reader must not wait for EOF.
        let raw = read_http_response(&mut client, Duration::from_secs(1), 0)
            .await
            .expect("read");
        assert_eq!(&raw[..], OK.as_bytes());
        drop(server);
    }

    #[tokio::test]
    async fn read_until_eof_without_framing() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        server
            .write_all(b"HTTP/1.0 404 Not Found\r\n\r\nmissing")
            .await
            .expect("write");
        drop(server);
        let raw = read_http_response(&mut client, Duration::from_secs(1), 0)
            .await
            .expect("read");
        assert_eq!(&raw[..], b"HTTP/1.0 404 Not Found\r\n\r\nmissing");
    }

    #[tokio::test]
    async fn read_reports_empty_and_oversized_responses() {
        let (mut client, server) = tokio::io::duplex(1024);
        drop(server);
        let err = read_http_response(&mut client, Duration::from_secs(1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::Empty));

        let (mut client, mut server) = tokio::io::duplex(1024);
        server.write_all(OK.as_bytes()).await.expect("write");
        let err = read_http_response(&mut client, Duration::from_secs(1), 8)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::TooLarge));
    }

    #[tokio::test]
    async fn read_keeps_unframed_body_when_origin_goes_quiet() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        server
            .write_all(b"HTTP/1.0 200 OK\r\n\r\n<html></html>")
            .await
            .expect("write");
        let raw = read_http_response(&mut client, Duration::from_millis(50), 0)
            .await
            .expect("read");
        assert_eq!(&raw[..], b"HTTP/1.0 200 OK\r\n\r\n<html></html>");
        drop(server);
    }

    #[tokio::test]
    async fn read_times_out_on_partial_length_body() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        server
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort")
            .await
            .expect("write");
        let err = read_http_response(&mut client, Duration::from_millis(50), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::Timeout));
        drop(server);
    }

    #[tokio::test]
    async fn read_times_out_on_silent_origin() {
        let (mut client, _server) = tokio::io::duplex(1024);
        let err = read_http_response(&mut client, Duration::from_millis(20), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::Timeout));
    }
}
