use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Statuses the proxy synthesises itself. Anything else reaching the client
/// is an origin response passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    MethodNotAllowed,
    BadGateway,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::MethodNotAllowed => 405,
            Status::BadGateway => 502,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::BadGateway => "Bad Gateway",
        }
    }
}

/// 200 carrying a body, whether it came from the cache or the origin.
///
/// `Content-Type` is always `text/html`; the origin's type is not consulted.
pub fn ok_response(body: &[u8], last_modified: Option<&str>) -> Vec<u8> {
    let mut head = String::from("HTTP/1.1 200 OK\r\n");
    if let Some(lm) = last_modified {
        head.push_str("Last-Modified: ");
        head.push_str(lm);
        head.push_str("\r\n");
    }
    head.push_str(&format!(
        "Content-Length: {}\r\n\
         Content-Type: text/html\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    ));

    let mut out = Vec::with_capacity(head.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(body);
    out
}

/// Body-less error response.
pub fn error_response(status: Status) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Length: 0\r\n\
         Connection: close\r\n\
         \r\n",
        status.code(),
        status.reason()
    )
    .into_bytes()
}

/// Writes a complete response and flushes it.
pub async fn send_bytes<W>(stream: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(bytes).await?;
    stream.flush().await
}

pub async fn send_error<W>(stream: &mut W, status: Status) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_bytes(stream, &error_response(status)).await
}

#[cfg(test)]
mod tests {
    use super::{error_response, ok_response, Status};

    #[test]
    fn ok_response_has_exact_content_length() {
        let out = ok_response(b"B1", Some("Sat, 20 Oct 2024 19:26:00 GMT"));
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("\r\nLast-Modified: Sat, 20 Oct 2024 19:26:00 GMT\r\n"));
        assert!(text.contains("\r\nContent-Length: 2\r\n"));
        assert!(text.contains("\r\nContent-Type: text/html\r\n"));
        assert!(text.ends_with("\r\n\r\nB1"));
    }

    #[test]
    fn ok_response_without_last_modified_omits_header() {
        let out = ok_response(b"", None);
        let text = String::from_utf8(out).expect("utf8");
        assert!(!text.contains("Last-Modified"));
        assert!(text.contains("\r\nContent-Length: 0\r\n"));
    }

    #[test]
    fn error_responses_have_no_body() {
        let out = error_response(Status::MethodNotAllowed);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
        assert!(text.contains("Content-Length: 0"));
    }
}
