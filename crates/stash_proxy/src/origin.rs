use bytes::Bytes;
use stash_config::HttpConfig;
use stash_http::ProxyError;
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    time::{timeout, Duration},
};
use tracing::{debug, info, instrument, warn};

use crate::response::{read_http_response, OriginResponse, ReadError};
use crate::target::ResolvedTarget;

/// Failure talking to the origin.
#[derive(Debug, Error)]
pub enum OriginError {
    #[error("origin {addr} unreachable: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("origin {addr} response exceeds {limit} bytes")]
    TooLarge { addr: String, limit: usize },

    /// Origin answered, but not with a parseable HTTP response. The bytes
    /// are kept for passthrough.
    #[error("origin sent an unparseable response ({} bytes)", .0.len())]
    Protocol(Bytes),
}

impl OriginError {
    /// Raw bytes to hand to the client, or the error to answer with.
    pub fn into_passthrough(self) -> Result<Bytes, ProxyError> {
        match self {
            OriginError::Protocol(raw) => Ok(raw),
            OriginError::Unreachable { addr, reason } => {
                Err(ProxyError::OriginUnreachable { addr, reason })
            }
            OriginError::TooLarge { addr, limit } => Err(ProxyError::OriginTooLarge { addr, limit }),
        }
    }
}

/// One-shot HTTP/1 client: a fresh connection per fetch, closed afterwards.
#[derive(Debug, Clone)]
pub struct OriginClient {
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    max_response_bytes: usize,
}

impl OriginClient {
    pub fn new(http: &HttpConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(http.origin_connect_timeout_secs),
            read_timeout: Duration::from_secs(http.origin_read_timeout_secs),
            write_timeout: Duration::from_secs(http.origin_write_timeout_secs),
            max_response_bytes: http.max_origin_response_bytes as usize,
        }
    }

    /// Sends `request` to the target's origin and reads the full reply.
    #[instrument(
        skip(self, target, request),
        fields(origin = %target.addr(), url = %target.canonical_url)
    )]
    pub async fn fetch(
        &self,
        target: &ResolvedTarget,
        request: &[u8],
    ) -> Result<OriginResponse, OriginError> {
        let addr = target.addr();
        let unreachable = |reason: String| OriginError::Unreachable {
            addr: addr.clone(),
            reason,
        };

        info!(target: "stash::proxy", upstream = %addr, "Connecting to origin");
        let mut stream = connect_with_timeout(&addr, self.connect_timeout)
            .await
            .map_err(unreachable)?;

        match timeout(self.write_timeout, stream.write_all(request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(unreachable(format!("write failed: {e}"))),
            Err(_) => return Err(unreachable("write timeout".into())),
        }

        debug!(
            target: "stash::proxy",
            upstream = %addr,
            request_len = request.len(),
            "Request forwarded; reading response"
        );

        let raw = match read_http_response(&mut stream, self.read_timeout, self.max_response_bytes)
            .await
        {
            Ok(raw) => raw,
            Err(ReadError::Empty) => {
                return Err(unreachable(
                    "closed connection without sending a response".into(),
                ));
            }
            Err(ReadError::Timeout) => return Err(unreachable("read timeout".into())),
            Err(ReadError::Io(e)) => return Err(unreachable(format!("read failed: {e}"))),
            Err(ReadError::TooLarge) => {
                return Err(OriginError::TooLarge {
                    addr,
                    limit: self.max_response_bytes,
                });
            }
        };

        let _ = stream.shutdown().await;

        match OriginResponse::parse(raw.clone()) {
            Some(resp) => {
                info!(
                    target: "stash::proxy",
                    upstream = %addr,
                    status = resp.status,
                    body_len = resp.body.len(),
                    "Origin responded"
                );
                Ok(resp)
            }
            None => {
                warn!(
                    target: "stash::proxy",
                    upstream = %addr,
                    bytes = raw.len(),
                    "Origin response could not be parsed"
                );
                Err(OriginError::Protocol(raw))
            }
        }
    }
}

async fn connect_with_timeout(addr: &str, timeout_dur: Duration) -> Result<TcpStream, String> {
    match timeout(timeout_dur, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(format!("connect failed: {e}")),
        Err(_) => Err(format!("connect timeout after {timeout_dur:?}")),
    }
}

#[cfg(test)]
mod tests {
    use stash_config::HttpConfig;
    use stash_http::ProxyError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::{OriginClient, OriginError};
    use crate::ResolvedTarget;

    fn target_for(port: u16) -> ResolvedTarget {
        ResolvedTarget {
            host: "127.0.0.1".into(),
            port,
            path: "/x".into(),
            canonical_url: "http://example.test/x".into(),
        }
    }

    #[tokio::test]
    async fn fetch_forwards_request_and_parses_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 1024];
            let n = sock.read(&mut buf).await.expect("read");
            sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi")
                .await
                .expect("write");
            buf.truncate(n);
            buf
        });

        let client = OriginClient::new(&HttpConfig::default());
        let resp = client
            .fetch(&target_for(port), b"GET /x HTTP/1.1\r\nHost: example.test\r\n\r\n")
            .await
            .expect("fetched");
        assert_eq!(resp.status, 200);
        assert_eq!(&resp.body[..], b"hi");

        let seen = server.await.expect("server task");
        assert_eq!(seen, b"GET /x HTTP/1.1\r\nHost: example.test\r\n\r\n");
    }

    #[tokio::test]
    async fn fetch_from_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let client = OriginClient::new(&HttpConfig::default());
        let err = client
            .fetch(&target_for(port), b"GET / HTTP/1.1\r\n\r\n")
            .await
            .unwrap_err();
        assert!(matches!(err, OriginError::Unreachable { .. }));
        assert!(matches!(
            err.into_passthrough(),
            Err(ProxyError::OriginUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn unparseable_reply_is_kept_for_passthrough() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 256];
            let _ = sock.read(&mut buf).await;
            let _ = sock.write_all(b"not http at all").await;
        });

        let client = OriginClient::new(&HttpConfig::default());
        let err = client
            .fetch(&target_for(port), b"GET / HTTP/1.1\r\n\r\n")
            .await
            .unwrap_err();
        let raw = err.into_passthrough().expect("passthrough bytes");
        assert_eq!(&raw[..], b"not http at all");
    }
}
