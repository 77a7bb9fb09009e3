use bytes::{Bytes, BytesMut};
use stash_config::HttpConfig;
use stash_http::{request::find_headers_end, ClientStream};
use tokio::time::Duration;
use tracing::{debug, instrument, warn};

use super::timeouts::{read_more, ReadOutcome};

/// What came off the client socket before the pipeline starts.
#[derive(Debug)]
pub(crate) enum ClientRequest {
    /// Header block, or whatever arrived before EOF / timeout.
    Received(Bytes),
    /// Client went away without sending anything.
    Empty,
    /// No header terminator within `max_request_headers_bytes`.
    TooLarge,
}

/// Reads until `\r\n\r\n`, EOF, the read timeout, or the header size cap.
///
/// Anything after the blank line is dropped: only GET is served and its
/// body (if any) is never forwarded.
#[instrument(skip(stream, http), fields())]
pub(crate) async fn read_client_request(
    stream: &mut dyn ClientStream,
    http: &HttpConfig,
) -> anyhow::Result<ClientRequest> {
    let read_timeout = Duration::from_secs(http.client_read_timeout_secs());
    let max_headers = http.max_request_headers_bytes() as usize;
    let mut buf = BytesMut::new();

    loop {
        let head_len = find_headers_end(&buf).map(|end| end + 4);
        let received = head_len.unwrap_or(buf.len());

        if max_headers > 0 && received > max_headers {
            warn!(
                target: "stash::http",
                received,
                max_headers,
                "Request headers exceed limit"
            );
            return Ok(ClientRequest::TooLarge);
        }

        if let Some(len) = head_len {
            buf.truncate(len);
            break;
        }

        match read_more(stream, &mut buf, read_timeout).await? {
            ReadOutcome::Timeout => {
                debug!(
                    target: "stash::http",
                    received = buf.len(),
                    "Client read timed out; using what arrived"
                );
                break;
            }
            ReadOutcome::Read(0) => break,
            ReadOutcome::Read(_) => {}
        }
    }

    if buf.is_empty() {
        return Ok(ClientRequest::Empty);
    }

    debug!(
        target: "stash::http",
        header_len = buf.len(),
        "Read client request"
    );

    Ok(ClientRequest::Received(buf.freeze()))
}
