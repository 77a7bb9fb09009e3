//! Per-connection handler.
//!
//! One request per connection: read it, answer it from the cache or the
//! origin, write exactly one response, close.

use std::{net::SocketAddr, sync::Arc};

use stash_http::{ClientStream, ProxyError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::ProxyContext;

mod dispatch;
mod request;
mod timeouts;


use dispatch::{dispatch, Reply};
use request::{read_client_request, ClientRequest};

/// Entry point for a "logical worker" that handles a single connection.
///
/// The stream is shut down exactly once before returning, whatever happened
/// on the way.
#[instrument(
    skip(stream, ctx),
    fields(
        client = %client_addr,
    )
)]
pub async fn handle_connection(
    mut stream: Box<dyn ClientStream>,
    client_addr: SocketAddr,
    ctx: Arc<ProxyContext>,
) -> anyhow::Result<()> {
    info!(target: "stash::worker", "Handling new client connection");

    let result = serve_one(stream.as_mut(), &ctx).await;

    if let Err(e) = stream.shutdown().await {
        debug!(
            target: "stash::worker",
            error = %e,
            "Client stream shutdown failed"
        );
    }

    info!(
        target: "stash::worker",
        %client_addr,
        "Finished handling connection"
    );

    result
}

async fn serve_one(stream: &mut dyn ClientStream, ctx: &ProxyContext) -> anyhow::Result<()> {
    let raw = match read_client_request(stream, &ctx.http).await? {
        ClientRequest::Received(raw) => raw,
        ClientRequest::Empty => {
            debug!(target: "stash::worker", "Empty request received; closing connection");
            return Ok(());
        }
        ClientRequest::TooLarge => {
            let reply = Reply::Error(ProxyError::MalformedRequest(
                "request headers too large".into(),
            ));
            respond(stream, &reply).await;
            return Ok(());
        }
    };

    let reply = dispatch(raw, ctx).await;
    respond(stream, &reply).await;
    Ok(())
}

/// Write failures (client gone) are logged and otherwise ignored; the cache
/// has already been updated by then.
async fn respond(stream: &mut dyn ClientStream, reply: &Reply) {
    match reply.write_to(stream).await {
        Ok(()) => info!(
            target: "stash::worker",
            reply = %reply.status_label(),
            "Response sent"
        ),
        Err(e) => warn!(
            target: "stash::worker",
            reply = %reply.status_label(),
            error = %e,
            "Failed to write response to client"
        ),
    }
}
