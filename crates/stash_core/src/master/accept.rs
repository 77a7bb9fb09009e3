use std::{net::SocketAddr, sync::Arc};

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Duration;
use tracing::{debug, error, info, instrument, Instrument};

use crate::{worker::handle_connection, ProxyContext};

/// Binds `listen_addr` with an explicit backlog.
pub(crate) fn bind_listener(listen_addr: &str, backlog: u32) -> anyhow::Result<TcpListener> {
    info!(
        target: "stash::master",
        listen = %listen_addr,
        backlog,
        "Binding listener"
    );

    let bind = || -> std::io::Result<TcpListener> {
        let addr: SocketAddr = listen_addr
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket.listen(backlog)
    };

    match bind() {
        Ok(listener) => {
            info!(
                target: "stash::master",
                listen = %listen_addr,
                "Bind() successful"
            );
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "stash::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(e.into())
        }
    }
}

struct AcceptedConn {
    stream: TcpStream,
    addr: SocketAddr,
    permit: OwnedSemaphorePermit,
}

/// Waits for a free permit first, so a full house delays accepting instead
/// of dropping connections.
async fn accept_with_permit(
    listener: &TcpListener,
    listen_addr: &str,
    semaphore: &Arc<Semaphore>,
) -> anyhow::Result<AcceptedConn> {
    let permit = match semaphore.clone().acquire_owned().await {
        Ok(p) => p,
        Err(e) => {
            error!(
                target: "stash::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to acquire connection permit"
            );
            return Err(e.into());
        }
    };

    let (stream, addr) = match listener.accept().await {
        Ok(pair) => pair,
        Err(e) => {
            error!(
                target: "stash::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to accept connection"
            );
            return Err(e.into());
        }
    };

    debug!(
        target: "stash::master",
        listen = %listen_addr,
        client_addr = %addr,
        available_permits = semaphore.available_permits(),
        "Connection accepted"
    );

    Ok(AcceptedConn {
        stream,
        addr,
        permit,
    })
}

#[instrument(
    skip(listener, semaphore, ctx),
    fields(
        listen = %listen_addr,
        available_permits = semaphore.available_permits(),
    )
)]
pub(crate) async fn accept_loop(
    listener: TcpListener,
    listen_addr: String,
    semaphore: Arc<Semaphore>,
    ctx: Arc<ProxyContext>,
) -> anyhow::Result<()> {
    info!(
        target: "stash::master",
        listen = %listen_addr,
        "accept_loop started for listening socket"
    );

    loop {
        let AcceptedConn {
            stream,
            addr,
            permit,
        } = match accept_with_permit(&listener, &listen_addr, &semaphore).await {
            Ok(conn) => conn,
            // Per-connection accept errors (e.g. EMFILE) must not take the
            // listener down.
            Err(e) if e.downcast_ref::<std::io::Error>().is_some() => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        let ctx = ctx.clone();
        let span = tracing::info_span!(
            "worker_connection",
            client_addr = %addr,
            listen = %listen_addr,
        );

        tokio::spawn(
            async move {
                let _permit = permit;

                debug!(
                    target: "stash::worker",
                    "Worker spawned for incoming connection"
                );

                if let Err(e) = handle_connection(Box::new(stream), addr, ctx).await {
                    error!(
                        target: "stash::worker",
                        client_addr = %addr,
                        error = ?e,
                        "Error while handling connection"
                    );
                } else {
                    debug!(
                        target: "stash::worker",
                        client_addr = %addr,
                        "Connection handled successfully"
                    );
                }

                debug!(
                    target: "stash::master",
                    client_addr = %addr,
                    "Permit released after connection closed"
                );
            }
            .instrument(span),
        );
    }
}
