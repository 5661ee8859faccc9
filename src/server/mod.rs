//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and serves exactly one HTTP/1.1 request on each:
//! one bounded read, one dispatch, one response write, then close.
//!
//! ## Limits
//!
//! - A request must fit in a single read of
//!   [`ServerConfig::read_buffer_size`] bytes; there is no read-retry loop.
//! - There is no cap on concurrent connections and no timeout on the read,
//!   the handler, or the write. A peer that never sends, or a handler that
//!   never finishes, holds its task indefinitely.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::http::{request::Request, response};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while serializing or writing a response. Logged, never retried.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to encode response body: {0}")]
    Encode(#[source] std::io::Error),

    #[error("failed to write response: {0}")]
    Write(#[source] std::io::Error),
}

/// The rspond HTTP server.
///
/// Binds to a TCP address and hands every parsed request to a
/// [`Dispatcher`].
///
/// # Examples
///
/// ```rust,no_run
/// use rspond::dispatch::{Dispatcher, handler_fn};
/// use rspond::http::{Body, StatusCode};
/// use rspond::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let dispatcher = Dispatcher::with_handler(handler_fn(|ctx| {
///         Box::pin(async move {
///             ctx.response_mut().set_status(StatusCode::Ok);
///             ctx.response_mut().set_body(Body::text("Hello!"));
///             ctx.mark_handled();
///             Ok(())
///         })
///     }));
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(dispatcher).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    read_buffer_size: usize,
}

impl Server {
    /// Binds the server to the given TCP address with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        Self::with_config(ServerConfig::default().addr(addr.as_ref())).await
    }

    /// Binds the server using `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if `config.addr` cannot be bound.
    pub async fn with_config(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            read_buffer_size: config.read_buffer_size.max(1),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever, dispatching each request through `dispatcher`.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; accept failures are logged and the
    /// loop continues.
    pub async fn run(self, dispatcher: Dispatcher) -> Result<(), ServerError> {
        self.run_with_shutdown(dispatcher, std::future::pending())
            .await
    }

    /// Like [`run`](Self::run), but stops accepting once `signal` resolves.
    ///
    /// Connections already accepted keep running to completion on their own
    /// tasks; this method does not wait for them.
    pub async fn run_with_shutdown<S>(
        self,
        dispatcher: Dispatcher,
        signal: S,
    ) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        let dispatcher = Arc::new(dispatcher);
        let read_buffer_size = self.read_buffer_size;
        tokio::pin!(signal);

        info!(
            address = %self.local_addr,
            handler = dispatcher.has_handler(),
            "rspond listening"
        );

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
                () = &mut signal => {
                    info!(address = %self.local_addr, "shutdown signal received, no longer accepting");
                    return Ok(());
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let dispatcher = Arc::clone(&dispatcher);

            tokio::spawn(async move {
                handle_connection(stream, peer_addr, dispatcher, read_buffer_size).await;
            });
        }
    }
}

/// Serves one request on `stream`, then closes it on every path.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    read_buffer_size: usize,
) {
    if let Err(e) = respond(&mut stream, peer_addr, &dispatcher, read_buffer_size).await {
        warn!(peer = %peer_addr, error = %e, "failed to send response");
    }

    if let Err(e) = stream.shutdown().await {
        debug!(peer = %peer_addr, error = %e, "shutdown failed");
    }
    debug!(peer = %peer_addr, "connection closed");
}

// Returns `Ok` without writing anything if no request could be read or parsed.
async fn respond(
    stream: &mut TcpStream,
    peer_addr: SocketAddr,
    dispatcher: &Dispatcher,
    read_buffer_size: usize,
) -> Result<(), SendError> {
    let mut buf = vec![0u8; read_buffer_size];
    let bytes_read = match stream.read(&mut buf).await {
        Ok(n) => n,
        Err(e) => {
            debug!(peer = %peer_addr, error = %e, "read failed");
            return Ok(());
        }
    };

    let request = match Request::parse(&buf[..bytes_read]) {
        Ok(request) => request,
        Err(e) => {
            warn!(peer = %peer_addr, bytes = bytes_read, error = %e, "dropping unparsable request");
            return Ok(());
        }
    };

    debug!(
        peer = %peer_addr,
        method = %request.method(),
        path = %request.path(),
        "dispatching request"
    );

    let mut ctx = Context::new(request);
    dispatcher.dispatch(&mut ctx).await;

    let bytes = response::serialize(ctx.response(), ctx.request()).map_err(SendError::Encode)?;
    stream.write_all(&bytes).await.map_err(SendError::Write)?;
    stream.flush().await.map_err(SendError::Write)?;

    Ok(())
}
