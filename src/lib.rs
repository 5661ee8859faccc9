//! # rspond
//!
//! A minimal, connection-per-request async HTTP/1.1 responder.
//!
//! Each accepted connection is read once, parsed into a [`Request`], handed
//! to the single registered [`Handler`](dispatch::Handler), answered with a
//! `Connection:close` response (gzip-encoded when the client accepts it),
//! and closed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rspond::dispatch::{Dispatcher, handler_fn};
//! use rspond::http::{Body, StatusCode};
//! use rspond::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::with_handler(handler_fn(|ctx| {
//!         Box::pin(async move {
//!             ctx.response_mut().set_status(StatusCode::Ok);
//!             ctx.response_mut().set_body(Body::text("Hello, World!"));
//!             ctx.mark_handled();
//!             Ok(())
//!         })
//!     }));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run(dispatcher).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::ServerConfig;
pub use context::Context;
pub use dispatch::{Dispatcher, Handler, HandlerError, HandlerFuture, Outcome, handler_fn};
pub use http::{Body, Header, Headers, Method, Request, Response, StatusCode};
pub use server::{SendError, Server, ServerError};
