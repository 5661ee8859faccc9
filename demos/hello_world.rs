//! Small relay-board style service.
//!
//! ```text
//! RUST_LOG=debug cargo run --example hello_world
//! curl -i http://127.0.0.1:8080/status
//! curl -i --compressed http://127.0.0.1:8080/status
//! curl -i -X POST -d '{"relay":1,"on":true}' http://127.0.0.1:8080/relay
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use rspond::{
    Body, Context, Dispatcher, HandlerError, HandlerFuture, Method, Server, ServerConfig,
    StatusCode, handler_fn,
};

#[derive(Debug, Deserialize)]
struct RelayCommand {
    relay: u8,
    on: bool,
}

fn handle(ctx: &mut Context) -> HandlerFuture<'_> {
    Box::pin(async move {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_owned();

        match (&method, path.as_str()) {
            (Method::Get, "/status") => {
                let mut status = BTreeMap::new();
                status.insert("ok", true);
                ctx.response_mut().set_status(StatusCode::Ok);
                ctx.response_mut().set_body(Body::json(&status)?);
                ctx.mark_handled();
            }
            (Method::Post, "/relay") => {
                let command: RelayCommand = ctx.json()?;
                if command.relay > 7 {
                    let message = format!("no relay {}", command.relay);
                    return Err(HandlerError::new("RelayOutOfRange", message).with_source("relay-board"));
                }
                tracing::info!(relay = command.relay, on = command.on, "switching relay");
                ctx.response_mut().set_status(StatusCode::NoContent);
                ctx.mark_handled();
            }
            // Left unhandled: the dispatcher answers 400.
            _ => {}
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dispatcher = Dispatcher::with_handler(handler_fn(handle));
    let server = Server::with_config(ServerConfig::from_env()).await?;
    println!("Listening on http://{}", server.local_addr());

    server
        .run_with_shutdown(dispatcher, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
