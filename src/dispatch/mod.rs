//! Dispatch — the single handler slot and the default outcomes around it.
//!
//! ## Core types
//!
//! - [`Handler`] — trait implemented by the application's request handler.
//! - [`handler_fn`] — adapts an async closure into a [`Handler`].
//! - [`HandlerError`] — the error a handler returns; any `std::error::Error`
//!   converts into it with `?`.
//! - [`Dispatcher`] — owns at most one handler and applies the status rules.
//!
//! ## Outcomes
//!
//! | Situation                              | Status | Body                       |
//! |----------------------------------------|--------|----------------------------|
//! | no handler registered                  | 501    | empty                      |
//! | handler returned `Ok`, marked handled  | as set (200 if unset) | as set      |
//! | handler returned `Ok`, not marked      | 400    | left as the handler set it |
//! | handler returned `Err` or panicked     | 500    | JSON [`ErrorReport`]       |

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::http::{ErrorReport, StatusCode};

/// Boxed future returned by [`Handler::handle`], borrowing the [`Context`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// The application's request handler.
///
/// A handler mutates `ctx.response_mut()` and calls
/// [`Context::mark_handled`] to claim the request. Returning `Err` (or
/// panicking) turns the response into a `500` carrying an [`ErrorReport`].
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because one handler is shared
///   by every connection task.
/// - The returned future may suspend; nothing times it out.
///
/// # Examples
///
/// ```rust,no_run
/// use rspond::context::Context;
/// use rspond::dispatch::{Handler, HandlerFuture};
/// use rspond::http::{Body, StatusCode};
///
/// struct Status;
///
/// impl Handler for Status {
///     fn handle<'a>(&'a self, ctx: &'a mut Context) -> HandlerFuture<'a> {
///         Box::pin(async move {
///             ctx.response_mut().set_status(StatusCode::Ok);
///             ctx.response_mut().set_body(Body::text("up"));
///             ctx.mark_handled();
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handle the request carried by `ctx`.
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> HandlerFuture<'a>;

    /// Component name reported as `source` when this handler fails.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A [`Handler`] backed by a closure. Built with [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Converts an async closure into a [`Handler`].
///
/// The closure must box its future so the future can borrow the context:
///
/// ```rust,no_run
/// use rspond::dispatch::{Dispatcher, handler_fn};
/// use rspond::http::StatusCode;
///
/// let dispatcher = Dispatcher::with_handler(handler_fn(|ctx| {
///     Box::pin(async move {
///         ctx.response_mut().set_status(StatusCode::NoContent);
///         ctx.mark_handled();
///         Ok(())
///     })
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    FnHandler { f }
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> HandlerFuture<'a> {
        (self.f)(ctx)
    }

    fn name(&self) -> &str {
        "handler_fn"
    }
}

/// Error raised by a [`Handler`].
///
/// Not a `std::error::Error` itself; every error type converts into it
/// with `?`, keeping its type name, message, and cause chain.
pub struct HandlerError {
    kind: String,
    message: String,
    component: Option<String>,
    causes: Vec<String>,
    backtrace: Backtrace,
}

impl HandlerError {
    /// Creates an error with an explicit type name and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            component: None,
            causes: Vec::new(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Names the component the error originated from.
    #[must_use]
    pub fn with_source(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("handler panicked")
        };
        Self::new("panic", message)
    }

    /// Builds the structured report, attributing it to `default_source` when
    /// the error did not name a component itself.
    pub fn report(&self, default_source: &str) -> ErrorReport {
        let mut stack_trace = self.causes.clone();
        if self.backtrace.status() == BacktraceStatus::Captured {
            stack_trace.extend(
                self.backtrace
                    .to_string()
                    .lines()
                    .map(|line| line.trim().to_owned()),
            );
        }

        ErrorReport {
            kind: self.kind.clone(),
            message: self.message.clone(),
            stack_trace: stack_trace.join("\n"),
            source: self
                .component
                .clone()
                .unwrap_or_else(|| default_source.to_owned()),
        }
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self {
            kind: short_type_name::<E>().to_owned(),
            message: err.to_string(),
            component: None,
            causes,
            backtrace: Backtrace::capture(),
        }
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("component", &self.component)
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// `std::io::error::Error` -> `Error`, `my_app::Fault<u8>` -> `Fault`
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler ran and marked the request handled.
    Handled,
    /// The handler ran but did not mark the request handled; status forced to 400.
    Unhandled,
    /// No handler is registered; status 501.
    NotImplemented,
    /// The handler returned an error or panicked; status 500.
    Failed,
}

/// Holds the single handler slot and applies the default outcomes.
///
/// Registration happens before the dispatcher is handed to the
/// [`Server`](crate::server::Server); after that it is only read.
#[derive(Default)]
pub struct Dispatcher {
    handler: Option<Box<dyn Handler>>,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty handler slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher with `handler` already registered.
    pub fn with_handler(handler: impl Handler) -> Self {
        Self {
            handler: Some(Box::new(handler)),
        }
    }

    /// Registers `handler`, replacing any previous one.
    ///
    /// Returns `true` if a handler was replaced.
    pub fn register(&mut self, handler: impl Handler) -> bool {
        let replaced = self.handler.replace(Box::new(handler)).is_some();
        if replaced {
            warn!("replacing previously registered handler");
        }
        replaced
    }

    /// Returns `true` if a handler is registered.
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Runs the registered handler against `ctx` and settles the response status.
    ///
    /// After this returns, `ctx.response().status()` is always `Some`.
    pub async fn dispatch(&self, ctx: &mut Context) -> Outcome {
        let start = Instant::now();
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_owned();

        let outcome = match &self.handler {
            None => {
                debug!("no handler registered");
                ctx.response_mut().set_status(StatusCode::NotImplemented);
                Outcome::NotImplemented
            }
            Some(handler) => match invoke(&**handler, ctx).await {
                Ok(()) if ctx.is_handled() => {
                    if ctx.response().status().is_none() {
                        ctx.response_mut().set_status(StatusCode::Ok);
                    }
                    Outcome::Handled
                }
                Ok(()) => {
                    ctx.response_mut().set_status(StatusCode::BadRequest);
                    Outcome::Unhandled
                }
                Err(err) => {
                    warn!(%method, %path, error = %err, "handler failed");
                    let report = err.report(handler.name());
                    let response = ctx.response_mut();
                    response.reset();
                    response.set_status(StatusCode::InternalServerError);
                    response.set_body(report.to_body());
                    Outcome::Failed
                }
            },
        };

        let status = ctx.response().status().unwrap_or_default();
        info!("{} {} - {} ({:?})", method, path, status, start.elapsed());

        outcome
    }
}

// Invokes the handler, converting a panic (while building or polling the
// future) into a `HandlerError`.
async fn invoke(handler: &dyn Handler, ctx: &mut Context) -> Result<(), HandlerError> {
    let build = move || {
        let ctx = ctx;
        handler.handle(ctx)
    };
    let future = match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(future) => future,
        Err(payload) => return Err(HandlerError::from_panic(payload)),
    };

    match (CatchPanic { inner: future }).await {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::from_panic(payload)),
    }
}

struct CatchPanic<'a> {
    inner: HandlerFuture<'a>,
}

impl Future for CatchPanic<'_> {
    type Output = Result<Result<(), HandlerError>, Box<dyn Any + Send>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let inner = &mut self.inner;
        match panic::catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(result)) => Poll::Ready(Ok(result)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}
