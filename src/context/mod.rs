//! Per-connection context — the request, the response being built for it,
//! and the flag a handler sets to claim the request.

use crate::http::{Request, Response};

/// The paired request/response state for one connection.
///
/// Created by the server after a successful parse and handed to the
/// [`Dispatcher`](crate::dispatch::Dispatcher) by `&mut`. It is owned by the
/// task serving that connection and dropped once the send attempt is over.
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    handled: bool,
}

impl Context {
    /// Create a new context from a request, with an empty response.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::new(),
            handled: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Asserts that the handler produced a meaningful response.
    ///
    /// Without this the dispatcher overwrites the status with `400`.
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    /// Sets the handled flag explicitly.
    pub fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Command {
        relay: u8,
        on: bool,
    }

    fn context(raw: &[u8]) -> Context {
        Context::new(Request::parse(raw).unwrap())
    }

    #[test]
    fn starts_unhandled_with_empty_response() {
        let ctx = context(b"GET / HTTP/1.1\r\n\r\n");
        assert!(!ctx.is_handled());
        assert_eq!(ctx.response().status(), None);
        assert!(ctx.response().body().is_none());
    }

    #[test]
    fn handled_flag_toggles() {
        let mut ctx = context(b"GET / HTTP/1.1\r\n\r\n");
        ctx.mark_handled();
        assert!(ctx.is_handled());
        ctx.set_handled(false);
        assert!(!ctx.is_handled());
    }

    #[test]
    fn json_body() {
        let ctx = context(b"POST /relay HTTP/1.1\r\n\r\n{\"relay\":2,\"on\":true}");
        let cmd: Command = ctx.json().unwrap();
        assert_eq!(cmd, Command { relay: 2, on: true });
    }

    #[test]
    fn json_body_invalid() {
        let ctx = context(b"POST /relay HTTP/1.1\r\n\r\nnot json");
        assert!(ctx.json::<Command>().is_err());
    }
}
