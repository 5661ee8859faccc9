//! HTTP/1.1 response state and its wire serialization.
//!
//! A [`Response`] starts with no status, no headers, and no body. The
//! handler (or the dispatcher's default paths) fills it in; [`serialize`]
//! then turns it into the exact bytes written to the socket.

use std::io;

use bytes::{BufMut, BytesMut};

use super::{Body, Header, Headers, Request, encoding, reason_phrase};

/// Mutable response state for a single connection.
///
/// # Examples
///
/// ```
/// use rspond::http::{Body, Response, StatusCode};
///
/// let mut response = Response::new();
/// assert_eq!(response.status(), None);
///
/// response.set_status(StatusCode::Ok);
/// response.add_header("X-Zone", "garden");
/// response.set_body(Body::text("watering"));
/// assert_eq!(response.status(), Some(200));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Response {
    status: Option<u16>,
    headers: Headers,
    body: Option<Body>,
}

impl Response {
    /// Creates an empty response with no status assigned yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status code, or `None` if nothing has assigned one yet.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Assigns the status code. Accepts a [`StatusCode`](super::StatusCode) or any raw `u16`.
    pub fn set_status(&mut self, status: impl Into<u16>) {
        self.status = Some(status.into());
    }

    /// Appends a header. Headers are written after the computed ones, in the
    /// order they were added.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Appends a prebuilt [`Header`].
    pub fn push_header(&mut self, header: Header) {
        self.headers.push(header);
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Body) {
        self.body = Some(body);
    }

    /// Discards headers and body, keeping only the status. Used when an
    /// error replaces whatever the handler produced.
    pub(crate) fn reset(&mut self) {
        self.headers = Headers::new();
        self.body = None;
    }
}

/// Serializes `response` into HTTP/1.1 wire bytes for `request`.
///
/// Header order is fixed:
///
/// ```text
/// HTTP/1.1 {code} {reason}
/// Access-Control-Allow-Origin:*
/// Connection:close
/// Content-Encoding:gzip            (only if the request accepts gzip)
/// Content-Type:{mime}
/// Content-Length:{n}
/// ...handler headers, in insertion order...
///
/// {body}
/// ```
///
/// A response without a status serializes as `500`; the dispatcher always
/// assigns one first, so this only happens if `serialize` is called directly.
///
/// # Errors
///
/// Returns the encoder's I/O error if gzip compression fails.
pub fn serialize(response: &Response, request: &Request) -> io::Result<BytesMut> {
    let code = response.status.unwrap_or(500);

    let (mut payload, mime_type) = match &response.body {
        Some(body) => (body.bytes().to_vec(), body.mime_type()),
        None => (Vec::new(), ""),
    };

    let gzip = encoding::supports_compression(request);
    if gzip {
        payload = encoding::compress(&payload)?;
    }

    let estimated_size = 160 + response.headers.len() * 64 + payload.len();
    let mut buf = BytesMut::with_capacity(estimated_size);

    buf.put(format!("HTTP/1.1 {code} {}\r\n", reason_phrase(code)).as_bytes());
    buf.put(&b"Access-Control-Allow-Origin:*\r\n"[..]);
    buf.put(&b"Connection:close\r\n"[..]);
    if gzip {
        buf.put(&b"Content-Encoding:gzip\r\n"[..]);
    }
    buf.put(format!("Content-Type:{mime_type}\r\n").as_bytes());
    buf.put(format!("Content-Length:{}\r\n", payload.len()).as_bytes());
    buf.put(response.headers.to_string().as_bytes());

    // Header/body separator
    buf.put(&b"\r\n"[..]);
    buf.put(payload.as_slice());

    Ok(buf)
}
