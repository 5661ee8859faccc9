//! HTTP/1.1 request parsing using the [`httparse`] crate.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, Version};

/// Errors that can occur while parsing an HTTP/1.1 request.
///
/// Every variant is terminal for the connection that produced the bytes, and
/// for nothing else.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no bytes received")]
    Empty,

    #[error("request head is incomplete within the read chunk")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("unsupported protocol version HTTP/1.{minor}")]
    UnsupportedVersion { minor: u8 },
}

/// A fully parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from the raw bytes of a single read. Every
/// byte following the blank line that ends the head is taken as the body.
///
/// # Examples
///
/// ```
/// use rspond::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let request = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    version: Version,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Empty`] — `buf` holds no bytes at all.
    /// - [`RequestError::Incomplete`] — the head is not terminated by an empty line.
    /// - [`RequestError::Parse`] — the request line or a header line is malformed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<Self, RequestError> {
        if buf.is_empty() {
            return Err(RequestError::Empty);
        }

        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(m) => match m.parse() {
                Ok(method) => method,
                Err(never) => match never {},
            },
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        let minor = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;
        let version =
            Version::from_minor(minor).ok_or(RequestError::UnsupportedVersion { minor })?;

        let mut header_list = Headers::with_capacity(raw_req.headers.len());
        // Non UTF-8 bytes (obs-text) are replaced rather than rejected.
        for header in raw_req.headers.iter() {
            header_list.insert(header.name, String::from_utf8_lossy(header.value));
        }

        let params = query.as_deref().map(parse_query_string).unwrap_or_default();

        Ok(Self {
            method,
            target: target.to_owned(),
            path,
            version,
            headers: header_list,
            query,
            body: Bytes::copy_from_slice(&buf[body_offset..]),
            params,
        })
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request target exactly as it appeared on the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers in the order they were received.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a parsed query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// Keys and values have `+` decoded as a space; percent-escapes are left as is.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.replace('+', " "), value.replace('+', " "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET /status HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/status");
        assert_eq!(req.version(), Version::Http11);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert!(req.body().is_empty());
    }

    #[test]
    fn parse_query_string() {
        let raw = b"GET /search?q=rust+lang&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.target(), "/search?q=rust+lang&page=2");
        assert_eq!(req.query_string(), Some("q=rust+lang&page=2"));
        assert_eq!(req.query_param("q"), Some("rust lang"));
        assert_eq!(req.query_param("page"), Some("2"));
    }

    #[test]
    fn headers_keep_order() {
        let raw = b"GET / HTTP/1.0\r\nB: 2\r\nA: 1\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        let names: Vec<_> = req.headers().iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(req.version(), Version::Http10);
    }

    #[test]
    fn body_is_remaining_bytes() {
        let raw = b"POST /act HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(req.body().as_ref(), b"hello");
    }

    #[test]
    fn latin1_header_value_is_decoded_lossily() {
        let raw = b"GET /status HTTP/1.1\r\nUser-Agent: caf\xe9\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/status");
        assert_eq!(req.headers().get("user-agent"), Some("caf\u{fffd}"));
    }

    #[test]
    fn empty_input() {
        assert!(matches!(Request::parse(b""), Err(RequestError::Empty)));
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn missing_terminator_is_incomplete() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn binary_noise_rejected() {
        let raw = [0x16, 0x03, 0x01, 0x00, 0xa5, 0x01, 0x00, 0x00, 0xa1, 0x03, 0x03];
        assert!(matches!(Request::parse(&raw), Err(RequestError::Parse(_))));
    }

    #[test]
    fn malformed_header_rejected() {
        let raw = b"GET / HTTP/1.1\r\nNo colon here\r\n\r\n";
        assert!(matches!(Request::parse(raw), Err(RequestError::Parse(_))));
    }
}
