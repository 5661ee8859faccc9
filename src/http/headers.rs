//! Header fields and the ordered header list.
//!
//! Names compare case-insensitively per [RFC 9110 §5], but the spelling
//! as received is kept for the wire.

use std::fmt;

/// A single immutable header field.
///
/// Rendered without whitespace around the colon (`Name:Value`), which is
/// also how the response builder writes header lines.
///
/// # Examples
///
/// ```
/// use rspond::http::Header;
///
/// let header = Header::new("Content-Type").value("application/json");
/// assert_eq!(header.name(), "Content-Type");
/// assert_eq!(header.to_string(), "Content-Type:application/json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    /// Starts a header with the given name and an empty value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
        }
    }

    /// Sets the value, consuming the header.
    #[must_use]
    pub fn value(self, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_value(&self) -> &str {
        &self.value
    }

    /// Returns `true` if this header's name equals `name`, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for Header {
    fn from((name, value): (N, V)) -> Self {
        Header::new(name).value(value)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// An ordered, append-only list of [`Header`]s with case-insensitive lookup.
///
/// Multiple values for the same name are preserved in insertion order.
///
/// # Examples
///
/// ```
/// use rspond::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html; charset=utf-8");
/// headers.insert("X-Custom", "first");
/// headers.insert("X-Custom", "second");
///
/// assert_eq!(headers.get("content-type"), Some("text/html; charset=utf-8"));
/// let all: Vec<_> = headers.get_all("x-custom").collect();
/// assert_eq!(all, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<Header>,
}

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header list with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header.
    pub fn push(&mut self, header: Header) {
        self.inner.push(header);
    }

    /// Appends a header built from a name and value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.push(Header::new(name).value(value));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|h| h.is(name))
            .map(Header::as_value)
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |h| h.is(name))
            .map(Header::as_value)
    }

    /// Returns `true` if the list contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|h| h.is(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.inner.iter()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.inner {
            write!(f, "{header}\r\n")?;
        }
        Ok(())
    }
}
