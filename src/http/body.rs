//! Response bodies and the serializers that produce them.

use bytes::Bytes;
use serde::Serialize;

pub const MIME_JSON: &str = "application/json";
pub const MIME_TEXT: &str = "text/plain; charset=utf-8";

/// Body bytes together with the MIME type that describes them.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use rspond::http::Body;
///
/// let mut map = BTreeMap::new();
/// map.insert("ok", true);
/// let body = Body::json(&map).unwrap();
/// assert_eq!(body.bytes().as_ref(), br#"{"ok":true}"#);
/// assert_eq!(body.mime_type(), "application/json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    bytes: Bytes,
    mime_type: String,
}

impl Body {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Plain UTF-8 text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into(), MIME_TEXT)
    }

    /// Serializes `value` to compact JSON. Key order follows the value's own
    /// serialization order.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_vec(value)?, MIME_JSON))
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Structured description of a failure raised while handling a request.
///
/// Serialized with the field names `type`, `message`, `stackTrace`, and
/// `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    /// Newline-separated trace lines.
    #[serde(rename = "stackTrace")]
    pub stack_trace: String,
    pub source: String,
}

impl ErrorReport {
    /// Renders the report as an `application/json` body.
    ///
    /// Falls back to an object holding only `type` and `message` if
    /// serialization fails, so the error path always has a body to send.
    pub fn to_body(&self) -> Body {
        Body::json(self).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to serialize error report");
            let minimal = serde_json::json!({ "type": self.kind, "message": self.message });
            Body::new(minimal.to_string(), MIME_JSON)
        })
    }
}
