//! gzip content coding for response bodies.

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

use super::Request;

/// Returns `true` if any `Accept-Encoding` header on `request` mentions `gzip`.
///
/// This is a case-insensitive substring match, not a token match, so
/// `gzip;q=0` and `x-gzip` both count.
pub fn supports_compression(request: &Request) -> bool {
    request
        .headers()
        .get_all("accept-encoding")
        .any(|value| value.to_ascii_lowercase().contains("gzip"))
}

/// gzip-encodes `bytes` at the default (level 6) compression level.
pub fn compress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2 + 32), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}
