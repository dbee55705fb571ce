//! HTTP response types and wire assembly
//!
//! Responses go out as two separate writes: the status line plus headers,
//! serialized into a fixed-capacity tracked buffer, then the body.

use crate::error::{Error, Result};
use crate::pool::{BufferPool, TrackedBuf};
use smallvec::SmallVec;
use std::io::Write;

/// Fixed capacity of the serialized response header.
pub const HEADER_CAPACITY: usize = 512;

/// Fixed 404 page. Its `Content-Length` is always this body's true length.
pub const NOT_FOUND_BODY: &[u8] = b"<h1>404 Not Found</h1><p>File not found</p>";

/// Fixed 500 body sent on allocation or read failure.
pub const SERVER_ERROR_BODY: &[u8] = b"Memory allocation failed";

/// Fixed 400 body sent for unparseable request lines.
pub const BAD_REQUEST_BODY: &[u8] = b"Bad Request";

/// HTTP Status Code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Get the numeric code
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Get the reason phrase
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// Response body: a fixed page or a pool-tracked buffer.
pub enum Body {
    Empty,
    Static(&'static [u8]),
    /// Tracked buffer with the number of bytes actually filled
    Tracked { buf: TrackedBuf, len: usize },
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Static(bytes) => bytes,
            Body::Tracked { buf, len } => &buf[..*len],
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// HTTP Response
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response headers (stack-allocated for small header counts)
    pub headers: SmallVec<[(String, String); 8]>,
    /// Response body
    pub body: Body,
}

impl Response {
    /// Create a new response
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: SmallVec::new(),
            body: Body::Empty,
        }
    }

    /// The fixed 404 answer for files that do not exist
    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/html")
            .body(Body::Static(NOT_FOUND_BODY))
            .build()
    }

    /// The fixed 400 answer for malformed request lines
    pub fn bad_request() -> Self {
        ResponseBuilder::new(StatusCode::BAD_REQUEST)
            .header("Content-Type", "text/plain")
            .body(Body::Static(BAD_REQUEST_BODY))
            .build()
    }

    /// The fixed 500 answer for allocation and read failures
    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .header("Content-Type", "text/plain")
            .body(Body::Static(SERVER_ERROR_BODY))
            .build()
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize the status line and headers into a pool-tracked buffer
    /// of `HEADER_CAPACITY` bytes. Returns the buffer and the number of
    /// bytes written. The body goes out as a separate write.
    pub fn serialize_header(&self, pool: &BufferPool) -> Result<(TrackedBuf, usize)> {
        let mut buf = pool.allocate(HEADER_CAPACITY).map_err(Error::from)?;
        let mut cursor = std::io::Cursor::new(&mut buf[..]);

        let overflow = |_| Error::HeaderTooLarge {
            limit: HEADER_CAPACITY,
        };
        write!(cursor, "HTTP/1.1 {}\r\n", self.status).map_err(overflow)?;
        for (name, value) in &self.headers {
            write!(cursor, "{}: {}\r\n", name, value).map_err(overflow)?;
        }
        write!(cursor, "Content-Length: {}\r\n\r\n", self.body.len()).map_err(overflow)?;

        let len = cursor.position() as usize;
        Ok((buf, len))
    }
}

/// Builder for constructing responses
pub struct ResponseBuilder {
    response: Response,
}

impl ResponseBuilder {
    /// Create a new builder
    pub fn new(status: StatusCode) -> Self {
        Self {
            response: Response::new(status),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers.push((name.into(), value.into()));
        self
    }

    /// Set body
    pub fn body(mut self, body: Body) -> Self {
        self.response.body = body;
        self
    }

    /// Build the response
    pub fn build(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        assert_eq!(StatusCode::OK.as_u16(), 200);
        assert_eq!(StatusCode::NOT_FOUND.to_string(), "404 Not Found");
        assert_eq!(StatusCode(418).reason_phrase(), "Unknown");
    }

    #[test]
    fn test_not_found_is_fixed() {
        let res = Response::not_found();
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.header("content-type"), Some("text/html"));
        assert_eq!(
            res.body.as_bytes(),
            b"<h1>404 Not Found</h1><p>File not found</p>"
        );
    }

    #[test]
    fn test_serialize_header() {
        let pool = BufferPool::new();
        let res = ResponseBuilder::new(StatusCode::OK)
            .header("Content-Type", "text/html")
            .header("Cache-Control", "no-cache")
            .body(Body::Static(b"Hello"))
            .build();

        let (buf, len) = res.serialize_header(&pool).unwrap();
        let header = std::str::from_utf8(&buf[..len]).unwrap();

        assert!(header.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(header.contains("Content-Type: text/html\r\n"));
        assert!(header.contains("Cache-Control: no-cache\r\n"));
        assert!(header.contains("Content-Length: 5\r\n"));
        assert!(header.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_serialize_header_is_tracked() {
        let pool = BufferPool::new();
        let res = Response::not_found();

        let (buf, _) = res.serialize_header(&pool).unwrap();
        assert_eq!(pool.total_allocated(), HEADER_CAPACITY);
        drop(buf);
        assert_eq!(pool.total_allocated(), 0);
    }

    #[test]
    fn test_oversized_header_rejected() {
        let pool = BufferPool::new();
        let res = ResponseBuilder::new(StatusCode::OK)
            .header("X-Padding", "x".repeat(HEADER_CAPACITY))
            .build();

        assert!(matches!(
            res.serialize_header(&pool),
            Err(Error::HeaderTooLarge { .. })
        ));
        // The failed attempt leaks nothing
        assert_eq!(pool.total_allocated(), 0);
    }
}
