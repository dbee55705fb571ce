//! HTTP request types and request-line parsing

use crate::error::{Error, Result};

/// Most bytes read from a connection for one request.
pub const MAX_REQUEST_BYTES: usize = 2048;

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    /// Parse from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed request line. Built fresh per connection, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
}

impl Request {
    /// Parse the request line out of a raw socket read.
    ///
    /// Fails closed: anything that does not yield a valid method token
    /// followed by a path token is rejected, never served from stale or
    /// partial state.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let line_end = raw
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(raw.len());
        let line = std::str::from_utf8(&raw[..line_end]).map_err(|_| Error::MalformedRequest)?;

        let mut tokens = line.split_whitespace();
        let method = tokens.next().ok_or(Error::MalformedRequest)?;
        let path = tokens.next().ok_or(Error::MalformedRequest)?;

        Ok(Self {
            method: Method::from_str(method)?,
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::from_str("GET").unwrap(), Method::Get);
        assert_eq!(Method::from_str("post").unwrap(), Method::Post);
        assert!(Method::from_str("BREW").is_err());
    }

    #[test]
    fn test_parse_request_line() {
        let req = Request::parse(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/index.html");
    }

    #[test]
    fn test_parse_without_version_token() {
        let req = Request::parse(b"GET /\r\n").unwrap();
        assert_eq!(req.path, "/");
    }

    #[test]
    fn test_parse_rejects_missing_path() {
        assert!(Request::parse(b"GET\r\n\r\n").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert!(Request::parse(b"").is_err());
        assert!(Request::parse(b"\r\n").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_method() {
        assert!(Request::parse(b"BREW /coffee HTTP/1.1\r\n").is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        assert!(Request::parse(b"GET /\xff\xfe HTTP/1.1\r\n").is_err());
    }
}
