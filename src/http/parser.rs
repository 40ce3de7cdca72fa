use bytes::Bytes;

use crate::http::request::{Method, Request, RequestBuilder};

/// Upper bound on the request line plus headers.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    InvalidContentLength,
    HeadersTooLarge,
    BodyTooLarge { length: usize, limit: usize },
    Incomplete,
}

impl ParseError {
    /// Status the transport answers with before closing the connection.
    pub fn status(&self) -> u16 {
        match self {
            ParseError::HeadersTooLarge => 431,
            ParseError::BodyTooLarge { .. } => 413,
            _ => 400,
        }
    }
}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied.
pub fn parse_http_request(buf: &[u8], max_body: usize) -> Result<(Request, usize), ParseError> {
    let Some(headers_end) = find_headers_end(buf) else {
        if buf.len() > MAX_HEADER_BYTES {
            return Err(ParseError::HeadersTooLarge);
        }
        return Err(ParseError::Incomplete);
    };
    if headers_end > MAX_HEADER_BYTES {
        return Err(ParseError::HeadersTooLarge);
    }
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let uri = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    let mut builder = RequestBuilder::new()
        .method(method)
        .uri(uri)
        .version(version);

    let mut content_length = 0;
    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let (key, value) = (key.trim(), value.trim());

        if key.eq_ignore_ascii_case("Content-Length") {
            content_length = value
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength)?;
        }
        builder = builder.header(key, value);
    }

    if content_length > max_body {
        return Err(ParseError::BodyTooLarge {
            length: content_length,
            limit: max_body,
        });
    }

    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let request = builder
        .body(Bytes::copy_from_slice(&body_bytes[..content_length]))
        .build()
        .map_err(|_| ParseError::InvalidRequest)?;

    Ok((request, headers_end + 4 + content_length))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req, 1024).unwrap();

        assert_eq!(parsed.uri, "/");
        assert_eq!(parsed.header("Host"), Some("example.com"));
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn oversized_body_is_rejected_before_it_arrives() {
        let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4096\r\n\r\n";

        let err = parse_http_request(req, 1024).unwrap_err();

        assert_eq!(err, ParseError::BodyTooLarge { length: 4096, limit: 1024 });
        assert_eq!(err.status(), 413);
    }
}
