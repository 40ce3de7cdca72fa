use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::{Response, reason_phrase};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Wire form of `resp`: status line, headers in insertion order, one
/// `Set-Cookie` per cookie, then the body (empty when none was set).
pub fn serialize_response(resp: &Response, keep_alive: bool) -> Vec<u8> {
    encode(resp, keep_alive, true)
}

/// Wire form of a response to `HEAD`: the same head, including the
/// `Content-Length` the body would have had, but no body bytes.
pub fn serialize_head_response(resp: &Response, keep_alive: bool) -> Vec<u8> {
    encode(resp, keep_alive, false)
}

fn encode(resp: &Response, keep_alive: bool, with_body: bool) -> Vec<u8> {
    let body = resp.body().unwrap_or_default();
    let mut buf = Vec::with_capacity(128 + body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status(),
        reason_phrase(resp.status())
    );
    buf.extend_from_slice(status_line.as_bytes());

    let mut has_length = false;
    for (k, v) in resp.headers() {
        has_length |= k.eq_ignore_ascii_case("Content-Length");
        push_header(&mut buf, k, v);
    }

    for (k, v) in resp.cookies() {
        push_header(&mut buf, "Set-Cookie", &format!("{k}={v}"));
    }

    if !has_length {
        push_header(&mut buf, "Content-Length", &body.len().to_string());
    }
    if !keep_alive {
        push_header(&mut buf, "Connection", "close");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");
    if with_body {
        buf.extend_from_slice(body);
    }

    buf
}

fn push_header(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response, keep_alive: bool) -> Self {
        Self {
            buffer: serialize_response(response, keep_alive),
            written: 0,
        }
    }

    pub fn head(response: &Response, keep_alive: bool) -> Self {
        Self {
            buffer: serialize_head_response(response, keep_alive),
            written: 0,
        }
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}
