use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, reason_phrase};
use crate::http::writer::ResponseWriter;
use crate::server::Engine;

pub struct Connection<S> {
    stream: S,
    peer: String,
    buffer: BytesMut,
    state: ConnectionState,
    engine: Arc<Engine>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

enum ReadOutcome {
    Request(Request),
    /// Translated transport error; answered and then the connection closes.
    Rejected(Response),
    Eof,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: String, engine: Arc<Engine>) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            engine,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
            self.state = match state {
                ConnectionState::Reading => match self.read_request().await? {
                    ReadOutcome::Request(req) => ConnectionState::Processing(req),
                    ReadOutcome::Rejected(response) => {
                        ConnectionState::Writing(ResponseWriter::new(&response, false), false)
                    }
                    ReadOutcome::Eof => ConnectionState::Closed,
                },

                ConnectionState::Processing(req) => {
                    let keep_alive = req.keep_alive();
                    let head = req.method == Method::HEAD;
                    let response = self.engine.handle(req).await;
                    let writer = if head {
                        ResponseWriter::head(&response, keep_alive)
                    } else {
                        ResponseWriter::new(&response, keep_alive)
                    };
                    ConnectionState::Writing(writer, keep_alive)
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        ConnectionState::Reading // go back for next request
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        let max_body = self.engine.config().server.max_request_body_size;

        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer, max_body) {
                Ok((mut request, consumed)) => {
                    self.buffer.advance(consumed);
                    request.set_remote_addr(self.peer.clone());
                    return Ok(ReadOutcome::Request(request));
                }

                Err(ParseError::Incomplete) => {}

                Err(e) => {
                    let status = e.status();
                    tracing::warn!(peer = %self.peer, error = ?e, status, "Rejecting request");
                    return Ok(ReadOutcome::Rejected(Response::transport_error(
                        status,
                        reason_phrase(status),
                    )));
                }
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Client closed connection
                return Ok(ReadOutcome::Eof);
            }
        }
    }
}
