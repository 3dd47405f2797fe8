use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::dispatch::DispatchResult;
use crate::http::parser::{BodyFraming, ParseError, assemble_request, body_framing, parse_head};
use crate::http::request::{HttpRequest, Method};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::server::ServerContext;

const READ_CHUNK: usize = 4096;

/// Why reading a request stopped.
#[derive(Debug)]
pub enum RequestError {
    /// The bytes received do not form an acceptable request.
    Parse(ParseError),
    Io(std::io::Error),
    Timeout,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Parse(e) => write!(f, "parse error: {}", e),
            RequestError::Io(e) => write!(f, "read failed: {}", e),
            RequestError::Timeout => write!(f, "read timed out"),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<ParseError> for RequestError {
    fn from(e: ParseError) -> Self {
        RequestError::Parse(e)
    }
}

/// One accepted connection, serving exactly one request.
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    state: ConnectionState,
    ctx: Arc<ServerContext>,
}

pub enum ConnectionState {
    Reading,
    Processing(HttpRequest),
    Writing(ResponseWriter),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, ctx: Arc<ServerContext>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ConnectionState::Reading,
            ctx,
        }
    }

    /// Reads one request, answers it and closes. I/O failures and timeouts are
    /// returned as errors without writing anything.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.drive().await;
        // Best effort; the peer may already be gone.
        let _ = self.stream.shutdown().await;
        result
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await {
                    Ok(Some(req)) => {
                        self.state = ConnectionState::Processing(req);
                    }
                    Ok(None) => {
                        self.state = ConnectionState::Closed;
                    }
                    Err(RequestError::Parse(e)) => {
                        tracing::warn!(error = %e, "Rejecting malformed request");
                        let mut response = error_response(&e);
                        response.set_header("Connection", "close");
                        self.state = ConnectionState::Writing(ResponseWriter::new(&response));
                    }
                    Err(e) => return Err(e.into()),
                },

                ConnectionState::Processing(req) => {
                    self.state = match self.handle_request(&req).await {
                        Some(mut response) => {
                            if req.method() == Method::HEAD {
                                response.strip_body();
                            }
                            response.set_header("Connection", "close");
                            tracing::info!(
                                method = %req.method(),
                                path = %req.path(),
                                status = response.status.as_u16(),
                                "Request handled"
                            );
                            ConnectionState::Writing(ResponseWriter::new(&response))
                        }
                        None => ConnectionState::Closed,
                    };
                }

                ConnectionState::Writing(mut writer) => {
                    writer.write_to_stream(&mut self.stream).await?;
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads and assembles a request. `Ok(None)` means the peer closed before
    /// sending anything.
    pub async fn read_request(&mut self) -> Result<Option<HttpRequest>, RequestError> {
        let options = self.ctx.parse_options;

        let (head, consumed) = loop {
            // Try parsing whatever we already have
            match parse_head(&self.buffer, &options) {
                Ok(parsed) => break parsed,
                Err(ParseError::Incomplete) => {}
                Err(e) => return Err(e.into()),
            }

            if self.buffer.len() > self.ctx.max_head_bytes {
                return Err(ParseError::HeadTooLarge.into());
            }

            if self.fill_buffer().await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ParseError::UnexpectedEof.into());
            }
        };
        self.buffer.advance(consumed);

        let body = match body_framing(&head)? {
            BodyFraming::None => None,
            BodyFraming::Length(len) => {
                if len > self.ctx.max_body_bytes {
                    return Err(ParseError::BodyTooLarge.into());
                }
                while self.buffer.len() < len {
                    if self.fill_buffer().await? == 0 {
                        return Err(ParseError::UnexpectedEof.into());
                    }
                }
                Some(self.buffer.split_to(len))
            }
            BodyFraming::UntilClose => {
                // No framing: trust the peer to stop sending and close.
                while self.fill_buffer().await? != 0 {
                    if self.buffer.len() > self.ctx.max_body_bytes {
                        return Err(ParseError::BodyTooLarge.into());
                    }
                }
                Some(self.buffer.split())
            }
        };

        let request = assemble_request(head, body.as_deref(), &options)?;
        Ok(Some(request))
    }

    async fn fill_buffer(&mut self) -> Result<usize, RequestError> {
        self.buffer.reserve(READ_CHUNK);
        match timeout(self.ctx.read_timeout, self.stream.read_buf(&mut self.buffer)).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(RequestError::Io(e)),
            Err(_) => Err(RequestError::Timeout),
        }
    }

    /// Produces the response for a parsed request, or `None` when nothing should
    /// be written back.
    async fn handle_request(&self, req: &HttpRequest) -> Option<Response> {
        if self.ctx.static_files.handles(req.path()) {
            return Some(self.ctx.static_files.serve(req.path()).await);
        }

        match self.ctx.dispatcher.resolve(req) {
            DispatchResult::Matched(matched) => match matched.invoke(req) {
                Ok(response) => Some(response),
                Err(e) => {
                    tracing::error!(
                        method = %req.method(),
                        path = %req.path(),
                        error = %e,
                        "Handler failed"
                    );
                    Some(Response::internal_error())
                }
            },
            DispatchResult::MethodNotImplemented => Some(Response::method_not_implemented()),
            DispatchResult::NotFound if req.is_json() => {
                // JSON callers get no automatic 404 from this layer.
                tracing::warn!(path = %req.path(), "No handler for JSON request, closing");
                None
            }
            DispatchResult::NotFound => Some(Response::not_found()),
        }
    }
}

/// Response sent back for a request that failed to parse.
pub fn error_response(error: &ParseError) -> Response {
    match error {
        ParseError::InvalidMethod(_) => Response::method_not_implemented(),
        ParseError::BodyTooLarge => Response::payload_too_large(),
        _ => Response::bad_request(),
    }
}
