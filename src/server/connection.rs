use crate::{
    config::ServerConfig,
    errors::{Error, Result},
    http::{codec, request::HttpRequest, response::HttpResponse, types::MethodRegistry},
    router::{Handler, RoutingTable},
};
use mio::{net::TcpStream, Interest};
use std::{
    any::Any,
    io::{self, Read, Write},
    mem,
    net::{Shutdown, SocketAddr},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

/// Everything a connection phase needs besides its own socket.
///
/// Built once at bind and shared read-only between the loop and the workers.
pub(crate) struct ServerContext {
    pub(crate) config: ServerConfig,
    pub(crate) routes: RoutingTable,
    pub(crate) methods: MethodRegistry,
}

/// Where a connection is in its single request/response exchange.
pub(crate) enum State {
    /// Collecting request bytes.
    Reading { buffer: Vec<u8> },
    /// Request decoded and routed; the handler runs on the next writable event.
    Dispatching {
        request: HttpRequest,
        handler: Arc<dyn Handler>,
    },
    /// Response bytes, of which `written` already reached the socket.
    Writing { bytes: Vec<u8>, written: usize },
    Closed,
}

/// One accepted socket and its state.
///
/// Owned by the event loop, or by a worker job while a phase runs there; never
/// by both at once.
pub(crate) struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    state: State,
}

impl Connection {
    #[inline]
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            state: State::Reading { buffer: Vec::new() },
        }
    }

    #[inline]
    pub(crate) fn stream(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &State {
        &self.state
    }

    /// Readiness the current state waits for; `None` once closed.
    #[inline]
    pub(crate) fn interest(&self) -> Option<Interest> {
        match self.state {
            State::Reading { .. } => Some(Interest::READABLE),
            State::Dispatching { .. } | State::Writing { .. } => Some(Interest::WRITABLE),
            State::Closed => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Runs the phase the current state is waiting for.
    pub(crate) fn advance(&mut self, ctx: &ServerContext) {
        match self.state {
            State::Reading { .. } => self.on_readable(ctx),
            State::Dispatching { .. } | State::Writing { .. } => self.on_writable(),
            State::Closed => {}
        }
    }
}

// Readable phase
impl Connection {
    /// Drains the socket and, once the request is complete, decodes and
    /// routes it.
    pub(crate) fn on_readable(&mut self, ctx: &ServerContext) {
        let State::Reading { buffer } = &mut self.state else {
            return;
        };

        match fill_buffer(&mut self.stream, buffer, &ctx.config) {
            Ok(false) => {}
            Ok(true) => {
                let bytes = mem::take(buffer);
                self.state = self.dispatch(&bytes, ctx);
            }
            Err(err) => {
                let bytes = mem::take(buffer);
                self.state = self.reject(err, &bytes, ctx);
            }
        }
    }

    fn dispatch(&self, bytes: &[u8], ctx: &ServerContext) -> State {
        match codec::decode(bytes, &ctx.methods) {
            Ok(request) => {
                let handler = ctx.routes.handler_for(&request).clone();
                tracing::debug!(
                    peer = %self.peer,
                    method = %request.method(),
                    path = request.path(),
                    "dispatching request"
                );
                State::Dispatching { request, handler }
            }
            Err(err) => self.reject(err, bytes, ctx),
        }
    }

    /// State after a failed read or decode: an error reply when configured,
    /// otherwise closed.
    fn reject(&self, err: Error, bytes: &[u8], ctx: &ServerContext) -> State {
        if !err.is_decode_error() {
            tracing::error!(peer = %self.peer, %err, "connection failed");
            return State::Closed;
        }

        tracing::warn!(peer = %self.peer, %err, "dropping malformed request");
        if !ctx.config.reject_malformed {
            return State::Closed;
        }

        match err.as_http(&codec::guess_version(bytes)) {
            Some(reply) => State::Writing {
                bytes: reply.to_vec(),
                written: 0,
            },
            None => State::Closed,
        }
    }
}

/// Reads until the request is complete, the peer closes or the socket would
/// block. Returns `true` when the buffer holds a full request.
fn fill_buffer(
    stream: &mut TcpStream,
    buffer: &mut Vec<u8>,
    config: &ServerConfig,
) -> Result<bool> {
    let mut chunk = vec![0; config.read_chunk_size.max(1)];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) if buffer.is_empty() => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed before sending a request",
                )
                .into())
            }
            Ok(0) => return Ok(true),
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);

                if buffer.len() > config.max_request_size {
                    return Err(Error::RequestTooLarge(config.max_request_size));
                }
                if codec::request_complete(buffer) {
                    return Ok(true);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

// Writable phase
impl Connection {
    /// Runs the handler if the request is still pending, then writes as much
    /// of the response as the socket takes. Closes once everything is out.
    pub(crate) fn on_writable(&mut self) {
        if let State::Dispatching { .. } = self.state {
            self.state = match mem::replace(&mut self.state, State::Closed) {
                State::Dispatching { request, handler } => self.respond(&request, &handler),
                other => other,
            };
        }

        let State::Writing { bytes, written } = &mut self.state else {
            return;
        };

        match write_bytes(&mut self.stream, bytes, written) {
            Ok(false) => {}
            Ok(true) => {
                // The peer may still be sending; an error here changes nothing.
                let _ = self.stream.shutdown(Shutdown::Write);
                self.state = State::Closed;
            }
            Err(err) => {
                tracing::error!(peer = %self.peer, %err, "failed to write response");
                self.state = State::Closed;
            }
        }
    }

    fn respond(&self, request: &HttpRequest, handler: &Arc<dyn Handler>) -> State {
        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.handle(request, HttpResponse::new())
        }));

        let response = match handled {
            Ok(response) => response,
            Err(payload) => {
                tracing::error!(
                    peer = %self.peer,
                    path = request.path(),
                    panic = panic_message(payload.as_ref()),
                    "handler panicked"
                );
                return State::Closed;
            }
        };

        match codec::encode_response(&response) {
            Ok(bytes) => {
                tracing::debug!(
                    peer = %self.peer,
                    path = request.path(),
                    status = response.status_line().status().as_u16(),
                    "response ready"
                );
                State::Writing { bytes, written: 0 }
            }
            Err(err) => {
                tracing::error!(peer = %self.peer, %err, "handler built an invalid response");
                State::Closed
            }
        }
    }
}

/// Text of a `panic!` payload, if it carried one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    match payload.downcast_ref::<&'static str>() {
        Some(message) => *message,
        None => payload
            .downcast_ref::<String>()
            .map_or("<non-string payload>", String::as_str),
    }
}

/// Writes `bytes[*written..]`. Returns `true` when everything is written,
/// `false` when the socket would block first.
fn write_bytes(stream: &mut TcpStream, bytes: &[u8], written: &mut usize) -> io::Result<bool> {
    while *written < bytes.len() {
        match stream.write(&bytes[*written..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => *written += n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(true)
}
