use crate::{
    config::ServerConfig,
    errors::{Error, Result},
    http::types::{Method, MethodRegistry},
    router::{Handler, RoutingTable},
    server::{
        connection::{Connection, ServerContext},
        executor::Executor,
    },
};
use crossbeam::channel::{self, Receiver, Sender};
use mio::{
    net::{TcpListener, TcpStream},
    Events, Interest, Poll, Registry, Token, Waker,
};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::{
    collections::HashMap,
    io,
    net::{SocketAddr, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;

const LISTEN_BACKLOG: i32 = 1024;

/// HTTP/1.1 server: exact-path routes, one request per connection.
///
/// Connections are multiplexed on a single readiness loop. Without an
/// [`Executor`] every phase (read, decode, handler, write) runs on the loop
/// thread; with one, each phase runs as a job that owns the connection
/// until it hands it back.
///
/// # Examples
///
/// ```no_run
/// use purr_http::{HttpRequest, HttpResponse, HttpServer, Method, WorkerPool};
///
/// HttpServer::new()
///     .register(Method::Get, "/hello", |_: &HttpRequest, mut resp: HttpResponse| {
///         resp.body("hi");
///         resp
///     })
///     .executor(WorkerPool::new(4))
///     .hostname("127.0.0.1")
///     .start_on(8080)
///     .unwrap();
/// ```
pub struct HttpServer {
    config: ServerConfig,
    routes: RoutingTable,
    methods: MethodRegistry,
    executor: Option<Arc<dyn Executor>>,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpServer {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            routes: RoutingTable::new(),
            methods: MethodRegistry::new(),
            executor: None,
        }
    }

    /// Adds `handler` for `method` on the exact `path`.
    ///
    /// A path registered again keeps its first handler and also accepts the
    /// new method.
    #[inline]
    pub fn register(
        mut self,
        method: Method,
        path: impl Into<String>,
        handler: impl Handler,
    ) -> Self {
        self.routes.register(method, path, handler);
        self
    }

    /// Interned method for `token`, e.g. `server.method("PURGE")` for
    /// registering an extension method.
    #[inline]
    pub fn method(&self, token: &str) -> Method {
        self.methods.intern(token)
    }

    /// Replaces the default `404 Not Found` handler.
    #[inline]
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.routes.set_not_found(handler);
        self
    }

    /// Replaces the default `405 Method Not Allowed` handler.
    #[inline]
    pub fn method_not_allowed(mut self, handler: impl Handler) -> Self {
        self.routes.set_method_not_allowed(handler);
        self
    }

    /// Runs connection phases on `executor` instead of the loop thread.
    #[inline]
    pub fn executor(mut self, executor: impl Executor) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Interface to bind; empty means all interfaces.
    #[inline]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.hostname = hostname.into();
        self
    }

    #[inline]
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Replaces the whole configuration.
    #[inline]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn get_config(&self) -> &ServerConfig {
        &self.config
    }
}

// Startup
impl HttpServer {
    /// Binds the configured address and serves until shut down.
    pub fn start(self) -> Result<()> {
        self.bind()?.run()
    }

    /// Binds `port` and serves. Ports below `1` pick any free port.
    ///
    /// # Errors
    /// [`Error::BindFailure`] for ports above `65535` or when the socket
    /// cannot be bound.
    pub fn start_on(self, port: i32) -> Result<()> {
        self.start_on_with(port, || {})
    }

    /// Runs `callback`, then binds the configured port and serves.
    pub fn start_with<F: FnOnce()>(self, callback: F) -> Result<()> {
        callback();
        self.start()
    }

    /// Runs `callback`, then binds `port` and serves.
    pub fn start_on_with<F: FnOnce()>(mut self, port: i32, callback: F) -> Result<()> {
        self.config.port = checked_port(&self.config.hostname, port)?;
        callback();
        self.start()
    }

    /// Creates the listening socket without serving yet.
    ///
    /// The configuration and routes are frozen here; [`Listening::run`]
    /// starts the event loop.
    pub fn bind(self) -> Result<Listening> {
        let addr = display_addr(&self.config.hostname, self.config.port);
        let bind_failure = |source: io::Error| Error::BindFailure {
            addr: addr.clone(),
            source,
        };

        let mut listener = listen(&self.config).map_err(bind_failure)?;
        let local_addr = listener.local_addr().map_err(bind_failure)?;

        let poll = Poll::new().map_err(bind_failure)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(bind_failure)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER).map_err(bind_failure)?);

        tracing::info!(server = %self.config.name, addr = %local_addr, "HTTP server started");

        Ok(Listening {
            poll,
            listener,
            waker,
            local_addr,
            running: Arc::new(AtomicBool::new(true)),
            executor: self.executor,
            context: Arc::new(ServerContext {
                config: self.config,
                routes: self.routes,
                methods: self.methods,
            }),
        })
    }
}

fn checked_port(hostname: &str, port: i32) -> Result<u16> {
    match port {
        i32::MIN..=0 => Ok(0),
        1..=65535 => Ok(port as u16),
        _ => Err(Error::BindFailure {
            addr: display_addr(hostname, port),
            source: io::Error::new(io::ErrorKind::InvalidInput, "port out of range"),
        }),
    }
}

#[inline]
fn host(hostname: &str) -> &str {
    match hostname.trim() {
        "" => "0.0.0.0",
        host => host,
    }
}

fn aborted_by_peer(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
    )
}

fn display_addr(hostname: &str, port: impl std::fmt::Display) -> String {
    format!("{}:{port}", host(hostname))
}

fn listen(config: &ServerConfig) -> io::Result<TcpListener> {
    let addr = (host(&config.hostname), config.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "hostname did not resolve")
        })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(config.recv_buffer_size)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(TcpListener::from_std(socket.into()))
}

fn configure(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    SockRef::from(stream).set_keepalive(true)
}

//

/// Clears the running flag of a [`Listening`] server and wakes its loop.
///
/// Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        if let Err(err) = self.waker.wake() {
            // The loop still sees the flag within one poll interval.
            tracing::error!(%err, "failed to wake event loop");
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// A bound server, ready to [`run`](Listening::run).
pub struct Listening {
    poll: Poll,
    listener: TcpListener,
    waker: Arc<Waker>,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    executor: Option<Arc<dyn Executor>>,
    context: Arc<ServerContext>,
}

impl Listening {
    /// Address actually bound; useful after asking for port `0`.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: self.running.clone(),
            waker: self.waker.clone(),
        }
    }

    /// Serves connections on the current thread until
    /// [`ShutdownHandle::shutdown`] is called.
    ///
    /// Connections still open at shutdown are closed without a response.
    pub fn run(mut self) -> Result<()> {
        let mut events = Events::with_capacity(self.context.config.max_events.max(1));
        let mut connections = Connections::new();
        let (done_tx, done_rx) = channel::unbounded();

        while self.running.load(Ordering::Acquire) {
            if let Err(err) = self.poll.poll(&mut events, Some(self.context.config.poll_interval)) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                tracing::error!(%err, "poll failed");
                return Err(err.into());
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(&mut connections),
                    // Completions are collected below on every iteration.
                    WAKER => {}
                    token => self.ready(token, &mut connections, &done_tx),
                }
            }

            self.collect(&done_rx, &mut connections);
        }

        tracing::info!(
            server = %self.context.config.name,
            open = connections.map.len(),
            "HTTP server stopped"
        );
        Ok(())
    }

    fn accept(&mut self, connections: &mut Connections) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    if let Err(err) = configure(&stream) {
                        tracing::warn!(%peer, %err, "failed to set socket options");
                    }

                    let token = connections.next_token();
                    match self
                        .poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                    {
                        Ok(()) => {
                            tracing::debug!(%peer, token = token.0, "accepted connection");
                            connections.map.insert(token, Connection::new(stream, peer));
                        }
                        Err(err) => tracing::error!(%peer, %err, "failed to register connection"),
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                // The peer gave up while queued; the rest of the backlog is fine.
                Err(err) if aborted_by_peer(&err) => {
                    tracing::debug!(%err, "connection aborted before accept");
                    continue;
                }
                // Out of descriptors or memory; retried on the next listener event.
                Err(err) => {
                    tracing::error!(%err, "accept failed");
                    break;
                }
            }
        }
    }

    fn ready(
        &mut self,
        token: Token,
        connections: &mut Connections,
        done: &Sender<(Token, Connection)>,
    ) {
        match &self.executor {
            None => {
                let Some(conn) = connections.map.get_mut(&token) else {
                    return;
                };

                let before = conn.interest();
                conn.advance(&self.context);
                let after = conn.interest();

                if after == before {
                    return;
                }
                let registry = self.poll.registry();
                match after {
                    Some(interest) => {
                        if let Err(err) = registry.reregister(conn.stream(), token, interest) {
                            tracing::error!(%err, "failed to reregister connection");
                            close(registry, &mut connections.map, token);
                        }
                    }
                    None => close(registry, &mut connections.map, token),
                }
            }
            Some(executor) => {
                // Events for connections out on a worker never find them here.
                let Some(mut conn) = connections.map.remove(&token) else {
                    return;
                };
                if let Err(err) = self.poll.registry().deregister(conn.stream()) {
                    tracing::error!(%err, "failed to deregister connection");
                    return;
                }

                let context = self.context.clone();
                let done = done.clone();
                let waker = self.waker.clone();
                executor.execute(Box::new(move || {
                    conn.advance(&context);
                    if done.send((token, conn)).is_ok() {
                        let _ = waker.wake();
                    }
                }));
            }
        }
    }

    /// Takes back connections from finished jobs.
    fn collect(&mut self, done: &Receiver<(Token, Connection)>, connections: &mut Connections) {
        for (token, mut conn) in done.try_iter() {
            let Some(interest) = conn.interest() else {
                continue;
            };

            match self.poll.registry().register(conn.stream(), token, interest) {
                Ok(()) => {
                    connections.map.insert(token, conn);
                }
                Err(err) => tracing::error!(%err, "failed to register returned connection"),
            }
        }
    }
}

fn close(registry: &Registry, map: &mut HashMap<Token, Connection>, token: Token) {
    if let Some(mut conn) = map.remove(&token) {
        let _ = registry.deregister(conn.stream());
    }
}

/// Connections owned by the loop thread, keyed by their poll token.
struct Connections {
    map: HashMap<Token, Connection>,
    next: usize,
}

impl Connections {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            next: FIRST_CONNECTION,
        }
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next);
        self.next = match self.next.checked_add(1) {
            Some(next) => next,
            None => FIRST_CONNECTION,
        };
        token
    }
}
