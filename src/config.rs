//! Server configuration
//!
//! # Memory Consumption
//!
//! Each open connection holds at most [`max_request_size`](ServerConfig::max_request_size)
//! bytes of request data plus one encoded response. Each readable event adds a
//! scratch chunk of [`read_chunk_size`](ServerConfig::read_chunk_size) bytes.
//!
//! # Examples
//!
//! ```no_run
//! use purr_http::{config::ServerConfig, HttpServer, HttpRequest, HttpResponse, Method};
//! use std::time::Duration;
//!
//! HttpServer::new()
//!     .config(ServerConfig {
//!         name: "api".into(),
//!         poll_interval: Duration::from_millis(100),
//!         reject_malformed: true, // Answer 400 instead of dropping
//!         ..ServerConfig::default()
//!     })
//!     .register(Method::Get, "/", |_: &HttpRequest, mut resp: HttpResponse| {
//!         resp.body("ok");
//!         resp
//!     })
//!     .start_on(8080)
//!     .unwrap();
//! ```

use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Listener and event loop settings.
///
/// The value is frozen into an `Arc` when the server binds; every connection
/// reads the same snapshot.
///
/// # Connection lifecycle
/// ```text
/// [ accept ] => [ Reading ] => [ Dispatching ] => [ Writing ] => [ Closed ]
///                   ||                                               /\
///                   \\============ decode error / EOF ===============//
/// ```
///
/// One request is served per connection; there is no keep-alive.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name written to the startup log (default: `"purr"`).
    pub name: String,

    /// Interface to bind (default: `"0.0.0.0"`, all interfaces).
    ///
    /// Anything accepted by [`ToSocketAddrs`](std::net::ToSocketAddrs)
    /// together with a port, e.g. `"127.0.0.1"` or `"localhost"`.
    pub hostname: String,

    /// Port used by [`start`](crate::HttpServer::start) and
    /// [`bind`](crate::HttpServer::bind) (default: `8080`).
    ///
    /// `0` asks the OS for any free port.
    pub port: u16,

    /// `SO_RCVBUF` hint for the listening socket (default: `2 MiB`, `8192 * 256`).
    ///
    /// Accepted sockets inherit it on most platforms. The OS may round or cap
    /// the value.
    pub recv_buffer_size: usize,

    /// Bytes read from a socket per `read` call (default: `8192`).
    pub read_chunk_size: usize,

    /// Upper bound on buffered request bytes (default: `1 MiB`).
    ///
    /// A connection going past it fails with
    /// [`RequestTooLarge`](crate::Error::RequestTooLarge).
    pub max_request_size: usize,

    /// Longest time a single poll blocks (default: `1s`).
    ///
    /// Bounds how long the loop takes to notice the running flag was cleared
    /// when the waker is not used.
    pub poll_interval: Duration,

    /// Capacity of the readiness event buffer (default: `1024`).
    pub max_events: usize,

    /// Reply to undecodable requests (default: `false`).
    ///
    /// If `false`, the connection is closed without a response.
    /// If `true`, the server sends one of these before closing:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// Connection: close\r
    /// Content-Length: 0\r
    /// \r
    /// ```
    /// `413 Payload Too Large` is used for requests over
    /// [`max_request_size`](ServerConfig::max_request_size).
    pub reject_malformed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "purr".to_string(),
            hostname: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            recv_buffer_size: 8192 * 256,
            read_chunk_size: 8192,
            max_request_size: 1024 * 1024,
            poll_interval: Duration::from_secs(1),
            max_events: 1024,
            reject_malformed: false,
        }
    }
}
