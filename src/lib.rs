//! purr_http - readiness-driven HTTP/1.1 server with exact-path routing
//!
//! A small HTTP server that owns its sockets end to end: a single `mio`
//! event loop multiplexes every connection, requests are parsed and
//! responses framed by a hand-written codec, and each request is routed by
//! exact path to a registered handler.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1** and **HTTP/1.0**: one request per connection, then close
//! - `Content-Length` framing only; no chunked encoding, no keep-alive
//! - Header and cookie values are checked for CR/LF injection in both
//!   directions
//!
//! # Execution Model
//!
//! - **Inline** (default): read, decode, handler and write all run on the loop thread
//! - **Offloaded**: with an [`Executor`] ([`WorkerPool`] or a
//!   [`tokio::runtime::Handle`]), each phase runs as a job owning the
//!   connection, which is handed back to the loop when the phase ends
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use purr_http::{HttpRequest, HttpResponse, HttpServer, Method};
//!
//! fn main() -> purr_http::Result<()> {
//!     HttpServer::new()
//!         .register(Method::Get, "/hello", |_: &HttpRequest, mut resp: HttpResponse| {
//!             resp.body("hi");
//!             resp
//!         })
//!         .start_on(8080)
//! }
//! ```
//! Embedding with a shutdown handle:
//! ```no_run
//! use purr_http::{HttpRequest, HttpResponse, HttpServer, Method, StatusCode};
//! use std::thread;
//!
//! let listening = HttpServer::new()
//!     .hostname("127.0.0.1")
//!     .register(Method::Post, "/echo", |req: &HttpRequest, mut resp: HttpResponse| {
//!         match req.body().as_str() {
//!             Some(text) => resp.body(text),
//!             None => resp.status(StatusCode::NoContent),
//!         };
//!         resp
//!     })
//!     .bind()
//!     .unwrap();
//!
//! println!("listening on {}", listening.local_addr());
//! let shutdown = listening.shutdown_handle();
//! let server = thread::spawn(move || listening.run());
//!
//! // ...
//! shutdown.shutdown();
//! server.join().unwrap().unwrap();
//! ```

pub(crate) mod http {
    pub mod codec;
    pub(crate) mod header;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod executor;
    pub(crate) mod server_impl;
}
pub mod config;
pub(crate) mod errors;
pub(crate) mod router;

pub use crate::{
    errors::{Error, Result},
    http::{
        codec,
        header::{HttpCookie, HttpHeader, HttpHeaders, HttpSetCookie, HttpSetCookies},
        request::HttpRequest,
        response::HttpResponse,
        types::{
            HttpBody, Method, MethodRegistry, RequestLine, Status, StatusCode, StatusLine, Target,
            Version,
        },
    },
    router::{Handler, MethodNotAllowedHandler, NotFoundHandler, Outcome, RoutingTable},
    server::{
        executor::{Executor, Job, WorkerPool},
        server_impl::{HttpServer, Listening, ShutdownHandle},
    },
};
