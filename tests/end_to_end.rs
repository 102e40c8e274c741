use purr_http::{
    config::ServerConfig, Error, Executor, HttpRequest, HttpResponse, HttpServer, Method,
    ShutdownHandle, StatusCode, WorkerPool,
};
use std::{
    io::{Read, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

const PATHS: usize = 32;

fn config() -> ServerConfig {
    ServerConfig {
        hostname: "127.0.0.1".into(),
        port: 0,
        poll_interval: Duration::from_millis(20),
        ..ServerConfig::default()
    }
}

fn hello(_: &HttpRequest, mut resp: HttpResponse) -> HttpResponse {
    resp.body("hi");
    resp
}

fn echo_path(req: &HttpRequest, mut resp: HttpResponse) -> HttpResponse {
    resp.header("X-Path", req.path()).body(req.path());
    resp
}

fn with_routes(server: HttpServer) -> HttpServer {
    let mut server = server
        .register(Method::Get, "/hello", hello)
        .register(Method::Post, "/hello", hello)
        .register(Method::Post, "/echo", |req: &HttpRequest, mut resp: HttpResponse| {
            match req.body().as_str() {
                Some(text) => resp.body(text),
                None => resp.status(StatusCode::NoContent),
            };
            resp
        })
        .register(Method::Get, "/cookies", |req: &HttpRequest, mut resp: HttpResponse| {
            let id = req.cookie("session").map(|c| c.value().to_string()).unwrap_or_default();
            resp.cookie("seen", id).status(StatusCode::NoContent);
            resp
        })
        .register(Method::Get, "/panic", |_: &HttpRequest, _: HttpResponse| -> HttpResponse {
            panic!("handler failure")
        })
        .register(Method::Get, "/broken", |_: &HttpRequest, mut resp: HttpResponse| {
            resp.header("Location", "/\r\nSet-Cookie: admin=1").body("x");
            resp
        });

    for i in 0..PATHS {
        server = server.register(Method::Get, format!("/p/{i}"), echo_path);
    }

    let purge = server.method("purge");
    server.register(purge, "/cache", hello)
}

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<purr_http::Result<()>>>,
}

impl Running {
    fn start(server: HttpServer) -> Self {
        let listening = server.bind().unwrap();
        let addr = listening.local_addr();
        let shutdown = listening.shutdown_handle();
        let thread = thread::spawn(move || listening.run());

        Self {
            addr,
            shutdown,
            thread: Some(thread),
        }
    }

    fn inline() -> Self {
        Self::start(with_routes(HttpServer::new().config(config())))
    }

    fn with_executor(executor: impl Executor) -> Self {
        Self::start(with_routes(HttpServer::new().config(config()).executor(executor)))
    }

    fn send(&self, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream.write_all(raw).unwrap();

        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    fn get(&self, path: &str) -> String {
        self.send(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
    }

    fn stop(mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap().unwrap();
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

fn concurrent_paths(server: &Running) {
    thread::scope(|scope| {
        let handles: Vec<_> = (0..PATHS)
            .map(|i| scope.spawn(move || (i, server.get(&format!("/p/{i}")))))
            .collect();

        for handle in handles {
            let (i, out) = handle.join().unwrap();
            let path = format!("/p/{i}");
            assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out:?}");
            assert!(out.contains(&format!("X-Path: {path}\r\n")), "{out:?}");
            assert!(out.ends_with(&format!("\r\n\r\n{path}\n")), "{out:?}");
        }
    });
}

#[test]
fn get_hello() {
    let server = Running::inline();
    let out = server.get("/hello");

    assert!(out.starts_with("HTTP/1.1 200 OK"), "{out:?}");
    assert!(out.contains("Content-Length: 3"), "{out:?}");
    assert!(out.contains("Content-Type: text/plain"), "{out:?}");
    assert!(out.ends_with("hi\n"), "{out:?}");

    server.stop();
}

#[test]
fn query_string_is_ignored_for_routing() {
    let server = Running::inline();
    assert!(server.get("/hello?name=x").ends_with("hi\n"));
    server.stop();
}

#[test]
fn not_found_and_method_not_allowed() {
    let server = Running::inline();

    let out = server.get("/missing");
    assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"), "{out:?}");
    assert!(out.ends_with("\r\n\r\nNot Found\n"), "{out:?}");

    let out = server.send(b"DELETE /hello HTTP/1.1\r\n\r\n");
    assert!(out.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "{out:?}");
    assert!(out.ends_with("Method Not Allowed\n"), "{out:?}");

    let out = server.get("/hello/");
    assert!(out.starts_with("HTTP/1.1 404"), "{out:?}");

    server.stop();
}

#[test]
fn extension_method() {
    let server = Running::inline();

    let out = server.send(b"PURGE /cache HTTP/1.1\r\n\r\n");
    assert!(out.starts_with("HTTP/1.1 200 OK"), "{out:?}");

    let out = server.get("/cache");
    assert!(out.starts_with("HTTP/1.1 405"), "{out:?}");

    server.stop();
}

#[test]
fn post_body_with_content_length() {
    let server = Running::inline();

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 9\r\n\r\nping")
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(b"\npong").unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();

    assert!(out.contains("Content-Length: 10\r\n"), "{out:?}");
    assert!(out.ends_with("\r\n\r\nping\npong\n"), "{out:?}");

    server.stop();
}

#[test]
fn cookies_round_trip() {
    let server = Running::inline();

    let out = server.send(b"GET /cookies HTTP/1.1\r\nCookie: Session=abc; other=1\r\n\r\n");
    assert!(out.starts_with("HTTP/1.1 204 No Content\r\n"), "{out:?}");
    assert!(out.contains("Content-Length: 0\r\n"), "{out:?}");
    assert!(out.contains("Set-Cookie: seen=abc\r\n"), "{out:?}");
    assert!(out.ends_with("\r\n\r\n"), "{out:?}");

    server.stop();
}

#[test]
fn injected_response_is_not_sent() {
    let server = Running::inline();
    assert_eq!(server.get("/broken"), "");
    server.stop();
}

fn survives_panicking_handler(server: Running) {
    assert!(server.get("/hello").ends_with("hi\n"));

    for _ in 0..2 {
        assert_eq!(server.get("/panic"), "");
    }

    let out = server.get("/hello");
    assert!(out.ends_with("hi\n"), "{out:?}");

    server.stop();
}

#[test]
fn panicking_handler_inline() {
    survives_panicking_handler(Running::inline());
}

#[test]
fn panicking_handler_worker_pool() {
    survives_panicking_handler(Running::with_executor(WorkerPool::new(2)));
}

#[test]
fn malformed_request_is_dropped() {
    let server = Running::inline();
    assert_eq!(server.send(b"GARBAGE\r\n\r\n"), "");

    // The loop keeps serving.
    assert!(server.get("/hello").ends_with("hi\n"));
    server.stop();
}

#[test]
fn malformed_request_is_rejected_when_configured() {
    let server = Running::start(with_routes(HttpServer::new().config(ServerConfig {
        reject_malformed: true,
        ..config()
    })));

    assert_eq!(
        server.send(b"GARBAGE\r\n\r\n"),
        "HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
    );
    assert_eq!(
        server.send(b"GET /hello HTTP/1.0\r\nHost\r\n\r\n"),
        "HTTP/1.0 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
    );

    server.stop();
}

#[test]
fn request_ended_by_eof() {
    let server = Running::inline();

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(b"GET /hello HTTP/1.1\r\nHost: x").unwrap();
    stream.shutdown(Shutdown::Write).unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    assert!(out.ends_with("hi\n"), "{out:?}");

    server.stop();
}

#[test]
fn idle_connection_does_not_block_others() {
    let server = Running::inline();

    let _idle = TcpStream::connect(server.addr).unwrap();
    assert!(server.get("/hello").ends_with("hi\n"));

    server.stop();
}

#[test]
fn concurrent_inline() {
    let server = Running::inline();
    concurrent_paths(&server);
    server.stop();
}

#[test]
fn concurrent_worker_pool() {
    let server = Running::with_executor(WorkerPool::new(4));
    concurrent_paths(&server);

    let out = server.get("/missing");
    assert!(out.starts_with("HTTP/1.1 404"), "{out:?}");

    server.stop();
}

#[test]
fn concurrent_tokio_blocking_pool() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .build()
        .unwrap();

    let server = Running::with_executor(runtime.handle().clone());
    concurrent_paths(&server);
    server.stop();
}

#[test]
fn shutdown_stops_the_loop() {
    let server = Running::inline();
    let addr = server.addr;
    let handle = server.shutdown.clone();
    assert!(handle.is_running());

    server.stop();
    assert!(!handle.is_running());

    // The listener is closed with the loop.
    thread::sleep(Duration::from_millis(50));
    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn start_on_rejects_out_of_range_port() {
    let result = HttpServer::new().config(config()).start_on(70_000);
    assert!(matches!(result, Err(Error::BindFailure { .. })));
}

#[test]
fn start_with_runs_callback_before_bind() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut called = false;
    let result = HttpServer::new()
        .config(config())
        .start_on_with(i32::from(port), || called = true);

    assert!(called);
    assert!(matches!(result, Err(Error::BindFailure { .. })));
}
