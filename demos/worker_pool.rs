use purr_http::{
    config::ServerConfig, HttpRequest, HttpResponse, HttpServer, Method, StatusCode, WorkerPool,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn inspect(req: &HttpRequest, mut resp: HttpResponse) -> HttpResponse {
    let headers = req
        .headers()
        .iter()
        .map(|header| header.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    resp.header("X-Method", req.method().as_str())
        .body(format!("{}\n{headers}", req.request_line()));
    resp
}

fn echo(req: &HttpRequest, mut resp: HttpResponse) -> HttpResponse {
    match req.body().as_str() {
        Some(text) => resp.body(text),
        None => resp.status(StatusCode::NoContent),
    };
    resp
}

fn main() -> purr_http::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let workers = std::thread::available_parallelism().map_or(4, usize::from);

    HttpServer::new()
        .config(ServerConfig {
            name: "purr-demo".into(),
            hostname: "127.0.0.1".into(),
            poll_interval: Duration::from_millis(250),
            reject_malformed: true,
            ..ServerConfig::default()
        })
        .executor(WorkerPool::new(workers))
        .register(Method::Get, "/inspect", inspect)
        .register(Method::Post, "/inspect", inspect)
        .register(Method::Post, "/echo", echo)
        .start_with(|| tracing::info!(workers, "starting worker pool demo"))
}
