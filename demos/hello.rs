use purr_http::{HttpRequest, HttpResponse, HttpServer, Method, StatusCode};
use tracing_subscriber::EnvFilter;

fn hello(_: &HttpRequest, mut resp: HttpResponse) -> HttpResponse {
    resp.status(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .body("Hello, world!");
    resp
}

fn main() -> purr_http::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    HttpServer::new()
        .hostname("127.0.0.1")
        .register(Method::Get, "/", hello)
        .register(Method::Get, "/hello", hello)
        .start_on(8080)
}
