//! Exact-path routing table and the handler contract.

use crate::http::{
    request::HttpRequest,
    response::HttpResponse,
    types::{Method, StatusCode},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// A trait for turning a request into a response.
///
/// The handler receives a fresh [`HttpResponse`] by value and returns it,
/// usually after chaining builder calls. Handlers run on the event loop
/// thread or, with an [`Executor`](crate::Executor) configured, on a worker,
/// so they must be `Send + Sync`.
///
/// Closures with the matching signature implement the trait.
///
/// # Examples
///
/// ```
/// use purr_http::{Handler, HttpRequest, HttpResponse, StatusCode};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn handle(&self, req: &HttpRequest, mut resp: HttpResponse) -> HttpResponse {
///         match req.body().as_str() {
///             Some(text) => resp.body(text),
///             None => resp.status(StatusCode::NoContent),
///         };
///         resp
///     }
/// }
///
/// let hello = |_: &HttpRequest, mut resp: HttpResponse| {
///     resp.body("hi");
///     resp
/// };
/// # fn assert_handler<H: Handler>(_: H) {}
/// # assert_handler(Echo);
/// # assert_handler(hello);
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &HttpRequest, response: HttpResponse) -> HttpResponse;
}

impl<F> Handler for F
where
    F: Fn(&HttpRequest, HttpResponse) -> HttpResponse + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, request: &HttpRequest, response: HttpResponse) -> HttpResponse {
        self(request, response)
    }
}

/// Answers `404 Not Found` with the reason phrase as a plain-text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundHandler;

impl Handler for NotFoundHandler {
    fn handle(&self, _: &HttpRequest, response: HttpResponse) -> HttpResponse {
        reason_reply(StatusCode::NotFound, response)
    }
}

/// Answers `405 Method Not Allowed` with the reason phrase as a plain-text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodNotAllowedHandler;

impl Handler for MethodNotAllowedHandler {
    fn handle(&self, _: &HttpRequest, response: HttpResponse) -> HttpResponse {
        reason_reply(StatusCode::MethodNotAllowed, response)
    }
}

fn reason_reply(status: StatusCode, mut response: HttpResponse) -> HttpResponse {
    response
        .status(status)
        .header("Content-Type", "text/plain")
        .body(status.reason_phrase());
    response
}

/// Result of [`RoutingTable::resolve`].
pub enum Outcome<'a> {
    Matched(&'a Arc<dyn Handler>),
    /// The path is registered, but not for this method.
    MethodNotAllowed,
    NotFound,
}

struct Route {
    handler: Arc<dyn Handler>,
    methods: HashSet<Method>,
}

/// Maps exact paths to a handler and the methods it accepts.
///
/// Paths are compared byte for byte: `/a` and `/a/` are different routes and
/// no wildcards or parameters exist. The query string is not part of the
/// path.
///
/// Registering a path again keeps the first handler and adds the new method
/// to the accepted set.
pub struct RoutingTable {
    ids: HashMap<String, usize>,
    routes: Vec<Route>,
    not_found: Arc<dyn Handler>,
    method_not_allowed: Arc<dyn Handler>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            ids: HashMap::new(),
            routes: Vec::new(),
            not_found: Arc::new(NotFoundHandler),
            method_not_allowed: Arc::new(MethodNotAllowedHandler),
        }
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, path: impl Into<String>, handler: impl Handler) {
        let path = path.into();

        match self.ids.get(&path) {
            Some(&id) => {
                self.routes[id].methods.insert(method);
            }
            None => {
                self.ids.insert(path, self.routes.len());
                self.routes.push(Route {
                    handler: Arc::new(handler),
                    methods: HashSet::from([method]),
                });
            }
        }
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Outcome<'_> {
        let Some(&id) = self.ids.get(path) else {
            return Outcome::NotFound;
        };

        let route = &self.routes[id];
        match route.methods.contains(method) {
            true => Outcome::Matched(&route.handler),
            false => Outcome::MethodNotAllowed,
        }
    }

    /// Handler for `request`, falling back to the 404 / 405 handlers.
    pub fn handler_for(&self, request: &HttpRequest) -> &Arc<dyn Handler> {
        match self.resolve(request.method(), request.path()) {
            Outcome::Matched(handler) => handler,
            Outcome::MethodNotAllowed => &self.method_not_allowed,
            Outcome::NotFound => &self.not_found,
        }
    }

    pub fn set_not_found(&mut self, handler: impl Handler) {
        self.not_found = Arc::new(handler);
    }

    pub fn set_method_not_allowed(&mut self, handler: impl Handler) {
        self.method_not_allowed = Arc::new(handler);
    }

    /// Number of distinct paths.
    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
