#![allow(rustdoc::bare_urls)]

//! Core HTTP protocol types

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, RwLock},
};

// METHOD

/// HTTP request method.
///
/// The standard tokens have their own variants; any other token is kept as an
/// upper-cased [`Extension`](Method::Extension). Extension methods should be
/// obtained through a [`MethodRegistry`] so the same string always maps to the
/// same shared value.
///
/// # References
///
/// - [RFC 9110, Section 9](https://datatracker.ietf.org/doc/html/rfc9110#section-9)
/// - [RFC 5789](https://datatracker.ietf.org/doc/html/rfc5789) (PATCH method)
/// - [draft-ietf-httpbis-safe-method-w-body](https://datatracker.ietf.org/doc/draft-ietf-httpbis-safe-method-w-body/) (QUERY method)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Query,
    /// Any other token, upper-cased.
    Extension(Arc<str>),
}

impl Method {
    #[inline]
    fn standard(token: &[u8]) -> Option<Self> {
        match token {
            b"GET" => Some(Method::Get),
            b"POST" => Some(Method::Post),
            b"PUT" => Some(Method::Put),
            b"PATCH" => Some(Method::Patch),
            b"DELETE" => Some(Method::Delete),
            b"HEAD" => Some(Method::Head),
            b"OPTIONS" => Some(Method::Options),
            b"TRACE" => Some(Method::Trace),
            b"QUERY" => Some(Method::Query),
            _ => None,
        }
    }

    /// Returns the method token, e.g. `"GET"`.
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Query => "QUERY",
            Method::Extension(token) => &**token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interning table for request methods.
///
/// Owned by the server and shared with the decoder. Standard methods never
/// touch the table; unknown tokens are upper-cased and stored on first sight,
/// and every later lookup of the same token returns a clone of the same
/// [`Arc`].
///
/// # Examples
/// ```
/// use purr_http::{Method, MethodRegistry};
///
/// let registry = MethodRegistry::new();
///
/// assert_eq!(registry.intern("get"), Method::Get);
/// assert_eq!(registry.intern("purge").as_str(), "PURGE");
/// assert_eq!(registry.intern("PURGE"), registry.intern("Purge"));
/// ```
#[derive(Debug, Default)]
pub struct MethodRegistry {
    extensions: RwLock<HashSet<Arc<str>>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the method for `token`, case-insensitively.
    pub fn intern(&self, token: &str) -> Method {
        let upper = token.to_ascii_uppercase();

        if let Some(method) = Method::standard(upper.as_bytes()) {
            return method;
        }

        if let Some(known) = self.read_known(&upper) {
            return Method::Extension(known);
        }

        let mut extensions = self
            .extensions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another thread may have inserted it between the two locks.
        let known = match extensions.get(upper.as_str()) {
            Some(known) => known.clone(),
            None => {
                let token: Arc<str> = Arc::from(upper);
                extensions.insert(token.clone());
                token
            }
        };

        Method::Extension(known)
    }

    /// Number of extension tokens seen so far.
    pub fn len(&self) -> usize {
        self.extensions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn read_known(&self, upper: &str) -> Option<Arc<str>> {
        self.extensions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(upper)
            .cloned()
    }
}

// VERSION

/// HTTP protocol version as advertised on the request line.
///
/// The server answers every request on a fresh connection and closes it
/// afterwards, so the version only affects the status line of error replies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// HTTP/1.0 - [RFC 1945](https://tools.ietf.org/html/rfc1945)
    Http10,
    /// HTTP/1.1 - [RFC 9112](https://datatracker.ietf.org/doc/html/rfc9112)
    #[default]
    Http11,
    /// Anything else, kept verbatim.
    Other(Box<str>),
}

impl Version {
    #[inline]
    pub(crate) fn from_token(token: &str) -> Self {
        match token {
            "HTTP/1.1" => Version::Http11,
            "HTTP/1.0" => Version::Http10,
            other => Version::Other(other.into()),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
            Version::Other(token) => &**token,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// HTTP status codes
        ///
        /// Represents valid HTTP status codes as defined in
        /// [RFC 9110](https://datatracker.ietf.org/doc/html/rfc9110#section-15) and other standards.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            /// Numeric code, e.g. `404`.
            #[inline]
            pub const fn as_u16(&self) -> u16 {
                *self as u16
            }

            /// Canonical reason phrase, e.g. `"Not Found"`.
            #[inline]
            pub const fn reason_phrase(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }

            /// Looks up a registered code.
            #[inline]
            pub const fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $( $num => Some(StatusCode::$name), )+
                    _ => None,
                }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.2.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.2.1)]
    Continue = (100, "Continue");
    /// [[RFC9110, Section 15.2.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.2.2)]
    SwitchingProtocols = (101, "Switching Protocols");

    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.3.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.2)]
    Created = (201, "Created");
    /// [[RFC9110, Section 15.3.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.3)]
    Accepted = (202, "Accepted");
    /// [[RFC9110, Section 15.3.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.5)]
    NoContent = (204, "No Content");

    /// [[RFC9110, Section 15.4.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.2)]
    MovedPermanently = (301, "Moved Permanently");
    /// [[RFC9110, Section 15.4.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.3)]
    Found = (302, "Found");
    /// [[RFC9110, Section 15.4.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.4)]
    SeeOther = (303, "See Other");
    /// [[RFC9110, Section 15.4.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.5)]
    NotModified = (304, "Not Modified");
    /// [[RFC9110, Section 15.4.8](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.8)]
    TemporaryRedirect = (307, "Temporary Redirect");
    /// [[RFC9110, Section 15.4.9](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.9)]
    PermanentRedirect = (308, "Permanent Redirect");

    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.2)]
    Unauthorized = (401, "Unauthorized");
    /// [[RFC9110, Section 15.5.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.4)]
    Forbidden = (403, "Forbidden");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)]
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [[RFC9110, Section 15.5.9](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.9)]
    RequestTimeout = (408, "Request Timeout");
    /// [[RFC9110, Section 15.5.10](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.10)]
    Conflict = (409, "Conflict");
    /// [[RFC9110, Section 15.5.14](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.14)]
    PayloadTooLarge = (413, "Payload Too Large");
    /// [[RFC9110, Section 15.5.16](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.16)]
    UnsupportedMediaType = (415, "Unsupported Media Type");
    /// [[RFC9110, Section 15.5.21](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.21)]
    UnprocessableEntity = (422, "Unprocessable Entity");
    /// [[RFC6585, Section 4](https://datatracker.ietf.org/doc/html/rfc6585#section-4)]
    TooManyRequests = (429, "Too Many Requests");

    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
    /// [[RFC9110, Section 15.6.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.2)]
    NotImplemented = (501, "Not Implemented");
    /// [[RFC9110, Section 15.6.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.3)]
    BadGateway = (502, "Bad Gateway");
    /// [[RFC9110, Section 15.6.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.4)]
    ServiceUnavailable = (503, "Service Unavailable");
    /// [[RFC9110, Section 15.6.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.5)]
    GatewayTimeout = (504, "Gateway Timeout");
    /// [[RFC9110, Section 15.6.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.6)]
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

// STATUS LINE

/// Status of a response: a registered [`StatusCode`] or a bare numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Known(StatusCode),
    Unknown(u16),
}

impl Status {
    #[inline]
    pub fn from_u16(code: u16) -> Self {
        match StatusCode::from_u16(code) {
            Some(known) => Status::Known(known),
            None => Status::Unknown(code),
        }
    }

    #[inline]
    pub fn as_u16(&self) -> u16 {
        match self {
            Status::Known(code) => code.as_u16(),
            Status::Unknown(code) => *code,
        }
    }

    #[inline]
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            Status::Known(code) => code.reason_phrase(),
            Status::Unknown(_) => "Unknown",
        }
    }
}

impl From<StatusCode> for Status {
    fn from(code: StatusCode) -> Self {
        Status::Known(code)
    }
}

/// `HTTP/1.1 200 OK`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub(crate) version: Version,
    pub(crate) status: Status,
}

impl StatusLine {
    #[inline]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self {
            version: Version::Http11,
            status: Status::Known(StatusCode::Ok),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.version,
            self.status.as_u16(),
            self.status.reason_phrase()
        )
    }
}

// TARGET

/// Request target split into path and query.
///
/// # Components
///
/// - **Raw**: the token as received (e.g., `/api/users?sort=name`)
/// - **Path**: up to the first `?` (e.g., `/api/users`), used for routing
/// - **Query**: after the first `?`, without it (e.g., `sort=name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    raw: String,
    path_end: usize,
}

impl Target {
    pub fn new(raw: String) -> Self {
        let path_end = memchr::memchr(b'?', raw.as_bytes()).unwrap_or(raw.len());
        Self { raw, path_end }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.raw[..self.path_end]
    }

    #[inline]
    pub fn query(&self) -> Option<&str> {
        match self.path_end < self.raw.len() {
            true => Some(&self.raw[self.path_end + 1..]),
            false => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `GET /index.html HTTP/1.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: Method,
    target: Target,
    version: Version,
}

impl RequestLine {
    pub fn new(method: Method, target: Target, version: Version) -> Self {
        Self {
            method,
            target,
            version,
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn target(&self) -> &Target {
        &self.target
    }

    #[inline]
    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.target, self.version)
    }
}

// BODY

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpBody {
    /// The request had nothing after the blank line.
    Empty,
    /// The response deliberately carries no payload.
    #[default]
    NoContent,
    /// Text payload.
    Content(String),
}

impl HttpBody {
    /// Text of a `Content` body.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HttpBody::Content(text) => Some(text),
            HttpBody::Empty | HttpBody::NoContent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_standard() {
        let registry = MethodRegistry::new();

        #[rustfmt::skip]
        let cases = [
            ("GET",     Method::Get),
            ("get",     Method::Get),
            ("Post",    Method::Post),
            ("PUT",     Method::Put),
            ("patch",   Method::Patch),
            ("DELETE",  Method::Delete),
            ("HEAD",    Method::Head),
            ("options", Method::Options),
            ("TRACE",   Method::Trace),
            ("query",   Method::Query),
        ];

        for (token, expected) in cases {
            assert_eq!(registry.intern(token), expected);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn intern_extension() {
        let registry = MethodRegistry::new();

        let first = registry.intern("purge");
        let second = registry.intern("PURGE");
        let third = registry.intern("Purge");

        assert_eq!(first.as_str(), "PURGE");
        assert_eq!(first, second);
        match (&first, &third) {
            (Method::Extension(a), Method::Extension(b)) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("expected extensions, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);

        registry.intern("LINK");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn registries_are_isolated() {
        let a = MethodRegistry::new();
        let b = MethodRegistry::new();

        a.intern("PURGE");
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn target() {
        #[rustfmt::skip]
        let cases = [
            ("/",                 "/",          None),
            ("/api/users",        "/api/users", None),
            ("/api/users/",       "/api/users/", None),
            ("/api?sort=name",    "/api",       Some("sort=name")),
            ("/api?",             "/api",       Some("")),
            ("/api?a=1?b=2",      "/api",       Some("a=1?b=2")),
            ("*",                 "*",          None),
        ];

        for (raw, path, query) in cases {
            let target = Target::new(raw.to_string());
            assert_eq!(target.as_str(), raw);
            assert_eq!(target.path(), path);
            assert_eq!(target.query(), query);
        }
    }

    #[test]
    fn status_line() {
        assert_eq!(StatusLine::default().to_string(), "HTTP/1.1 200 OK");

        let line = StatusLine {
            version: Version::Http10,
            status: Status::from_u16(404),
        };
        assert_eq!(line.to_string(), "HTTP/1.0 404 Not Found");

        let line = StatusLine {
            version: Version::Http11,
            status: Status::from_u16(599),
        };
        assert_eq!(line.to_string(), "HTTP/1.1 599 Unknown");
    }

    #[test]
    fn status_codes() {
        assert_eq!(StatusCode::from_u16(405), Some(StatusCode::MethodNotAllowed));
        assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
        assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
        assert_eq!(StatusCode::from_u16(299), None);
    }

    #[test]
    fn version() {
        assert_eq!(Version::from_token("HTTP/1.1"), Version::Http11);
        assert_eq!(Version::from_token("HTTP/1.0"), Version::Http10);
        assert_eq!(Version::from_token("HTTP/2").as_str(), "HTTP/2");
    }
}
