use crate::http::{
    header::{HttpCookie, HttpHeader, HttpHeaders},
    types::{HttpBody, Method, RequestLine, Target, Version},
};
use std::fmt;

/// Decoded HTTP request.
///
/// Built once per connection by the decoder and handed to the handler by
/// reference; it never changes afterwards.
///
/// # Wire format
///
/// ```text
/// METHOD SP target SP version CRLF
/// Name: v1;v2 CRLF
/// ...
/// CRLF
/// body lines
/// ```
///
/// - The start line needs at least three whitespace-separated tokens.
/// - Header values are split on `;` and trimmed; repeated names are merged.
/// - Header values with bare CR or LF are rejected.
/// - The body is every line after the first blank line, joined with `\n`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    request_line: RequestLine,
    headers: HttpHeaders,
    cookies: Vec<HttpCookie>,
    body: HttpBody,
}

impl HttpRequest {
    /// Assembles a request from separately parsed parts without further checks.
    pub fn new(
        request_line: RequestLine,
        headers: HttpHeaders,
        cookies: Vec<HttpCookie>,
        body: HttpBody,
    ) -> Self {
        Self {
            request_line,
            headers,
            cookies,
            body,
        }
    }
}

// Public API
impl HttpRequest {
    #[inline]
    pub fn request_line(&self) -> &RequestLine {
        &self.request_line
    }

    #[inline]
    pub fn method(&self) -> &Method {
        self.request_line.method()
    }

    #[inline]
    pub fn target(&self) -> &Target {
        self.request_line.target()
    }

    /// Path without the query string; this is what routing compares.
    #[inline]
    pub fn path(&self) -> &str {
        self.request_line.target().path()
    }

    #[inline]
    pub fn version(&self) -> &Version {
        self.request_line.version()
    }

    #[inline]
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    /// Case-insensitive header lookup.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&HttpHeader> {
        self.headers.get(name)
    }

    #[inline]
    pub fn cookies(&self) -> &[HttpCookie] {
        &self.cookies
    }

    /// First cookie whose name matches `name`, ignoring ASCII case.
    pub fn cookie(&self, name: &str) -> Option<&HttpCookie> {
        self.cookies
            .iter()
            .find(|cookie| cookie.name().eq_ignore_ascii_case(name))
    }

    #[inline]
    pub fn body(&self) -> &HttpBody {
        &self.body
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.request_line)?;
        for header in self.headers.sorted() {
            writeln!(f, "{header}")?;
        }
        writeln!(f)?;
        if let HttpBody::Content(text) = &self.body {
            writeln!(f, "{text}")?;
        }
        Ok(())
    }
}
