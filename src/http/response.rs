//! Fluent HTTP response builder handed to every handler.

use crate::{
    errors::{Error, Result},
    http::{
        header::{HttpHeader, HttpHeaders, HttpSetCookie, HttpSetCookies},
        types::{HttpBody, Status, StatusCode, StatusLine, Version},
    },
};

/// HTTP response builder.
///
/// A fresh response (`HTTP/1.1 200 OK`, no headers, [`HttpBody::NoContent`])
/// is created for every request and passed to
/// [`Handler::handle`](crate::Handler::handle), which returns it after
/// chaining any of the builder methods.
///
/// Header and cookie setters never fail in the middle of a chain: the first
/// invalid name or value is remembered and reported by
/// [`encode_response`](crate::codec::encode_response), so such a response is
/// never written. Use [`try_header`](HttpResponse::try_header) or
/// [`try_cookie`](HttpResponse::try_cookie) to see the error right away.
///
/// `Content-Length` is derived when the response is encoded and should not be
/// set by hand.
///
/// # Examples
/// ```
/// use purr_http::{HttpResponse, StatusCode};
///
/// let mut resp = HttpResponse::new();
/// resp.status(StatusCode::Created)
///     .header("Content-Type", "application/json")
///     .cookie("session", "abc")
///     .body(r#"{"id": 1}"#);
///
/// assert_eq!(resp.status_line().status().as_u16(), 201);
/// assert!(resp.error().is_none());
/// ```
#[derive(Debug, Default)]
pub struct HttpResponse {
    status_line: StatusLine,
    headers: HttpHeaders,
    cookies: HttpSetCookies,
    body: HttpBody,
    next: bool,
    invalid: Option<Invalid>,
}

/// First rejected header or cookie input, kept until the response is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Invalid {
    Name(String),
    Value(&'static str),
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, result: Result<()>) -> &mut Self {
        let invalid = match result {
            Err(Error::IllegalHeaderName(name)) => Invalid::Name(name),
            Err(Error::IllegalHeaderValue(reason)) => Invalid::Value(reason),
            _ => return self,
        };
        self.invalid.get_or_insert(invalid);
        self
    }
}

// Status line
impl HttpResponse {
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status_line.status = Status::Known(status);
        self
    }

    /// Sets a numeric status; codes without a registered reason phrase render
    /// as `Unknown`.
    #[inline]
    pub fn status_code(&mut self, code: u16) -> &mut Self {
        self.status_line.status = Status::from_u16(code);
        self
    }

    #[inline]
    pub fn version(&mut self, version: Version) -> &mut Self {
        self.status_line.version = version;
        self
    }

    #[inline]
    pub fn status_line(&self) -> &StatusLine {
        &self.status_line
    }
}

// Headers
impl HttpResponse {
    /// Sets a single-valued header, replacing any header with the same name.
    ///
    /// # Examples
    /// ```
    /// use purr_http::HttpResponse;
    ///
    /// let mut resp = HttpResponse::new();
    /// resp.header("x-id", "1").header("X-Id", "2");
    ///
    /// assert_eq!(resp.headers().get("X-ID").and_then(|h| h.value()), Some("2"));
    ///
    /// resp.header("x-bad", "1\r\nSet-Cookie: admin=1");
    /// assert!(resp.error().is_some());
    /// ```
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let result = self.try_header(name, value).map(|_| ());
        self.record(result)
    }

    /// Same as [`header`](HttpResponse::header) but reports an invalid name
    /// or value immediately and leaves the response untouched.
    pub fn try_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        let header = HttpHeader::new(name, [value])?;
        self.headers.add(header);
        Ok(self)
    }

    /// Adds an already validated header, replacing one with the same name.
    #[inline]
    pub fn header_entry(&mut self, header: HttpHeader) -> &mut Self {
        self.headers.add(header);
        self
    }

    pub fn headers_from<I: IntoIterator<Item = HttpHeader>>(&mut self, headers: I) -> &mut Self {
        self.headers.add_all(headers);
        self
    }

    #[inline]
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HttpHeaders {
        &mut self.headers
    }
}

// Cookies
impl HttpResponse {
    /// Adds a `Set-Cookie`, replacing one with the same name.
    pub fn cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let result = self.try_cookie(name, value).map(|_| ());
        self.record(result)
    }

    pub fn try_cookie(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        let cookie = HttpSetCookie::new(name, value)?;
        self.cookies.add(cookie);
        Ok(self)
    }

    #[inline]
    pub fn cookie_entry(&mut self, cookie: HttpSetCookie) -> &mut Self {
        self.cookies.add(cookie);
        self
    }

    pub fn cookies_from<I: IntoIterator<Item = HttpSetCookie>>(&mut self, cookies: I) -> &mut Self {
        for cookie in cookies {
            self.cookies.add(cookie);
        }
        self
    }

    #[inline]
    pub fn cookies(&self) -> &HttpSetCookies {
        &self.cookies
    }

    #[inline]
    pub fn cookies_mut(&mut self) -> &mut HttpSetCookies {
        &mut self.cookies
    }
}

// Body and flags
impl HttpResponse {
    /// Sets a text body. `Content-Type: text/plain` is added at encode time
    /// unless a `Content-Type` header is present.
    #[inline]
    pub fn body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = HttpBody::Content(body.into());
        self
    }

    /// Drops any body; the response is sent with `Content-Length: 0`.
    #[inline]
    pub fn no_content(&mut self) -> &mut Self {
        self.body = HttpBody::NoContent;
        self
    }

    #[inline]
    pub fn body_ref(&self) -> &HttpBody {
        &self.body
    }

    /// Marks the response as passed on to a following handler.
    ///
    /// The flag is carried for handler chains built on top of the server;
    /// the server itself still writes the response.
    #[inline]
    pub fn next(&mut self) -> &mut Self {
        self.next = true;
        self
    }

    #[inline]
    pub fn is_next(&self) -> bool {
        self.next
    }

    /// First invalid header or cookie given to the fluent setters.
    pub fn error(&self) -> Option<Error> {
        match self.invalid.as_ref()? {
            Invalid::Name(name) => Some(Error::IllegalHeaderName(name.clone())),
            Invalid::Value(reason) => Some(Error::IllegalHeaderValue(reason)),
        }
    }
}
