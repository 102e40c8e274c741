//! Hand-written HTTP/1.1 wire codec.
//!
//! Decoding works on the complete request text (the connection buffers until
//! [`request_complete`] says so); encoding renders a [`HttpResponse`] into the
//! bytes written to the socket.

use crate::{
    errors::{Error, Result},
    http::{
        header::{HttpCookie, HttpHeader, HttpHeaders},
        request::HttpRequest,
        response::HttpResponse,
        types::{HttpBody, MethodRegistry, RequestLine, Target, Version},
    },
};
use memchr::memmem;
use std::fmt::Write;

const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_LENGTH: &str = "Content-Length";
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

// DECODING

/// Parses the first line: `METHOD target version`.
///
/// Extra tokens after the version are ignored.
pub fn parse_request_line(text: &str, registry: &MethodRegistry) -> Result<RequestLine> {
    let line = text.lines().next().unwrap_or_default();
    let mut tokens = line.split_whitespace();

    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(method), Some(target), Some(version)) => Ok(RequestLine::new(
            registry.intern(method),
            Target::new(target.to_string()),
            Version::from_token(version),
        )),
        _ => Err(Error::MalformedStartLine(line.to_string())),
    }
}

/// Parses the header lines between the start line and the first blank line.
///
/// Each line is split on its first `:`; the value part is split on `;` and
/// every piece is trimmed, empty pieces are dropped. Lines repeating a name
/// add their values to the earlier header.
pub fn parse_headers(text: &str) -> Result<HttpHeaders> {
    let mut headers = HttpHeaders::new();

    for line in text.lines().skip(1).take_while(|line| !line.trim().is_empty()) {
        let colon = memchr::memchr(b':', line.as_bytes())
            .ok_or_else(|| Error::MalformedHeader(line.to_string()))?;

        let name = line[..colon].trim();
        let values = line[colon + 1..]
            .split(';')
            .map(str::trim)
            .filter(|value| !value.is_empty());

        headers.merge(HttpHeader::new(name, values)?);
    }

    Ok(headers)
}

/// Reads `name=value` pairs from the `Cookie` header.
///
/// A segment without `=` becomes a cookie with an empty value.
pub fn parse_cookies(headers: &HttpHeaders) -> Vec<HttpCookie> {
    let Some(header) = headers.get("Cookie") else {
        return Vec::new();
    };

    header
        .values()
        .iter()
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match memchr::memchr(b'=', segment.as_bytes()) {
            Some(eq) => HttpCookie::new(segment[..eq].trim(), segment[eq + 1..].trim()),
            None => HttpCookie::new(segment, ""),
        })
        .collect()
}

/// Every line after the first blank line, joined with `\n`.
pub fn parse_body(text: &str) -> HttpBody {
    let mut lines = text.lines().skip(1).skip_while(|line| !line.trim().is_empty());
    // The blank separator itself.
    lines.next();

    let body: Vec<&str> = lines.collect();
    match body.is_empty() {
        true => HttpBody::Empty,
        false => HttpBody::Content(body.join("\n")),
    }
}

/// Decodes a complete request.
///
/// # Errors
/// - [`Error::InvalidEncoding`] if the bytes are not UTF-8
/// - [`Error::MalformedStartLine`], [`Error::MalformedHeader`]
/// - [`Error::IllegalHeaderValue`], [`Error::IllegalHeaderName`]
pub fn decode(bytes: &[u8], registry: &MethodRegistry) -> Result<HttpRequest> {
    let text = simdutf8::basic::from_utf8(bytes).map_err(|_| Error::InvalidEncoding)?;

    let request_line = parse_request_line(text, registry)?;
    let headers = parse_headers(text)?;
    let cookies = parse_cookies(&headers);
    let body = parse_body(text);

    Ok(HttpRequest::new(request_line, headers, cookies, body))
}

/// End offset of the header section: just past `\r\n\r\n` or `\n\n`,
/// whichever comes first.
fn header_end(buffer: &[u8]) -> Option<usize> {
    let crlf = memmem::find(buffer, b"\r\n\r\n").map(|pos| pos + 4);
    let lf = memmem::find(buffer, b"\n\n").map(|pos| pos + 2);

    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// `Content-Length` from the raw header section, if present and numeric.
fn content_length(head: &[u8]) -> Option<usize> {
    head.split(|&b| b == b'\n').skip(1).find_map(|line| {
        let colon = memchr::memchr(b':', line)?;
        let name = line[..colon].trim_ascii();
        if !name.eq_ignore_ascii_case(CONTENT_LENGTH.as_bytes()) {
            return None;
        }
        std::str::from_utf8(line[colon + 1..].trim_ascii())
            .ok()?
            .parse()
            .ok()
    })
}

/// `true` once the header section has arrived and, when it declares a
/// `Content-Length`, that many body bytes followed it.
pub(crate) fn request_complete(buffer: &[u8]) -> bool {
    let Some(end) = header_end(buffer) else {
        return false;
    };

    match content_length(&buffer[..end]) {
        Some(length) => buffer.len() - end >= length,
        None => true,
    }
}

/// Version of a request that may not decode, for choosing the status line of
/// an error reply. Falls back to HTTP/1.1.
pub(crate) fn guess_version(buffer: &[u8]) -> Version {
    let line_end = memchr::memchr(b'\n', buffer).unwrap_or(buffer.len());

    std::str::from_utf8(&buffer[..line_end])
        .ok()
        .and_then(|line| line.split_whitespace().nth(2))
        .map(Version::from_token)
        .unwrap_or_default()
}

// ENCODING

/// Renders `response` as wire bytes.
///
/// Headers come out ordered by lower-cased name, then `Set-Cookie` lines in
/// insertion order. A `Content` body gets `Content-Type: text/plain` unless one
/// is set, `Content-Length` equal to its UTF-8 length plus one, and a trailing
/// `\n`. Other bodies get `Content-Length: 0` and no body section. The
/// response itself is left unchanged.
///
/// # Errors
/// The first invalid header or cookie recorded by the builder
/// ([`Error::IllegalHeaderValue`] / [`Error::IllegalHeaderName`]).
pub fn encode_response(response: &HttpResponse) -> Result<Vec<u8>> {
    if let Some(err) = response.error() {
        return Err(err);
    }

    let mut headers = response.headers().clone();
    let body = match response.body_ref() {
        HttpBody::Content(text) => {
            if !headers.contains(CONTENT_TYPE) {
                headers.add(HttpHeader::new(CONTENT_TYPE, [DEFAULT_CONTENT_TYPE])?);
            }
            headers.add(HttpHeader::new(CONTENT_LENGTH, [(text.len() + 1).to_string()])?);
            Some(text.as_str())
        }
        HttpBody::NoContent | HttpBody::Empty => {
            headers.add(HttpHeader::new(CONTENT_LENGTH, ["0"])?);
            None
        }
    };

    let mut out = String::with_capacity(128 + body.map_or(0, str::len));

    // Writing into a `String` cannot fail.
    let _ = write!(out, "{}\r\n", response.status_line());
    for header in headers.sorted() {
        let _ = write!(out, "{header}\r\n");
    }
    for cookie in response.cookies().iter() {
        let _ = write!(out, "{cookie}\r\n");
    }
    out.push_str("\r\n");

    if let Some(text) = body {
        out.push_str(text);
        out.push('\n');
    }

    Ok(out.into_bytes())
}
