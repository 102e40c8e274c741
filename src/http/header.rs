//! Header and cookie collections with CR/LF injection checks.

use crate::errors::{Error, Result};
use std::{collections::HashMap, fmt};

/// Rejects CR/LF sequences that would let a value escape its header line.
///
/// A CR is accepted only as part of a folded continuation (`\r\n` followed by
/// a space or tab); a bare LF is always rejected.
pub(crate) fn check_value(value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\r' => match bytes.get(i + 1..i + 3) {
                Some([b'\n', b' ' | b'\t']) => i += 2,
                Some([b'\n', _]) => {
                    return Err(Error::IllegalHeaderValue(
                        "No whitespace found after CRLF in header",
                    ))
                }
                Some(_) => {
                    return Err(Error::IllegalHeaderValue(
                        "Illegal character found after CR in header",
                    ))
                }
                None => return Err(Error::IllegalHeaderValue("Illegal CR found in header")),
            },
            b'\n' => return Err(Error::IllegalHeaderValue("Illegal LF found in header")),
            _ => {}
        }
        i += 1;
    }

    Ok(())
}

#[inline]
pub(crate) fn check_name(name: &str) -> Result<()> {
    match memchr::memchr2(b'\r', b'\n', name.as_bytes()) {
        Some(_) => Err(Error::IllegalHeaderName(name.to_string())),
        None => Ok(()),
    }
}

// HEADER

/// One header name with its set of values.
///
/// Values keep the order in which they were first seen and are never
/// duplicated. On the wire they are joined with `;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    name: String,
    values: Vec<String>,
}

impl HttpHeader {
    /// Builds a header, validating the name and every value.
    pub fn new<N, I, V>(name: N, values: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        check_name(&name)?;

        let mut header = Self {
            name,
            values: Vec::new(),
        };
        for value in values {
            let value = value.into();
            check_value(&value)?;
            header.push_value(value);
        }

        Ok(header)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// First value, if any.
    #[inline]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    #[inline]
    pub fn contains_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    #[inline]
    fn push_value(&mut self, value: String) {
        if !self.contains_value(&value) {
            self.values.push(value);
        }
    }
}

impl fmt::Display for HttpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.values.join(";"))
    }
}

// HEADER MAP

/// Headers keyed by lower-cased name.
///
/// Lookups are case-insensitive; the spelling used when a header was first
/// added is the one rendered on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpHeaders {
    headers: HashMap<String, HttpHeader>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&Self::key(name))
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&HttpHeader> {
        self.headers.get(&Self::key(name))
    }

    /// Returns the header, or one named `name` carrying `default` values.
    pub fn get_or_default<I, V>(&self, name: &str, default: I) -> Result<HttpHeader>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        match self.get(name) {
            Some(header) => Ok(header.clone()),
            None => HttpHeader::new(name, default),
        }
    }

    /// Inserts `header`, replacing any header with the same name.
    pub fn add(&mut self, header: HttpHeader) -> &mut Self {
        self.headers.insert(Self::key(&header.name), header);
        self
    }

    /// Inserts `header`, adding its values to a header of the same name if
    /// there is one.
    pub fn merge(&mut self, header: HttpHeader) -> &mut Self {
        match self.headers.get_mut(&Self::key(&header.name)) {
            Some(existing) => {
                for value in header.values {
                    existing.push_value(value);
                }
            }
            None => {
                self.add(header);
            }
        }
        self
    }

    pub fn add_all<I: IntoIterator<Item = HttpHeader>>(&mut self, headers: I) -> &mut Self {
        for header in headers {
            self.add(header);
        }
        self
    }

    /// Replaces the values of an existing header; does nothing when absent.
    pub fn replace<I, V>(&mut self, name: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        if let Some(existing) = self.headers.get_mut(&Self::key(name)) {
            *existing = HttpHeader::new(existing.name.clone(), values)?;
        }
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Option<HttpHeader> {
        self.headers.remove(&Self::key(name))
    }

    pub fn clear(&mut self) -> &mut Self {
        self.headers.clear();
        self
    }

    /// Headers in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &HttpHeader> {
        self.headers.values()
    }

    /// Headers ordered by lower-cased name.
    pub(crate) fn sorted(&self) -> Vec<&HttpHeader> {
        let mut keys: Vec<&String> = self.headers.keys().collect();
        keys.sort_unstable();
        keys.into_iter().map(|key| &self.headers[key]).collect()
    }
}

// COOKIES

/// Request-side cookie from the `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpCookie {
    name: String,
    value: String,
}

impl HttpCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for HttpCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Response-side cookie rendered as a `Set-Cookie` line.
///
/// Attributes (`Path`, `Expires`, ...) are not rendered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSetCookie {
    name: String,
    value: String,
}

impl HttpSetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let (name, value) = (name.into(), value.into());
        check_name(&name)?;
        check_value(&value)?;

        Ok(Self { name, value })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for HttpSetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Set-Cookie: {}={}", self.name, self.value)
    }
}

/// Set-cookies of a response, keyed by exact name, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpSetCookies {
    cookies: Vec<HttpSetCookie>,
}

impl HttpSetCookies {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&HttpSetCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Inserts `cookie`, replacing one with the same name in place.
    pub fn add(&mut self, cookie: HttpSetCookie) -> &mut Self {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
        self
    }

    /// Changes the value of an existing cookie; does nothing when absent.
    pub fn replace(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        let value = value.into();
        check_value(&value)?;

        if let Some(existing) = self.cookies.iter_mut().find(|c| c.name == name) {
            existing.value = value;
        }
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Option<HttpSetCookie> {
        let index = self.cookies.iter().position(|c| c.name == name)?;
        Some(self.cookies.remove(index))
    }

    pub fn clear(&mut self) -> &mut Self {
        self.cookies.clear();
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &HttpSetCookie> {
        self.cookies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value_cases() {
        #[rustfmt::skip]
        let cases = [
            ("text/plain",       true),
            ("",                 true),
            ("a\r\n b",          true),
            ("a\r\n\tb",         true),
            ("a\r\n \r\n\tb",    true),

            ("a\nb",             false),
            ("a\n",              false),
            ("a\rb",             false),
            ("a\r",              false),
            ("a\r\n",            false),
            ("a\r\nb",           false),
            ("a\r\n\r\n b",      false),
            ("\r\nSet-Cookie: x=1", false),
        ];

        for (value, ok) in cases {
            let result = check_value(value);
            assert_eq!(result.is_ok(), ok, "{value:?}");
            if !ok {
                assert!(matches!(result, Err(Error::IllegalHeaderValue(_))));
            }
        }
    }

    #[test]
    fn name_with_crlf() {
        assert!(matches!(
            HttpHeader::new("X-Bad\r\nInjected", ["1"]),
            Err(Error::IllegalHeaderName(_))
        ));
        assert!(matches!(
            HttpSetCookie::new("id\n", "1"),
            Err(Error::IllegalHeaderName(_))
        ));
    }

    #[test]
    fn case_insensitive_lookup() {
        let mut headers = HttpHeaders::new();
        headers.add(HttpHeader::new("Content-Type", ["text/html"]).unwrap());

        for name in ["Content-Type", "content-type", "CONTENT-TYPE", "cOnTeNt-TyPe"] {
            assert!(headers.contains(name));
            let header = headers.get(name).unwrap();
            assert_eq!(header.name(), "Content-Type");
            assert_eq!(header.value(), Some("text/html"));
        }
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn add_replaces_merge_unions() {
        let mut headers = HttpHeaders::new();
        headers.add(HttpHeader::new("Accept", ["a", "b"]).unwrap());
        headers.merge(HttpHeader::new("accept", ["b", "c"]).unwrap());

        let header = headers.get("ACCEPT").unwrap();
        assert_eq!(header.values(), ["a", "b", "c"]);
        assert_eq!(header.to_string(), "Accept: a;b;c");

        headers.add(HttpHeader::new("accept", ["z"]).unwrap());
        let header = headers.get("Accept").unwrap();
        assert_eq!(header.values(), ["z"]);
        assert_eq!(header.name(), "accept");
    }

    #[test]
    fn replace_remove_clear() {
        let mut headers = HttpHeaders::new();
        headers.add(HttpHeader::new("X-Id", ["1"]).unwrap());

        headers.replace("x-id", ["2"]).unwrap();
        assert_eq!(headers.get("X-Id").unwrap().values(), ["2"]);

        headers.replace("x-missing", ["2"]).unwrap();
        assert!(!headers.contains("x-missing"));

        assert!(matches!(
            headers.replace("x-id", ["\n"]),
            Err(Error::IllegalHeaderValue(_))
        ));

        assert_eq!(headers.remove("X-ID").map(|h| h.name().to_string()), Some("X-Id".into()));
        assert!(headers.is_empty());

        headers.add(HttpHeader::new("A", ["1"]).unwrap());
        headers.clear();
        assert!(headers.is_empty());
    }

    #[test]
    fn get_or_default() {
        let headers = HttpHeaders::new();
        let header = headers.get_or_default("Accept", ["*/*"]).unwrap();
        assert_eq!(header.to_string(), "Accept: */*");
    }

    #[test]
    fn sorted() {
        let mut headers = HttpHeaders::new();
        for name in ["X-B", "content-type", "A"] {
            headers.add(HttpHeader::new(name, ["1"]).unwrap());
        }

        let names: Vec<&str> = headers.sorted().into_iter().map(|h| h.name()).collect();
        assert_eq!(names, ["A", "content-type", "X-B"]);
    }

    #[test]
    fn set_cookies() {
        let mut cookies = HttpSetCookies::new();
        cookies.add(HttpSetCookie::new("id", "1").unwrap());
        cookies.add(HttpSetCookie::new("theme", "dark").unwrap());
        cookies.add(HttpSetCookie::new("id", "2").unwrap());

        let rendered: Vec<String> = cookies.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["Set-Cookie: id=2", "Set-Cookie: theme=dark"]);

        cookies.replace("theme", "light").unwrap();
        assert_eq!(cookies.get("theme").map(HttpSetCookie::value), Some("light"));
        assert!(cookies.replace("theme", "x\r\ny").is_err());

        assert!(cookies.remove("id").is_some());
        assert!(!cookies.contains("id"));
        assert_eq!(cookies.len(), 1);

        assert!(matches!(
            HttpSetCookie::new("id", "1\r\nLocation: evil"),
            Err(Error::IllegalHeaderValue(_))
        ));
    }
}
