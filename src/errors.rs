use crate::http::types::Version;
use std::io;
use thiserror::Error;

/// Errors produced while decoding requests, building responses or serving
/// connections.
///
/// Everything except [`BindFailure`](Error::BindFailure) is scoped to a single
/// connection: the event loop logs it, closes that connection and keeps serving
/// the others.
#[derive(Debug, Error)]
pub enum Error {
    /// The first line of the request has fewer than three tokens.
    #[error("malformed start line: {0:?}")]
    MalformedStartLine(String),

    /// A header line without a `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// A header or cookie value carrying a bare CR or LF (response/header
    /// splitting attempt).
    #[error("illegal header value: {0}")]
    IllegalHeaderValue(&'static str),

    /// A header or cookie name containing CR or LF.
    #[error("illegal character in name {0:?}")]
    IllegalHeaderName(String),

    /// The request bytes are not valid UTF-8.
    #[error("request is not valid UTF-8")]
    InvalidEncoding,

    /// The peer sent more bytes than `ServerConfig::max_request_size`.
    #[error("request exceeds {0} bytes")]
    RequestTooLarge(usize),

    /// Read, write or accept failure, or the peer closed before sending anything.
    #[error("connection i/o error: {0}")]
    ConnectionIo(#[from] io::Error),

    /// The listening socket or the poll instance could not be created.
    #[error("failed to bind {addr}: {source}")]
    BindFailure {
        addr: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

macro_rules! http_errors {
    ($($name:ident: $status_code:literal; )*) => {
        /// Static `400`-class response for decode errors, `None` for errors
        /// that never reach the client (I/O, bind).
        pub(crate) fn as_http(&self, version: &Version) -> Option<&'static [u8]> {
            let http10 = matches!(version, Version::Http10);

            match self { $(
                Self::$name { .. } if http10 => Some(concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "Connection: close\r\n",
                    "Content-Length: 0\r\n\r\n",
                ).as_bytes()),
                Self::$name { .. } => Some(concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "Connection: close\r\n",
                    "Content-Length: 0\r\n\r\n",
                ).as_bytes()),
            )*
                Self::ConnectionIo(_) | Self::BindFailure { .. } => None,
            }
        }
    };
}

impl Error {
    http_errors! {
        MalformedStartLine: "400 Bad Request";
        MalformedHeader: "400 Bad Request";
        IllegalHeaderValue: "400 Bad Request";
        IllegalHeaderName: "400 Bad Request";
        InvalidEncoding: "400 Bad Request";
        RequestTooLarge: "413 Payload Too Large";
    }

    /// `true` for errors raised while turning bytes into a request.
    #[inline]
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, Self::ConnectionIo(_) | Self::BindFailure { .. })
    }
}
