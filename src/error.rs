//! Errors of tunetube.
//!
//! An [`Error`] pairs a coarse [`ErrorKind`] with whatever caused it. The
//! kinds follow the gRPC status codes, which is enough to decide what to do
//! about an error without inspecting its cause: a missing secrets file is
//! `NotFound` and means "run anonymously", a widget that is not ready yet is
//! `FailedPrecondition` and is not worth a warning, and so on.
//!
//! Most failures never leave the playback core. Widget, history and refresh
//! errors are logged where they happen. Errors only propagate at the edges:
//! the HTTP client, the state and secrets files, and the `mpv` process.
//!
//! # Example
//!
//! ```rust
//! use tunetube::error::{Error, Result};
//!
//! fn lookup(video_id: &str) -> Result<()> {
//!     if video_id.is_empty() {
//!         return Err(Error::invalid_argument("video id must not be empty"));
//!     }
//!     Ok(())
//! }
//! ```

use std::{fmt, io};

use thiserror::Error;

/// Error of any tunetube operation.
#[derive(Debug)]
pub struct Error {
    /// What went wrong, broadly.
    pub kind: ErrorKind,

    /// The cause, with the details.
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of errors, numbered like gRPC status codes.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    #[error("cancelled")]
    Cancelled = 1,

    #[error("unknown error")]
    Unknown = 2,

    /// Input was malformed: a command, a response body, a state file.
    #[error("invalid argument")]
    InvalidArgument = 3,

    #[error("timed out")]
    DeadlineExceeded = 4,

    #[error("not found")]
    NotFound = 5,

    #[error("permission denied")]
    PermissionDenied = 7,

    /// The backend throttled us or its upstream quota ran out.
    #[error("quota exhausted")]
    ResourceExhausted = 8,

    /// Not possible right now, such as commanding a widget that has not
    /// reported ready.
    #[error("not ready")]
    FailedPrecondition = 9,

    /// A connection dropped halfway.
    #[error("aborted")]
    Aborted = 10,

    #[error("out of range")]
    OutOfRange = 11,

    /// Not supported here, such as a media session action on a host
    /// without one.
    #[error("unsupported")]
    Unimplemented = 12,

    #[error("internal error")]
    Internal = 13,

    /// The backend or the `mpv` process cannot be reached.
    #[error("unavailable")]
    Unavailable = 14,

    #[error("data loss")]
    DataLoss = 15,

    /// The backend did not accept the token, or there was none.
    #[error("unauthenticated")]
    Unauthenticated = 16,
}

/// Defines a constructor per [`ErrorKind`].
macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident),+ $(,)?) => {
        impl Error {
            $(
                $(#[$doc])*
                pub fn $name<E>(error: E) -> Self
                where
                    E: Into<Box<dyn std::error::Error + Send + Sync>>,
                {
                    Self::new(ErrorKind::$kind, error)
                }
            )+
        }
    };
}

constructors! {
    aborted => Aborted,
    cancelled => Cancelled,
    data_loss => DataLoss,
    deadline_exceeded => DeadlineExceeded,
    /// Used by the player adapter for commands issued before the widget
    /// became ready.
    failed_precondition => FailedPrecondition,
    internal => Internal,
    invalid_argument => InvalidArgument,
    not_found => NotFound,
    out_of_range => OutOfRange,
    permission_denied => PermissionDenied,
    resource_exhausted => ResourceExhausted,
    unauthenticated => Unauthenticated,
    unimplemented => Unimplemented,
    unavailable => Unavailable,
    unknown => Unknown,
}

impl Error {
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats as `"{kind}: {cause}"`.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

/// Classifies IO errors of files, sockets and child processes.
fn io_kind(kind: io::ErrorKind) -> ErrorKind {
    match kind {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => ErrorKind::Unavailable,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => ErrorKind::Aborted,
        io::ErrorKind::TimedOut => ErrorKind::DeadlineExceeded,
        io::ErrorKind::Interrupted => ErrorKind::Cancelled,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::InvalidArgument,
        io::ErrorKind::UnexpectedEof => ErrorKind::DataLoss,
        _ => ErrorKind::Unknown,
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(io_kind(e.kind()), e)
    }
}

/// Classifies backend responses by status, and transport failures by cause.
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let kind = if let Some(status) = e.status() {
            match status.as_u16() {
                400 => ErrorKind::InvalidArgument,
                401 => ErrorKind::Unauthenticated,
                403 => ErrorKind::PermissionDenied,
                404 => ErrorKind::NotFound,
                429 => ErrorKind::ResourceExhausted,
                500..=599 => ErrorKind::Unavailable,
                _ => ErrorKind::Unknown,
            }
        } else if e.is_timeout() {
            ErrorKind::DeadlineExceeded
        } else if e.is_connect() {
            ErrorKind::Unavailable
        } else if e.is_decode() {
            ErrorKind::InvalidArgument
        } else if e.is_body() {
            ErrorKind::DataLoss
        } else if e.is_builder() {
            ErrorKind::Internal
        } else {
            ErrorKind::Unknown
        };

        Self::new(kind, e)
    }
}

/// Malformed JSON is an invalid argument; truncated JSON is data loss.
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        use serde_json::error::Category;

        let kind = match e.classify() {
            Category::Io => ErrorKind::Unknown,
            Category::Syntax | Category::Data => ErrorKind::InvalidArgument,
            Category::Eof => ErrorKind::DataLoss,
        };
        Self::new(kind, e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::invalid_argument(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_argument(e)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Self::invalid_argument(e)
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(e: std::num::ParseFloatError) -> Self {
        Self::invalid_argument(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Self::deadline_exceeded(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_kind() {
        let err = Error::not_found("video abc");
        assert_eq!(err.to_string(), "not found: video abc");

        let err = Error::failed_precondition("player widget is not ready yet");
        assert_eq!(err.to_string(), "not ready: player widget is not ready yet");
    }

    #[test]
    fn io_errors_map_to_kinds() {
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err = Error::from(io::Error::new(io::ErrorKind::InvalidData, "bad"));
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        let err = Error::from(io::Error::new(io::ErrorKind::ConnectionRefused, "no mpv"));
        assert_eq!(err.kind, ErrorKind::Unavailable);
    }

    #[test]
    fn json_errors_by_category() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert_eq!(Error::from(err).kind, ErrorKind::InvalidArgument);

        let err = serde_json::from_str::<Vec<u32>>("[1, 2").unwrap_err();
        assert_eq!(Error::from(err).kind, ErrorKind::DataLoss);
    }
}
