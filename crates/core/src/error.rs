//! Error types for the request-processing core.

use std::fmt;

/// Errors that can occur in the request-processing core.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Io`](Self::Io), [`LineTooLong`](Self::LineTooLong) for
///   socket failures and framing limits.
/// - **Protocol**: [`Parse`](Self::Parse) for malformed command lines.
/// - **Registration**: [`InvalidRoute`](Self::InvalidRoute),
///   [`EmptyPrefix`](Self::EmptyPrefix) for start-up contract violations.
/// - **Server**: [`AlreadyRunning`](Self::AlreadyRunning).
/// - **Outbound**: [`Dial`](Self::Dial).
///
/// Handlers never see these directly; they report through
/// [`Outcome`](crate::router::Outcome).
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command or header line exceeded the configured bound.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// Failed to parse a request command line.
    #[error("parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// A route pattern did not compile.
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidRoute {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A literal route was registered with an empty prefix.
    #[error("literal route prefix must not be empty")]
    EmptyPrefix,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// Outbound connection failed.
    #[error("dial failed: {0}")]
    Dial(#[from] DialError),
}

/// Specific kind of command-line parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The command line was empty.
    EmptyRequest,
    /// The command line did not split into `METHOD PATH VERSION`.
    InvalidRequestLine,
    /// The method token is not one we serve.
    UnknownMethod,
    /// The version token is not `HTTP/1.0`, `HTTP/1.1` or `RTSP/1.0`.
    UnknownVersion,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::UnknownMethod => write!(f, "unknown method"),
            Self::UnknownVersion => write!(f, "unknown protocol version"),
        }
    }
}

/// Failure modes of [`dial`](crate::transport::dial::dial).
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    /// Name resolution found no such host.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// The host resolved, but to no usable address.
    #[error("no address for host: {0}")]
    NoAddress(String),

    /// The connect did not complete within the timeout.
    #[error("connect to {0} timed out")]
    TimedOut(String),

    /// The connect itself failed.
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
}

/// Convenience alias for `Result<T, HttpError>`.
pub type Result<T> = std::result::Result<T, HttpError>;
