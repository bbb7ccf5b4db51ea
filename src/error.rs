//! Unified error type.

use std::fmt;

/// The error type returned by courier's fallible operations.
///
/// Per-request failures never surface here — they become HTTP responses
/// (500 bodies, mid-stream error markers) inside the delivery engine. This
/// type covers what can go wrong *around* requests: infrastructure failures
/// (binding a port, accepting a connection) and route-table configuration
/// errors caught at startup.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Route(RouteError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Route(e) => write!(f, "route configuration: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Route(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<RouteError> for Error {
    fn from(e: RouteError) -> Self {
        Self::Route(e)
    }
}

// ── RouteError ────────────────────────────────────────────────────────────────

/// A malformed route key, reported when the route table is built.
///
/// Route keys are startup configuration, so these surface before the server
/// accepts a single connection — a bad key never degrades silently into an
/// unreachable route.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteError {
    /// The key was empty.
    EmptyKey,
    /// The first token is not a recognized HTTP verb.
    UnknownMethod { key: String, token: String },
    /// A variable segment had no name after the sigil.
    EmptyVariable { key: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "empty route key"),
            Self::UnknownMethod { key, token } => {
                write!(f, "route key `{key}`: unknown method token `{token}`")
            }
            Self::EmptyVariable { key } => {
                write!(f, "route key `{key}`: variable segment has no name")
            }
        }
    }
}

impl std::error::Error for RouteError {}

// ── HandlerError ──────────────────────────────────────────────────────────────

/// A failure originating inside a handler or the stream it returned.
///
/// Where it surfaces depends on when it happens: before the response commits
/// it becomes a 500 with the message and debug detail in the body; after a
/// streaming response has started it becomes the mid-stream `error` marker;
/// after a non-streaming response has committed it is only logged.
#[derive(Debug)]
pub struct HandlerError(Box<dyn std::error::Error + Send + Sync>);

impl HandlerError {
    pub fn new(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(e.into())
    }

    /// A free-form message error, for handlers without a richer type.
    pub fn msg(m: impl fmt::Display) -> Self {
        Self(m.to_string().into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
