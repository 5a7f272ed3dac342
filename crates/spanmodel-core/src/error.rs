//! Error types for SpanModel Rust.
//!
//! Every failure in the session and read-consistency layer is local and
//! synchronous: nothing here is retried internally. The caller (usually an
//! ORM or query layer) decides whether to re-acquire a session, rebuild a
//! request, or propagate further.

use std::error::Error as StdError;
use std::fmt;

/// Convenience alias used throughout the SpanModel crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Session handle problems (malformed responses, missing metadata, no reusable session).
    Session(SessionError),
    /// A staleness bound was built from an invalid parameter.
    Bound(BoundError),
    /// A value of the wrong kind was offered to a column cast.
    Cast(CastError),
    /// A mutation observer vetoed a pending write.
    Mutation(MutationError),
    /// The underlying RPC client reported a failure.
    Client(ClientError),
    /// JSON (de)serialization failure outside of column casting.
    Serde(serde_json::Error),
    /// Free-form error.
    Custom(String),
}

impl Error {
    /// Short, stable name of the error category (useful for logging fields).
    pub fn category(&self) -> &'static str {
        match self {
            Error::Session(e) => e.kind.as_str(),
            Error::Bound(_) => "InvalidBoundParameter",
            Error::Cast(e) => e.kind.as_str(),
            Error::Mutation(_) => "MutationRejected",
            Error::Client(_) => "Client",
            Error::Serde(_) => "Serde",
            Error::Custom(_) => "Custom",
        }
    }

    /// True when the error means "metadata unknown" rather than a broken session.
    pub fn is_timestamp_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Session(SessionError {
                kind: SessionErrorKind::TimestampUnavailable,
                ..
            })
        )
    }

    /// True when the registry had nothing to hand out.
    pub fn is_no_available_session(&self) -> bool {
        matches!(
            self,
            Error::Session(SessionError {
                kind: SessionErrorKind::NoAvailableSession,
                ..
            })
        )
    }

    /// True when the server no longer knows the session the request ran on.
    pub fn is_session_not_found(&self) -> bool {
        matches!(
            self,
            Error::Client(ClientError {
                kind: ClientErrorKind::SessionNotFound,
                ..
            })
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Session(e) => write!(f, "session error: {}", e),
            Error::Bound(e) => write!(f, "timestamp bound error: {}", e),
            Error::Cast(e) => write!(f, "cast error: {}", e),
            Error::Mutation(e) => write!(f, "mutation rejected: {}", e),
            Error::Client(e) => write!(f, "client error: {}", e),
            Error::Serde(e) => write!(f, "serialization error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Session(e) => e.source(),
            Error::Cast(e) => e.source(),
            Error::Mutation(e) => e.source(),
            Error::Client(e) => e.source(),
            Error::Serde(e) => Some(e),
            Error::Bound(_) | Error::Custom(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Error::Session(err)
    }
}

impl From<BoundError> for Error {
    fn from(err: BoundError) -> Self {
        Error::Bound(err)
    }
}

impl From<CastError> for Error {
    fn from(err: CastError) -> Self {
        Error::Cast(err)
    }
}

impl From<MutationError> for Error {
    fn from(err: MutationError) -> Self {
        Error::Mutation(err)
    }
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        Error::Client(err)
    }
}

// ============================================================================
// Session errors
// ============================================================================

/// Session-related failure.
#[derive(Debug)]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
    /// Full session name, when one is known.
    pub session: Option<String>,
}

/// Kinds of session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The session-creation response lacked a usable identifier. Not retryable.
    InvalidSessionResponse,
    /// Requested timing metadata was not reported by the server.
    TimestampUnavailable,
    /// The registry had no eligible session; the caller must create one.
    NoAvailableSession,
}

impl SessionErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionErrorKind::InvalidSessionResponse => "InvalidSessionResponse",
            SessionErrorKind::TimestampUnavailable => "TimestampUnavailable",
            SessionErrorKind::NoAvailableSession => "NoAvailableSession",
        }
    }
}

impl SessionError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::InvalidSessionResponse,
            message: message.into(),
            session: None,
        }
    }

    pub fn timestamp_unavailable(field: &str, session: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::TimestampUnavailable,
            message: format!("{} was not reported by the server", field),
            session: Some(session.into()),
        }
    }

    pub fn no_available(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::NoAvailableSession,
            message: message.into(),
            session: None,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session {
            Some(session) => write!(f, "{}: {} ({})", self.kind.as_str(), self.message, session),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}

impl StdError for SessionError {}

// ============================================================================
// Timestamp bound errors
// ============================================================================

/// A staleness bound parameter was rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundError {
    /// Name of the bound kind being built (e.g. "exact_staleness").
    pub bound: &'static str,
    pub message: String,
}

impl BoundError {
    pub fn new(bound: &'static str, message: impl Into<String>) -> Self {
        Self {
            bound,
            message: message.into(),
        }
    }
}

impl fmt::Display for BoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidBoundParameter for {}: {}", self.bound, self.message)
    }
}

impl StdError for BoundError {}

// ============================================================================
// Cast errors
// ============================================================================

/// A column value could not be cast.
#[derive(Debug)]
pub struct CastError {
    pub kind: CastErrorKind,
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Kinds of cast failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastErrorKind {
    /// The value kind is outside the set the codec accepts.
    UnsupportedCastInput,
    /// Text offered as JSON did not parse.
    MalformedJson,
}

impl CastErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            CastErrorKind::UnsupportedCastInput => "UnsupportedCastInput",
            CastErrorKind::MalformedJson => "MalformedJson",
        }
    }
}

impl CastError {
    pub fn unsupported(expected: &str, found: &str) -> Self {
        Self {
            kind: CastErrorKind::UnsupportedCastInput,
            message: format!("expected {}, found {}", expected, found),
            source: None,
        }
    }

    pub fn malformed_json(err: serde_json::Error) -> Self {
        Self {
            kind: CastErrorKind::MalformedJson,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl StdError for CastError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// ============================================================================
// Mutation errors
// ============================================================================

/// An observer vetoed a write before it was transmitted.
#[derive(Debug)]
pub struct MutationError {
    pub table: String,
    /// Command name as it appears in the event ("insert", "update", ...).
    pub command: &'static str,
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl MutationError {
    pub fn rejected(
        table: impl Into<String>,
        command: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            command,
            message: message.into(),
            source: None,
        }
    }
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.command, self.table, self.message)
    }
}

impl StdError for MutationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// ============================================================================
// Client errors
// ============================================================================

/// Failure surfaced by the RPC client. Surfaced as-is; no retries here.
#[derive(Debug)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Kinds of client failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Generic RPC failure.
    Rpc,
    /// The server no longer knows the session.
    SessionNotFound,
    /// The server rejected the request as invalid.
    InvalidArgument,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl StdError for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
