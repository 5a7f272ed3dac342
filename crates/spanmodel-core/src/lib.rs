//! Core types for SpanModel Rust.
//!
//! `spanmodel-core` is the **foundation layer** shared by the session, query and
//! facade crates.
//!
//! # Role In The Architecture
//!
//! - **Data model**: `Value`, `SqlType`, `Row` and `ResultSet` describe request
//!   parameters and read results, including their REST wire encoding.
//! - **Errors**: a single `Error` enum with one category per failure class of the
//!   session and read-consistency layer.
//! - **Resource paths**: `DatabasePath` and `SessionPath` parse and render the
//!   slash-delimited names the server assigns.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so
//!   every async client operation is cancel-correct.
//!
//! Most applications should use the `spanmodel` facade; reach for this crate
//! directly when implementing a `SpannerClient` transport.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod error;
pub mod path;
pub mod row;
pub mod time;
pub mod types;
pub mod value;

pub use error::{
    BoundError, CastError, CastErrorKind, ClientError, ClientErrorKind, Error, MutationError,
    Result, SessionError, SessionErrorKind,
};
pub use path::{DatabasePath, SessionPath};
pub use row::{ColumnInfo, ResultSet, Row};
pub use time::{format_duration, format_timestamp, parse_timestamp};
pub use types::SqlType;
pub use value::Value;
