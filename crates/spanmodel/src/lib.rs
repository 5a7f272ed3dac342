//! SpanModel Rust: the session and read-consistency layer of a Spanner-style
//! database driver.
//!
//! The facade ties the lower crates together behind a [`Database`] handle:
//!
//! - sessions are created on demand, reused while fresh, and evicted when
//!   idle (`spanmodel-session`);
//! - reads carry a [`TimestampBound`], JSON columns are decoded, and writes
//!   raise a [`MutationEvent`] before they are sent (`spanmodel-query`);
//! - the network lives behind the [`SpannerClient`] trait, so any transport
//!   (REST, gRPC, an in-memory fake) can be plugged in.
//!
//! # Example
//!
//! ```ignore
//! use spanmodel::prelude::*;
//!
//! let db = Database::new(client, DatabaseConfig::parse("projects/p/instances/i/databases/d")?)?;
//! let singers = db
//!     .read(&cx, &ReadBuilder::new("Singers")
//!         .columns(&["SingerId", "Name"])
//!         .with_staleness(TimestampBound::exact_staleness(TimeDelta::seconds(15))?))
//!     .await;
//! ```

pub mod client;
pub mod config;
pub mod database;

pub use client::{ReadRpc, SpannerClient};
pub use config::DatabaseConfig;
pub use database::Database;

pub use spanmodel_core::{
    BoundError, CastError, CastErrorKind, ClientError, ClientErrorKind, ColumnInfo, Cx,
    DatabasePath, Error, MutationError, Outcome, Result, ResultSet, Row, SessionError,
    SessionErrorKind, SessionPath, SqlType, Value,
};
pub use spanmodel_query::{
    BoundKind, CastableInput, ColumnKind, InterleaveKey, JsonCodec, JsonLiteral, MutationCommand,
    MutationEvent, MutationObserver, MutationObservers, ReadBuilder, ReadPredicate, ReadRequest,
    SupportsStaleReads, TimestampBound, WriteBuilder, WriteRequest, build_read_request,
    build_write_request, cast_column_on_read, cast_column_on_write,
};
pub use spanmodel_session::{
    EvictionPolicy, IdleAgePolicy, SessionInfo, SessionLease, SessionPoolConfig, SessionRegistry,
};

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{
        Cx, Database, DatabaseConfig, Error, MutationCommand, MutationEvent, Outcome, ReadBuilder,
        ReadPredicate, Result, ResultSet, Row, SessionInfo, SpannerClient, SupportsStaleReads,
        TimestampBound, Value, WriteBuilder,
    };
    pub use chrono::TimeDelta;
}
