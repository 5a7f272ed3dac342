//! Read/write request building for SpanModel Rust.
//!
//! `spanmodel-query` turns what the ORM layer wants into requests the server
//! understands:
//!
//! - **Reads** carry a [`TimestampBound`] through the [`SupportsStaleReads`]
//!   capability; a read with no bound is strong.
//! - **Writes** cast their values and raise a [`MutationEvent`] to every
//!   registered observer before a [`WriteRequest`] exists.
//! - **Casting** bridges column kinds with no native host representation
//!   (structured JSON, interleaved keys) in both directions.
//!
//! Nothing here performs I/O; the facade crate dispatches the requests.

pub mod bound;
pub mod cast;
pub mod events;
pub mod read;
pub mod stale;
pub mod write;

pub use bound::{BoundKind, TimestampBound};
pub use cast::{
    CastableInput, ColumnKind, InterleaveKey, JsonCodec, JsonLiteral, cast_column_on_read,
    cast_column_on_write, decode_result_set,
};
pub use events::{MutationCommand, MutationEvent, MutationObserver, MutationObservers};
pub use read::{ReadBuilder, ReadPredicate, ReadRequest, build_read_request};
pub use stale::SupportsStaleReads;
pub use write::{WriteBuilder, WriteRequest, build_write_request};
