//! Session handle tracking for SpanModel Rust.
//!
//! A session is a server-held handle every read and write runs through.
//! Creating one costs a round trip, so handles are tracked and reused:
//!
//! - [`SessionInfo`] is an immutable snapshot of one handle's identity and
//!   timing metadata, built from the server's response.
//! - [`SessionRegistry`] owns the map of live handles, hands out exclusive
//!   [`SessionLease`]s for reuse, and evicts idle handles through a pluggable
//!   [`EvictionPolicy`].
//!
//! The registry never talks to the server. Creating sessions when none is
//! available, and deleting evicted ones, is the caller's job.

pub mod config;
pub mod eviction;
pub mod info;
pub mod registry;

pub use config::SessionPoolConfig;
pub use eviction::{EvictionPolicy, IdleAgePolicy};
pub use info::{SessionInfo, UNDEFINED_SESSION_NAME, short_session_name};
pub use registry::{DEFAULT_MAX_IDLE, SessionLease, SessionRegistry};
