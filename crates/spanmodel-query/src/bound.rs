//! Read-consistency bounds.
//!
//! A [`TimestampBound`] says how fresh the data returned by a read must be.
//! Stale reads trade freshness for latency: a replica can serve them without
//! waiting on the leader.
//!
//! # Example
//!
//! ```ignore
//! // Latest committed data (the default)
//! let bound = TimestampBound::strong();
//!
//! // Data exactly 15 seconds old
//! let bound = TimestampBound::exact_staleness(TimeDelta::seconds(15))?;
//!
//! // Whatever the server can serve without blocking, at most 10 seconds old
//! let bound = TimestampBound::max_staleness(TimeDelta::seconds(10))?;
//! ```

use std::fmt;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde_json::json;
use spanmodel_core::{BoundError, Error, Result, format_duration, format_timestamp, parse_timestamp};

/// The consistency policy of a bound, with its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundKind {
    /// Read at the latest committed data.
    #[default]
    Strong,
    /// Read at exactly `now - staleness`.
    ExactStaleness(TimeDelta),
    /// Read at a server-chosen time no older than `now - staleness`.
    MaxStaleness(TimeDelta),
    /// Read at a server-chosen time at or after the timestamp.
    MinReadTimestamp(DateTime<Utc>),
    /// Read at exactly the timestamp.
    ExactReadTimestamp(DateTime<Utc>),
}

/// A validated read-consistency bound.
///
/// Built through one factory per kind; each factory rejects negative
/// durations and out-of-range timestamps with `InvalidBoundParameter`, so a
/// `TimestampBound` in hand is always sendable. Bounds are plain immutable
/// values: attach one to a single read request and discard it after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimestampBound {
    kind: BoundKind,
}

impl TimestampBound {
    /// Read the latest committed data.
    pub const fn strong() -> Self {
        Self {
            kind: BoundKind::Strong,
        }
    }

    /// Read data exactly `staleness` old.
    pub fn exact_staleness(staleness: TimeDelta) -> Result<Self> {
        check_duration("exact_staleness", staleness)?;
        Ok(Self {
            kind: BoundKind::ExactStaleness(staleness),
        })
    }

    /// Read data at most `staleness` old, at a time of the server's choosing.
    pub fn max_staleness(staleness: TimeDelta) -> Result<Self> {
        check_duration("max_staleness", staleness)?;
        Ok(Self {
            kind: BoundKind::MaxStaleness(staleness),
        })
    }

    /// Read at a time no earlier than `ts`.
    pub fn min_read_timestamp(ts: DateTime<Utc>) -> Result<Self> {
        check_timestamp("min_read_timestamp", ts)?;
        Ok(Self {
            kind: BoundKind::MinReadTimestamp(ts),
        })
    }

    /// Read at exactly `ts`.
    pub fn exact_read_timestamp(ts: DateTime<Utc>) -> Result<Self> {
        check_timestamp("exact_read_timestamp", ts)?;
        Ok(Self {
            kind: BoundKind::ExactReadTimestamp(ts),
        })
    }

    /// [`min_read_timestamp`](Self::min_read_timestamp) from RFC 3339 text.
    pub fn min_read_timestamp_str(ts: &str) -> Result<Self> {
        Self::min_read_timestamp(parse_bound_timestamp("min_read_timestamp", ts)?)
    }

    /// [`exact_read_timestamp`](Self::exact_read_timestamp) from RFC 3339 text.
    pub fn exact_read_timestamp_str(ts: &str) -> Result<Self> {
        Self::exact_read_timestamp(parse_bound_timestamp("exact_read_timestamp", ts)?)
    }

    pub const fn kind(&self) -> &BoundKind {
        &self.kind
    }

    pub const fn is_strong(&self) -> bool {
        matches!(self.kind, BoundKind::Strong)
    }

    /// Stable name of the bound kind.
    pub const fn label(&self) -> &'static str {
        match self.kind {
            BoundKind::Strong => "strong",
            BoundKind::ExactStaleness(_) => "exact_staleness",
            BoundKind::MaxStaleness(_) => "max_staleness",
            BoundKind::MinReadTimestamp(_) => "min_read_timestamp",
            BoundKind::ExactReadTimestamp(_) => "exact_read_timestamp",
        }
    }

    /// Bounded-staleness kinds are only accepted in single-use read-only
    /// transactions; the server rejects them on multi-use transactions.
    pub const fn requires_single_use(&self) -> bool {
        matches!(
            self.kind,
            BoundKind::MaxStaleness(_) | BoundKind::MinReadTimestamp(_)
        )
    }

    /// Render as a `TransactionOptions.ReadOnly` message.
    pub fn to_read_only_options(&self, return_read_timestamp: bool) -> serde_json::Value {
        let mut options = match self.kind {
            BoundKind::Strong => json!({ "strong": true }),
            BoundKind::ExactStaleness(d) => json!({ "exactStaleness": format_duration(d) }),
            BoundKind::MaxStaleness(d) => json!({ "maxStaleness": format_duration(d) }),
            BoundKind::MinReadTimestamp(ts) => {
                json!({ "minReadTimestamp": format_timestamp(&ts) })
            }
            BoundKind::ExactReadTimestamp(ts) => {
                json!({ "readTimestamp": format_timestamp(&ts) })
            }
        };
        if return_read_timestamp {
            options["returnReadTimestamp"] = json!(true);
        }
        options
    }
}

impl fmt::Display for TimestampBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BoundKind::Strong => write!(f, "strong"),
            BoundKind::ExactStaleness(d) | BoundKind::MaxStaleness(d) => {
                write!(f, "{}({})", self.label(), format_duration(d))
            }
            BoundKind::MinReadTimestamp(ts) | BoundKind::ExactReadTimestamp(ts) => {
                write!(f, "{}({})", self.label(), format_timestamp(&ts))
            }
        }
    }
}

fn check_duration(bound: &'static str, d: TimeDelta) -> Result<()> {
    if d < TimeDelta::zero() {
        return Err(Error::Bound(BoundError::new(
            bound,
            format!("staleness must not be negative, got {}", format_duration(d)),
        )));
    }
    Ok(())
}

fn check_timestamp(bound: &'static str, ts: DateTime<Utc>) -> Result<()> {
    // The server's timestamp domain is 0001-01-01 through 9999-12-31.
    if !(1..=9999).contains(&ts.year()) {
        return Err(Error::Bound(BoundError::new(
            bound,
            format!("timestamp year {} is out of range", ts.year()),
        )));
    }
    Ok(())
}

fn parse_bound_timestamp(bound: &'static str, text: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(text).ok_or_else(|| {
        Error::Bound(BoundError::new(
            bound,
            format!("'{}' is not an RFC 3339 timestamp", text),
        ))
    })
}
