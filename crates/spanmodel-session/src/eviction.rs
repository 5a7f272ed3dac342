//! Pluggable eviction strategies for the session registry.

use chrono::{DateTime, TimeDelta, Utc};

use crate::info::SessionInfo;

/// Decides which idle sessions the registry should give up.
///
/// Implementations only judge; removal (and closing the server-side handle)
/// is done by the registry and its caller. Sessions currently leased are
/// never offered to the policy.
///
/// # Example
///
/// ```rust,ignore
/// struct KeepLabelled;
///
/// impl EvictionPolicy for KeepLabelled {
///     fn is_expired(&self, session: &SessionInfo, _now: DateTime<Utc>) -> bool {
///         !session.labels().contains_key("pinned")
///     }
/// }
/// ```
pub trait EvictionPolicy: Send + Sync {
    /// Whether `session` should be evicted at time `now`.
    fn is_expired(&self, session: &SessionInfo, now: DateTime<Utc>) -> bool;
}

/// Evicts sessions whose last activity is older than `max_idle`.
///
/// Sessions without any reported timestamp have an unknown age and are
/// treated as expired.
#[derive(Debug, Clone, Copy)]
pub struct IdleAgePolicy {
    max_idle: TimeDelta,
}

impl IdleAgePolicy {
    pub fn new(max_idle: TimeDelta) -> Self {
        Self { max_idle }
    }

    pub fn max_idle(&self) -> TimeDelta {
        self.max_idle
    }
}

impl EvictionPolicy for IdleAgePolicy {
    fn is_expired(&self, session: &SessionInfo, now: DateTime<Utc>) -> bool {
        is_older_than(session, age_cutoff(now, self.max_idle))
    }
}

/// Earliest activity time still within `max_age` of `now`.
///
/// An age too large to subtract means no lower bound.
pub(crate) fn age_cutoff(now: DateTime<Utc>, max_age: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(max_age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// True when the session's last activity predates `cutoff` or is unknown.
pub(crate) fn is_older_than(session: &SessionInfo, cutoff: DateTime<Utc>) -> bool {
    session.last_activity().is_none_or(|at| at < cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "projects/p/instances/i/databases/d/sessions/s";

    #[test]
    fn test_idle_age_policy() {
        let now = Utc::now();
        let policy = IdleAgePolicy::new(TimeDelta::minutes(10));

        let fresh = SessionInfo::new(FULL, None, Some(now - TimeDelta::minutes(1))).unwrap();
        let stale = SessionInfo::new(FULL, None, Some(now - TimeDelta::minutes(11))).unwrap();
        let unknown = SessionInfo::new(FULL, None, None).unwrap();

        assert!(!policy.is_expired(&fresh, now));
        assert!(policy.is_expired(&stale, now));
        assert!(policy.is_expired(&unknown, now));
    }

    #[test]
    fn test_unbounded_idle_age_never_expires_dated_sessions() {
        let now = Utc::now();
        let policy = IdleAgePolicy::new(TimeDelta::MAX);
        let ancient = SessionInfo::new(FULL, None, Some(now - TimeDelta::days(3650))).unwrap();
        let unknown = SessionInfo::new(FULL, None, None).unwrap();

        assert!(!policy.is_expired(&ancient, now));
        assert!(policy.is_expired(&unknown, now));
    }

    #[test]
    fn test_created_at_counts_as_activity() {
        let now = Utc::now();
        let policy = IdleAgePolicy::new(TimeDelta::minutes(10));
        let created = SessionInfo::new(FULL, Some(now - TimeDelta::minutes(2)), None).unwrap();
        assert!(!policy.is_expired(&created, now));
    }
}
