//! Registry of live session handles.
//!
//! The registry is the sole owner of the full-name → [`SessionInfo`] map. It is
//! read-mostly: many callers look for a reusable session, a few track new ones
//! or evict idle ones. State sits behind a single `RwLock` so selection always
//! scans a consistent snapshot and mutations are mutually exclusive.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = SessionRegistry::new();
//! registry.track(SessionInfo::from_response(&response)?);
//!
//! // Exclusive use for one request; returned (and touched) on drop.
//! let lease = registry.checkout(TimeDelta::minutes(50))?;
//! client.read(&cx, lease.session(), &request).await;
//! drop(lease);
//!
//! // Periodic maintenance: close what the registry gave up.
//! for stale in registry.evict(Utc::now() - TimeDelta::minutes(55)) {
//!     client.delete_session(&cx, &stale).await;
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeDelta, Utc};
use spanmodel_core::{Error, Result, SessionError};

use crate::eviction::{EvictionPolicy, IdleAgePolicy, age_cutoff, is_older_than};
use crate::info::SessionInfo;

/// Default idle age after which the policy evicts a session.
pub const DEFAULT_MAX_IDLE: TimeDelta = TimeDelta::minutes(50);

#[derive(Debug)]
struct Entry {
    info: SessionInfo,
    in_use: bool,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<String, Entry>,
}

impl RegistryState {
    /// Most-recently-used idle session whose last activity is within `max_age`.
    fn select(&self, max_age: TimeDelta, now: DateTime<Utc>) -> Option<&Entry> {
        let cutoff = age_cutoff(now, max_age);
        self.sessions
            .values()
            .filter(|e| !e.in_use)
            .filter_map(|e| e.info.last_activity().map(|at| (at, e)))
            .filter(|(at, _)| *at >= cutoff)
            .max_by(|(a, ea), (b, eb)| {
                a.cmp(b)
                    .then_with(|| eb.info.full_name().cmp(ea.info.full_name()))
            })
            .map(|(_, e)| e)
    }
}

/// Shared, thread-safe session registry. Cloning shares the same state.
#[derive(Clone)]
pub struct SessionRegistry {
    state: Arc<RwLock<RegistryState>>,
    policy: Arc<dyn EvictionPolicy>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("SessionRegistry")
            .field("sessions", &state.sessions.len())
            .field(
                "in_use",
                &state.sessions.values().filter(|e| e.in_use).count(),
            )
            .finish()
    }
}

impl SessionRegistry {
    /// Create an empty registry with the default idle-age eviction policy.
    pub fn new() -> Self {
        Self::with_policy(IdleAgePolicy::new(DEFAULT_MAX_IDLE))
    }

    /// Create an empty registry with a custom eviction policy.
    pub fn with_policy(policy: impl EvictionPolicy + 'static) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            policy: Arc::new(policy),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated (every
    // mutation is a single insert/remove/flag flip), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session. An existing entry with the same full name is
    /// replaced (a refresh); its lease state is kept.
    ///
    /// Returns the snapshot that was replaced, if any.
    pub fn track(&self, info: SessionInfo) -> Option<SessionInfo> {
        let mut state = self.write();
        let key = info.full_name().to_string();
        match state.sessions.get_mut(&key) {
            Some(entry) => {
                tracing::debug!(target: "spanmodel::session", session = %info.name(), "Refreshing tracked session");
                Some(std::mem::replace(&mut entry.info, info))
            }
            None => {
                tracing::debug!(target: "spanmodel::session", session = %info.name(), "Tracking new session");
                state.sessions.insert(key, Entry { info, in_use: false });
                None
            }
        }
    }

    /// Find a reusable session used within `max_age` of now.
    ///
    /// Among eligible idle sessions the most recently used wins. Sessions
    /// currently leased, and sessions with no reported timestamps, are never
    /// eligible. Fails with `NoAvailableSession` when nothing qualifies.
    pub fn select_for_reuse(&self, max_age: TimeDelta) -> Result<SessionInfo> {
        self.select_for_reuse_at(max_age, Utc::now())
    }

    /// [`select_for_reuse`](Self::select_for_reuse) against an explicit clock.
    pub fn select_for_reuse_at(&self, max_age: TimeDelta, now: DateTime<Utc>) -> Result<SessionInfo> {
        let state = self.read();
        state
            .select(max_age, now)
            .map(|e| e.info.clone())
            .ok_or_else(|| no_available(state.sessions.len()))
    }

    /// Select a reusable session and mark it in use until the lease drops.
    pub fn checkout(&self, max_age: TimeDelta) -> Result<SessionLease> {
        self.checkout_at(max_age, Utc::now())
    }

    /// [`checkout`](Self::checkout) against an explicit clock.
    pub fn checkout_at(&self, max_age: TimeDelta, now: DateTime<Utc>) -> Result<SessionLease> {
        let mut state = self.write();
        let key = match state.select(max_age, now) {
            Some(entry) => entry.info.full_name().to_string(),
            None => return Err(no_available(state.sessions.len())),
        };
        let entry = state
            .sessions
            .get_mut(&key)
            .ok_or_else(|| no_available(0))?;
        entry.in_use = true;
        tracing::trace!(target: "spanmodel::session", session = %entry.info.name(), "Session checked out");
        Ok(SessionLease {
            info: entry.info.clone(),
            state: Arc::clone(&self.state),
            discard: false,
        })
    }

    /// Track a freshly created session and lease it in one step.
    ///
    /// Used right after creation, when the new session must go to the
    /// requester that caused it to be created.
    pub fn track_leased(&self, info: SessionInfo) -> SessionLease {
        let mut state = self.write();
        tracing::debug!(target: "spanmodel::session", session = %info.name(), "Tracking new session (leased)");
        state.sessions.insert(
            info.full_name().to_string(),
            Entry {
                info: info.clone(),
                in_use: true,
            },
        );
        SessionLease {
            info,
            state: Arc::clone(&self.state),
            discard: false,
        }
    }

    /// Remove and return idle sessions whose last activity predates
    /// `older_than` (or is unknown).
    ///
    /// Advisory: the caller is responsible for deleting the server-side
    /// handles. Leased sessions are left alone.
    pub fn evict(&self, older_than: DateTime<Utc>) -> Vec<SessionInfo> {
        self.evict_where(|info| is_older_than(info, older_than))
    }

    /// Remove and return idle sessions the eviction policy considers expired.
    pub fn evict_expired(&self) -> Vec<SessionInfo> {
        self.evict_expired_at(Utc::now())
    }

    /// [`evict_expired`](Self::evict_expired) against an explicit clock.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> Vec<SessionInfo> {
        let policy = Arc::clone(&self.policy);
        self.evict_where(|info| policy.is_expired(info, now))
    }

    fn evict_where(&self, mut expired: impl FnMut(&SessionInfo) -> bool) -> Vec<SessionInfo> {
        let mut state = self.write();
        let keys: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, e)| !e.in_use && expired(&e.info))
            .map(|(k, _)| k.clone())
            .collect();

        let evicted: Vec<SessionInfo> = keys
            .iter()
            .filter_map(|k| state.sessions.remove(k))
            .map(|e| e.info)
            .collect();

        if !evicted.is_empty() {
            tracing::info!(
                target: "spanmodel::session",
                evicted = evicted.len(),
                remaining = state.sessions.len(),
                "Evicted idle sessions"
            );
        }
        evicted
    }

    /// Forget a session regardless of lease state.
    pub fn remove(&self, full_name: &str) -> Option<SessionInfo> {
        self.write().sessions.remove(full_name).map(|e| e.info)
    }

    pub fn get(&self, full_name: &str) -> Option<SessionInfo> {
        self.read().sessions.get(full_name).map(|e| e.info.clone())
    }

    pub fn len(&self) -> usize {
        self.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().sessions.is_empty()
    }

    /// Number of sessions currently leased.
    pub fn in_use_count(&self) -> usize {
        self.read().sessions.values().filter(|e| e.in_use).count()
    }

    /// Copy of every tracked snapshot, in no particular order.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.read().sessions.values().map(|e| e.info.clone()).collect()
    }
}

fn no_available(tracked: usize) -> Error {
    Error::Session(SessionError::no_available(format!(
        "no idle session within the reuse window ({} tracked)",
        tracked
    )))
}

/// Exclusive use of one session for one in-flight request.
///
/// Dropping the lease returns the session to the registry and records the
/// release time as its last use. This also happens when the request future is
/// dropped mid-flight: cancellation never evicts a session by itself.
pub struct SessionLease {
    info: SessionInfo,
    state: Arc<RwLock<RegistryState>>,
    discard: bool,
}

impl SessionLease {
    /// Snapshot of the leased session at checkout time.
    pub fn session(&self) -> &SessionInfo {
        &self.info
    }

    /// Drop the lease and forget the session, e.g. after the server reported
    /// that it no longer exists.
    pub fn discard(mut self) {
        self.discard = true;
    }
}

impl fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLease")
            .field("session", &self.info.full_name())
            .field("discard", &self.discard)
            .finish()
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let key = self.info.full_name();
        if self.discard {
            state.sessions.remove(key);
            tracing::debug!(target: "spanmodel::session", session = %self.info.name(), "Discarded leased session");
            return;
        }
        if let Some(entry) = state.sessions.get_mut(key) {
            entry.in_use = false;
            entry.info = entry.info.with_last_used_at(Utc::now());
            tracing::trace!(target: "spanmodel::session", session = %self.info.name(), "Session released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, last_used: Option<DateTime<Utc>>) -> SessionInfo {
        SessionInfo::new(
            format!("projects/p/instances/i/databases/d/sessions/{id}"),
            None,
            last_used,
        )
        .unwrap()
    }

    #[test]
    fn test_select_on_empty_registry_fails() {
        let registry = SessionRegistry::new();
        let err = registry.select_for_reuse(TimeDelta::seconds(10)).unwrap_err();
        assert!(err.is_no_available_session());
    }

    #[test]
    fn test_select_skips_sessions_outside_window() {
        let now = Utc::now();
        let registry = SessionRegistry::new();
        registry.track(session("old", Some(now - TimeDelta::seconds(30))));
        registry.track(session("unknown", None));

        let err = registry
            .select_for_reuse_at(TimeDelta::seconds(10), now)
            .unwrap_err();
        assert!(err.is_no_available_session());
    }

    #[test]
    fn test_select_prefers_most_recently_used() {
        let now = Utc::now();
        let registry = SessionRegistry::new();
        registry.track(session("a", Some(now - TimeDelta::seconds(8))));
        registry.track(session("b", Some(now - TimeDelta::seconds(2))));
        registry.track(session("c", Some(now - TimeDelta::seconds(5))));
        registry.track(session("d", Some(now - TimeDelta::seconds(60))));

        let picked = registry
            .select_for_reuse_at(TimeDelta::seconds(10), now)
            .unwrap();
        assert_eq!(picked.name(), "b");
    }

    #[test]
    fn test_unbounded_age_accepts_any_dated_session() {
        let now = Utc::now();
        let registry = SessionRegistry::new();
        registry.track(session("ancient", Some(now - TimeDelta::days(3650))));

        let picked = registry.select_for_reuse_at(TimeDelta::MAX, now).unwrap();
        assert_eq!(picked.name(), "ancient");
        let lease = registry.checkout(TimeDelta::MAX).unwrap();
        assert_eq!(lease.session().name(), "ancient");
    }

    #[test]
    fn test_track_overwrites_as_refresh() {
        let now = Utc::now();
        let registry = SessionRegistry::new();
        assert!(registry.track(session("a", None)).is_none());
        let previous = registry.track(session("a", Some(now))).unwrap();
        assert!(previous.last_used_at_opt().is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.select_for_reuse_at(TimeDelta::seconds(1), now).is_ok());
    }

    #[test]
    fn test_checkout_is_exclusive() {
        let now = Utc::now();
        let registry = SessionRegistry::new();
        registry.track(session("only", Some(now)));

        let lease = registry.checkout_at(TimeDelta::seconds(10), now).unwrap();
        assert_eq!(lease.session().name(), "only");
        assert_eq!(registry.in_use_count(), 1);
        assert!(
            registry
                .checkout_at(TimeDelta::seconds(10), now)
                .unwrap_err()
                .is_no_available_session()
        );

        drop(lease);
        assert_eq!(registry.in_use_count(), 0);
        let refreshed = registry.get("projects/p/instances/i/databases/d/sessions/only").unwrap();
        assert!(refreshed.last_used_at().unwrap() >= now);
    }

    #[test]
    fn test_discarded_lease_forgets_session() {
        let registry = SessionRegistry::new();
        let lease = registry.track_leased(session("gone", Some(Utc::now())));
        assert_eq!(registry.in_use_count(), 1);
        lease.discard();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_evict_returns_stale_and_keeps_fresh() {
        let now = Utc::now();
        let registry = SessionRegistry::new();
        registry.track(session("fresh", Some(now)));
        registry.track(session("stale", Some(now - TimeDelta::hours(2))));
        registry.track(session("unknown", None));

        let mut evicted: Vec<String> = registry
            .evict(now - TimeDelta::hours(1))
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        evicted.sort();
        assert_eq!(evicted, vec!["stale", "unknown"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_evict_leaves_leased_sessions() {
        let now = Utc::now();
        let registry = SessionRegistry::new();
        registry.track(session("busy", Some(now - TimeDelta::hours(2))));
        let _lease = registry.checkout_at(TimeDelta::hours(3), now).unwrap();

        assert!(registry.evict(now).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_evict_expired_uses_policy() {
        let now = Utc::now();
        let registry = SessionRegistry::with_policy(IdleAgePolicy::new(TimeDelta::minutes(5)));
        registry.track(session("a", Some(now - TimeDelta::minutes(6))));
        registry.track(session("b", Some(now - TimeDelta::minutes(1))));

        let evicted = registry.evict_expired_at(now);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].name(), "a");
    }

    #[test]
    fn test_concurrent_select_and_track() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        registry.track(session("seed", Some(now)));

        std::thread::scope(|scope| {
            for i in 0..4 {
                let registry = registry.clone();
                scope.spawn(move || {
                    registry.track(session(&format!("t{i}"), Some(Utc::now())));
                });
            }
            for _ in 0..4 {
                let registry = registry.clone();
                scope.spawn(move || {
                    assert!(registry.select_for_reuse(TimeDelta::minutes(1)).is_ok());
                });
            }
        });
        assert_eq!(registry.len(), 5);
    }
}
