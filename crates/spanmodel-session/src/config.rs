//! Session pool configuration.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use spanmodel_core::{Error, Result};

use crate::registry::DEFAULT_MAX_IDLE;

/// How many sessions a database handle may hold and how long they stay reusable.
#[derive(Debug, Clone)]
pub struct SessionPoolConfig {
    /// Upper bound on tracked sessions (default: 100).
    pub max_sessions: usize,
    /// Idle age after which a session is neither reused nor kept (default: 50 minutes).
    ///
    /// The server deletes sessions idle for roughly an hour, so this should
    /// stay comfortably below that.
    pub max_idle: TimeDelta,
    /// Labels attached to every session this pool creates.
    pub labels: BTreeMap<String, String>,
}

impl Default for SessionPoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            max_idle: DEFAULT_MAX_IDLE,
            labels: BTreeMap::new(),
        }
    }
}

impl SessionPoolConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tracked sessions.
    #[must_use]
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the idle age used for reuse and eviction.
    #[must_use]
    pub fn max_idle(mut self, max_idle: TimeDelta) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Add a label applied to created sessions.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Reject configurations that could never hand out a session.
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(Error::Custom(
                "session pool max_sessions must be greater than 0".to_string(),
            ));
        }
        if self.max_idle <= TimeDelta::zero() {
            return Err(Error::Custom(
                "session pool max_idle must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SessionPoolConfig::new();
        assert_eq!(cfg.max_sessions, 100);
        assert_eq!(cfg.max_idle, TimeDelta::minutes(50));
        assert!(cfg.labels.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let cfg = SessionPoolConfig::new()
            .max_sessions(4)
            .max_idle(TimeDelta::minutes(5))
            .label("app", "billing");
        assert_eq!(cfg.max_sessions, 4);
        assert_eq!(cfg.labels.get("app").map(String::as_str), Some("billing"));
    }

    #[test]
    fn test_validate_rejects_zero_sessions_and_idle() {
        assert!(SessionPoolConfig::new().max_sessions(0).validate().is_err());
        assert!(
            SessionPoolConfig::new()
                .max_idle(TimeDelta::zero())
                .validate()
                .is_err()
        );
    }
}
