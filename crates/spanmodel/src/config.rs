//! Database handle configuration.

use chrono::TimeDelta;
use spanmodel_core::{DatabasePath, Result};
use spanmodel_session::SessionPoolConfig;

/// Everything a [`Database`](crate::Database) needs besides its client.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// The database every session is created in.
    pub path: DatabasePath,
    /// Session reuse and eviction settings.
    pub pool: SessionPoolConfig,
    /// Ask the server to report the timestamp each read ran at (default: true).
    pub return_read_timestamp: bool,
}

impl DatabaseConfig {
    /// Create a configuration for `path` with default values.
    pub fn new(path: DatabasePath) -> Self {
        Self {
            path,
            pool: SessionPoolConfig::default(),
            return_read_timestamp: true,
        }
    }

    /// Create a configuration from a `projects/.../databases/...` path.
    pub fn parse(path: &str) -> Result<Self> {
        Ok(Self::new(DatabasePath::parse(path)?))
    }

    /// Replace the session pool settings.
    #[must_use]
    pub fn pool(mut self, pool: SessionPoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the maximum number of tracked sessions.
    #[must_use]
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.pool = self.pool.max_sessions(max);
        self
    }

    /// Set the idle age used for session reuse and eviction.
    #[must_use]
    pub fn max_idle(mut self, max_idle: TimeDelta) -> Self {
        self.pool = self.pool.max_idle(max_idle);
        self
    }

    /// Add a label applied to created sessions.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pool = self.pool.label(key, value);
        self
    }

    #[must_use]
    pub fn return_read_timestamp(mut self, enabled: bool) -> Self {
        self.return_read_timestamp = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_defaults() {
        let cfg = DatabaseConfig::parse("projects/p/instances/i/databases/d").unwrap();
        assert_eq!(cfg.path.to_string(), "projects/p/instances/i/databases/d");
        assert!(cfg.return_read_timestamp);
        assert_eq!(cfg.pool.max_sessions, 100);
    }

    #[test]
    fn test_builder_forwards_to_pool() {
        let cfg = DatabaseConfig::new(DatabasePath::new("p", "i", "d"))
            .max_sessions(2)
            .max_idle(TimeDelta::minutes(1))
            .label("env", "test")
            .return_read_timestamp(false);
        assert_eq!(cfg.pool.max_sessions, 2);
        assert_eq!(cfg.pool.max_idle, TimeDelta::minutes(1));
        assert_eq!(cfg.pool.labels.len(), 1);
        assert!(!cfg.return_read_timestamp);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_path_is_rejected() {
        assert!(DatabaseConfig::parse("databases/d").is_err());
    }
}
