//! Resource paths for databases and sessions.
//!
//! Spanner names every server resource with a slash-delimited path:
//! `projects/{p}/instances/{i}/databases/{d}/sessions/{s}`. These types
//! validate and split such paths; the compiled patterns are cached the same
//! way `validate::matches_pattern` caches its regexes.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

const SEGMENT: &str = r"[A-Za-z0-9][A-Za-z0-9_\-.]*";

fn database_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"^projects/({SEGMENT})/instances/({SEGMENT})/databases/({SEGMENT})$"
        ))
        .expect("database path pattern is valid")
    })
}

fn session_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"^projects/({SEGMENT})/instances/({SEGMENT})/databases/({SEGMENT})/sessions/({SEGMENT})$"
        ))
        .expect("session path pattern is valid")
    })
}

/// `projects/{project}/instances/{instance}/databases/{database}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabasePath {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl DatabasePath {
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
            database: database.into(),
        }
    }

    pub fn parse(path: &str) -> Result<Self> {
        let caps = database_pattern()
            .captures(path)
            .ok_or_else(|| Error::Custom(format!("invalid database path: '{}'", path)))?;
        Ok(Self::new(&caps[1], &caps[2], &caps[3]))
    }

    /// Path of a session inside this database.
    pub fn session(&self, session: impl Into<String>) -> SessionPath {
        SessionPath {
            database: self.clone(),
            session: session.into(),
        }
    }
}

impl fmt::Display for DatabasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

/// `projects/{project}/instances/{instance}/databases/{database}/sessions/{session}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionPath {
    pub database: DatabasePath,
    pub session: String,
}

impl SessionPath {
    pub fn parse(path: &str) -> Result<Self> {
        let caps = session_pattern()
            .captures(path)
            .ok_or_else(|| Error::Custom(format!("invalid session path: '{}'", path)))?;
        Ok(DatabasePath::new(&caps[1], &caps[2], &caps[3]).session(&caps[4]))
    }
}

impl fmt::Display for SessionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/sessions/{}", self.database, self.session)
    }
}
