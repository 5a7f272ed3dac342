//! Immutable snapshot of a server-side session handle.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use spanmodel_core::{Error, Result, SessionError, SessionPath, parse_timestamp};

/// Short name used when a full name has no non-empty segment.
pub const UNDEFINED_SESSION_NAME: &str = "undefined";

/// Last non-empty `/`-delimited segment of `full_name`, or
/// [`UNDEFINED_SESSION_NAME`] when there is none.
pub fn short_session_name(full_name: &str) -> &str {
    full_name
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(UNDEFINED_SESSION_NAME)
}

/// Identity and timing metadata of a session, as reported by the server.
///
/// A `SessionInfo` never changes after construction. To reflect newer
/// metadata, build a new instance from a new response (or use
/// [`SessionInfo::with_last_used_at`], which also returns a new instance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    full_name: String,
    name: String,
    created_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    labels: BTreeMap<String, String>,
}

impl SessionInfo {
    /// Build from already-known parts.
    pub fn new(
        full_name: impl Into<String>,
        created_at: Option<DateTime<Utc>>,
        last_used_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let full_name = full_name.into();
        if full_name.trim().is_empty() {
            return Err(Error::Session(SessionError::invalid_response(
                "session name is empty",
            )));
        }
        let name = short_session_name(&full_name).to_string();
        Ok(Self {
            full_name,
            name,
            created_at,
            last_used_at,
            labels: BTreeMap::new(),
        })
    }

    /// Build from a `Session` resource returned by `CreateSession`,
    /// `BatchCreateSessions` or `GetSession`.
    ///
    /// Reads `name`, `createTime`, `approximateLastUseTime` and `labels`.
    /// Timestamps that are missing stay unset; timestamps that are present but
    /// unparseable are logged and also left unset rather than guessed.
    pub fn from_response(response: &serde_json::Value) -> Result<Self> {
        let full_name = match response.get("name") {
            Some(serde_json::Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(Error::Session(SessionError::invalid_response(
                    "session name is not a string",
                )));
            }
            None => {
                return Err(Error::Session(SessionError::invalid_response(
                    "session response has no name",
                )));
            }
        };

        let created_at = response_timestamp(response, "createTime", full_name);
        let last_used_at = response_timestamp(response, "approximateLastUseTime", full_name);
        let mut info = Self::new(full_name, created_at, last_used_at)?;

        if let Some(labels) = response.get("labels").and_then(|l| l.as_object()) {
            info.labels = labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect();
        }
        Ok(info)
    }

    /// Canonical server-assigned path.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Short identifier (final path segment).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structured form of [`full_name`](Self::full_name), when it is a
    /// well-formed session path.
    pub fn path(&self) -> Option<SessionPath> {
        SessionPath::parse(&self.full_name).ok()
    }

    /// Creation time. Fails with `TimestampUnavailable` if the server did not
    /// report one; callers should read that as "unknown".
    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        self.created_at.ok_or_else(|| {
            Error::Session(SessionError::timestamp_unavailable(
                "createTime",
                &self.full_name,
            ))
        })
    }

    /// Last-use time. Fails with `TimestampUnavailable` if unreported.
    pub fn last_used_at(&self) -> Result<DateTime<Utc>> {
        self.last_used_at.ok_or_else(|| {
            Error::Session(SessionError::timestamp_unavailable(
                "approximateLastUseTime",
                &self.full_name,
            ))
        })
    }

    pub fn created_at_opt(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn last_used_at_opt(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    /// Most recent known activity: last use, else creation.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_used_at.or(self.created_at)
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// New snapshot identical to this one except for the last-use time.
    #[must_use]
    pub fn with_last_used_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_used_at: Some(at),
            ..self.clone()
        }
    }
}

fn response_timestamp(
    response: &serde_json::Value,
    field: &str,
    session: &str,
) -> Option<DateTime<Utc>> {
    let raw = response.get(field)?.as_str()?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        tracing::warn!(
            target: "spanmodel::session",
            session = session,
            field = field,
            value = raw,
            "Ignoring unparseable session timestamp"
        );
    }
    parsed
}
