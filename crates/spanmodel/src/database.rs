//! The database handle: session reuse, bounded reads and observed writes.
//!
//! # Example
//!
//! ```ignore
//! let mut db = Database::new(client, DatabaseConfig::parse("projects/p/instances/i/databases/d")?)?;
//! db.on_mutating(|event: &MutationEvent| -> Result<()> {
//!     tracing::info!(table = %event.table, "audit");
//!     Ok(())
//! });
//!
//! let rows = db
//!     .read(&cx, &ReadBuilder::new("Singers")
//!         .columns(&["SingerId", "Name"])
//!         .with_staleness(TimestampBound::max_staleness(TimeDelta::seconds(10))?))
//!     .await;
//! ```

use chrono::{DateTime, Utc};
use serde_json::json;
use spanmodel_core::{Cx, Error, Outcome, ResultSet, Result, SessionError, parse_timestamp};
use spanmodel_query::{
    MutationObserver, MutationObservers, ReadBuilder, ReadRequest, WriteBuilder, WriteRequest,
    decode_result_set,
};
use spanmodel_session::{EvictionPolicy, IdleAgePolicy, SessionInfo, SessionLease, SessionRegistry};

use crate::client::{ReadRpc, SpannerClient};
use crate::config::DatabaseConfig;

/// A handle to one database.
///
/// Owns the session registry and the mutation observers; shares nothing
/// process-wide. Every read and write leases a session for its duration.
/// A lease is returned when the request finishes or its future is dropped.
pub struct Database<C: SpannerClient> {
    client: C,
    config: DatabaseConfig,
    registry: SessionRegistry,
    observers: MutationObservers,
}

impl<C: SpannerClient> std::fmt::Debug for Database<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.config.path.to_string())
            .field("registry", &self.registry)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl<C: SpannerClient> Database<C> {
    /// Create a handle whose sessions expire after `config.pool.max_idle`.
    pub fn new(client: C, config: DatabaseConfig) -> Result<Self> {
        let policy = IdleAgePolicy::new(config.pool.max_idle);
        Self::with_policy(client, config, policy)
    }

    /// Create a handle with a custom eviction policy.
    pub fn with_policy(
        client: C,
        config: DatabaseConfig,
        policy: impl EvictionPolicy + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            registry: SessionRegistry::with_policy(policy),
            observers: MutationObservers::new(),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn observers(&self) -> &MutationObservers {
        &self.observers
    }

    /// Register an observer notified before every write.
    pub fn on_mutating(&mut self, observer: impl MutationObserver + 'static) -> &mut Self {
        self.observers.on_mutating(observer);
        self
    }

    /// Lease a session: reuse an idle one if possible, otherwise create one.
    ///
    /// When the pool already holds `max_sessions` handles, expired ones are
    /// evicted first. Fails with `NoAvailableSession` if the pool is still full.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn session(&self, cx: &Cx) -> Outcome<SessionLease, Error> {
        match self.registry.checkout(self.config.pool.max_idle) {
            Ok(lease) => return Outcome::Ok(lease),
            Err(e) if e.is_no_available_session() => {}
            Err(e) => return Outcome::Err(e),
        }

        let mut tracked = self.registry.len();
        if tracked >= self.config.pool.max_sessions {
            // Expired sessions are never handed out; close them before
            // counting against the cap.
            match self.evict_idle(cx).await {
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
            tracked = self.registry.len();
        }
        if tracked >= self.config.pool.max_sessions {
            tracing::warn!(
                tracked,
                in_use = self.registry.in_use_count(),
                max_sessions = self.config.pool.max_sessions,
                "Session pool exhausted"
            );
            return Outcome::Err(Error::Session(SessionError::no_available(format!(
                "{} sessions tracked and none reusable",
                tracked
            ))));
        }

        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let database = self.config.path.to_string();
        let body = json!({ "session": { "labels": self.config.pool.labels } });
        let response = match self.client.create_session(cx, &database, &body).await {
            Outcome::Ok(r) => r,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let info = match SessionInfo::from_response(&response) {
            Ok(info) => info,
            Err(e) => {
                tracing::error!(error = %e, "Session creation returned a malformed response");
                return Outcome::Err(e);
            }
        };
        tracing::info!(session = %info.name(), tracked = tracked + 1, "Created session");
        Outcome::Ok(self.registry.track_leased(info))
    }

    /// Build and run a read.
    pub async fn read(&self, cx: &Cx, builder: &ReadBuilder) -> Outcome<ResultSet, Error> {
        match builder.build() {
            Ok(request) => self.read_request(cx, &request).await,
            Err(e) => Outcome::Err(e),
        }
    }

    /// Run a built read on a leased session and decode its JSON columns.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, request),
        fields(table = %request.table(), bound = %request.bound())
    )]
    pub async fn read_request(&self, cx: &Cx, request: &ReadRequest) -> Outcome<ResultSet, Error> {
        let lease = match self.session(cx).await {
            Outcome::Ok(lease) => lease,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let session = lease.session().full_name().to_string();
        let rpc = if request.is_sql() {
            ReadRpc::ExecuteSql
        } else {
            ReadRpc::Read
        };
        let body = request.to_wire(&session, self.config.return_read_timestamp);
        tracing::debug!(session = %lease.session().name(), rpc = rpc.as_str(), "Dispatching read");

        let response = match self.client.read(cx, rpc, &session, &body).await {
            Outcome::Ok(r) => r,
            Outcome::Err(e) => {
                release_after_error(lease, &e);
                return Outcome::Err(e);
            }
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        drop(lease);

        let mut set = match ResultSet::from_wire(&response) {
            Ok(set) => set,
            Err(e) => return Outcome::Err(e),
        };
        if let Err(e) = decode_result_set(&mut set) {
            return Outcome::Err(e);
        }
        tracing::debug!(rows = set.len(), "Read complete");
        Outcome::Ok(set)
    }

    /// Build and commit one write. Observers run before any RPC is made.
    ///
    /// Returns the commit timestamp, when the server reports one.
    pub async fn write(
        &self,
        cx: &Cx,
        builder: &WriteBuilder,
    ) -> Outcome<Option<DateTime<Utc>>, Error> {
        self.write_all(cx, std::slice::from_ref(builder)).await
    }

    /// Build several writes and commit them atomically.
    ///
    /// Each write raises its own mutation event; if any is vetoed, none is
    /// committed.
    pub async fn write_all(
        &self,
        cx: &Cx,
        builders: &[WriteBuilder],
    ) -> Outcome<Option<DateTime<Utc>>, Error> {
        let requests = match builders
            .iter()
            .map(|b| b.build(&self.observers))
            .collect::<Result<Vec<_>>>()
        {
            Ok(requests) => requests,
            Err(e) => return Outcome::Err(e),
        };
        self.commit(cx, &requests).await
    }

    /// Commit already-built writes in a single-use read-write transaction.
    #[tracing::instrument(level = "debug", skip(self, cx, requests), fields(mutations = requests.len()))]
    pub async fn commit(
        &self,
        cx: &Cx,
        requests: &[WriteRequest],
    ) -> Outcome<Option<DateTime<Utc>>, Error> {
        if requests.is_empty() {
            return Outcome::Ok(None);
        }
        let lease = match self.session(cx).await {
            Outcome::Ok(lease) => lease,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let session = lease.session().full_name().to_string();
        let mutations: Vec<serde_json::Value> = requests.iter().map(WriteRequest::to_wire).collect();
        let body = json!({
            "singleUseTransaction": { "readWrite": {} },
            "mutations": mutations,
        });

        let response = match self.client.commit(cx, &session, &body).await {
            Outcome::Ok(r) => r,
            Outcome::Err(e) => {
                release_after_error(lease, &e);
                return Outcome::Err(e);
            }
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let committed_at = response
            .get("commitTimestamp")
            .and_then(serde_json::Value::as_str)
            .and_then(parse_timestamp);
        tracing::debug!(session = %lease.session().name(), "Commit complete");
        Outcome::Ok(committed_at)
    }

    /// Evict expired idle sessions and delete them on the server.
    ///
    /// A failed delete is logged and otherwise ignored: the server drops idle
    /// sessions on its own eventually. Sessions not yet deleted when eviction
    /// is cancelled stay tracked.
    pub async fn evict_idle(&self, cx: &Cx) -> Outcome<Vec<SessionInfo>, Error> {
        self.evict_idle_at(cx, Utc::now()).await
    }

    /// [`evict_idle`](Self::evict_idle) against an explicit clock.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn evict_idle_at(
        &self,
        cx: &Cx,
        now: DateTime<Utc>,
    ) -> Outcome<Vec<SessionInfo>, Error> {
        let evicted = self.registry.evict_expired_at(now);
        let mut pending = PendingDeletes::new(&self.registry, &evicted);
        while let Some(info) = pending.current() {
            match self.client.delete_session(cx, info.full_name()).await {
                Outcome::Ok(()) => {
                    tracing::debug!(session = %info.name(), "Deleted evicted session");
                }
                Outcome::Err(e) => {
                    tracing::warn!(session = %info.name(), error = %e, "Failed to delete evicted session");
                }
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
            pending.advance();
        }
        Outcome::Ok(evicted)
    }
}

/// Evicted sessions whose server-side delete has not completed yet.
///
/// If eviction stops early (a cancelled outcome, or the future is dropped),
/// the rest go back into the registry so a later pass deletes them.
struct PendingDeletes<'a> {
    registry: &'a SessionRegistry,
    remaining: Vec<SessionInfo>,
}

impl<'a> PendingDeletes<'a> {
    fn new(registry: &'a SessionRegistry, evicted: &[SessionInfo]) -> Self {
        Self {
            registry,
            remaining: evicted.iter().rev().cloned().collect(),
        }
    }

    fn current(&self) -> Option<SessionInfo> {
        self.remaining.last().cloned()
    }

    fn advance(&mut self) {
        self.remaining.pop();
    }
}

impl Drop for PendingDeletes<'_> {
    fn drop(&mut self) {
        if self.remaining.is_empty() {
            return;
        }
        let skipped: Vec<&str> = self.remaining.iter().map(SessionInfo::name).collect();
        tracing::warn!(
            skipped = ?skipped,
            "Eviction stopped before deleting every session; keeping the rest tracked"
        );
        for info in self.remaining.drain(..) {
            self.registry.track(info);
        }
    }
}

fn release_after_error(lease: SessionLease, err: &Error) {
    if err.is_session_not_found() {
        tracing::warn!(session = %lease.session().name(), "Server no longer knows session; discarding");
        lease.discard();
    }
}
