//! The transport seam.
//!
//! A [`SpannerClient`] moves REST request bodies to the server and response
//! bodies back. It owns authentication, channels and retry policy; everything
//! above it (session reuse, bounds, casting, mutation events) lives in
//! [`Database`](crate::Database).

use std::future::Future;

use spanmodel_core::{Cx, Error, Outcome};

/// The RPC a read is dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRpc {
    /// `sessions.read`: rows by key set.
    Read,
    /// `sessions.executeSql`: rows by SQL.
    ExecuteSql,
}

impl ReadRpc {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReadRpc::Read => "read",
            ReadRpc::ExecuteSql => "executeSql",
        }
    }
}

/// Raw access to the session-scoped RPCs of a Spanner-style database.
///
/// Implementations report "session does not exist" as a
/// [`ClientErrorKind::SessionNotFound`](spanmodel_core::ClientErrorKind)
/// client error so the caller can stop reusing that handle.
pub trait SpannerClient: Send + Sync {
    /// `sessions.create` on `database` (a full database path). Returns the
    /// `Session` resource.
    fn create_session(
        &self,
        cx: &Cx,
        database: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Outcome<serde_json::Value, Error>> + Send;

    /// `sessions.delete` on `session` (a full session name).
    fn delete_session(
        &self,
        cx: &Cx,
        session: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// `sessions.read` or `sessions.executeSql`. Returns the `ResultSet`
    /// resource.
    fn read(
        &self,
        cx: &Cx,
        rpc: ReadRpc,
        session: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Outcome<serde_json::Value, Error>> + Send;

    /// `sessions.commit`. Returns the `CommitResponse` resource.
    fn commit(
        &self,
        cx: &Cx,
        session: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Outcome<serde_json::Value, Error>> + Send;
}
