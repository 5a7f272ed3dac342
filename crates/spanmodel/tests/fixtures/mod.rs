//! In-memory `SpannerClient` for the facade integration tests.

#![allow(dead_code, clippy::manual_async_fn)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use asupersync::{Cx, Outcome};
use chrono::Utc;
use serde_json::json;
use spanmodel::{ClientError, ClientErrorKind, Error, ReadRpc, SpannerClient};
use spanmodel_core::format_timestamp;

pub const DATABASE: &str = "projects/p/instances/i/databases/d";

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

/// Poll a request future exactly once, without a runtime.
pub fn poll_once<F: Future>(fut: Pin<&mut F>) -> Poll<F::Output> {
    fut.poll(&mut Context::from_waker(Waker::noop()))
}

#[derive(Debug, Default)]
pub struct FakeState {
    next_session: usize,
    /// Every RPC in call order, e.g. `"create s1"`, `"read s1"`.
    pub log: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub reads: Vec<(ReadRpc, serde_json::Value)>,
    pub commits: Vec<serde_json::Value>,
    pub read_response: serde_json::Value,
    /// Fail the next read with this kind.
    pub fail_next_read: Option<ClientErrorKind>,
    pub fail_deletes: bool,
    /// Reads and deletes never complete while set.
    pub hang_reads: bool,
    pub hang_deletes: bool,
    /// Report sessions without timestamps.
    pub omit_timestamps: bool,
}

/// Cloneable handle onto one shared fake server.
#[derive(Debug, Clone, Default)]
pub struct FakeSpanner {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeSpanner {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state().read_response = singers_result();
        fake
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state lock")
    }

    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }
}

fn short(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

impl SpannerClient for FakeSpanner {
    fn create_session(
        &self,
        _cx: &Cx,
        database: &str,
        body: &serde_json::Value,
    ) -> impl std::future::Future<Output = Outcome<serde_json::Value, Error>> + Send {
        let response = {
            let mut state = self.state();
            state.next_session += 1;
            let name = format!("{database}/sessions/s{}", state.next_session);
            state.log.push(format!("create {}", short(&name)));
            state.created.push(name.clone());
            if state.omit_timestamps {
                json!({ "name": name })
            } else {
                json!({
                    "name": name,
                    "createTime": format_timestamp(&Utc::now()),
                    "labels": body["session"]["labels"].clone(),
                })
            }
        };
        async move { Outcome::Ok(response) }
    }

    fn delete_session(
        &self,
        _cx: &Cx,
        session: &str,
    ) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        let (hang, outcome) = {
            let mut state = self.state();
            state.log.push(format!("delete {}", short(session)));
            let outcome = if state.fail_deletes {
                Outcome::Err(Error::Client(ClientError::new(
                    ClientErrorKind::Rpc,
                    "delete failed",
                )))
            } else {
                state.deleted.push(session.to_string());
                Outcome::Ok(())
            };
            (state.hang_deletes, outcome)
        };
        hang_then(hang, outcome)
    }

    fn read(
        &self,
        _cx: &Cx,
        rpc: ReadRpc,
        session: &str,
        body: &serde_json::Value,
    ) -> impl std::future::Future<Output = Outcome<serde_json::Value, Error>> + Send {
        let (hang, outcome) = {
            let mut state = self.state();
            state.log.push(format!("read {}", short(session)));
            state.reads.push((rpc, body.clone()));
            let outcome = match state.fail_next_read.take() {
                Some(kind) => Outcome::Err(Error::Client(ClientError::new(kind, "read failed"))),
                None => Outcome::Ok(state.read_response.clone()),
            };
            (state.hang_reads, outcome)
        };
        hang_then(hang, outcome)
    }

    fn commit(
        &self,
        _cx: &Cx,
        session: &str,
        body: &serde_json::Value,
    ) -> impl std::future::Future<Output = Outcome<serde_json::Value, Error>> + Send {
        let response = {
            let mut state = self.state();
            state.log.push(format!("commit {}", short(session)));
            state.commits.push(body.clone());
            json!({ "commitTimestamp": "2024-06-01T12:00:00.000000001Z" })
        };
        async move { Outcome::Ok(response) }
    }
}

async fn hang_then<T>(hang: bool, outcome: Outcome<T, Error>) -> Outcome<T, Error> {
    if hang {
        std::future::pending::<()>().await;
    }
    outcome
}

/// Two singers, one with preferences stored as JSON text.
pub fn singers_result() -> serde_json::Value {
    json!({
        "metadata": {
            "rowType": {
                "fields": [
                    { "name": "SingerId", "type": { "code": "INT64" } },
                    { "name": "Name", "type": { "code": "STRING" } },
                    { "name": "Prefs", "type": { "code": "JSON" } },
                ]
            },
            "transaction": { "readTimestamp": "2024-06-01T00:00:00Z" }
        },
        "rows": [
            ["1", "Ada", "{\"theme\":\"dark\"}"],
            ["2", "Grace", null],
        ]
    })
}
