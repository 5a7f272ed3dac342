mod fixtures;

use std::sync::{Arc, Mutex};

use asupersync::Cx;
use asupersync::runtime::RuntimeBuilder;
use serde_json::json;

use fixtures::{DATABASE, FakeSpanner, expect_err, unwrap_outcome};
use spanmodel::prelude::*;
use spanmodel::MutationError;

fn database(fake: &FakeSpanner) -> Database<FakeSpanner> {
    Database::new(fake.clone(), DatabaseConfig::parse(DATABASE).expect("valid path"))
        .expect("valid config")
}

/// Observer that records every event into the fake server's RPC log, so the
/// test can see where the event lands relative to the commit.
fn record_into(
    fake: &FakeSpanner,
    events: &Arc<Mutex<Vec<MutationEvent>>>,
) -> impl Fn(&MutationEvent) -> Result<()> + Send + Sync + 'static {
    let fake = fake.clone();
    let events = Arc::clone(events);
    move |event: &MutationEvent| -> Result<()> {
        fake.state()
            .log
            .push(format!("event {} {}", event.command, event.table));
        events.lock().expect("events lock").push(event.clone());
        Ok(())
    }
}

#[test]
fn write_raises_one_event_before_commit() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let fake = FakeSpanner::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut db = database(&fake);
        db.on_mutating(record_into(&fake, &events));

        let committed_at = unwrap_outcome(
            db.write(
                &cx,
                &WriteBuilder::insert("Singers")
                    .set("SingerId", 1)
                    .set("Name", "Ada")
                    .set_json("Prefs", r#"{"theme":"dark"}"#),
            )
            .await,
        );
        assert!(committed_at.is_some());

        let events = events.lock().expect("events lock");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].table, "Singers");
        assert_eq!(events[0].command, MutationCommand::Insert);
        assert_eq!(events[0].get("SingerId"), Some(&Value::Int64(1)));
        assert_eq!(events[0].get("Name"), Some(&Value::Text("Ada".into())));
        assert_eq!(
            events[0].get("Prefs"),
            Some(&Value::Json(json!({ "theme": "dark" })))
        );

        assert_eq!(
            fake.log(),
            ["event insert Singers", "create s1", "commit s1"]
        );
        let state = fake.state();
        assert_eq!(
            state.commits[0]["mutations"][0]["insert"]["values"],
            json!([["1", "Ada", r#"{"theme":"dark"}"#]])
        );
        assert_eq!(
            state.commits[0]["singleUseTransaction"],
            json!({ "readWrite": {} })
        );
    });
}

#[test]
fn vetoed_write_never_reaches_the_server() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let fake = FakeSpanner::new();
        let mut db = database(&fake);
        db.on_mutating(|event: &MutationEvent| -> Result<()> {
            if event.table == "AuditLog" {
                return Err(Error::Mutation(MutationError::rejected(
                    &event.table,
                    event.command.as_str(),
                    "audit log is append-only",
                )));
            }
            Ok(())
        });

        let err = expect_err(
            db.write(&cx, &WriteBuilder::delete("AuditLog").set("EntryId", 9))
                .await,
        );
        assert_eq!(err.category(), "MutationRejected");
        assert!(fake.log().is_empty());

        unwrap_outcome(
            db.write(&cx, &WriteBuilder::upsert("Singers").set("SingerId", 2))
                .await,
        );
        assert_eq!(fake.log(), ["create s1", "commit s1"]);
    });
}

#[test]
fn batch_is_all_or_nothing() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let fake = FakeSpanner::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut db = database(&fake);
        db.on_mutating(record_into(&fake, &events));

        let batch = [
            WriteBuilder::insert("Singers").set("SingerId", 3),
            WriteBuilder::insert("Albums").set_json("Liner", 7),
        ];
        let err = expect_err(db.write_all(&cx, &batch).await);
        assert_eq!(err.category(), "UnsupportedCastInput");
        assert!(fake.state().commits.is_empty());

        let batch = [
            WriteBuilder::insert("Singers").set("SingerId", 3),
            WriteBuilder::update("Albums").set("AlbumId", 1).set("Title", "Blue"),
        ];
        unwrap_outcome(db.write_all(&cx, &batch).await);
        let state = fake.state();
        assert_eq!(state.commits.len(), 1);
        assert_eq!(
            state.commits[0]["mutations"]
                .as_array()
                .map(Vec::len),
            Some(2)
        );
    });
}

#[test]
fn error_observer_becomes_mutation_rejected() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let fake = FakeSpanner::new();
        let mut db = database(&fake);
        db.on_mutating(|_: &MutationEvent| -> Result<()> {
            Err(Error::Custom("replication lag too high".into()))
        });

        let err = expect_err(
            db.write(&cx, &WriteBuilder::insert("Singers").set("SingerId", 1))
                .await,
        );
        assert_eq!(err.category(), "MutationRejected");
        assert!(err.to_string().contains("replication lag too high"));
        assert!(fake.state().commits.is_empty());
    });
}
