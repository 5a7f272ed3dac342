//! Pre-write mutation events.
//!
//! Every write raises exactly one [`MutationEvent`] before anything is sent
//! to the server. Observers run synchronously, in registration order, on the
//! caller's task. An observer returning an error vetoes the write.

use std::fmt;
use std::sync::Arc;

use spanmodel_core::{Error, MutationError, Result, Value};

/// The kind of change a write performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationCommand {
    Insert,
    Update,
    Delete,
    Upsert,
}

impl MutationCommand {
    pub const fn as_str(self) -> &'static str {
        match self {
            MutationCommand::Insert => "insert",
            MutationCommand::Update => "update",
            MutationCommand::Delete => "delete",
            MutationCommand::Upsert => "upsert",
        }
    }

    /// Field name of this command inside a `Mutation` message.
    pub const fn wire_key(self) -> &'static str {
        match self {
            MutationCommand::Insert => "insert",
            MutationCommand::Update => "update",
            MutationCommand::Delete => "delete",
            MutationCommand::Upsert => "insertOrUpdate",
        }
    }
}

impl fmt::Display for MutationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write about to be transmitted.
///
/// Values are already cast for the wire, so an observer sees exactly what the
/// server will receive.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent {
    pub table: String,
    pub command: MutationCommand,
    /// Column name to value, in column order.
    pub values: Vec<(String, Value)>,
}

impl MutationEvent {
    pub fn new(
        table: impl Into<String>,
        command: MutationCommand,
        values: Vec<(String, Value)>,
    ) -> Self {
        Self {
            table: table.into(),
            command,
            values,
        }
    }

    /// Value written to `column`, if the write touches it.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }
}

/// Receives every [`MutationEvent`] before the write goes out.
///
/// Returning an error aborts the write; the error reaches the caller as
/// `MutationRejected`.
pub trait MutationObserver: Send + Sync {
    fn on_mutating(&self, event: &MutationEvent) -> Result<()>;
}

impl<F> MutationObserver for F
where
    F: Fn(&MutationEvent) -> Result<()> + Send + Sync,
{
    fn on_mutating(&self, event: &MutationEvent) -> Result<()> {
        self(event)
    }
}

/// The set of observers injected into the write path.
///
/// Cloning is cheap and shares the observers themselves.
#[derive(Clone, Default)]
pub struct MutationObservers {
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl MutationObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Observers are notified in registration order.
    pub fn on_mutating(&mut self, observer: impl MutationObserver + 'static) -> &mut Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notify every observer of `event`. The first failure stops dispatch.
    pub fn dispatch(&self, event: &MutationEvent) -> Result<()> {
        for observer in &self.observers {
            if let Err(err) = observer.on_mutating(event) {
                tracing::warn!(
                    table = %event.table,
                    command = event.command.as_str(),
                    error = %err,
                    "Mutation rejected by observer"
                );
                return Err(reject(event, err));
            }
        }
        tracing::trace!(
            table = %event.table,
            command = event.command.as_str(),
            observers = self.observers.len(),
            "Mutation event dispatched"
        );
        Ok(())
    }
}

impl fmt::Debug for MutationObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObservers")
            .field("count", &self.observers.len())
            .finish()
    }
}

fn reject(event: &MutationEvent, err: Error) -> Error {
    match err {
        Error::Mutation(inner) => Error::Mutation(inner),
        other => {
            let mut rejected =
                MutationError::rejected(&event.table, event.command.as_str(), other.to_string());
            rejected.source = Some(Box::new(other));
            Error::Mutation(rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event() -> MutationEvent {
        MutationEvent::new(
            "Singers",
            MutationCommand::Insert,
            vec![
                ("SingerId".to_string(), Value::Int64(1)),
                ("Name".to_string(), Value::Text("Ada".to_string())),
            ],
        )
    }

    #[test]
    fn test_event_accessors() {
        let event = event();
        assert_eq!(event.get("Name"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(event.get("Missing"), None);
        assert_eq!(event.columns().collect::<Vec<_>>(), ["SingerId", "Name"]);
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = MutationObservers::new();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            observers.on_mutating(move |_: &MutationEvent| -> Result<()> {
                seen.lock().unwrap().push(tag);
                Ok(())
            });
        }
        observers.dispatch(&event()).unwrap();
        assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn test_observer_error_becomes_mutation_rejected() {
        let mut observers = MutationObservers::new();
        observers.on_mutating(|_: &MutationEvent| -> Result<()> {
            Err(Error::Custom("audit offline".into()))
        });
        let err = observers.dispatch(&event()).unwrap_err();
        assert_eq!(err.category(), "MutationRejected");
        assert!(err.to_string().contains("audit offline"));
    }

    #[test]
    fn test_first_failure_stops_dispatch() {
        let calls = Arc::new(Mutex::new(0));
        let mut observers = MutationObservers::new();
        observers.on_mutating(|_: &MutationEvent| -> Result<()> {
            Err(Error::Mutation(MutationError::rejected("Singers", "insert", "no")))
        });
        let counter = Arc::clone(&calls);
        observers.on_mutating(move |_: &MutationEvent| -> Result<()> {
            *counter.lock().unwrap() += 1;
            Ok(())
        });
        assert!(observers.dispatch(&event()).is_err());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_wire_keys() {
        assert_eq!(MutationCommand::Upsert.wire_key(), "insertOrUpdate");
        assert_eq!(MutationCommand::Upsert.as_str(), "upsert");
        assert_eq!(MutationCommand::Delete.to_string(), "delete");
    }
}
