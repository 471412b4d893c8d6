use crate::error::{LockError, Result};
use crate::notify::EventKind;
use crate::persister::{PersistOutcome, Persister};
use crate::singleton::Singleton;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A persister call, as observed by [`ScriptedPersister`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Persist(String),
    Delete(String),
    Exists(String),
}

#[derive(Default)]
struct Script {
    persist: VecDeque<Result<PersistOutcome>>,
    delete: VecDeque<Result<()>>,
    exists: VecDeque<Result<bool>>,
    calls: Vec<Call>,
}

/// Persister that replays queued results and records every call.
///
/// An unscripted call panics so a test fails loudly when the controller
/// makes more backend calls than expected.
#[derive(Clone, Default)]
pub(crate) struct ScriptedPersister {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPersister {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on_persist(&self, result: Result<PersistOutcome>) -> &Self {
        self.lock().persist.push_back(result);
        self
    }

    pub(crate) fn on_delete(&self, result: Result<()>) -> &Self {
        self.lock().delete.push_back(result);
        self
    }

    pub(crate) fn on_exists(&self, result: Result<bool>) -> &Self {
        self.lock().exists.push_back(result);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

#[async_trait]
impl Persister for ScriptedPersister {
    async fn persist_lock(&self, name: &str) -> Result<PersistOutcome> {
        let mut script = self.lock();
        script.calls.push(Call::Persist(name.to_string()));
        script
            .persist
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted persist_lock({name})"))
    }

    async fn delete_lock(&self, name: &str) -> Result<()> {
        let mut script = self.lock();
        script.calls.push(Call::Delete(name.to_string()));
        script
            .delete
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted delete_lock({name})"))
    }

    async fn lock_exists(&self, name: &str) -> Result<bool> {
        let mut script = self.lock();
        script.calls.push(Call::Exists(name.to_string()));
        script
            .exists
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted lock_exists({name})"))
    }
}

pub(crate) fn backend_error(message: &str) -> LockError {
    LockError::Backend(message.to_string())
}

/// A notification captured by [`record_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Seen {
    pub kind: EventKind,
    pub message: String,
    pub error: Option<String>,
}

/// Subscribe to every notification of `singleton` and collect them.
pub(crate) fn record_events(singleton: &Singleton) -> Arc<Mutex<Vec<Seen>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    singleton.subscribe_all(move |n| {
        sink.lock().unwrap().push(Seen {
            kind: n.kind,
            message: n.message.clone(),
            error: n.error.map(|e| e.to_string()),
        });
    });
    seen
}

pub(crate) fn kinds(seen: &Arc<Mutex<Vec<Seen>>>) -> Vec<EventKind> {
    seen.lock().unwrap().iter().map(|s| s.kind).collect()
}
