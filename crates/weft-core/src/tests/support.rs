//! Shared fixtures for the crate's tests.
use std::any::Any;
use std::sync::{Arc, Mutex, Once};

use tracing_subscriber::{fmt, EnvFilter};

use crate::context::Context;
use crate::error::FlowError;
use crate::node::Node;
use crate::task::task_fn;

static INIT: Once = Once::new();

pub(crate) fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

/// Ordered record of which tasks ran, shared between tasks and assertions.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn sorted(&self) -> Vec<String> {
        let mut entries = self.entries();
        entries.sort();
        entries
    }
}

/// A leaf named `name` that records itself and succeeds.
pub(crate) fn step(name: &str, journal: &Journal) -> Node {
    let journal = journal.clone();
    let entry = name.to_string();
    Node::leaf(task_fn(name, move |_| {
        journal.record(entry.clone());
        async { Ok(()) }
    }))
}

/// A leaf named `name` that records itself and fails.
pub(crate) fn failing(name: &str, journal: &Journal) -> Node {
    let journal = journal.clone();
    let entry = name.to_string();
    Node::leaf(task_fn(name, move |_| {
        journal.record(entry.clone());
        let err = FlowError::execution(entry.clone(), "deliberate failure");
        async move { Err(err) }
    }))
}

/// A node that is always skipped.
pub(crate) fn skipping(name: &str) -> Node {
    Node::when(name, |_| Ok(false), Node::sequence("unreachable", Vec::new()))
}

/// A leaf that writes `value` under `key`.
pub(crate) fn writes<T>(name: &str, key: &str, value: T) -> Node
where
    T: Any + Send + Sync + Clone,
{
    let key = key.to_string();
    Node::leaf(task_fn(name, move |ctx: Context| {
        let res = ctx.put(&key, value.clone()).map_err(FlowError::from);
        async move { res }
    }))
}
