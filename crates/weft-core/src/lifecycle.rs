//! Observers notified around every node execution.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::FlowError;
use crate::result::{NodeResult, Status};

/// Receives lifecycle callbacks for the nodes it is registered on.
///
/// Every `execute` call produces exactly one `on_start` followed by exactly one
/// of `on_success` (for successful and skipped results) or `on_failure`.
/// Callbacks run synchronously on the executing task, in registration order.
/// A panicking listener is logged and does not affect other listeners or the
/// node's result.
pub trait WorkflowListener: Send + Sync {
    fn on_start(&self, _node: &str, _ctx: &Context) {}

    fn on_success(&self, _node: &str, _ctx: &Context, _result: &NodeResult) {}

    fn on_failure(&self, _node: &str, _ctx: &Context, _error: &FlowError) {}
}

/// Ordered listener list attached to a node.
#[derive(Clone, Default)]
pub(crate) struct Listeners(Vec<Arc<dyn WorkflowListener>>);

impl Listeners {
    pub(crate) fn push(&mut self, listener: Arc<dyn WorkflowListener>) {
        self.0.push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn notify_start(&self, node: &str, ctx: &Context) {
        for listener in &self.0 {
            guarded(node, "on_start", || listener.on_start(node, ctx));
        }
    }

    pub(crate) fn notify_end(&self, node: &str, ctx: &Context, result: &NodeResult) {
        for listener in &self.0 {
            match result.error() {
                Some(err) => guarded(node, "on_failure", || listener.on_failure(node, ctx, err)),
                None => guarded(node, "on_success", || listener.on_success(node, ctx, result)),
            }
        }
    }
}

fn guarded<F: FnOnce()>(node: &str, callback: &str, f: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        let err = FlowError::from_panic(payload);
        warn!(node = %node, callback, error = %err, "workflow listener panicked");
    }
}

/// Emits a `tracing` event for every lifecycle callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl WorkflowListener for TracingListener {
    fn on_start(&self, node: &str, _ctx: &Context) {
        debug!(node = %node, "node started");
    }

    fn on_success(&self, node: &str, _ctx: &Context, result: &NodeResult) {
        let elapsed_ms = result.elapsed().num_milliseconds();
        match result.status() {
            Status::Skipped => info!(node = %node, elapsed_ms, "node skipped"),
            _ => info!(node = %node, elapsed_ms, "node succeeded"),
        }
    }

    fn on_failure(&self, node: &str, _ctx: &Context, error: &FlowError) {
        warn!(node = %node, error = %error, "node failed");
    }
}
