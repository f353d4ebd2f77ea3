//! The node execution contract shared by every control-flow variant.
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, debug_span, Instrument};

use crate::context::Context;
use crate::error::FlowError;
use crate::lifecycle::{Listeners, WorkflowListener};
use crate::nodes::{Conditional, DynamicBranch, Fallback, Parallel, Saga, Sequence, TaskNode};
use crate::result::{NodeResult, Outcome};

/// The closed set of node variants.
pub enum NodeKind {
    Sequence(Sequence),
    Parallel(Parallel),
    Conditional(Conditional),
    DynamicBranch(DynamicBranch),
    Fallback(Fallback),
    Saga(Saga),
    Task(TaskNode),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Parallel(_) => "parallel",
            NodeKind::Conditional(_) => "conditional",
            NodeKind::DynamicBranch(_) => "dynamic_branch",
            NodeKind::Fallback(_) => "fallback",
            NodeKind::Saga(_) => "saga",
            NodeKind::Task(_) => "task",
        }
    }
}

/// A named, immutable element of a workflow tree.
///
/// Nodes can be executed any number of times, concurrently too, provided the
/// tasks they wrap allow it.
pub struct Node {
    name: String,
    kind: NodeKind,
    listeners: Listeners,
}

impl Node {
    pub(crate) fn from_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            listeners: Listeners::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Register a listener notified around every execution of this node.
    pub fn with_listener(mut self, listener: Arc<dyn WorkflowListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Direct children, in the order the node would consider them.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Sequence(s) => s.children().iter().collect(),
            NodeKind::Parallel(p) => p.children().iter().map(|c| c.as_ref()).collect(),
            NodeKind::Conditional(c) => {
                std::iter::once(c.then_branch()).chain(c.else_branch()).collect()
            }
            NodeKind::DynamicBranch(b) => b
                .branches()
                .map(|(_, node)| node)
                .chain(b.default_branch())
                .collect(),
            NodeKind::Fallback(f) => vec![f.primary(), f.fallback()],
            NodeKind::Saga(s) => s
                .steps()
                .iter()
                .flat_map(|step| std::iter::once(step.action()).chain(step.compensation()))
                .collect(),
            NodeKind::Task(_) => Vec::new(),
        }
    }

    /// Run this node against `ctx`.
    ///
    /// Never panics and never returns early: listeners get one start and one
    /// terminal notification, and anything the body raises, panics included,
    /// becomes a failed result.
    pub fn execute<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, NodeResult> {
        let span = debug_span!("node", name = %self.name, kind = self.kind.label());
        async move {
            let started_at = Utc::now();
            self.listeners.notify_start(&self.name, ctx);

            let outcome = match AssertUnwindSafe(self.run_body(ctx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Outcome::Failed(FlowError::from_panic(payload)),
            };
            let result = NodeResult::new(outcome, started_at);

            debug!(status = ?result.status(), "node finished");
            self.listeners.notify_end(&self.name, ctx, &result);
            result
        }
        .instrument(span)
        .boxed()
    }

    async fn run_body(&self, ctx: &Context) -> Outcome {
        match &self.kind {
            NodeKind::Sequence(s) => s.run(ctx).await,
            NodeKind::Parallel(p) => p.run(ctx).await,
            NodeKind::Conditional(c) => c.run(ctx).await,
            NodeKind::DynamicBranch(b) => b.run(ctx).await,
            NodeKind::Fallback(f) => f.run(ctx).await,
            NodeKind::Saga(s) => s.run(ctx).await,
            NodeKind::Task(t) => t.run(ctx).await,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("children", &self.children())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Calls user code (predicates, selectors) inside a panic boundary.
pub(crate) fn call_guarded<T>(f: impl FnOnce() -> Result<T, FlowError>) -> Result<T, FlowError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(payload) => Err(FlowError::from_panic(payload)),
    }
}
