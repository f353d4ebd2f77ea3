//! Execution core of weft.
//!
//! Application code wraps its work in [`Task`]s, composes them into a tree of
//! [`Node`]s (sequence, parallel, conditional, dynamic branch, fallback, saga)
//! and executes the tree against a shared [`Context`]. Execution never panics
//! past a node: every node returns a [`NodeResult`] that is a success, a
//! failure carrying its cause, or a deliberate skip.
pub mod context;
pub mod error;
pub mod executor;
pub mod fan_in;
pub mod lifecycle;
pub mod node;
pub mod nodes;
pub mod result;
pub mod retry;
pub mod strategy;
pub mod task;
pub mod timeout;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use context::{Context, Value};
pub use error::{CompensationFailure, ContextError, FlowError, FlowResult};
pub use executor::TaskExecutor;
pub use fan_in::fan_in;
pub use lifecycle::{TracingListener, WorkflowListener};
pub use node::{Node, NodeKind};
pub use nodes::{ParallelConfig, SagaStep};
pub use result::{NodeResult, Outcome, Status};
pub use retry::{
    limited_retries, no_retry, Backoff, BackoffSettings, BackoffStrategy, LimitedRetry, NoRetry,
    RetryPolicy, RetrySettings,
};
pub use strategy::{BoundedStrategy, ExecutionStrategy, TokioStrategy, WorkHandle};
pub use task::{task_fn, Task, TaskDescriptor};
pub use timeout::{TimeoutPolicy, TimeoutSettings};
pub use workflow::{Workflow, WorkflowRun};
