//! Runs a single task through its attempt loop.
//!
//! Errors raised by the task are handed to the retry policy. A deadline
//! expiry is terminal for the task and never reaches the retry policy, and so
//! is cancellation of the context: every attempt races the context's token.
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::FlowError;
use crate::retry::{NoRetry, RetryPolicy};
use crate::task::{Task, TaskDescriptor};

static NO_RETRY: NoRetry = NoRetry;

/// Executes task descriptors.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskExecutor;

impl TaskExecutor {
    pub async fn execute(&self, descriptor: &TaskDescriptor, ctx: &Context) -> Result<(), FlowError> {
        let task = descriptor.task();
        let policy: &dyn RetryPolicy = match descriptor.retry() {
            Some(policy) => policy.as_ref(),
            None => &NO_RETRY,
        };
        let deadline = descriptor.timeout().and_then(|t| t.duration());

        let mut attempt = 1;
        loop {
            let raised = match run_attempt(task, ctx, deadline).await {
                Ok(res) => res,
                Err(terminal) => {
                    error!(task = %task.name(), attempt, error = %terminal, "task attempt did not complete");
                    return Err(terminal);
                }
            };

            let err = match raised {
                Ok(()) => {
                    debug!(task = %task.name(), attempt, "task completed");
                    return Ok(());
                }
                Err(e) => e,
            };

            debug!(task = %task.name(), attempt, error = %err, "task failed, evaluating retry policy");
            if !policy.should_retry(attempt, &err) {
                error!(task = %task.name(), attempt, error = %err, "giving up on task");
                return Err(FlowError::TaskFailed {
                    task: task.name().to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = policy.backoff().delay(attempt);
            warn!(task = %task.name(), attempt, backoff = ?delay, "retrying task after backoff");
            pause(ctx, delay).await?;
            attempt += 1;
        }
    }
}

/// Runs one attempt, giving up on it when the context is cancelled.
///
/// The outer error is terminal; the inner result is what the task returned.
async fn run_attempt(
    task: &Arc<dyn Task>,
    ctx: &Context,
    deadline: Option<Duration>,
) -> Result<Result<(), FlowError>, FlowError> {
    match deadline {
        Some(limit) => attempt_with_deadline(Arc::clone(task), ctx, limit).await,
        None => tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(FlowError::Cancelled),
            res = task.execute(ctx) => Ok(res),
        },
    }
}

/// Runs one attempt on the runtime and waits for it at most `limit`.
///
/// The outer error is terminal (deadline, cancellation, panic); the inner
/// result is what the task itself returned. On expiry the attempt keeps
/// running detached; only the wait stops.
async fn attempt_with_deadline(
    task: Arc<dyn Task>,
    ctx: &Context,
    limit: Duration,
) -> Result<Result<(), FlowError>, FlowError> {
    let name = task.name().to_string();
    let attempt_ctx = ctx.clone();
    let handle = tokio::spawn(async move { task.execute(&attempt_ctx).await });

    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(FlowError::Cancelled),
        joined = tokio::time::timeout(limit, handle) => match joined {
            Err(_) => Err(FlowError::Timeout { task: name, after: limit }),
            Ok(Ok(res)) => Ok(res),
            Ok(Err(join)) if join.is_panic() => Err(FlowError::from_panic(join.into_panic())),
            Ok(Err(_)) => Err(FlowError::Cancelled),
        },
    }
}

/// Sleep for the backoff delay unless the context is cancelled first.
///
/// Cancellation is reported, and the context's token stays cancelled.
async fn pause(ctx: &Context, delay: Duration) -> Result<(), FlowError> {
    if ctx.is_cancelled() {
        return Err(FlowError::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = ctx.cancelled() => Err(FlowError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
