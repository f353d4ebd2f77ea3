use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlowError;
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutPolicy;

/// A unit of application work executed by a leaf node.
///
/// Tasks wrapped into nodes that run under a `Parallel` node or a timeout
/// policy may be invoked concurrently and must be safe for that.
#[async_trait]
pub trait Task: Send + Sync {
    /// Display name used in logs, errors and listener callbacks.
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &Context) -> Result<(), FlowError>;
}

/// Create a task from a closure.
///
/// The closure receives a handle on the execution's context; writes through it
/// land in the caller's store.
pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> FnTask<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
{
    FnTask {
        name: name.into(),
        f,
    }
}

/// A task implementation that wraps a closure
#[derive(Clone)]
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F> Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &Context) -> Result<(), FlowError> {
        (self.f)(ctx.clone()).await
    }
}

/// A task together with the policies governing its execution.
#[derive(Clone)]
pub struct TaskDescriptor {
    task: Arc<dyn Task>,
    retry: Option<Arc<dyn RetryPolicy>>,
    timeout: Option<TimeoutPolicy>,
}

impl TaskDescriptor {
    pub fn new<T: Task + 'static>(task: T) -> Self {
        Self::from_arc(Arc::new(task))
    }

    pub fn from_arc(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            retry: None,
            timeout: None,
        }
    }

    pub fn with_retry<R: RetryPolicy + 'static>(mut self, policy: R) -> Self {
        self.retry = Some(Arc::new(policy));
        self
    }

    pub fn with_timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = Some(policy);
        self
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    pub fn retry(&self) -> Option<&Arc<dyn RetryPolicy>> {
        self.retry.as_ref()
    }

    pub fn timeout(&self) -> Option<TimeoutPolicy> {
        self.timeout
    }
}

impl Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("task", &self.task.name())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::limited_retries;
    use std::time::Duration;

    #[tokio::test]
    async fn closure_tasks_write_into_the_context() {
        let task = task_fn("greet", |ctx: Context| async move {
            ctx.put("greeting", "hello").map_err(FlowError::from)
        });
        let ctx = Context::new();
        task.execute(&ctx).await.unwrap();

        assert_eq!(task.name(), "greet");
        assert_eq!(
            ctx.get_cloned::<&str>("greeting").unwrap(),
            Some("hello")
        );
    }

    #[test]
    fn descriptor_carries_policies() {
        let desc = TaskDescriptor::new(task_fn("noop", |_| async { Ok(()) }))
            .with_retry(limited_retries(3))
            .with_timeout(TimeoutPolicy::of(Duration::from_millis(10)));

        assert_eq!(desc.task().name(), "noop");
        assert!(desc.retry().is_some());
        assert_eq!(
            desc.timeout().and_then(|t| t.duration()),
            Some(Duration::from_millis(10))
        );
    }
}
