use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::context::Context;
use crate::fan_in::fan_in;
use crate::node::{Node, NodeKind};
use crate::result::Outcome;
use crate::strategy::{ExecutionStrategy, TokioStrategy, WorkHandle};

/// How a parallel node shares its context and reacts to failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Give every child the same context (true) or its own copy (false).
    pub share_context: bool,
    /// Cancel the remaining children on the first failure.
    pub fail_fast: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            share_context: true,
            fail_fast: true,
        }
    }
}

impl ParallelConfig {
    pub fn with_share_context(mut self, share: bool) -> Self {
        self.share_context = share;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Fans children out onto an execution strategy and fans their results back in.
///
/// With a shared context, children writing the same key race each other; use
/// isolated copies when they must not see each other's writes.
pub struct Parallel {
    children: Vec<Arc<Node>>,
    config: ParallelConfig,
    strategy: Arc<dyn ExecutionStrategy>,
}

impl Parallel {
    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    pub fn config(&self) -> ParallelConfig {
        self.config
    }

    /// Dropping the returned future cancels every child still running.
    pub(crate) async fn run(&self, ctx: &Context) -> Outcome {
        let group = ctx.cancel_token().child_token();
        let _guard = group.clone().drop_guard();
        let handles: Vec<WorkHandle> = self
            .children
            .iter()
            .map(|child| {
                let token = group.child_token();
                let base = if self.config.share_context {
                    ctx.clone()
                } else {
                    ctx.copy()
                };
                let child_ctx = base.with_token(token.clone());
                let child = Arc::clone(child);
                let work = async move { child.execute(&child_ctx).await }.boxed();
                self.strategy.submit(work, token)
            })
            .collect();

        debug!(
            children = handles.len(),
            fail_fast = self.config.fail_fast,
            share_context = self.config.share_context,
            "parallel children submitted"
        );
        fan_in(handles, self.config.fail_fast).await.into()
    }
}

impl fmt::Debug for Parallel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parallel")
            .field("children", &self.children.len())
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Builder for [`Parallel`] nodes, started with [`Node::parallel`].
pub struct ParallelBuilder {
    name: String,
    children: Vec<Arc<Node>>,
    config: ParallelConfig,
    strategy: Arc<dyn ExecutionStrategy>,
}

impl ParallelBuilder {
    pub fn child(mut self, node: Node) -> Self {
        self.children.push(Arc::new(node));
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes.into_iter().map(Arc::new));
        self
    }

    pub fn config(mut self, config: ParallelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn share_context(mut self, share: bool) -> Self {
        self.config.share_context = share;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast = fail_fast;
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn build(self) -> Node {
        Node::from_kind(
            self.name,
            NodeKind::Parallel(Parallel {
                children: self.children,
                config: self.config,
                strategy: self.strategy,
            }),
        )
    }
}

impl Node {
    /// Start building a parallel node. Defaults: shared context, fail-fast,
    /// one tokio task per child.
    pub fn parallel(name: impl Into<String>) -> ParallelBuilder {
        ParallelBuilder {
            name: name.into(),
            children: Vec::new(),
            config: ParallelConfig::default(),
            strategy: Arc::new(TokioStrategy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::result::Status;
    use std::time::{Duration, Instant};
    use crate::tests::support::{failing, step, writes, Journal};

    #[tokio::test]
    async fn empty_parallel_succeeds() {
        let node = Node::parallel("none").build();
        assert!(node.execute(&Context::new()).await.is_success());
    }

    #[tokio::test]
    async fn shared_context_sees_child_writes() {
        let ctx = Context::new();
        let node = Node::parallel("p")
            .child(writes("a", "a", 1_u8))
            .child(writes("b", "b", 2_u8))
            .build();

        assert!(node.execute(&ctx).await.is_success());
        assert!(ctx.contains("a") && ctx.contains("b"));
    }

    #[tokio::test]
    async fn isolated_children_write_to_copies() {
        let ctx = Context::new();
        ctx.put("seed", 7_u8).unwrap();
        let node = Node::parallel("p")
            .share_context(false)
            .child(writes("a", "a", 1_u8))
            .child(writes("b", "b", 2_u8))
            .build();

        assert!(node.execute(&ctx).await.is_success());
        assert!(!ctx.contains("a"));
        assert!(!ctx.contains("b"));
        assert!(ctx.contains("seed"));
    }

    #[tokio::test]
    async fn failure_is_reported() {
        let journal = Journal::default();
        let node = Node::parallel("p")
            .fail_fast(false)
            .child(step("ok", &journal))
            .child(failing("bad", &journal))
            .build();

        let res = node.execute(&Context::new()).await;
        assert_eq!(res.status(), Status::Failed);
        assert_eq!(journal.sorted(), ["bad", "ok"]);
    }

    fn sleeper(name: &str) -> Node {
        Node::leaf(crate::task::task_fn(name, |_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }))
    }

    #[tokio::test]
    async fn cancelling_the_parent_reaches_children() {
        let ctx = Context::new();
        let node = Node::parallel("p").fail_fast(false).child(sleeper("waiter")).build();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let started = Instant::now();
        let res = node.execute(&ctx).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(res.error().is_some_and(FlowError::is_cancelled));
    }

    #[tokio::test]
    async fn dropping_a_running_parallel_cancels_its_children() {
        let ctx = Context::new();
        let child_ctx = Arc::new(std::sync::Mutex::new(None::<Context>));
        let slot = Arc::clone(&child_ctx);
        let child = Node::leaf(crate::task::task_fn("waiter", move |ctx: Context| {
            *slot.lock().unwrap() = Some(ctx);
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }));
        let node = Node::parallel("p").child(child).build();

        let res = tokio::time::timeout(Duration::from_millis(50), node.execute(&ctx)).await;
        assert!(res.is_err());
        let seen = child_ctx.lock().unwrap().clone().unwrap();
        assert!(seen.is_cancelled());
        assert!(!ctx.is_cancelled());
    }
}
