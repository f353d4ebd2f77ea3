use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::FlowError;
use crate::node::{call_guarded, Node, NodeKind};
use crate::result::Outcome;

type Predicate = Arc<dyn Fn(&Context) -> Result<bool, FlowError> + Send + Sync>;

/// Runs one of two branches depending on a predicate over the context.
pub struct Conditional {
    predicate: Predicate,
    then_branch: Box<Node>,
    else_branch: Option<Box<Node>>,
}

impl Conditional {
    pub fn then_branch(&self) -> &Node {
        &self.then_branch
    }

    pub fn else_branch(&self) -> Option<&Node> {
        self.else_branch.as_deref()
    }

    pub(crate) async fn run(&self, ctx: &Context) -> Outcome {
        let decision = match call_guarded(|| (self.predicate)(ctx)) {
            Ok(decision) => decision,
            Err(err) => return Outcome::Failed(err),
        };
        debug!(decision, "condition evaluated");

        match (decision, &self.else_branch) {
            (true, _) => self.then_branch.execute(ctx).await.into_outcome(),
            (false, Some(otherwise)) => otherwise.execute(ctx).await.into_outcome(),
            (false, None) => Outcome::Skipped,
        }
    }
}

impl Node {
    /// Runs `then` when `predicate` holds and `otherwise` when it does not.
    pub fn if_else<P>(name: impl Into<String>, predicate: P, then: Node, otherwise: Node) -> Node
    where
        P: Fn(&Context) -> Result<bool, FlowError> + Send + Sync + 'static,
    {
        Self::conditional(name, Arc::new(predicate), then, Some(otherwise))
    }

    /// Runs `then` when `predicate` holds; otherwise the node is skipped.
    pub fn when<P>(name: impl Into<String>, predicate: P, then: Node) -> Node
    where
        P: Fn(&Context) -> Result<bool, FlowError> + Send + Sync + 'static,
    {
        Self::conditional(name, Arc::new(predicate), then, None)
    }

    fn conditional(
        name: impl Into<String>,
        predicate: Predicate,
        then: Node,
        otherwise: Option<Node>,
    ) -> Node {
        Node::from_kind(
            name,
            NodeKind::Conditional(Conditional {
                predicate,
                then_branch: Box::new(then),
                else_branch: otherwise.map(Box::new),
            }),
        )
    }
}
