use tracing::warn;

use crate::context::Context;
use crate::node::{Node, NodeKind};
use crate::result::Outcome;

/// Runs `fallback` only when `primary` fails, returning its result verbatim.
pub struct Fallback {
    primary: Box<Node>,
    fallback: Box<Node>,
}

impl Fallback {
    pub fn primary(&self) -> &Node {
        &self.primary
    }

    pub fn fallback(&self) -> &Node {
        &self.fallback
    }

    pub(crate) async fn run(&self, ctx: &Context) -> Outcome {
        match self.primary.execute(ctx).await.into_outcome() {
            Outcome::Failed(err) => {
                warn!(primary = %self.primary.name(), error = %err, "primary failed, running fallback");
                self.fallback.execute(ctx).await.into_outcome()
            }
            outcome => outcome,
        }
    }
}

impl Node {
    pub fn fallback(name: impl Into<String>, primary: Node, fallback: Node) -> Node {
        Node::from_kind(
            name,
            NodeKind::Fallback(Fallback {
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            }),
        )
    }
}
