use tracing::debug;

use crate::context::Context;
use crate::node::{Node, NodeKind};
use crate::result::Outcome;

/// Runs children one at a time, in order, on the same context.
pub struct Sequence {
    children: Vec<Node>,
}

impl Sequence {
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Stops at the first failed child; the children after it never run.
    pub(crate) async fn run(&self, ctx: &Context) -> Outcome {
        for (index, child) in self.children.iter().enumerate() {
            if let Outcome::Failed(err) = child.execute(ctx).await.into_outcome() {
                debug!(child = %child.name(), index, error = %err, "sequence stopped at failed child");
                return Outcome::Failed(err);
            }
        }
        Outcome::Success
    }
}

impl Node {
    /// A node running `children` in order. An empty sequence succeeds.
    pub fn sequence(name: impl Into<String>, children: impl IntoIterator<Item = Node>) -> Node {
        Node::from_kind(
            name,
            NodeKind::Sequence(Sequence {
                children: children.into_iter().collect(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::error::FlowError;
    use crate::node::Node;
    use crate::result::Status;
    use crate::tests::support::{failing, skipping, step, Journal};

    #[tokio::test]
    async fn runs_children_in_order() {
        let journal = Journal::default();
        let seq = Node::sequence(
            "seq",
            ["a", "b", "c"].map(|n| step(n, &journal)),
        );

        let res = seq.execute(&Context::new()).await;
        assert!(res.is_success());
        assert_eq!(journal.entries(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let journal = Journal::default();
        let seq = Node::sequence(
            "seq",
            vec![
                step("a", &journal),
                failing("b", &journal),
                step("c", &journal),
            ],
        );

        let res = seq.execute(&Context::new()).await;
        assert_eq!(res.status(), Status::Failed);
        assert!(res.error().unwrap().to_string().contains("b"));
        assert_eq!(journal.entries(), ["a", "b"]);
    }

    #[tokio::test]
    async fn empty_sequence_succeeds() {
        let seq = Node::sequence("empty", Vec::new());
        assert!(seq.execute(&Context::new()).await.is_success());
    }

    #[tokio::test]
    async fn skipped_children_do_not_stop_the_sequence() {
        let journal = Journal::default();
        let seq = Node::sequence("seq", vec![skipping("quiet"), step("after", &journal)]);
        assert!(seq.execute(&Context::new()).await.is_success());
        assert_eq!(journal.entries(), ["after"]);
    }

    #[tokio::test]
    async fn children_share_the_context() {
        let writer = crate::tests::support::writes("writer", "k", 41_i64);
        let reader = Node::leaf(crate::task::task_fn("reader", |ctx: Context| async move {
            let v = ctx.get_cloned::<i64>("k")?.unwrap_or_default();
            ctx.put("k", v + 1)?;
            Ok::<_, FlowError>(())
        }));
        let ctx = Context::new();
        Node::sequence("seq", vec![writer, reader]).execute(&ctx).await;
        assert_eq!(ctx.get_cloned::<i64>("k").unwrap(), Some(42));
    }
}
