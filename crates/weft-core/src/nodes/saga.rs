//! Sagas: ordered steps whose completed work is undone, newest first, when a
//! later step fails.
use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::{CompensationFailure, FlowError};
use crate::node::{Node, NodeKind};
use crate::result::Outcome;

/// One saga step: a forward action and, optionally, the action undoing it.
///
/// Steps that only read or are idempotent need no compensation.
pub struct SagaStep {
    name: String,
    action: Node,
    compensation: Option<Node>,
}

impl SagaStep {
    pub fn new(name: impl Into<String>, action: Node) -> Self {
        Self {
            name: name.into(),
            action,
            compensation: None,
        }
    }

    pub fn with_compensation(mut self, compensation: Node) -> Self {
        self.compensation = Some(compensation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &Node {
        &self.action
    }

    pub fn compensation(&self) -> Option<&Node> {
        self.compensation.as_ref()
    }
}

pub struct Saga {
    steps: Vec<SagaStep>,
}

impl Saga {
    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub(crate) async fn run(&self, ctx: &Context) -> Outcome {
        let mut completed: Vec<&SagaStep> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step.action.execute(ctx).await.into_outcome() {
                Outcome::Failed(cause) => {
                    warn!(step = %step.name, error = %cause, completed = completed.len(), "saga step failed, rolling back");
                    return Self::roll_back(ctx, &completed, cause).await;
                }
                Outcome::Success | Outcome::Skipped => completed.push(step),
            }
        }
        debug!(steps = completed.len(), "saga completed");
        Outcome::Success
    }

    /// Compensates `completed` in reverse. Every compensation is attempted even
    /// when a later one failed; failures are attached to the triggering cause.
    ///
    /// Compensations run on the saga's store under a fresh cancellation token:
    /// a rollback triggered by cancellation still runs to completion.
    async fn roll_back(ctx: &Context, completed: &[&SagaStep], cause: FlowError) -> Outcome {
        let ctx = &ctx.with_token(CancellationToken::new());
        let mut failures = Vec::new();
        for step in completed.iter().rev() {
            let Some(compensation) = &step.compensation else {
                debug!(step = %step.name, "no compensation registered");
                continue;
            };
            if let Outcome::Failed(err) = compensation.execute(ctx).await.into_outcome() {
                error!(step = %step.name, error = %err, "compensation failed");
                failures.push(CompensationFailure {
                    step: step.name.clone(),
                    error: err,
                });
            }
        }

        if failures.is_empty() {
            Outcome::Failed(cause)
        } else {
            Outcome::Failed(FlowError::Compensation {
                cause: Box::new(cause),
                failures,
            })
        }
    }
}

/// Builder for [`Saga`] nodes, started with [`Node::saga`].
pub struct SagaBuilder {
    name: String,
    steps: Vec<SagaStep>,
}

impl SagaBuilder {
    pub fn step(mut self, step: SagaStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Fails when two steps share a name.
    pub fn build(self) -> Result<Node, FlowError> {
        let mut seen = HashSet::with_capacity(self.steps.len());
        if let Some(dup) = self.steps.iter().find(|s| !seen.insert(s.name.as_str())) {
            return Err(FlowError::configuration(format!(
                "saga `{}` has two steps named `{}`",
                self.name, dup.name
            )));
        }
        Ok(Node::from_kind(
            self.name,
            NodeKind::Saga(Saga { steps: self.steps }),
        ))
    }
}

impl Node {
    pub fn saga(name: impl Into<String>) -> SagaBuilder {
        SagaBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{failing, step, Journal};

    #[tokio::test]
    async fn all_steps_succeed_without_compensation() {
        let journal = Journal::default();
        let saga = Node::saga("order")
            .step(SagaStep::new("reserve", step("reserve", &journal)).with_compensation(step("release", &journal)))
            .step(SagaStep::new("charge", step("charge", &journal)).with_compensation(step("refund", &journal)))
            .build()
            .unwrap();

        assert!(saga.execute(&Context::new()).await.is_success());
        assert_eq!(journal.entries(), ["reserve", "charge"]);
    }

    #[tokio::test]
    async fn missing_compensations_are_skipped_on_rollback() {
        let journal = Journal::default();
        let saga = Node::saga("order")
            .step(SagaStep::new("lookup", step("lookup", &journal)))
            .step(SagaStep::new("reserve", step("reserve", &journal)).with_compensation(step("release", &journal)))
            .step(SagaStep::new("charge", failing("charge", &journal)))
            .build()
            .unwrap();

        let res = saga.execute(&Context::new()).await;
        assert!(res.is_failed());
        assert!(res.error().unwrap().compensation_failures().is_empty());
        assert_eq!(journal.entries(), ["lookup", "reserve", "charge", "release"]);
    }

    #[tokio::test]
    async fn empty_saga_succeeds() {
        let saga = Node::saga("nothing").build().unwrap();
        assert!(saga.execute(&Context::new()).await.is_success());
    }

    #[test]
    fn duplicate_step_names_are_rejected() {
        let journal = Journal::default();
        let err = Node::saga("order")
            .step(SagaStep::new("a", step("a", &journal)))
            .step(SagaStep::new("a", step("b", &journal)))
            .build()
            .unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }

    #[tokio::test]
    async fn cancelled_step_still_rolls_back() {
        let journal = Journal::default();
        let waiting = Node::leaf(crate::task::task_fn("ship", |_| async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(())
        }));
        let saga = Node::saga("order")
            .step(SagaStep::new("reserve", step("reserve", &journal)).with_compensation(step("release", &journal)))
            .step(SagaStep::new("ship", waiting))
            .build()
            .unwrap();
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let res = saga.execute(&ctx).await;
        assert!(res.error().is_some_and(FlowError::is_cancelled));
        assert_eq!(journal.entries(), ["reserve", "release"]);
    }
}
