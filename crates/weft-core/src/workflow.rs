//! A named workflow tree and its runs.
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::context::Context;
use crate::node::Node;
use crate::result::NodeResult;

/// Owns the root node of a workflow tree.
#[derive(Debug)]
pub struct Workflow {
    root: Node,
}

/// What one run of a workflow produced.
#[derive(Debug)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    /// The context the run executed against, holding whatever the tasks wrote.
    pub context: Context,
    pub result: NodeResult,
}

impl Workflow {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Execute against a fresh, empty context.
    pub async fn run(&self) -> WorkflowRun {
        self.run_with(Context::new()).await
    }

    /// Execute against a caller-prepared context.
    pub async fn run_with(&self, context: Context) -> WorkflowRun {
        let run_id = Uuid::new_v4();
        let span = info_span!("workflow", name = %self.name(), %run_id);
        let result = async {
            info!("workflow run started");
            let result = self.root.execute(&context).await;
            info!(status = ?result.status(), elapsed_ms = result.elapsed().num_milliseconds(), "workflow run finished");
            result
        }
        .instrument(span)
        .await;

        WorkflowRun {
            run_id,
            context,
            result,
        }
    }
}
