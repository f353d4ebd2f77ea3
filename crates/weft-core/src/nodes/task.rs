use crate::context::Context;
use crate::executor::TaskExecutor;
use crate::node::{Node, NodeKind};
use crate::result::Outcome;
use crate::task::{Task, TaskDescriptor};

/// Leaf adapter running a task through the task executor.
#[derive(Debug)]
pub struct TaskNode {
    descriptor: TaskDescriptor,
}

impl TaskNode {
    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    pub(crate) async fn run(&self, ctx: &Context) -> Outcome {
        TaskExecutor.execute(&self.descriptor, ctx).await.into()
    }
}

impl Node {
    /// A leaf node named after its task.
    pub fn task(descriptor: TaskDescriptor) -> Node {
        let name = descriptor.task().name().to_string();
        Node::from_kind(name, NodeKind::Task(TaskNode { descriptor }))
    }

    /// A leaf node for a task without retry or timeout policies.
    pub fn leaf<T: Task + 'static>(task: T) -> Node {
        Node::task(TaskDescriptor::new(task))
    }
}
