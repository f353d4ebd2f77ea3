use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::context::Context;
use crate::error::FlowError;
use crate::node::{call_guarded, Node, NodeKind};
use crate::result::Outcome;

type Selector = Arc<dyn Fn(&Context) -> Result<String, FlowError> + Send + Sync>;

/// Routes to one of several branches by a key computed from the context.
///
/// Lookup tries the exact key, then a case-insensitive match in registration
/// order, then the default branch. With no match and no default the node is
/// skipped: "no route" is not a failure.
pub struct DynamicBranch {
    selector: Selector,
    branches: Vec<(String, Node)>,
    index: HashMap<String, usize>,
    default: Option<Box<Node>>,
}

impl DynamicBranch {
    pub fn branches(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.branches.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn default_branch(&self) -> Option<&Node> {
        self.default.as_deref()
    }

    /// The branch `key` resolves to, default included.
    pub fn resolve(&self, key: &str) -> Option<&Node> {
        if let Some(&i) = self.index.get(key) {
            return Some(&self.branches[i].1);
        }
        let folded = key.to_lowercase();
        self.branches
            .iter()
            .find(|(k, _)| k.to_lowercase() == folded)
            .map(|(_, node)| node)
            .or(self.default.as_deref())
    }

    pub(crate) async fn run(&self, ctx: &Context) -> Outcome {
        let key = match call_guarded(|| (self.selector)(ctx)) {
            Ok(key) => key,
            Err(err) => return Outcome::Failed(err),
        };

        match self.resolve(&key) {
            Some(branch) => {
                debug!(key = %key, branch = %branch.name(), "branch selected");
                branch.execute(ctx).await.into_outcome()
            }
            None => {
                info!(key = %key, "no branch matches selector key, skipping");
                Outcome::Skipped
            }
        }
    }
}

/// Builder for [`DynamicBranch`] nodes, started with [`Node::branch`].
pub struct DynamicBranchBuilder {
    name: String,
    selector: Selector,
    branches: Vec<(String, Node)>,
    default: Option<Node>,
}

impl DynamicBranchBuilder {
    pub fn case(mut self, key: impl Into<String>, node: Node) -> Self {
        self.branches.push((key.into(), node));
        self
    }

    pub fn default_branch(mut self, node: Node) -> Self {
        self.default = Some(node);
        self
    }

    /// Fails when there is nothing to route to or a key is registered twice.
    pub fn build(self) -> Result<Node, FlowError> {
        if self.branches.is_empty() && self.default.is_none() {
            return Err(FlowError::configuration(format!(
                "dynamic branch `{}` has no branches and no default",
                self.name
            )));
        }
        let mut index = HashMap::with_capacity(self.branches.len());
        for (i, (key, _)) in self.branches.iter().enumerate() {
            if index.insert(key.clone(), i).is_some() {
                return Err(FlowError::configuration(format!(
                    "dynamic branch `{}` registers key `{key}` twice",
                    self.name
                )));
            }
        }
        Ok(Node::from_kind(
            self.name,
            NodeKind::DynamicBranch(DynamicBranch {
                selector: self.selector,
                branches: self.branches,
                index,
                default: self.default.map(Box::new),
            }),
        ))
    }
}

impl Node {
    /// Start building a dynamic branch routed by `selector`.
    pub fn branch<S>(name: impl Into<String>, selector: S) -> DynamicBranchBuilder
    where
        S: Fn(&Context) -> Result<String, FlowError> + Send + Sync + 'static,
    {
        DynamicBranchBuilder {
            name: name.into(),
            selector: Arc::new(selector),
            branches: Vec::new(),
            default: None,
        }
    }
}
