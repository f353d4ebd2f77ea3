//! Control-flow node variants and their constructors.
mod branch;
mod conditional;
mod fallback;
mod parallel;
mod saga;
mod sequence;
mod task;

pub use branch::{DynamicBranch, DynamicBranchBuilder};
pub use conditional::Conditional;
pub use fallback::Fallback;
pub use parallel::{Parallel, ParallelBuilder, ParallelConfig};
pub use saga::{Saga, SagaBuilder, SagaStep};
pub use sequence::Sequence;
pub use task::TaskNode;
