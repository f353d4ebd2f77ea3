//! # Weft - composable workflow trees for async Rust
//!
//! Build a tree of nodes (sequences, parallel fan-outs, conditionals, dynamic
//! branches, fallbacks and sagas) over your own [`Task`](core::Task)s, then
//! run it with retries, timeouts and cancellation handled for you.
//!
//! ```no_run
//! use weft::core::{task_fn, FlowError, Node, Workflow};
//!
//! # async fn demo() {
//! let hello = Node::leaf(task_fn("hello", |ctx| async move {
//!     ctx.put("greeting", "hello").map_err(FlowError::from)
//! }));
//! let run = Workflow::new(Node::sequence("greet", vec![hello])).run().await;
//! assert!(run.result.is_success());
//! # }
//! ```

use tracing_subscriber::{fmt, EnvFilter};

/// Install a `tracing` subscriber for weft's logs.
///
/// Honours `RUST_LOG` and falls back to `info`. Does nothing when a global
/// subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

pub use weft_core as core;
pub use weft_core::{Context, FlowError, Node, NodeResult, Task, Workflow};
