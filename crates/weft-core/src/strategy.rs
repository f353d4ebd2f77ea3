//! Where parallel children run.
//!
//! An [`ExecutionStrategy`] accepts a unit of work and hands back a
//! [`WorkHandle`] that can be awaited or cancelled. Cancellation is
//! cooperative: it fires the work's cancellation token and the work winds
//! down on its own, so a cancelled node still reports a terminal result.
//! Code that never checks the token runs to completion.
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;
use crate::result::NodeResult;

/// A unit of work submitted to a strategy.
pub type Work = BoxFuture<'static, NodeResult>;

pub trait ExecutionStrategy: Send + Sync + Debug {
    /// Start `work`. `cancel` is the token the work observes; cancelling the
    /// returned handle fires it.
    fn submit(&self, work: Work, cancel: CancellationToken) -> WorkHandle;
}

/// Handle on submitted work. Resolves to the work's result, or to the
/// runtime's join error when the work panicked or the runtime shut down.
#[derive(Debug)]
pub struct WorkHandle {
    join: JoinHandle<NodeResult>,
    cancel: CancellationToken,
}

impl WorkHandle {
    pub fn new(join: JoinHandle<NodeResult>, cancel: CancellationToken) -> Self {
        Self { join, cancel }
    }

    /// Request cancellation of the work.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A detached cancel switch, usable after the handle has been moved.
    pub fn canceller(&self) -> Canceller {
        Canceller {
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Future for WorkHandle {
    type Output = Result<NodeResult, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join).poll(cx)
    }
}

#[derive(Debug, Clone)]
pub struct Canceller {
    cancel: CancellationToken,
}

impl Canceller {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Runs every submission as its own tokio task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioStrategy;

impl ExecutionStrategy for TokioStrategy {
    fn submit(&self, work: Work, cancel: CancellationToken) -> WorkHandle {
        WorkHandle::new(tokio::spawn(work), cancel)
    }
}

/// Runs submissions as tokio tasks, at most `limit` of them at a time.
///
/// Work cancelled while still waiting for a slot never starts and reports
/// [`FlowError::Cancelled`].
#[derive(Debug, Clone)]
pub struct BoundedStrategy {
    permits: Arc<Semaphore>,
}

impl BoundedStrategy {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl ExecutionStrategy for BoundedStrategy {
    fn submit(&self, work: Work, cancel: CancellationToken) -> WorkHandle {
        let permits = Arc::clone(&self.permits);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            let queued_at = Utc::now();
            let permit = tokio::select! {
                _ = token.cancelled() => return NodeResult::failed(queued_at, FlowError::Cancelled),
                permit = permits.acquire_owned() => permit,
            };
            match permit {
                Ok(_permit) => work.await,
                Err(_) => NodeResult::failed(queued_at, FlowError::Cancelled),
            }
        });
        WorkHandle::new(join, cancel)
    }
}
