//! Combines concurrently running children into a single completion.
//!
//! In wait-all mode the combinator resolves once every child has completed,
//! to the first failure in submission order, so the reported error is
//! deterministic. In fail-fast mode the first failure *observed* wins and the
//! others are cancelled; which child that is depends on scheduling and is not
//! deterministic when several fail close together. Cancelled children are
//! still waited for, so every child has reported before the combinator does.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;
use tracing::debug;

use crate::error::FlowError;
use crate::result::{NodeResult, Outcome};
use crate::strategy::{Canceller, WorkHandle};

/// Latch letting exactly one failure resolve a fail-fast fan-in.
#[derive(Debug, Clone, Default)]
pub struct FirstFailure {
    tripped: Arc<AtomicBool>,
}

impl FirstFailure {
    /// Returns true for exactly one caller, the first.
    pub fn trip(&self) -> bool {
        self.tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

/// Wait for `handles` and reduce them to one result.
///
/// An empty list succeeds immediately. A child that panicked surfaces as
/// [`FlowError::Panicked`] and a child torn down by the runtime as [`FlowError::Cancelled`];
/// the runtime's join wrapper never reaches the caller.
pub async fn fan_in(handles: Vec<WorkHandle>, fail_fast: bool) -> Result<(), FlowError> {
    if handles.is_empty() {
        return Ok(());
    }

    let latch = FirstFailure::default();
    let cancellers: Vec<Canceller> = handles.iter().map(WorkHandle::canceller).collect();
    let mut settled: Vec<Option<Result<(), FlowError>>> = vec![None; handles.len()];

    let mut pending: FuturesUnordered<_> = handles
        .into_iter()
        .enumerate()
        .map(|(index, handle)| async move { (index, settle(handle.await)) })
        .collect();

    let mut observed: Option<FlowError> = None;
    while let Some((index, res)) = pending.next().await {
        if let Err(err) = &res {
            if fail_fast && latch.trip() {
                let mut cancelled = 0;
                for (other, canceller) in cancellers.iter().enumerate() {
                    if other != index && settled[other].is_none() {
                        canceller.cancel();
                        cancelled += 1;
                    }
                }
                debug!(child = index, cancelled, error = %err, "fail-fast: cancelling siblings");
                observed = Some(err.clone());
            }
        }
        settled[index] = Some(res);
    }

    if let Some(err) = observed {
        return Err(err);
    }
    match settled.into_iter().flatten().find_map(Result::err) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Unwraps the join wrapper and the child's outcome into the real cause.
fn settle(joined: Result<NodeResult, JoinError>) -> Result<(), FlowError> {
    match joined {
        Ok(res) => match res.into_outcome() {
            Outcome::Failed(err) => Err(err),
            Outcome::Success | Outcome::Skipped => Ok(()),
        },
        Err(join) if join.is_panic() => Err(FlowError::from_panic(join.into_panic())),
        Err(_) => Err(FlowError::Cancelled),
    }
}
