use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Terminal status of a node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failed,
    /// Intentionally not executed. Not an error.
    Skipped,
}

/// What a node body produced. A failure always carries its cause.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success,
    Failed(FlowError),
    Skipped,
}

impl Outcome {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Success => Status::Success,
            Outcome::Failed(_) => Status::Failed,
            Outcome::Skipped => Status::Skipped,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl From<Result<(), FlowError>> for Outcome {
    fn from(res: Result<(), FlowError>) -> Self {
        match res {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Result of executing a node, stamped with start and completion times.
#[derive(Debug, Clone)]
pub struct NodeResult {
    outcome: Outcome,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl NodeResult {
    /// Completes `outcome` now. The completion time never precedes `started_at`.
    pub fn new(outcome: Outcome, started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now().max(started_at);
        Self {
            outcome,
            started_at,
            completed_at,
        }
    }

    pub fn success(started_at: DateTime<Utc>) -> Self {
        Self::new(Outcome::Success, started_at)
    }

    pub fn failed(started_at: DateTime<Utc>, error: FlowError) -> Self {
        Self::new(Outcome::Failed(error), started_at)
    }

    pub fn skipped(started_at: DateTime<Utc>) -> Self {
        Self::new(Outcome::Skipped, started_at)
    }

    pub fn status(&self) -> Status {
        self.outcome.status()
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status() == Status::Skipped
    }

    /// The cause of a failed result.
    pub fn error(&self) -> Option<&FlowError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}
