use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the context store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// Keys must be non-empty.
    #[error("context keys must not be empty")]
    EmptyKey,
    /// A value exists under the key but has a different type.
    #[error("value under key `{key}` is not a `{expected}`")]
    TypeMismatch { key: String, expected: &'static str },
}

/// A compensation that failed while a saga was rolling back.
#[derive(Debug, Clone)]
pub struct CompensationFailure {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// What went wrong.
    pub error: FlowError,
}

/// All errors that can end up as the cause of a failed node.
#[derive(Debug, Error, Clone)]
pub enum FlowError {
    /// Invalid construction, e.g. a branch node with nothing to route to.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A task or node body raised an error.
    #[error("Execution error in {source_name}: {message}")]
    Execution { source_name: String, message: String },

    /// A task gave up after exhausting its retry policy.
    #[error("Task {task} failed after {attempts} attempt(s)")]
    TaskFailed {
        task: String,
        attempts: usize,
        #[source]
        source: Box<FlowError>,
    },

    /// A task attempt exceeded its deadline.
    #[error("Task {task} timed out after {after:?}")]
    Timeout { task: String, after: Duration },

    /// A saga failed and one or more of its compensations failed too.
    #[error("{cause} ({} compensation(s) failed)", failures.len())]
    Compensation {
        #[source]
        cause: Box<FlowError>,
        failures: Vec<CompensationFailure>,
    },

    /// Structural problems detected while composing a graph.
    #[error("Composition error: {0}")]
    Composition(String),

    /// The execution was cancelled through its cancellation token.
    #[error("Execution cancelled")]
    Cancelled,

    /// A body panicked; carries the panic message.
    #[error("Panicked: {0}")]
    Panicked(String),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),
}

/// A specialized Result type for weft operations
pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    /// Create a new execution error attributed to `source_name`.
    pub fn execution(source_name: impl Display, message: impl Display) -> Self {
        Self::Execution {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn configuration(message: impl Display) -> Self {
        Self::Configuration(message.to_string())
    }

    /// The error that triggered a saga rollback, skipping the compensation wrapper.
    pub fn primary(&self) -> &FlowError {
        match self {
            Self::Compensation { cause, .. } => cause.primary(),
            other => other,
        }
    }

    /// Walks retry and compensation wrappers down to the innermost error.
    pub fn root_cause(&self) -> &FlowError {
        match self {
            Self::TaskFailed { source, .. } => source.root_cause(),
            Self::Compensation { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Compensation failures attached to this error, if any.
    pub fn compensation_failures(&self) -> &[CompensationFailure] {
        match self {
            Self::Compensation { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }

    /// Converts a panic payload into an error, keeping the message when there is one.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        if let Some(msg) = payload.downcast_ref::<&str>() {
            Self::Panicked((*msg).to_string())
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            Self::Panicked(msg.clone())
        } else {
            Self::Panicked("panic with a non-string payload".to_string())
        }
    }
}
