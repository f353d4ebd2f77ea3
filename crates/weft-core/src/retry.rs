//! Retry decisions and backoff computation for task attempts.
//!
//! Both are traits so applications can plug in their own policies; the
//! built-ins cover the common cases: [`NoRetry`], [`LimitedRetry`] and the
//! [`Backoff`] strategies.
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Computes the delay to wait before the next attempt.
pub trait BackoffStrategy: Send + Sync + Debug {
    /// Delay after the given failed attempt (1-based).
    fn delay(&self, attempt: usize) -> Duration;
}

/// Decides whether a failed attempt is retried.
pub trait RetryPolicy: Send + Sync + Debug {
    /// `attempt` is the 1-based number of the attempt that just failed with `error`.
    fn should_retry(&self, attempt: usize, error: &FlowError) -> bool;

    fn backoff(&self) -> &dyn BackoffStrategy;
}

/// Built-in backoff strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// The same delay after every attempt.
    Constant(Duration),
    /// Delay = initial * attempt, capped at max
    Linear { initial: Duration, max: Duration },
    /// Delay = initial * 2^(attempt - 1), capped at max
    Exponential { initial: Duration, max: Duration },
    /// Exponential delay, then a uniformly random value between half of it and all of it.
    ExponentialJitter { initial: Duration, max: Duration },
}

impl Backoff {
    fn exponential(initial: Duration, max: Duration, attempt: usize) -> Duration {
        // 2^(attempt-1) with shift, saturating at 32 bits
        let exp = attempt.saturating_sub(1);
        let factor = if exp < 32 { 1_u32 << exp } else { u32::MAX };
        initial.saturating_mul(factor).min(max)
    }
}

impl BackoffStrategy for Backoff {
    fn delay(&self, attempt: usize) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Constant(delay) => delay,
            Backoff::Linear { initial, max } => {
                let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
            Backoff::Exponential { initial, max } => Self::exponential(initial, max, attempt),
            Backoff::ExponentialJitter { initial, max } => {
                let full = Self::exponential(initial, max, attempt);
                let nanos = u64::try_from(full.as_nanos()).unwrap_or(u64::MAX);
                if nanos == 0 {
                    return full;
                }
                let jittered = rand::thread_rng().gen_range(nanos / 2..=nanos);
                Duration::from_nanos(jittered)
            }
        }
    }
}

static NO_BACKOFF: Backoff = Backoff::None;

/// Never retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _attempt: usize, _error: &FlowError) -> bool {
        false
    }

    fn backoff(&self) -> &dyn BackoffStrategy {
        &NO_BACKOFF
    }
}

pub fn no_retry() -> NoRetry {
    NoRetry
}

type RetryPredicate = Arc<dyn Fn(&FlowError) -> bool + Send + Sync>;

/// Retries up to a total number of attempts, the first one included.
///
/// By default every error except cancellation is retried; narrow that with
/// [`LimitedRetry::retry_if`].
#[derive(Clone)]
pub struct LimitedRetry {
    max_attempts: usize,
    backoff: Arc<dyn BackoffStrategy>,
    retry_if: Option<RetryPredicate>,
}

/// A policy allowing `max_attempts` attempts in total.
pub fn limited_retries(max_attempts: usize) -> LimitedRetry {
    LimitedRetry::new(max_attempts)
}

impl LimitedRetry {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            backoff: Arc::new(Backoff::None),
            retry_if: None,
        }
    }

    pub fn with_backoff<B: BackoffStrategy + 'static>(mut self, backoff: B) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Only retry errors matching `predicate`.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&FlowError) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl Debug for LimitedRetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitedRetry")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("retry_if", &self.retry_if.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

impl RetryPolicy for LimitedRetry {
    fn should_retry(&self, attempt: usize, error: &FlowError) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match &self.retry_if {
            Some(predicate) => predicate(error),
            None => !error.is_cancelled(),
        }
    }

    fn backoff(&self) -> &dyn BackoffStrategy {
        self.backoff.as_ref()
    }
}

/// Serializable form of [`Backoff`], with delays in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffSettings {
    #[default]
    None,
    Constant { delay_ms: u64 },
    Linear { initial_ms: u64, max_ms: u64 },
    Exponential { initial_ms: u64, max_ms: u64 },
    ExponentialJitter { initial_ms: u64, max_ms: u64 },
}

impl From<BackoffSettings> for Backoff {
    fn from(settings: BackoffSettings) -> Self {
        let ms = Duration::from_millis;
        match settings {
            BackoffSettings::None => Backoff::None,
            BackoffSettings::Constant { delay_ms } => Backoff::Constant(ms(delay_ms)),
            BackoffSettings::Linear { initial_ms, max_ms } => Backoff::Linear {
                initial: ms(initial_ms),
                max: ms(max_ms),
            },
            BackoffSettings::Exponential { initial_ms, max_ms } => Backoff::Exponential {
                initial: ms(initial_ms),
                max: ms(max_ms),
            },
            BackoffSettings::ExponentialJitter { initial_ms, max_ms } => {
                Backoff::ExponentialJitter {
                    initial: ms(initial_ms),
                    max: ms(max_ms),
                }
            }
        }
    }
}

/// Retry configuration as loaded from application settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: usize,
    #[serde(default)]
    pub backoff: BackoffSettings,
}

impl RetrySettings {
    pub fn into_policy(self) -> LimitedRetry {
        LimitedRetry::new(self.max_attempts).with_backoff(Backoff::from(self.backoff))
    }
}
