use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deadline for a single task attempt. A zero duration means no timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TimeoutPolicy {
    limit: Duration,
}

impl TimeoutPolicy {
    pub fn of(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn millis(ms: u64) -> Self {
        Self::of(Duration::from_millis(ms))
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// The deadline, or `None` when the policy does not limit attempts.
    pub fn duration(&self) -> Option<Duration> {
        (!self.limit.is_zero()).then_some(self.limit)
    }

    pub fn is_enabled(&self) -> bool {
        self.duration().is_some()
    }
}

/// Timeout configuration as loaded from application settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default)]
    pub millis: u64,
}

impl TimeoutSettings {
    pub fn into_policy(self) -> TimeoutPolicy {
        TimeoutPolicy::millis(self.millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_no_timeout() {
        assert!(!TimeoutPolicy::none().is_enabled());
        assert_eq!(TimeoutPolicy::millis(0).duration(), None);
        assert_eq!(
            TimeoutPolicy::millis(50).duration(),
            Some(Duration::from_millis(50))
        );
    }

    #[test]
    fn settings_default_to_disabled() {
        let settings: TimeoutSettings = serde_json::from_str("{}").unwrap();
        assert!(!settings.into_policy().is_enabled());
        let settings: TimeoutSettings = serde_json::from_str(r#"{"millis": 250}"#).unwrap();
        assert!(settings.into_policy().is_enabled());
    }
}
