//! Success-or-degraded results for fail-open collaborators

use serde::{Deserialize, Serialize};

/// Result of a call that always produces a usable value.
///
/// `Degraded` carries the fallback that was substituted together with the
/// reason the primary path failed, so callers can log or count degradation
/// without any error handling of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome<T> {
    Fresh(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Fresh(value) => value,
            Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Fresh(value) => value,
            Outcome::Degraded { value, .. } => value,
        }
    }

    /// Reason for degradation, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Fresh(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Fresh(value) => Outcome::Fresh(f(value)),
            Outcome::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_value() {
        let outcome = Outcome::Fresh(3);
        assert!(!outcome.is_degraded());
        assert_eq!(*outcome.value(), 3);
        assert_eq!(outcome.reason(), None);
    }

    #[test]
    fn test_degraded_keeps_value_and_reason() {
        let outcome = Outcome::degraded(vec![1, 2], "provider timeout");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.reason(), Some("provider timeout"));

        let mapped = outcome.map(|v| v.len());
        assert!(mapped.is_degraded());
        assert_eq!(mapped.into_value(), 2);
    }
}
