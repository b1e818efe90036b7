//! Stopping rule state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CatConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Awaiting further responses ("continue").
    InProgress,
    /// Inspection label for "below the minimum length"; never produced as a
    /// terminal state, sessions under `min_items` simply stay in progress.
    StoppedMin,
    StoppedMax,
    StoppedPrecision,
    StoppedExhausted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress | SessionStatus::StoppedMin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::StoppedMin => "stopped_min",
            SessionStatus::StoppedMax => "stopped_max",
            SessionStatus::StoppedPrecision => "stopped_precision",
            SessionStatus::StoppedExhausted => "stopped_exhausted",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingRule {
    pub min_items: usize,
    pub max_items: usize,
    pub min_sem: f64,
}

impl From<&CatConfig> for StoppingRule {
    fn from(config: &CatConfig) -> Self {
        Self {
            min_items: config.min_items,
            max_items: config.max_items,
            min_sem: config.min_sem,
        }
    }
}

impl StoppingRule {
    /// Decide after a response has been recorded and the estimate refreshed.
    pub fn evaluate(&self, administered: usize, sem: f64, remaining: usize) -> SessionStatus {
        if administered < self.min_items {
            // nothing left to ask means the session cannot reach min_items
            if remaining == 0 {
                return SessionStatus::StoppedExhausted;
            }
            return SessionStatus::InProgress;
        }
        if administered >= self.max_items {
            return SessionStatus::StoppedMax;
        }
        if sem <= self.min_sem {
            return SessionStatus::StoppedPrecision;
        }
        if remaining == 0 {
            return SessionStatus::StoppedExhausted;
        }
        SessionStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: StoppingRule = StoppingRule {
        min_items: 8,
        max_items: 15,
        min_sem: 0.3,
    };

    #[test]
    fn precision_is_ignored_below_min_items() {
        assert_eq!(RULE.evaluate(3, 0.1, 10), SessionStatus::InProgress);
        assert_eq!(RULE.evaluate(7, 0.29, 10), SessionStatus::InProgress);
    }

    #[test]
    fn max_items_wins_over_precision() {
        assert_eq!(RULE.evaluate(15, 0.2, 5), SessionStatus::StoppedMax);
        assert_eq!(RULE.evaluate(15, 0.9, 0), SessionStatus::StoppedMax);
    }

    #[test]
    fn precision_then_exhaustion_then_continue() {
        assert_eq!(RULE.evaluate(8, 0.3, 5), SessionStatus::StoppedPrecision);
        assert_eq!(RULE.evaluate(9, 0.31, 0), SessionStatus::StoppedExhausted);
        assert_eq!(RULE.evaluate(9, 0.31, 4), SessionStatus::InProgress);
    }

    #[test]
    fn exhausted_before_min_items() {
        assert_eq!(RULE.evaluate(5, 0.5, 0), SessionStatus::StoppedExhausted);
    }

    #[test]
    fn stopped_min_is_not_terminal() {
        assert!(!SessionStatus::StoppedMin.is_terminal());
        assert!(!SessionStatus::InProgress.is_terminal());
        assert!(SessionStatus::StoppedPrecision.is_terminal());
        assert_eq!(SessionStatus::StoppedExhausted.to_string(), "stopped_exhausted");
    }
}
