use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::status::AttemptOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 3000,
        }
    }
}

/// One entry in the retry trace of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryAttempt {
    pub fn succeeded(attempt_number: u32) -> Self {
        Self {
            attempt_number,
            outcome: AttemptOutcome::Success,
            error: None,
        }
    }

    pub fn failed(attempt_number: u32, outcome: AttemptOutcome, error: String) -> Self {
        Self {
            attempt_number,
            outcome,
            error: Some(error),
        }
    }
}
