use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration attached to a single CLI invocation.
///
/// `attempts` is the number of re-tries permitted after the initial
/// invocation: `0` means a single attempt, a negative count means
/// unbounded. An empty `retryable_names` list retries on any structured
/// error; otherwise only the listed error names are eligible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub attempts: i32,
    pub retryable_names: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 0,
            retryable_names: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn limited(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts as i32,
            retryable_names: Vec::new(),
            delay,
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            attempts: -1,
            retryable_names: Vec::new(),
            delay,
        }
    }

    pub fn for_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a failure carrying `error_name` may be retried under the
    /// remaining budget.
    pub fn permits(&self, error_name: Option<&str>) -> bool {
        if self.attempts == 0 {
            return false;
        }
        if self.retryable_names.is_empty() {
            return true;
        }
        match error_name {
            Some(name) => self.retryable_names.iter().any(|n| n == name),
            None => false,
        }
    }

    /// Consume one attempt. Unbounded policies are never consumed.
    pub fn decrement(&mut self) {
        if self.attempts > 0 {
            self.attempts -= 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts == 0
    }
}
