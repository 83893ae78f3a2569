use std::time::Duration;

use storyframe_contracts::config::ProviderSpec;
use storyframe_contracts::failure::ProviderFailure;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryNow,
    RetryAfter(Duration),
    Abandon,
}

/// Per-provider retry rule: bounded attempts, immediate retries for
/// ordinary transient failures, a fixed backoff for rate limits, and
/// no retry at all for fatal failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub rate_limit_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_spec(spec: &ProviderSpec) -> Self {
        Self {
            max_attempts: spec.max_attempts.max(1),
            rate_limit_backoff: spec.rate_limit_backoff,
        }
    }

    /// Decides the next step given the failure and how many attempts
    /// have already been made. Backoff does not grant extra attempts
    /// beyond the configured maximum.
    pub fn decide(&self, failure: &ProviderFailure, attempts_made: usize) -> RetryDecision {
        if failure.is_fatal() {
            return RetryDecision::Abandon;
        }
        if attempts_made >= self.max_attempts {
            return RetryDecision::Abandon;
        }
        if failure.is_rate_limited() {
            return RetryDecision::RetryAfter(self.rate_limit_backoff);
        }
        RetryDecision::RetryNow
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use storyframe_contracts::failure::ProviderFailure;

    use super::{RetryDecision, RetryPolicy};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            rate_limit_backoff: Duration::from_millis(50),
        }
    }

    #[test]
    fn fatal_failures_abandon_regardless_of_budget() {
        assert_eq!(
            policy().decide(&ProviderFailure::Auth, 1),
            RetryDecision::Abandon
        );
        assert_eq!(
            policy().decide(&ProviderFailure::UnknownEndpoint("/x".to_string()), 1),
            RetryDecision::Abandon
        );
    }

    #[test]
    fn transient_failures_retry_immediately_within_budget() {
        assert_eq!(
            policy().decide(&ProviderFailure::Timeout, 1),
            RetryDecision::RetryNow
        );
        assert_eq!(
            policy().decide(&ProviderFailure::DegradedPlaceholder, 2),
            RetryDecision::RetryNow
        );
    }

    #[test]
    fn rate_limits_back_off_without_extra_attempts() {
        let decision = policy().decide(&ProviderFailure::RateLimited("429".to_string()), 1);
        assert_eq!(
            decision,
            RetryDecision::RetryAfter(Duration::from_millis(50))
        );
        // The budget still applies at the cap.
        assert_eq!(
            policy().decide(&ProviderFailure::RateLimited("429".to_string()), 3),
            RetryDecision::Abandon
        );
    }

    #[test]
    fn exhausted_budget_abandons() {
        assert_eq!(
            policy().decide(&ProviderFailure::Timeout, 3),
            RetryDecision::Abandon
        );
    }
}
