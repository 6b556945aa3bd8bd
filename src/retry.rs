//! Retry policy for undecodable responses
//!
//! A production response that is not valid JSON is usually a truncated or
//! interleaved body, and re-issuing the whole call tends to fix it. A debug
//! response without its payload markers is a program failure, so by default it
//! is reported straight away (`retry_in_debug = false`).

use crate::config::AdapterConfig;
use crate::response::ParseMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_in_debug: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &AdapterConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            retry_in_debug: config.retry_in_debug,
        }
    }

    /// Whether a parse failure after `retries_done` re-issues warrants another.
    pub fn should_retry(&self, mode: ParseMode, retries_done: u32) -> bool {
        let mode_allows = match mode {
            ParseMode::Production => true,
            ParseMode::Debug => self.retry_in_debug,
        };
        mode_allows && retries_done < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AdapterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_retries_up_to_bound() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(ParseMode::Production, 0));
        assert!(policy.should_retry(ParseMode::Production, 4));
        assert!(!policy.should_retry(ParseMode::Production, 5));
    }

    #[test]
    fn test_debug_does_not_retry_by_default() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(ParseMode::Debug, 0));
    }

    #[test]
    fn test_debug_retry_opt_in() {
        let policy = RetryPolicy {
            max_retries: 2,
            retry_in_debug: true,
        };
        assert!(policy.should_retry(ParseMode::Debug, 1));
        assert!(!policy.should_retry(ParseMode::Debug, 2));
    }
}
