//! Retry policy for failed downloader invocations.
//!
//! A failure whose output carries the lyrics provider's captcha marker is
//! transient: the operator solves the challenge in a browser and the same
//! entry is tried again after a fixed delay. Anything else is terminal.

use std::time::Duration;

use super::downloader::InvocationOutcome;

/// Marker printed by the downloader when the lyrics provider wants a captcha solved.
pub const CAPTCHA_MARKER: &str = "Please solve the captcha";

/// Where the operator solves the challenge.
pub const CAPTCHA_CHALLENGE_URL: &str = "https://www.musixmatch.com/";

pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;

/// What to do after one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Success,
    RetryAfter {
        delay: Duration,
        challenge_url: &'static str,
    },
    TerminalFailure,
}

/// Fixed-delay retry on captcha challenges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before re-invoking the same entry.
    pub retry_delay: Duration,
    /// Challenge retries allowed for one entry. `None` retries until the
    /// challenge is solved or the process stops.
    pub max_challenge_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn new(retry_delay: Duration, max_challenge_retries: Option<u32>) -> Self {
        Self {
            retry_delay,
            max_challenge_retries,
        }
    }

    /// Classify an invocation outcome.
    ///
    /// `challenge_retries` is the number of challenge retries already spent on
    /// the current entry.
    pub fn classify(&self, outcome: &InvocationOutcome, challenge_retries: u32) -> RetryDecision {
        if outcome.success {
            return RetryDecision::Success;
        }
        if !is_captcha_challenge(&outcome.output) {
            return RetryDecision::TerminalFailure;
        }
        match self.max_challenge_retries {
            Some(max) if challenge_retries >= max => RetryDecision::TerminalFailure,
            _ => RetryDecision::RetryAfter {
                delay: self.retry_delay,
                challenge_url: CAPTCHA_CHALLENGE_URL,
            },
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            max_challenge_retries: None,
        }
    }
}

/// Case-insensitive search for the captcha marker.
pub fn is_captcha_challenge(output: &str) -> bool {
    output
        .to_lowercase()
        .contains(&CAPTCHA_MARKER.to_lowercase())
}
