// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Bounded retry with a fixed delay
//!
//! Failures are split into transient and fatal. A fatal error stops the
//! loop at once; transient errors are retried until `max_attempts` calls
//! have been made.

use crate::error::TransferError;
use lfsync_git::GitError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Errors that know whether retrying could help
pub trait Retryable {
    /// True when another attempt may succeed
    fn is_transient(&self) -> bool;
}

impl Retryable for TransferError {
    fn is_transient(&self) -> bool {
        TransferError::is_transient(self)
    }
}

impl Retryable for GitError {
    fn is_transient(&self) -> bool {
        GitError::is_transient(self)
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// Non-retryable error on the given attempt
    Fatal { attempt: u32, error: E },
    /// Every attempt failed transiently
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryFailure<E> {
    /// The last error seen
    pub fn into_error(self) -> E {
        match self {
            RetryFailure::Fatal { error, .. } => error,
            RetryFailure::Exhausted { last, .. } => last,
        }
    }

    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryFailure::Fatal { attempt, .. } => *attempt,
            RetryFailure::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Attempt bound and delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Upper bound on attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fixed pause between attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `operation` until it succeeds, fails fatally, or runs out of
    /// attempts. The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryFailure<E>>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation = label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_transient() => {
                    warn!(operation = label, attempt, error = %error, "Fatal error, not retrying");
                    return Err(RetryFailure::Fatal { attempt, error });
                }
                Err(error) if attempt >= self.max_attempts => {
                    warn!(operation = label, attempts = attempt, error = %error, "Giving up");
                    return Err(RetryFailure::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
                Err(error) => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "Transient error, retrying in {:?}",
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
