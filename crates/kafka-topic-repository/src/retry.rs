//! Bounded retry with a fixed delay.
//!
//! The operation classifies each attempt itself through [`RetryOutcome`]:
//! only `Retry` outcomes are attempted again, `Fatal` ends the loop at once.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use fluvio_future::timer::sleep;
use tracing::debug;

pub enum RetryOutcome<T, E> {
    Done(T),
    Retry(E),
    Fatal(E),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// total number of attempts, including the first one
    pub attempts: u32,
    pub delay: Duration,
    /// wall-clock budget; no new attempt starts once it would be exceeded
    pub timeout: Option<Duration>,
}

/// Errors of every attempt made, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    errors: Vec<E>,
}

impl<E> RetryError<E> {
    pub fn new(errors: Vec<E>) -> Self {
        Self { errors }
    }

    pub fn attempts(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn last(&self) -> Option<&E> {
        self.errors.last()
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "All attempts fail:")?;
        for (i, err) in self.errors.iter().enumerate() {
            write!(f, "\n#{}: {err}", i + 1)?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.errors.last().map(|err| err as &(dyn Error + 'static))
    }
}

/// Runs `operation` until it is done, fails fatally, or the policy is exhausted.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_with_delay<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RetryOutcome<T, E>>,
{
    let deadline = policy.timeout.map(|timeout| Instant::now() + timeout);
    let attempts = policy.attempts.max(1);
    let mut errors = Vec::new();

    for attempt in 1..=attempts {
        match operation(attempt).await {
            RetryOutcome::Done(value) => return Ok(value),
            RetryOutcome::Fatal(err) => {
                debug!(attempt, %err, "unrecoverable error, not retrying");
                errors.push(err);
                break;
            }
            RetryOutcome::Retry(err) => {
                debug!(attempt, %err, "attempt failed");
                errors.push(err);
                if attempt == attempts {
                    break;
                }
                if let Some(deadline) = deadline {
                    if Instant::now() + policy.delay > deadline {
                        debug!(attempt, "retry deadline reached");
                        break;
                    }
                }
                sleep(policy.delay).await;
            }
        }
    }

    Err(RetryError::new(errors))
}
