// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timeout budgets
//!
//! A [`Budget`] is the deadline of one host call. Every I/O step takes its
//! timeout from what is left of it, so the sum of all steps never exceeds
//! the timeout the host passed in.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    clock::{Clock, SystemClock},
    Error, Result,
};

/// Deadline derived from a start time and a total timeout.
#[derive(Debug, Clone)]
pub struct Budget {
    clock: Arc<dyn Clock>,
    started: Instant,
    total: Duration,
}

impl Budget {
    /// Starts a budget on the system clock.
    #[must_use]
    pub fn start(total: Duration) -> Self {
        Self::start_with(Arc::new(SystemClock), total)
    }

    #[must_use]
    pub fn start_with(clock: Arc<dyn Clock>, total: Duration) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            total,
        }
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.total
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.elapsed())
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Returns the remaining time, or [`Error::Timeout`] if nothing is left.
    ///
    /// Must be called before every I/O step.
    pub fn check(&self) -> Result<Duration> {
        match self.remaining() {
            remaining if remaining.is_zero() => Err(Error::Timeout),
            remaining => Ok(remaining),
        }
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Retry policy for a single I/O step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    /// Total number of attempts, at least one is always made.
    pub attempts: u32,
    /// Settle time between attempts, deducted from the budget.
    pub delay: Duration,
    /// Attempts are never started with less time than this.
    pub min_slice: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
            min_slice: Duration::from_millis(10),
        }
    }
}

impl Retry {
    /// Runs `op` until it succeeds, fails permanently or the budget runs out.
    ///
    /// `op` receives the timeout of the attempt: an even share of the
    /// remaining budget among the attempts left, but not less than
    /// `min_slice`. An attempt is only started while the budget still
    /// covers `min_slice` and the longest attempt observed so far.
    ///
    /// Only errors that are [retryable](Error::is_retryable) are retried.
    /// When the attempts are used up the last error is returned, when the
    /// budget runs out first [`Error::Timeout`].
    pub fn run<T, F>(&self, budget: &Budget, mut op: F) -> Result<T>
    where
        F: FnMut(Duration) -> Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut longest = Duration::ZERO;
        let mut last_err = None;
        for attempt in 0..attempts {
            if attempt > 0 && !self.delay.is_zero() {
                if budget.remaining() <= self.delay + longest.max(self.min_slice) {
                    log::debug!("No time left to settle before attempt {}", attempt + 1);
                    return Err(Error::Timeout);
                }
                budget.clock().sleep(self.delay);
            }
            let remaining = budget.remaining();
            if remaining.is_zero() || remaining < self.min_slice.max(longest) {
                log::debug!(
                    "Budget exhausted after {attempt} attempt(s), {remaining:?} left"
                );
                return Err(Error::Timeout);
            }
            let slice = (remaining / (attempts - attempt))
                .max(self.min_slice)
                .min(remaining);
            let started = budget.clock().now();
            match op(slice) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    longest = longest.max(budget.clock().now().saturating_duration_since(started));
                    if attempt + 1 < attempts {
                        log::warn!("Attempt {} of {attempts} failed: {err}", attempt + 1);
                    }
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or(Error::Timeout))
    }
}
