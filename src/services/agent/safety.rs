// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Trips after `max_failures` consecutive failed ticks and stays open until
/// `reset_interval` has passed since the last failure.
pub struct SafetyGuard {
    consecutive_failures: AtomicU64,
    last_failure_ms: AtomicU64,
    origin: Instant,
    max_failures: u64,
    reset_interval: Duration,
}

impl SafetyGuard {
    pub fn new(max_failures: u64, reset_interval: Duration) -> Self {
        Self {
            consecutive_failures: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            origin: Instant::now(),
            max_failures: max_failures.max(1),
            reset_interval,
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    pub fn check(&self) -> Result<(), AppError> {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures >= self.max_failures {
            let last = self.last_failure_ms.load(Ordering::Relaxed);
            if self.now_ms().saturating_sub(last) > self.reset_interval.as_millis() as u64 {
                self.reset();
            } else {
                return Err(AppError::Planner {
                    message: format!(
                        "circuit breaker open after {failures} consecutive failed ticks"
                    ),
                    recoverable: true,
                });
            }
        }
        Ok(())
    }

    pub fn report_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn report_failure(&self) {
        let count = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms.store(self.now_ms(), Ordering::Relaxed);

        if count + 1 >= self.max_failures {
            tracing::error!(target: "agent", failures = count + 1, "SAFETY GUARD: circuit breaker tripped");
        }
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        tracing::info!(target: "agent", "Safety guard: circuit breaker auto-reset.");
    }
}
