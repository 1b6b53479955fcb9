use std::{fmt::Display, future::Future, time::Duration};

/// Fixed-delay retry for a single flow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no delay.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `op` until it succeeds or `max_attempts` is reached, sleeping
    /// `delay` between attempts. The last error is returned when exhausted.
    pub async fn run<T, E, F, Fut>(&self, step: &'static str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        error = %e,
                        step,
                        attempt,
                        max_attempts = self.max_attempts,
                        "flow step failed, retrying after fixed delay"
                    );
                    metrics::counter!("step_retries_total", "step" => step).increment(1);
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, step, attempt, "flow step failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}
