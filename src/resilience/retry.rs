//! Escalating-timeout retry scheduler.
//!
//! Generative backends have bursty, load-dependent latency. Each attempt gets
//! a strictly larger deadline than the previous one; an attempt that times
//! out or returns too little output is retried after a short fixed pause.

use crate::error::AttemptFailure;
use crate::transport::UpstreamReply;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Per-attempt deadlines, strictly increasing. One attempt per entry.
    pub deadlines_ms: Vec<u64>,
    /// Pause between attempts.
    pub pause_ms: u64,
    /// Replies whose trimmed text is shorter than this are treated as failed attempts.
    pub min_viable_len: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            deadlines_ms: vec![30_000, 60_000, 90_000],
            pause_ms: 1_000,
            min_viable_len: 50,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        let ctx = || {
            ErrorContext::new()
                .with_field_path("retry.deadlines_ms")
                .with_source("retry_config")
        };
        if self.deadlines_ms.is_empty() {
            return Err(Error::configuration_with_context(
                "at least one retry deadline is required",
                ctx(),
            ));
        }
        if self.deadlines_ms[0] == 0 {
            return Err(Error::configuration_with_context(
                "retry deadlines must be positive",
                ctx(),
            ));
        }
        if self.deadlines_ms.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::configuration_with_context(
                "retry deadlines must be strictly increasing",
                ctx().with_details(format!("{:?}", self.deadlines_ms)),
            ));
        }
        Ok(())
    }

    pub fn max_deadline(&self) -> Duration {
        Duration::from_millis(self.deadlines_ms.last().copied().unwrap_or(0))
    }
}

pub struct RetryScheduler {
    config: RetryConfig,
}

impl RetryScheduler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `invoke` under escalating deadlines until it yields a viable reply.
    ///
    /// `invoke` receives the 1-based attempt number and that attempt's deadline.
    /// Errors other than a timeout are returned as-is without retrying. Once every
    /// deadline is used up the call fails with [`Error::UpstreamTimeout`].
    /// Cancelling `cancel` aborts the in-flight attempt and skips the rest.
    pub async fn call_with_escalating_timeout<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut invoke: F,
    ) -> Result<UpstreamReply>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<UpstreamReply>>,
    {
        let attempts = self.config.deadlines_ms.len() as u32;
        let pause = Duration::from_millis(self.config.pause_ms);
        let mut last_failure = AttemptFailure::TimedOut;
        let mut last_deadline_ms = 0;

        for (idx, &deadline_ms) in self.config.deadlines_ms.iter().enumerate() {
            let attempt = idx as u32 + 1;
            if idx > 0 && !pause.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(pause) => {}
                }
            }

            let deadline = Duration::from_millis(deadline_ms);
            last_deadline_ms = deadline_ms;
            debug!(attempt, deadline_ms, "upstream attempt");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                r = tokio::time::timeout(deadline, invoke(attempt, deadline)) => r,
            };

            match outcome {
                Err(_) => {
                    warn!(attempt, deadline_ms, "upstream attempt timed out");
                    last_failure = AttemptFailure::TimedOut;
                }
                Ok(Ok(reply)) => {
                    let len = reply.content_len();
                    if len >= self.config.min_viable_len {
                        return Ok(reply);
                    }
                    warn!(
                        attempt,
                        len,
                        min_viable_len = self.config.min_viable_len,
                        "upstream output too short"
                    );
                    last_failure = AttemptFailure::InsufficientOutput { len };
                }
                Ok(Err(e)) => return Err(e),
            }
        }

        warn!(attempts, last_deadline_ms, failure = %last_failure, "upstream attempts exhausted");
        Err(Error::UpstreamTimeout {
            attempts,
            deadline_ms: last_deadline_ms,
            last_failure,
        })
    }
}

/// Single attempt under a fixed deadline, for calls that are not retried.
pub async fn call_with_deadline<Fut>(
    cancel: &CancellationToken,
    deadline: Duration,
    fut: Fut,
) -> Result<UpstreamReply>
where
    Fut: Future<Output = Result<UpstreamReply>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        r = tokio::time::timeout(deadline, fut) => match r {
            Ok(res) => res,
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "upstream call timed out");
                Err(Error::UpstreamTimeout {
                    attempts: 1,
                    deadline_ms: deadline.as_millis() as u64,
                    last_failure: AttemptFailure::TimedOut,
                })
            }
        },
    }
}
