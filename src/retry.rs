use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use serde::Deserialize;
use tracing::Level;
use url::Url;

use crate::options::duration_ms;
use crate::{Executor, HttpError, LogSink, Request, Response, Result, TracingSink};

/// Rules for retrying failed attempts and rotating through failover endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,
    /// Doubles the delay after every failed attempt.
    pub use_exponential_backoff: bool,
    /// Response statuses that trigger a retry.
    pub retryable_statuses: BTreeSet<u16>,
    /// Alternate targets tried after the original URL, in order.
    pub failover_endpoints: Vec<String>,
    /// Emits a retry event through the log sink before every retry.
    pub logging_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            use_exponential_backoff: true,
            retryable_statuses: [429, 500, 502, 503, 504].into_iter().collect(),
            failover_endpoints: Vec::new(),
            logging_enabled: false,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` retries and exponential backoff from `base_delay`.
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            use_exponential_backoff: true,
            ..Self::default()
        }
    }

    /// Policy with `max_attempts` retries spaced by a constant `delay`.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            use_exponential_backoff: false,
            ..Self::default()
        }
    }

    /// Replaces the set of retryable statuses.
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Appends alternate endpoints to the rotation.
    pub fn with_failover<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failover_endpoints
            .extend(endpoints.into_iter().map(Into::into));
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_statuses.contains(&status.as_u16())
    }

    /// Wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let multiplier = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(multiplier)
    }
}

/// Executor decorator that retries, backs off and fails over.
///
/// Request bodies are buffered once per call so every attempt sends the same
/// bytes. All loop state lives in [`Executor::execute`], so one instance can
/// serve any number of concurrent calls.
pub struct RetryTransport {
    base: Arc<dyn Executor>,
    policy: RetryPolicy,
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for RetryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryTransport {
    pub fn new(base: Arc<dyn Executor>, policy: RetryPolicy) -> Self {
        Self {
            base,
            policy,
            sink: Arc::new(TracingSink),
        }
    }

    /// Routes retry events to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn slot_count(&self) -> usize {
        self.policy.failover_endpoints.len() + 1
    }

    /// Slot 0 is the caller's URL, the rest are failover endpoints.
    fn endpoint(&self, slot: usize, original: &Url) -> std::result::Result<Url, url::ParseError> {
        match slot {
            0 => Ok(original.clone()),
            n => Url::parse(&self.policy.failover_endpoints[n - 1]),
        }
    }

    fn log_retry(&self, request: &Request, target: &Url, attempt: u32, slot: usize, cause: &Outcome) {
        if !self.policy.logging_enabled {
            return;
        }
        let attempt = attempt + 1;
        let slot = slot + 1;
        self.sink.log(
            Level::WARN,
            "retrying request",
            &[
                ("url", target),
                ("method", request.method()),
                ("attempt", &attempt),
                ("failover_index", &slot),
                ("cause", cause),
            ],
        );
    }
}

/// Why the previous attempt is being retried.
enum Outcome {
    Status(StatusCode),
    Failed(HttpError),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status {}", status.as_u16()),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

#[async_trait]
impl Executor for RetryTransport {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        let body: Option<Bytes> = match request.take_body() {
            Some(body) => Some(
                request
                    .context()
                    .run(body.collect())
                    .await?
                    .map_err(HttpError::RequestBody)?,
            ),
            None => None,
        };

        let max_attempts = self.policy.max_attempts;
        let slots = self.slot_count();
        let mut sent = 0u32;
        let mut last: Option<Outcome> = None;

        for attempt in 0..=max_attempts {
            request.context().check()?;

            let slot = attempt as usize % slots;
            let target = match self.endpoint(slot, request.url()) {
                Ok(target) => target,
                Err(err) => {
                    tracing::debug!(slot, error = %err, "skipping unparsable failover endpoint");
                    continue;
                }
            };

            sent += 1;
            let attempt_result = request
                .context()
                .run(self.base.execute(request.rebind(target.clone(), body.as_ref())))
                .await?;
            let outcome = match attempt_result {
                Ok(response) if !self.policy.is_retryable_status(response.status()) => {
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    drop(response);
                    Outcome::Status(status)
                }
                Err(err) if err.is_context_error() => return Err(err),
                Err(err) => Outcome::Failed(err),
            };

            if attempt < max_attempts {
                self.log_retry(&request, &target, attempt, slot, &outcome);
                let delay = self.policy.delay_for_attempt(attempt);
                request.context().run(tokio::time::sleep(delay)).await?;
            }
            last = Some(outcome);
        }

        let (last_status, source) = match last {
            Some(Outcome::Status(status)) => (Some(status), None),
            Some(Outcome::Failed(err)) => (None, Some(Box::new(err))),
            None => (None, None),
        };
        Err(HttpError::RetriesExhausted {
            attempts: sent,
            last_status,
            source,
        })
    }
}
