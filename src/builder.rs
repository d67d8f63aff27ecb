use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{
    Client, Context, Executor, HttpError, LogSink, ReqwestExecutor, Result, RetryPolicy,
    RetryTransport, TlsOptions, TracingSink, TransportTuning,
};

/// Order-sensitive client configuration.
///
/// Options apply in call order. Executor-slot options (custom executor,
/// custom `reqwest::Client`, retry policy) follow last-writer-wins; headers
/// merge. [`ClientBuilder::retry`] wraps whatever executor is installed at the
/// moment it is called, so install a custom executor first.
///
/// Transport tuning (timeout, pool sizing, TLS) only applies to the built-in
/// executor. Tuning after a custom executor or a retry policy has been
/// installed is reported by [`ClientBuilder::build`] as
/// [`HttpError::Config`] instead of being dropped.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use failover_http::{Client, RetryPolicy};
///
/// # async fn run() -> failover_http::Result<()> {
/// let client = Client::builder()
///     .timeout(Duration::from_secs(5))
///     .header("x-api-key", "secret")
///     .retry(
///         RetryPolicy::exponential(2, Duration::from_millis(100))
///             .with_failover(["https://backup.example.com/v1/items"]),
///     )
///     .build()?;
///
/// let reply = client.get("https://primary.example.com/v1/items").await?;
/// println!("{} {}", reply.status, reply.text());
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    context: Context,
    headers: HeaderMap,
    logging_enabled: bool,
    log_sink: Option<Arc<dyn LogSink>>,
    slot: ExecutorSlot,
    retry_attached: bool,
    error: Option<HttpError>,
}

enum ExecutorSlot {
    Tuned(TransportTuning),
    Installed(Arc<dyn Executor>),
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match &self.slot {
            ExecutorSlot::Tuned(tuning) => format!("{tuning:?}"),
            ExecutorSlot::Installed(_) => "<custom executor>".to_owned(),
        };
        f.debug_struct("ClientBuilder")
            .field("context", &self.context)
            .field("headers", &self.headers)
            .field("logging_enabled", &self.logging_enabled)
            .field("executor", &slot)
            .field("retry_attached", &self.retry_attached)
            .field("error", &self.error)
            .finish()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            context: Context::background(),
            headers: HeaderMap::new(),
            logging_enabled: false,
            log_sink: None,
            slot: ExecutorSlot::Tuned(TransportTuning::default()),
            retry_attached: false,
            error: None,
        }
    }

    /// Binds every request of the client to `context`.
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Adds a default header. Invalid names or values fail the build.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                self
            }
            _ => self.fail(HttpError::InvalidRequest(format!(
                "invalid default header '{name}'"
            ))),
        }
    }

    /// Merges `headers` into the defaults.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Per-attempt timeout; zero disables it.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.tune("timeout", |tuning| tuning.timeout = timeout)
    }

    pub fn disable_keep_alive(self, disable: bool) -> Self {
        self.tune("disable_keep_alive", |tuning| {
            tuning.disable_keep_alive = disable
        })
    }

    pub fn max_idle_connections(self, max: usize) -> Self {
        self.tune("max_idle_connections", |tuning| {
            tuning.max_idle_connections = max
        })
    }

    pub fn max_connections_per_host(self, max: usize) -> Self {
        self.tune("max_connections_per_host", |tuning| {
            tuning.max_connections_per_host = max
        })
    }

    pub fn max_idle_connections_per_host(self, max: usize) -> Self {
        self.tune("max_idle_connections_per_host", |tuning| {
            tuning.max_idle_connections_per_host = max
        })
    }

    pub fn tls(self, tls: TlsOptions) -> Self {
        self.tune("tls", |tuning| tuning.tls = tls)
    }

    /// Disables certificate verification. Never use against untrusted hosts.
    pub fn insecure_skip_verify(self, skip: bool) -> Self {
        self.tune("insecure_skip_verify", |tuning| {
            tuning.tls.insecure_skip_verify = skip
        })
    }

    /// Replaces every transport setting at once.
    pub fn tuning(self, replacement: TransportTuning) -> Self {
        self.tune("tuning", |tuning| *tuning = replacement)
    }

    /// Installs a custom executor, replacing any earlier one and any retry wrapping.
    pub fn executor<E>(self, executor: E) -> Self
    where
        E: Executor + 'static,
    {
        self.install(Arc::new(executor))
    }

    /// Installs a caller-built `reqwest::Client` as the low-level transport.
    pub fn reqwest_client(self, http: reqwest::Client) -> Self {
        self.install(Arc::new(ReqwestExecutor::from_client(http)))
    }

    /// Sink for retry events of policies attached after this call.
    pub fn logger(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self.logging_enabled = true;
        self
    }

    /// Turns on retry logging for policies attached after this call.
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// Wraps the currently installed executor in a [`RetryTransport`].
    pub fn retry(mut self, mut policy: RetryPolicy) -> Self {
        if self.retry_attached {
            return self.fail(HttpError::Config(
                "a retry policy is already attached".to_owned(),
            ));
        }
        let base = match self.current_executor() {
            Ok(base) => base,
            Err(err) => return self.fail(err),
        };

        policy.logging_enabled |= self.logging_enabled;
        let sink: Arc<dyn LogSink> = match &self.log_sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(TracingSink),
        };
        let transport = RetryTransport::new(base, policy).with_sink(sink);

        self.slot = ExecutorSlot::Installed(Arc::new(transport));
        self.retry_attached = true;
        self
    }

    pub fn build(self) -> Result<Client> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let executor: Arc<dyn Executor> = match self.slot {
            ExecutorSlot::Tuned(tuning) => Arc::new(ReqwestExecutor::from_tuning(&tuning)?),
            ExecutorSlot::Installed(executor) => executor,
        };
        Ok(Client::from_parts(self.context, executor, self.headers))
    }

    fn tune(mut self, option: &str, apply: impl FnOnce(&mut TransportTuning)) -> Self {
        if let ExecutorSlot::Tuned(tuning) = &mut self.slot {
            apply(tuning);
            return self;
        }
        self.fail(HttpError::Config(format!(
            "`{option}` must be set before a custom executor or retry policy is installed"
        )))
    }

    fn install(mut self, executor: Arc<dyn Executor>) -> Self {
        if self.retry_attached {
            tracing::warn!("executor replaced after retry policy; retry wrapping discarded");
            self.retry_attached = false;
        }
        self.slot = ExecutorSlot::Installed(executor);
        self
    }

    fn current_executor(&self) -> Result<Arc<dyn Executor>> {
        match &self.slot {
            ExecutorSlot::Tuned(tuning) => Ok(Arc::new(ReqwestExecutor::from_tuning(tuning)?)),
            ExecutorSlot::Installed(executor) => Ok(Arc::clone(executor)),
        }
    }

    /// Keeps the first error; later options still run but cannot clear it.
    fn fail(mut self, err: HttpError) -> Self {
        if self.error.is_none() {
            self.error = Some(err);
        }
        self
    }
}
