use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::{Body, HttpError, Request, Response, Result, TransportTuning};

/// Performs one request/response exchange.
///
/// Implemented by [`ReqwestExecutor`], by [`RetryTransport`](crate::RetryTransport)
/// as a decorator, and by any custom network stack or test double.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request).await
    }
}

/// Executor backed by a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestExecutor {
    http: reqwest::Client,
    per_host_limit: usize,
    hosts: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl fmt::Debug for ReqwestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestExecutor")
            .field("per_host_limit", &self.per_host_limit)
            .finish()
    }
}

impl ReqwestExecutor {
    /// Executor over `reqwest`'s default client.
    pub fn new() -> Self {
        Self::from_client(reqwest::Client::new())
    }

    /// Wraps a caller-built `reqwest::Client` as the low-level transport.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self {
            http,
            per_host_limit: 0,
            hosts: Arc::default(),
        }
    }

    /// Builds a client honouring every [`TransportTuning`] field.
    pub fn from_tuning(tuning: &TransportTuning) -> Result<Self> {
        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(tuning.idle_per_host());

        if !tuning.timeout.is_zero() {
            builder = builder.timeout(tuning.timeout);
        }
        if tuning.tls.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        for pem in &tuning.tls.root_certificates {
            let certificate = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|err| HttpError::Config(format!("invalid root certificate: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(version) = tuning.tls.min_version {
            builder = builder.min_tls_version(version.into());
        }

        let http = builder
            .build()
            .map_err(|err| HttpError::Config(format!("cannot build http client: {err}")))?;

        Ok(Self {
            http,
            per_host_limit: tuning.max_connections_per_host,
            hosts: Arc::default(),
        })
    }

    fn host_semaphore(&self, url: &Url) -> Option<Arc<Semaphore>> {
        if self.per_host_limit == 0 {
            return None;
        }
        let key = format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        );
        let mut hosts = self.hosts.lock();
        // Only the map holds a reference: no request is waiting or in flight.
        hosts.retain(|_, semaphore| Arc::strong_count(semaphore) > 1);
        let semaphore = hosts
            .entry(key)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)));
        Some(Arc::clone(semaphore))
    }
}

impl Default for ReqwestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ReqwestExecutor {
    async fn execute(&self, request: Request) -> Result<Response> {
        let (method, url, headers, body, context) = request.into_parts();

        let permit: Option<OwnedSemaphorePermit> = match self.host_semaphore(&url) {
            Some(semaphore) => Some(
                context
                    .run(semaphore.acquire_owned())
                    .await?
                    .map_err(|_| HttpError::Connection("host connection limiter closed".to_owned()))?,
            ),
            None => None,
        };

        let mut builder = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            let bytes = context
                .run(body.collect())
                .await?
                .map_err(HttpError::RequestBody)?;
            builder = builder.body(bytes);
        }

        let response = context.run(builder.send()).await??;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();

        let chunks = response.bytes_stream().map_err(io::Error::other);
        let body = match permit {
            // The permit is held until the body is drained or dropped.
            Some(permit) => Body::from_stream(chunks.map(move |chunk| {
                let _held = &permit;
                chunk
            })),
            None => Body::from_stream(chunks),
        };

        Ok(Response::from_parts(status, headers, Some(final_url), body))
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::ReqwestExecutor;
    use crate::TransportTuning;

    #[test]
    fn per_host_limiter_is_shared_per_authority() {
        let executor = ReqwestExecutor::from_tuning(&TransportTuning {
            max_connections_per_host: 2,
            ..TransportTuning::default()
        })
        .unwrap();

        let a1 = executor
            .host_semaphore(&Url::parse("http://a.test/one").unwrap())
            .unwrap();
        let a2 = executor
            .host_semaphore(&Url::parse("http://a.test:80/two").unwrap())
            .unwrap();
        let b = executor
            .host_semaphore(&Url::parse("http://b.test/").unwrap())
            .unwrap();

        assert!(std::sync::Arc::ptr_eq(&a1, &a2));
        assert!(!std::sync::Arc::ptr_eq(&a1, &b));
        assert_eq!(a1.available_permits(), 2);
    }

    #[test]
    fn idle_host_limiters_are_pruned() {
        let executor = ReqwestExecutor::from_tuning(&TransportTuning {
            max_connections_per_host: 1,
            ..TransportTuning::default()
        })
        .unwrap();

        let held = executor
            .host_semaphore(&Url::parse("http://held.test/").unwrap())
            .unwrap();
        drop(
            executor
                .host_semaphore(&Url::parse("http://idle.test/").unwrap())
                .unwrap(),
        );
        let _fresh = executor
            .host_semaphore(&Url::parse("http://fresh.test/").unwrap())
            .unwrap();

        let hosts = executor.hosts.lock();
        assert_eq!(hosts.len(), 2);
        assert!(hosts.contains_key("held.test:80"));
        assert!(hosts.contains_key("fresh.test:80"));
        assert!(!hosts.contains_key("idle.test:80"));
        drop(held);
    }

    #[test]
    fn unlimited_tuning_skips_limiter() {
        let executor = ReqwestExecutor::from_tuning(&TransportTuning::default()).unwrap();
        assert!(executor
            .host_semaphore(&Url::parse("http://a.test/").unwrap())
            .is_none());
    }
}
