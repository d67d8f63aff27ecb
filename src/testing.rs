//! Executor and log-sink doubles shared by unit tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use tracing::Level;
use url::Url;

use crate::{Body, Executor, HttpError, LogSink, Request, Response, Result};

/// What the scripted executor does for one call.
#[derive(Clone, Debug)]
pub(crate) enum Step {
    Respond { status: StatusCode, body: Bytes },
    Connection(String),
    Deadline,
    /// Ignores the request context and never answers in test time.
    Hang,
}

impl Step {
    pub(crate) fn status(code: u16) -> Self {
        Self::respond(code, "")
    }

    pub(crate) fn respond(code: u16, body: &'static str) -> Self {
        Self::Respond {
            status: StatusCode::from_u16(code).expect("valid status code"),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub(crate) fn error(message: &str) -> Self {
        Self::Connection(message.to_owned())
    }
}

/// A request as observed by [`ScriptedExecutor`].
#[derive(Clone, Debug)]
pub(crate) struct Seen {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub at: Instant,
}

/// Replays a fixed list of steps, recording every request it receives.
#[derive(Debug)]
pub(crate) struct ScriptedExecutor {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    seen: Mutex<Vec<Seen>>,
    pub released: Arc<AtomicUsize>,
}

impl ScriptedExecutor {
    pub(crate) fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
            released: Arc::default(),
        })
    }

    pub(crate) fn always(step: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Some(step),
            seen: Mutex::new(Vec::new()),
            released: Arc::default(),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub(crate) fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    fn next_step(&self) -> Step {
        self.steps
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Step::respond(500, "no scripted step left"))
    }
}

struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, request: Request) -> Result<Response> {
        let (method, url, headers, body, _context) = request.into_parts();
        let body = match body {
            Some(body) => body.collect().await.map_err(HttpError::RequestBody)?,
            None => Bytes::new(),
        };
        self.seen.lock().push(Seen {
            method,
            url,
            headers,
            body,
            at: Instant::now(),
        });

        match self.next_step() {
            Step::Respond { status, body } => {
                let guard = ReleaseGuard(self.released.clone());
                let chunks = futures::stream::once(async move { Ok(body) }).map(move |chunk| {
                    let _guard = &guard;
                    chunk
                });
                Ok(Response::new(status, Body::from_stream(chunks)))
            }
            Step::Connection(message) => Err(HttpError::Connection(message)),
            Step::Deadline => Err(HttpError::DeadlineExceeded),
            Step::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(Response::new(StatusCode::OK, Body::empty()))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Event {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl Event {
    pub(crate) fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Log sink that keeps every event in memory.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: Level, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        self.events.lock().push(Event {
            level,
            message: message.to_owned(),
            fields: fields
                .iter()
                .map(|(key, value)| ((*key).to_owned(), value.to_string()))
                .collect(),
        });
    }
}
