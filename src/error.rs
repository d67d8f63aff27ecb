use std::io;

use http::StatusCode;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Target URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Request could not be assembled (bad header name or value, bad method).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Structured body could not be serialized to JSON.
    #[error("body encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    /// Form fields could not be URL-encoded.
    #[error("form encoding error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
    /// Response body was not valid JSON for the requested type.
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),
    /// Outbound body stream failed while being read.
    #[error("request body error: {0}")]
    RequestBody(#[source] io::Error),
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Transport-level failure reported by a custom executor.
    #[error("connection error: {0}")]
    Connection(String),
    /// Response body stream failed while being drained.
    #[error("response body error: {0}")]
    ResponseBody(#[source] io::Error),
    /// The execution context was cancelled.
    #[error("request cancelled")]
    Cancelled,
    /// The execution context deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// Client configuration was rejected by the builder.
    #[error("configuration error: {0}")]
    Config(String),
    /// Every attempt allowed by the retry policy failed.
    #[error("retries exhausted after {attempts} attempts: {}", last_cause(.last_status, .source))]
    RetriesExhausted {
        /// Number of requests actually sent.
        attempts: u32,
        /// Status of the last response, when the last attempt produced one.
        last_status: Option<StatusCode>,
        /// Error of the last attempt, when it failed below the HTTP layer.
        source: Option<Box<HttpError>>,
    },
}

impl HttpError {
    /// Returns `true` for cancellation and deadline expiry of the execution context.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns `true` if the failure was a timeout, either per attempt or by deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded => true,
            Self::Transport(err) => err.is_timeout(),
            Self::RetriesExhausted {
                source: Some(source),
                ..
            } => source.is_timeout(),
            _ => false,
        }
    }

    /// Status code of the last response when retries were exhausted on a status.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RetriesExhausted { last_status, .. } => *last_status,
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }
}

fn last_cause(status: &Option<StatusCode>, source: &Option<Box<HttpError>>) -> String {
    match (status, source) {
        (_, Some(err)) => err.to_string(),
        (Some(status), None) => format!("last status {status}"),
        (None, None) => "no attempt was sent".to_owned(),
    }
}
