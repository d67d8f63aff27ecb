//! `failover-http` is an async HTTP client with retries, backoff and endpoint
//! failover.
//!
//! The crate is layered around the [`Executor`] trait:
//! - [`Client`] encodes bodies, applies default headers and drains replies;
//! - [`RetryTransport`] decorates any executor with retries, exponential
//!   backoff, round-robin failover and body replay;
//! - [`ReqwestExecutor`] performs the network I/O;
//! - [`ClientBuilder`] composes the above in call order.
//!
//! Crate-level [`get`], [`post`], [`put`], [`delete`] and [`post_form`] go
//! through a lazily built [`default_client`].

mod body;
mod builder;
mod client;
mod context;
mod encode;
mod error;
mod executor;
mod global;
mod log;
mod options;
mod request;
mod response;
mod retry;
mod types;

#[cfg(test)]
mod testing;

pub use body::Body;
pub use builder::ClientBuilder;
pub use client::Client;
pub use context::Context;
pub use encode::{encode, Form, IntoBody, Json};
pub use error::HttpError;
pub use executor::{Executor, ReqwestExecutor};
pub use global::{default_client, delete, get, post, post_form, put, send};
pub use log::{LogSink, TracingSink};
pub use options::{TlsOptions, TlsVersion, TransportTuning};
pub use request::Request;
pub use response::Response;
pub use retry::{RetryPolicy, RetryTransport};
pub use types::Reply;

pub use bytes::Bytes;
pub use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
pub use url::Url;

pub type Result<T> = std::result::Result<T, HttpError>;
