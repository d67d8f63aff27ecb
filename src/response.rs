use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use url::Url;

use crate::{Body, HttpError, Result};

/// A response produced by an [`Executor`](crate::Executor).
///
/// The body is not read yet; dropping the response releases it together with
/// whatever connection resources back it.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: Option<Url>,
    body: Body,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: None,
            body: body.into(),
        }
    }

    pub fn from_parts(status: StatusCode, headers: HeaderMap, url: Option<Url>, body: Body) -> Self {
        Self {
            status,
            headers,
            url,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Final URL of the exchange, when the executor reports one.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Drains the body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.collect().await.map_err(HttpError::ResponseBody)
    }
}
