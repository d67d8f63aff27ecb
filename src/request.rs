use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::{Body, Context};

/// An outbound request as seen by an [`Executor`](crate::Executor).
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    context: Context,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            context: Context::background(),
        }
    }

    /// Binds the request to an execution context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Option<Body>) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Detaches the body, leaving the request without one.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Clones the request when its body can be replayed.
    pub fn try_clone(&self) -> Option<Self> {
        let body = match &self.body {
            Some(body) => Some(body.try_clone()?),
            None => None,
        };
        Some(Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
            context: self.context.clone(),
        })
    }

    /// Builds a copy aimed at `url` carrying a fresh body over `body`.
    pub(crate) fn rebind(&self, url: Url, body: Option<&Bytes>) -> Self {
        Self {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: body.map(|bytes| Body::from(bytes.clone())),
            context: self.context.clone(),
        }
    }

    pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<Body>, Context) {
        (self.method, self.url, self.headers, self.body, self.context)
    }
}
