use std::fmt;
use std::sync::Arc;

use http::{header, HeaderMap, HeaderValue, Method};
use parking_lot::RwLock;
use url::Url;

use crate::{
    encode::{encode, IntoBody},
    ClientBuilder, Context, Executor, Form, Reply, ReqwestExecutor, Request, Result,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP client delegating every exchange to an [`Executor`].
///
/// Clones share the executor, the context and the default headers.
#[derive(Clone)]
pub struct Client {
    context: Context,
    executor: Arc<dyn Executor>,
    headers: Arc<RwLock<HeaderMap>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("context", &self.context)
            .field("headers", &self.headers.read().len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client over `reqwest`'s default configuration.
    pub fn new() -> Self {
        Self::from_parts(
            Context::background(),
            Arc::new(ReqwestExecutor::new()),
            HeaderMap::new(),
        )
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        context: Context,
        executor: Arc<dyn Executor>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            context,
            executor,
            headers: Arc::new(RwLock::new(headers)),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Snapshot of the default headers.
    pub fn headers(&self) -> HeaderMap {
        self.headers.read().clone()
    }

    /// Merges `headers` into the defaults; names already present are replaced.
    pub fn merge_headers(&self, headers: HeaderMap) {
        self.headers.write().extend(headers);
    }

    pub async fn get(&self, url: &str) -> Result<Reply> {
        self.send(Method::GET, url, ()).await
    }

    pub async fn post<B: IntoBody>(&self, url: &str, body: B) -> Result<Reply> {
        self.send(Method::POST, url, body).await
    }

    pub async fn put<B: IntoBody>(&self, url: &str, body: B) -> Result<Reply> {
        self.send(Method::PUT, url, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<Reply> {
        self.send(Method::DELETE, url, ()).await
    }

    /// Posts URL-encoded `form` fields with the form content type.
    pub async fn post_form(&self, url: &str, form: &Form) -> Result<Reply> {
        let body = form.encode()?;
        let mut request = self.request(Method::POST, url, body)?;
        request.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(FORM_CONTENT_TYPE),
        );
        self.dispatch(request).await
    }

    /// Sends `body` with an arbitrary method.
    pub async fn send<B: IntoBody>(&self, method: Method, url: &str, body: B) -> Result<Reply> {
        let request = self.request(method, url, body)?;
        self.dispatch(request).await
    }

    fn request<B: IntoBody>(&self, method: Method, url: &str, body: B) -> Result<Request> {
        let body = encode(body)?;
        let url = Url::parse(url)?;
        Ok(Request::new(method, url)
            .with_context(self.context.clone())
            .with_headers(self.headers())
            .with_body(body))
    }

    async fn dispatch(&self, request: Request) -> Result<Reply> {
        let context = request.context().clone();
        let response = context.run(self.executor.execute(request)).await??;
        let status = response.status();
        let body = context.run(response.bytes()).await??;
        tracing::trace!(status = status.as_u16(), bytes = body.len(), "response drained");

        Ok(Reply { body, status })
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
