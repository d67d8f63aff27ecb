use std::sync::OnceLock;

use http::Method;

use crate::{encode::IntoBody, Client, Form, Reply, Result};

static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();

/// Process-wide client behind the crate-level verb functions.
///
/// Built on first use with default settings and never replaced.
pub fn default_client() -> &'static Client {
    DEFAULT_CLIENT.get_or_init(Client::new)
}

/// `GET` through the default client.
pub async fn get(url: &str) -> Result<Reply> {
    default_client().get(url).await
}

/// `POST` through the default client.
pub async fn post<B: IntoBody>(url: &str, body: B) -> Result<Reply> {
    default_client().post(url, body).await
}

/// `PUT` through the default client.
pub async fn put<B: IntoBody>(url: &str, body: B) -> Result<Reply> {
    default_client().put(url, body).await
}

/// `DELETE` through the default client.
pub async fn delete(url: &str) -> Result<Reply> {
    default_client().delete(url).await
}

/// Form `POST` through the default client.
pub async fn post_form(url: &str, form: &Form) -> Result<Reply> {
    default_client().post_form(url, form).await
}

/// Any method through the default client.
pub async fn send<B: IntoBody>(method: Method, url: &str, body: B) -> Result<Reply> {
    default_client().send(method, url, body).await
}

#[cfg(test)]
mod tests {
    use super::default_client;

    #[test]
    fn default_client_is_built_once() {
        let first = default_client() as *const _;
        let second = default_client() as *const _;
        assert_eq!(first, second);
    }
}
