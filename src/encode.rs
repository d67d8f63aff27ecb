use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;

use crate::{Body, Result};

/// Converts a value into an optional request body.
///
/// - `()` and `None` send no body;
/// - [`Body`] and [`Bytes`] pass through unchanged;
/// - text is sent as its UTF-8 bytes;
/// - [`Json`] and [`serde_json::Value`] are serialized to JSON.
///
/// No `Content-Type` header is implied by any of these.
pub trait IntoBody {
    fn into_body(self) -> Result<Option<Body>>;
}

/// Runs the body codec over `value`.
pub fn encode<B: IntoBody>(value: B) -> Result<Option<Body>> {
    value.into_body()
}

/// Marks a value to be sent as its JSON representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl IntoBody for () {
    fn into_body(self) -> Result<Option<Body>> {
        Ok(None)
    }
}

impl<T: IntoBody> IntoBody for Option<T> {
    fn into_body(self) -> Result<Option<Body>> {
        match self {
            Some(value) => value.into_body(),
            None => Ok(None),
        }
    }
}

impl IntoBody for Body {
    fn into_body(self) -> Result<Option<Body>> {
        Ok(Some(self))
    }
}

impl IntoBody for Bytes {
    fn into_body(self) -> Result<Option<Body>> {
        Ok(Some(Body::from(self)))
    }
}

impl IntoBody for Vec<u8> {
    fn into_body(self) -> Result<Option<Body>> {
        Ok(Some(Body::from(self)))
    }
}

impl IntoBody for String {
    fn into_body(self) -> Result<Option<Body>> {
        Ok(Some(Body::from(self)))
    }
}

impl IntoBody for &str {
    fn into_body(self) -> Result<Option<Body>> {
        Ok(Some(Body::from(Bytes::copy_from_slice(self.as_bytes()))))
    }
}

impl IntoBody for serde_json::Value {
    fn into_body(self) -> Result<Option<Body>> {
        Json(self).into_body()
    }
}

impl<T: Serialize> IntoBody for Json<T> {
    fn into_body(self) -> Result<Option<Body>> {
        let bytes = serde_json::to_vec(&self.0)?;
        Ok(Some(Body::from(bytes)))
    }
}

/// Multi-valued form fields for `application/x-www-form-urlencoded` bodies.
///
/// Keys encode in sorted order and values keep insertion order, so the same
/// fields always produce the same body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Form {
    fields: BTreeMap<String, Vec<String>>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, keeping existing values for the same key.
    pub fn append(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Replaces all values for `key`.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), vec![value.into()]);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// URL-encodes the fields.
    pub fn encode(&self) -> Result<String> {
        let pairs: Vec<(&str, &str)> = self
            .fields
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .map(move |value| (key.as_str(), value.as_str()))
            })
            .collect();
        Ok(serde_urlencoded::to_string(pairs)?)
    }
}

impl<K, V> FromIterator<(K, V)> for Form
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |form, (key, value)| form.append(key, value))
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Form
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
