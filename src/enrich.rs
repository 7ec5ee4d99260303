//! External content used for enriched messages.

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::SourceError, format::Excerpt};

/// One entry of the external collection. Fields are free-form.
pub type Item = serde_json::Map<String, Value>;

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_collection(&self) -> Result<Vec<Item>, SourceError>;
}

/// A JSON endpoint returning an array of objects.
pub struct HttpContentSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpContentSource {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_owned() }
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_collection(&self) -> Result<Vec<Item>, SourceError> {
        let body: Value = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_items(body)
    }
}

pub fn parse_items(body: Value) -> Result<Vec<Item>, SourceError> {
    let Value::Array(entries) = body else {
        return Err(SourceError::Payload(format!("expected an array, got {body}")));
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(item) => Ok(item),
            other => Err(SourceError::Payload(format!("expected an object, got {other}"))),
        })
        .collect()
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> Result<&str, SourceError>;
    fn get_str_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str;
}

impl GetField for Item {
    fn get_str_field(&self, field: &str) -> Result<&str, SourceError> {
        self.get(field)
            .ok_or(SourceError::Payload(format!("expected {field} in item")))?
            .as_str()
            .ok_or(SourceError::Payload(format!("expected {field} in item to be string")))
    }

    fn get_str_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.get(field).and_then(Value::as_str).unwrap_or(default)
    }
}

/// Builds the excerpt for one item. Only `title` is required.
pub fn excerpt_from_item(item: &Item) -> Result<Excerpt, SourceError> {
    Ok(Excerpt::new(
        item.get_str_field("title")?,
        item.get_str_or("director", ""),
        item.get_str_or("release_date", ""),
        item.get_str_or("description", ""),
    ))
}
