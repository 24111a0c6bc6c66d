mod bundled;
mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use bundled::{BundledSource, TieredSource};
pub use http::{HttpSetupError, HttpSource};

/// Bounds for one page request.
#[derive(Clone, Copy, Debug, Default)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl PageQuery {
    #[must_use]
    pub const fn page(limit: usize, skip: usize) -> Self {
        Self {
            limit: Some(limit),
            skip: Some(skip),
        }
    }
}

/// One page of a named collection as the read API returns it: raw
/// items plus the server's own signal for whether another page exists.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    pub items: Vec<Value>,
    #[serde(default)]
    pub has_next: bool,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("collection '{collection}' has no item with id '{id}'")]
    NotFound { collection: String, id: String },

    #[error("failed to fetch collection '{collection}': {source}")]
    Fetch {
        collection: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("failed to decode item from '{collection}': {source}")]
    Decode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SourceError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The content read API. Collections are named; items are opaque JSON
/// until an entity type decodes them. Implementations must be shareable
/// across pages and in-flight requests.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_page(&self, collection: &str, query: PageQuery) -> Result<RawPage, SourceError>;

    async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Value, SourceError>;
}

/// Decodes a page of raw items into an entity type, attributing decode
/// failures to the collection they came from.
pub fn decode_items<T: DeserializeOwned>(
    collection: &str,
    items: Vec<Value>,
) -> Result<Vec<T>, SourceError> {
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| SourceError::Decode {
                collection: collection.to_string(),
                source: e,
            })
        })
        .collect()
}

/// Typed single-item lookup.
pub async fn fetch_item<T: DeserializeOwned>(
    source: &dyn ContentSource,
    collection: &str,
    id: &str,
) -> Result<T, SourceError> {
    let raw = source.fetch_by_id(collection, id).await?;
    serde_json::from_value(raw).map_err(|e| SourceError::Decode {
        collection: collection.to_string(),
        source: e,
    })
}
