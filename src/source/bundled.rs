use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{ContentSource, PageQuery, RawPage, SourceError};

/// In-memory collections shipped with the site: the static default a
/// page falls back to when the remote tier is unavailable. Paging
/// semantics match the remote contract.
#[derive(Clone, Debug, Default)]
pub struct BundledSource {
    collections: HashMap<String, Vec<Value>>,
}

impl BundledSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_items(mut self, collection: impl Into<String>, items: Vec<Value>) -> Self {
        self.collections.insert(collection.into(), items);
        self
    }

    /// Registers typed records under a collection name. Records are
    /// stored as raw items so they round-trip through the same decode
    /// path as remote ones.
    pub fn with_records<T: Serialize>(
        self,
        collection: impl Into<String>,
        records: &[T],
    ) -> Result<Self, serde_json::Error> {
        let items = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_items(collection, items))
    }
}

fn item_id(item: &Value) -> Option<&str> {
    item.get("_id").and_then(Value::as_str)
}

#[async_trait]
impl ContentSource for BundledSource {
    async fn fetch_page(&self, collection: &str, query: PageQuery) -> Result<RawPage, SourceError> {
        let items = self
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(items.len());
        let page: Vec<Value> = items.iter().skip(skip).take(limit).cloned().collect();
        let has_next = skip.saturating_add(limit) < items.len();

        Ok(RawPage {
            items: page,
            has_next,
        })
    }

    async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Value, SourceError> {
        self.collections
            .get(collection)
            .and_then(|items| items.iter().find(|item| item_id(item) == Some(id)))
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }
}

/// Two-tier source: try the remote tier first, serve the bundled tier
/// when the remote errors or has nothing on the first page. Deeper
/// pages of a collection that already produced items never switch
/// tiers mid-stream.
pub struct TieredSource {
    primary: Arc<dyn ContentSource>,
    fallback: Arc<dyn ContentSource>,
}

impl TieredSource {
    pub fn new(primary: Arc<dyn ContentSource>, fallback: Arc<dyn ContentSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ContentSource for TieredSource {
    async fn fetch_page(&self, collection: &str, query: PageQuery) -> Result<RawPage, SourceError> {
        let first_page = query.skip.unwrap_or(0) == 0;
        match self.primary.fetch_page(collection, query).await {
            Ok(page) if page.items.is_empty() && first_page => {
                tracing::debug!(collection, "remote tier empty, serving bundled items");
                self.fallback.fetch_page(collection, query).await
            }
            Ok(page) => Ok(page),
            Err(e) => {
                tracing::warn!(collection, error = %e, "remote tier failed, serving bundled items");
                self.fallback.fetch_page(collection, query).await
            }
        }
    }

    async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Value, SourceError> {
        match self.primary.fetch_by_id(collection, id).await {
            Ok(item) => Ok(item),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(collection, id, error = %e, "remote tier failed, trying bundled items");
                }
                self.fallback.fetch_by_id(collection, id).await
            }
        }
    }
}
