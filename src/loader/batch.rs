use serde_json::Value;

use crate::source::{ContentSource, PageQuery, SourceError};

/// One collection to fetch in a batch, bounded to `limit` items.
#[derive(Clone, Debug)]
pub struct BatchRequest {
    pub collection: String,
    pub limit: usize,
}

impl BatchRequest {
    pub fn new(collection: impl Into<String>, limit: usize) -> Self {
        Self {
            collection: collection.into(),
            limit,
        }
    }
}

/// Result of one collection in a batch. Failures are per collection;
/// a failed fetch never poisons its neighbours.
#[derive(Debug)]
pub struct BatchOutcome {
    pub collection: String,
    pub result: Result<Vec<Value>, SourceError>,
}

/// Fetches several independent collections in parallel and resolves
/// once all of them have settled. Outcomes come back in request order.
pub async fn load_batch(
    source: &dyn ContentSource,
    requests: &[BatchRequest],
) -> Vec<BatchOutcome> {
    let fetches = requests.iter().map(|request| async move {
        let result = source
            .fetch_page(&request.collection, PageQuery::page(request.limit, 0))
            .await
            .map(|page| page.items);
        if let Err(e) = &result {
            tracing::warn!(collection = %request.collection, error = %e, "batch fetch failed");
        }
        BatchOutcome {
            collection: request.collection.clone(),
            result,
        }
    });

    futures::future::join_all(fetches).await
}
