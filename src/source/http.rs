use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;

use super::{ContentSource, PageQuery, RawPage, SourceError};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

#[derive(Debug, Error)]
pub enum HttpSetupError {
    #[error("base_url is required")]
    MissingBaseUrl,

    #[error("invalid base_url: {url}")]
    InvalidBaseUrl { url: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Read-API client over HTTP. Collections live under
/// `{base}/collections/{name}/items`; pages are bounded with `limit`
/// and `skip` query parameters; single items under `items/{id}`.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(config: &ClientConfig) -> Result<Self, HttpSetupError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(HttpSetupError::MissingBaseUrl)?;
        if reqwest::Url::parse(base_url).is_err() {
            return Err(HttpSetupError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        if let Ok(value) = reqwest::header::HeaderValue::from_str(user_agent) {
            headers.insert(reqwest::header::USER_AGENT, value);
        }

        let redirect_policy = if config.follow_redirects.unwrap_or(true) {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let timeout = Duration::from_secs(config.timeout.unwrap_or(ClientConfig::DEFAULT_TIMEOUT));
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect_policy)
            .timeout(timeout);

        if let Some(proxy) = config
            .proxy
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            let proxy_setup =
                reqwest::Proxy::all(proxy).map_err(|e| HttpSetupError::ProxySetup {
                    proxy: proxy.to_string(),
                    source: e,
                })?;
            builder = builder.proxy(proxy_setup);
        }

        let client = builder
            .build()
            .map_err(|e| HttpSetupError::HttpClientBuild { source: e })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn items_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/items", self.base_url, collection)
    }

    fn item_url(&self, collection: &str, id: &str) -> String {
        format!("{}/collections/{}/items/{}", self.base_url, collection, id)
    }
}

fn fetch_error(collection: &str, source: reqwest::Error) -> SourceError {
    SourceError::Fetch {
        collection: collection.to_string(),
        source: Box::new(source),
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch_page(&self, collection: &str, query: PageQuery) -> Result<RawPage, SourceError> {
        let mut request = self.client.get(self.items_url(collection));
        if let Some(limit) = query.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(skip) = query.skip {
            request = request.query(&[("skip", skip.to_string())]);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!(collection, error = %e, "page fetch failed");
                fetch_error(collection, e)
            })?;

        response
            .json::<RawPage>()
            .await
            .map_err(|e| fetch_error(collection, e))
    }

    async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(self.item_url(collection, id))
            .send()
            .await
            .map_err(|e| fetch_error(collection, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        let response = response.error_for_status().map_err(|e| {
            tracing::warn!(collection, id, error = %e, "item fetch failed");
            fetch_error(collection, e)
        })?;

        response
            .json::<Value>()
            .await
            .map_err(|e| fetch_error(collection, e))
    }
}
