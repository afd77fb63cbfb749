//! REST implementation of the category service.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Settings;
use crate::domain::{CategoryId, CategoryNode};
use crate::infrastructure::traits::{CategoryService, CategoryUpdate};
use crate::infrastructure::{InfraError, InfraResult, RemoteError};

const TENANT_HEADER: &str = "x-tenant";

#[derive(Debug, Serialize)]
struct PositionPatch {
    position: i64,
    version: u64,
}

/// Category service backed by the REST API.
///
/// No retries and no request timeout: callers decide retry policy.
pub struct HttpCategoryService {
    client: Client,
    base_url: Url,
}

impl HttpCategoryService {
    pub fn new(settings: &Settings) -> InfraResult<Self> {
        let base_url = Url::parse(&settings.api_url).map_err(|e| InfraError::Http {
            message: format!("invalid api_url {}: {e}", settings.api_url),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::Http {
                message: format!("api_url cannot be a base: {}", settings.api_url),
            });
        }
        let client = Client::builder()
            .default_headers(default_headers(settings)?)
            .build()
            .map_err(|e| InfraError::Http {
                message: format!("build client: {e}"),
            })?;
        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        decode(resp).await
    }
}

fn default_headers(settings: &Settings) -> InfraResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = &settings.auth_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| InfraError::Http {
            message: format!("invalid auth header: {e}"),
        })?;
        headers.insert(AUTHORIZATION, value);
    }
    if let Some(tenant) = &settings.tenant {
        let value = HeaderValue::from_str(tenant).map_err(|e| InfraError::Http {
            message: format!("invalid tenant header: {e}"),
        })?;
        headers.insert(HeaderName::from_static(TENANT_HEADER), value);
    }
    Ok(headers)
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RemoteError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl CategoryService for HttpCategoryService {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_roots(&self) -> Result<Vec<CategoryNode>, RemoteError> {
        let url = self.url(&["categories", "roots"])?;
        self.get_json(url).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_children(&self, parent: &CategoryId) -> Result<Vec<CategoryNode>, RemoteError> {
        let url = self.url(&["categories", parent.as_str(), "children"])?;
        self.get_json(url).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn update_position(
        &self,
        id: &CategoryId,
        position: i64,
        expected_version: u64,
    ) -> Result<CategoryUpdate, RemoteError> {
        let url = self.url(&["categories", id.as_str()])?;
        debug!("PATCH {url} position={position} version={expected_version}");
        let resp = self
            .client
            .patch(url)
            .json(&PositionPatch {
                position,
                version: expected_version,
            })
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(RemoteError::Conflict {
                id: id.clone(),
                expected_version,
            });
        }
        decode(resp).await
    }
}
