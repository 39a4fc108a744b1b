//! Fabric REST API metadata provider
//!
//! Lists the caller's workspaces, then the lakehouses in each one, using
//! the caller's own bearer token. Table listings need a separate API the
//! caller may not have rights to, so lakehouse tables are left empty.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{MetadataError, MetadataProvider, mock_metadata};
use crate::config::MetadataConfig;
use crate::domain::{DomainMetadata, Lakehouse, MetadataSource, RequestContext, Workspace};

pub struct FabricMetadataProvider {
    base_url: String,
    http: Client,
}

impl FabricMetadataProvider {
    pub fn from_config(config: &MetadataConfig) -> Result<Self, MetadataError> {
        debug!(base_url = %config.api_base_url, "FabricMetadataProvider::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, token: &str) -> Result<T, MetadataError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "FabricMetadataProvider::get_json: called");
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(%url, status = status.as_u16(), "FabricMetadataProvider::get_json: API error");
            return Err(MetadataError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Fetch workspaces and lakehouses for the token's owner
    ///
    /// Fails only when the workspace listing fails; a workspace whose
    /// lakehouses cannot be listed is skipped.
    pub async fn fetch(&self, token: &str) -> Result<DomainMetadata, MetadataError> {
        debug!("FabricMetadataProvider::fetch: called");
        let listing: ItemList = self.get_json("/v1/workspaces", token).await?;
        let workspaces: Vec<Workspace> = listing
            .value
            .into_iter()
            .map(|item| Workspace {
                id: item.id,
                name: item.display_name,
            })
            .collect();

        let mut lakehouses = Vec::new();
        for ws in &workspaces {
            let path = format!("/v1/workspaces/{}/items?type=Lakehouse", ws.id);
            match self.get_json::<ItemList>(&path, token).await {
                Ok(items) => lakehouses.extend(items.value.into_iter().map(|item| Lakehouse {
                    id: item.id,
                    name: item.display_name,
                    workspace_id: Some(ws.id.clone()),
                    workspace_name: Some(ws.name.clone()),
                    tables: Vec::new(),
                })),
                Err(e) => warn!(workspace = %ws.name, error = %e, "Could not list lakehouses"),
            }
        }

        info!(
            workspaces = workspaces.len(),
            lakehouses = lakehouses.len(),
            "Fetched metadata from platform API"
        );
        Ok(DomainMetadata {
            workspaces,
            lakehouses,
            table_schemas: Vec::new(),
            source: MetadataSource::Api,
            message: None,
        })
    }
}

#[async_trait]
impl MetadataProvider for FabricMetadataProvider {
    async fn get_metadata(&self, context: &RequestContext) -> DomainMetadata {
        let Some(token) = context.user_token.as_deref() else {
            debug!("FabricMetadataProvider::get_metadata: no token");
            return mock_metadata(MetadataSource::Mock, "No credentials provided.");
        };

        match self.fetch(token).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "Metadata API failed, using mock metadata");
                mock_metadata(
                    MetadataSource::Error,
                    "Could not fetch workspaces. Please check API permissions.",
                )
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    value: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    id: String,
    display_name: String,
}
