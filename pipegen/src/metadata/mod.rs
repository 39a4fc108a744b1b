//! Domain metadata providers
//!
//! Resolve the workspaces, lakehouses and tables available to a caller.
//! Providers never fail outright: when nothing better is available they
//! return mock metadata tagged with its source so the UI can say so.
//!
//! Resolution order in [`ChainedMetadataProvider`]:
//! 1. The platform REST API, when the caller sent a bearer token
//! 2. A manual metadata file
//! 3. Mock metadata

mod fabric;
mod manual;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub use fabric::FabricMetadataProvider;
pub use manual::ManualMetadataProvider;

use crate::config::MetadataConfig;
use crate::domain::{DomainMetadata, Lakehouse, MetadataSource, RequestContext, TableRef, Workspace};

/// Errors while loading metadata from one source
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read metadata file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metadata API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metadata API returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn get_metadata(&self, context: &RequestContext) -> DomainMetadata;
}

/// Sample metadata used when no real source is available
pub fn mock_metadata(source: MetadataSource, message: impl Into<String>) -> DomainMetadata {
    DomainMetadata {
        workspaces: vec![Workspace {
            id: "ws-123".to_string(),
            name: "Sales Workspace".to_string(),
        }],
        lakehouses: vec![Lakehouse {
            id: "lh-123".to_string(),
            name: "sales_lakehouse".to_string(),
            workspace_id: None,
            workspace_name: None,
            tables: ["sales_raw", "customers", "products"]
                .into_iter()
                .map(|t| TableRef::Name(t.to_string()))
                .collect(),
        }],
        table_schemas: Vec::new(),
        source,
        message: Some(message.into()),
    }
}

/// Token -> manual file -> mock
pub struct ChainedMetadataProvider {
    api: Option<FabricMetadataProvider>,
    manual: Option<ManualMetadataProvider>,
}

impl ChainedMetadataProvider {
    pub fn new(api: Option<FabricMetadataProvider>, manual: Option<ManualMetadataProvider>) -> Self {
        Self { api, manual }
    }

    pub fn from_config(config: &MetadataConfig) -> Self {
        debug!(?config, "ChainedMetadataProvider::from_config: called");
        let api = match FabricMetadataProvider::from_config(config) {
            Ok(api) => Some(api),
            Err(e) => {
                warn!(error = %e, "Metadata API client unavailable");
                None
            }
        };
        Self::new(api, config.manual_path.clone().map(ManualMetadataProvider::new))
    }

    pub fn shared(self) -> Arc<dyn MetadataProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl MetadataProvider for ChainedMetadataProvider {
    async fn get_metadata(&self, context: &RequestContext) -> DomainMetadata {
        debug!(has_token = context.user_token.is_some(), "ChainedMetadataProvider::get_metadata: called");
        if let (Some(api), Some(_)) = (&self.api, &context.user_token) {
            debug!("ChainedMetadataProvider::get_metadata: using platform API");
            return api.get_metadata(context).await;
        }

        if let Some(manual) = &self.manual
            && let Some(metadata) = manual.load()
        {
            debug!("ChainedMetadataProvider::get_metadata: using manual metadata");
            return metadata;
        }

        debug!("ChainedMetadataProvider::get_metadata: falling back to mock");
        mock_metadata(
            MetadataSource::Mock,
            "No credentials provided. Please sign in or configure manual metadata.",
        )
    }
}
