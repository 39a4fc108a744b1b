//! Manual metadata file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{MetadataError, MetadataProvider, mock_metadata};
use crate::domain::{DomainMetadata, MetadataSource, RequestContext};

/// Lakehouse name left in the template file until the user edits it
const PLACEHOLDER_LAKEHOUSE: &str = "your_lakehouse_name";

/// Metadata entered by hand and saved as JSON
#[derive(Debug, Clone)]
pub struct ManualMetadataProvider {
    path: PathBuf,
}

impl ManualMetadataProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a metadata file, failing on any problem
    pub fn read(path: &Path) -> Result<DomainMetadata, MetadataError> {
        debug!(?path, "ManualMetadataProvider::read: called");
        let text = std::fs::read_to_string(path)?;
        Ok(DomainMetadata::from_json(&text)?)
    }

    /// Load the file if it exists and has been filled in
    pub fn try_load(&self) -> Result<Option<DomainMetadata>, MetadataError> {
        debug!(path = ?self.path, "ManualMetadataProvider::try_load: called");
        if !self.path.exists() {
            debug!("ManualMetadataProvider::try_load: file missing");
            return Ok(None);
        }

        let mut metadata = Self::read(&self.path)?;
        if metadata.lakehouses.first().is_some_and(|lh| lh.name == PLACEHOLDER_LAKEHOUSE) {
            debug!("ManualMetadataProvider::try_load: placeholder template, ignoring");
            return Ok(None);
        }
        metadata.source = MetadataSource::Manual;
        Ok(Some(metadata))
    }

    /// Like [`try_load`](Self::try_load) but logs and swallows errors
    pub fn load(&self) -> Option<DomainMetadata> {
        match self.try_load() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ignoring unreadable manual metadata");
                None
            }
        }
    }
}

#[async_trait]
impl MetadataProvider for ManualMetadataProvider {
    async fn get_metadata(&self, _context: &RequestContext) -> DomainMetadata {
        self.load().unwrap_or_else(|| {
            mock_metadata(MetadataSource::Mock, "Manual metadata not found. Using sample metadata.")
        })
    }
}
