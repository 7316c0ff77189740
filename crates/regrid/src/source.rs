//! Where datasets come from. The trait exists so ensemble pipelines can
//! be driven by synthetic in-memory datasets in tests.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use climate_common::{ClimateError, ClimateResult};
use storage::{DownloadCache, FileRecord};

use crate::dataset::RawDataset;
use crate::netcdf_io::read_dataset;

/// Provider of decoded datasets for catalog records.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn load(&self, record: &FileRecord) -> ClimateResult<RawDataset>;
}

/// Production source: fetch the NetCDF file through the download cache
/// and decode it off the async runtime.
pub struct StorageDatasetSource {
    cache: Arc<DownloadCache>,
}

impl StorageDatasetSource {
    pub fn new(cache: Arc<DownloadCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl DatasetSource for StorageDatasetSource {
    #[instrument(skip(self), fields(key = %record.storage_key))]
    async fn load(&self, record: &FileRecord) -> ClimateResult<RawDataset> {
        let path = self.cache.fetch(&record.storage_key).await?;
        tokio::task::spawn_blocking(move || read_dataset(&path))
            .await
            .map_err(|e| ClimateError::InternalError(format!("Decode task failed: {}", e)))?
    }
}
