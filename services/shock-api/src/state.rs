//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::info;

use country_mask::CountryMask;
use ensemble::EnsembleBuilder;
use regrid::StorageDatasetSource;
use shock::{ShockEngine, ThresholdStore};
use storage::{Catalog, DownloadCache, ObjectStorage};

use crate::config::ApiConfig;

/// Shared state behind every handler.
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<ObjectStorage>,
    pub cache_dir: PathBuf,

    /// In-memory catalog; None until a reindex or manifest load.
    pub catalog: RwLock<Option<Arc<Catalog>>>,

    /// In-memory country mask; None until ensured.
    pub mask: RwLock<Option<Arc<CountryMask>>>,

    pub engine: ShockEngine,
}

impl AppState {
    /// Build state from configuration, picking up any artifacts a
    /// previous run left in the cache directory.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let storage = Arc::new(ObjectStorage::new(&config.storage)?);
        let cache = Arc::new(DownloadCache::new(
            Arc::clone(&storage),
            &config.cache_dir,
        )?);
        let cache_dir = PathBuf::from(&config.cache_dir);

        let catalog = match Catalog::load(&cache_dir) {
            Ok(catalog) => {
                info!(count = catalog.count, "Loaded persisted catalog");
                Some(Arc::new(catalog))
            }
            Err(_) => None,
        };

        let mask = match CountryMask::load(&cache_dir) {
            Ok(mask) => {
                info!(countries = mask.countries.len(), "Loaded persisted country mask");
                Some(Arc::new(mask))
            }
            Err(_) => None,
        };

        let builder = EnsembleBuilder::new(Arc::new(StorageDatasetSource::new(cache)));
        let engine = ShockEngine::new(builder, ThresholdStore::new(&cache_dir));

        Ok(Self {
            config,
            storage,
            cache_dir,
            catalog: RwLock::new(catalog),
            mask: RwLock::new(mask),
            engine,
        })
    }

    /// Current catalog, or the error clients should see before a reindex.
    pub async fn require_catalog(&self) -> Result<Arc<Catalog>, climate_common::ClimateError> {
        self.catalog.read().await.clone().ok_or_else(|| {
            climate_common::ClimateError::CatalogNotFound(
                "no catalog loaded; POST /catalog/reindex first".to_string(),
            )
        })
    }

    /// Current mask, or the error clients should see before it is built.
    pub async fn require_mask(&self) -> Result<Arc<CountryMask>, climate_common::ClimateError> {
        self.mask.read().await.clone().ok_or_else(|| {
            climate_common::ClimateError::MaskNotBuilt(
                "POST /mask/ensure first".to_string(),
            )
        })
    }
}
