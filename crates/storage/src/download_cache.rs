//! On-disk cache for downloaded source files.
//!
//! Source NetCDF files are fetched once per storage key and kept for the
//! process lifetime; there is no eviction or freshness check. A cached
//! object is presumed immutable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use climate_common::{ClimateError, ClimateResult};

use crate::ObjectStorage;

/// Local file cache keyed by sanitized object key.
pub struct DownloadCache {
    storage: Arc<ObjectStorage>,
    cache_dir: PathBuf,
}

impl DownloadCache {
    /// Create a cache rooted at `cache_dir`, creating the directory if needed.
    pub fn new(storage: Arc<ObjectStorage>, cache_dir: impl Into<PathBuf>) -> ClimateResult<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| ClimateError::CacheError(format!("Failed to create cache dir: {}", e)))?;
        Ok(Self { storage, cache_dir })
    }

    /// Local path a key maps to, whether or not it exists yet.
    pub fn local_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("dl_{}", sanitize_key(key)))
    }

    /// Fetch an object to the local cache, returning the local path.
    /// A file already present is reused without any freshness check.
    pub async fn fetch(&self, key: &str) -> ClimateResult<PathBuf> {
        let local = self.local_path(key);
        if local.exists() {
            debug!(key = %key, "Download cache hit");
            return Ok(local);
        }

        let bytes = self.storage.get(key).await?;

        // Write to a temp name first so a partial download never looks cached.
        let tmp = local.with_extension("part");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| ClimateError::CacheError(format!("Failed to create {:?}: {}", tmp, e)))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| ClimateError::CacheError(format!("Failed to write {:?}: {}", tmp, e)))?;
        file.flush()
            .await
            .map_err(|e| ClimateError::CacheError(format!("Failed to flush {:?}: {}", tmp, e)))?;
        drop(file);

        tokio::fs::rename(&tmp, &local)
            .await
            .map_err(|e| ClimateError::CacheError(format!("Failed to finalize {:?}: {}", local, e)))?;

        info!(key = %key, path = ?local, size = bytes.len(), "Downloaded source file");
        Ok(local)
    }

    /// Cache directory root (also used for derived artifacts).
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Replace path separators and other awkward characters so any object key
/// maps to a single flat file name.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
