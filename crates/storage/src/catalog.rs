//! File catalog over the object-storage archive.
//!
//! Archive keys follow the naming grammar
//! `var_freq_model_scenario_run_grid_YYYYMM-YYYYMM.nc`. A reindex walks
//! the whole listing, keeps only keys that fully match, and replaces the
//! persisted manifest atomically; there is no incremental merge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use climate_common::{ClimateError, ClimateResult, YearMonth};

use crate::ObjectStorage;

/// Manifest file name inside the cache directory.
const MANIFEST_FILE: &str = "catalog_index.json";

/// One parsed archive file. Immutable once parsed; identified by its
/// storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub variable: String,
    pub frequency: String,
    pub model: String,
    pub scenario: String,
    pub run: String,
    pub grid_tag: String,
    pub start: YearMonth,
    pub end: YearMonth,
    pub storage_key: String,
}

impl FileRecord {
    /// Parse an object key against the naming grammar. Returns None for
    /// any key that does not fully match; such keys are dropped, never
    /// stored.
    pub fn parse_key(key: &str) -> Option<Self> {
        let basename = key.rsplit('/').next()?;
        let stem = basename.strip_suffix(".nc")?;

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 7 {
            return None;
        }
        if parts.iter().take(6).any(|p| p.is_empty()) {
            return None;
        }

        let (start_tok, end_tok) = parts[6].split_once('-')?;
        let start = YearMonth::parse(start_tok)?;
        let end = YearMonth::parse(end_tok)?;
        if start > end {
            return None;
        }

        Some(Self {
            variable: parts[0].to_string(),
            frequency: parts[1].to_string(),
            model: parts[2].to_string(),
            scenario: parts[3].to_string(),
            run: parts[4].to_string(),
            grid_tag: parts[5].to_string(),
            start,
            end,
            storage_key: key.to_string(),
        })
    }

    /// Whether this record's time interval contains the given calendar year.
    pub fn covers_year(&self, year: i32) -> bool {
        self.start.year <= year && year <= self.end.year
    }

    /// Whether this record's time interval overlaps the inclusive window.
    pub fn covers_window(&self, y0: i32, y1: i32) -> bool {
        !(self.end.year < y0 || self.start.year > y1)
    }
}

/// Year filter for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSelector {
    Year(i32),
    Window(i32, i32),
}

/// Filter criteria for listing catalog records.
#[derive(Debug, Default, Clone)]
pub struct CatalogQuery {
    /// Scenario token, matched case-insensitively.
    pub scenario: Option<String>,
    /// Year or inclusive window the record must cover.
    pub years: Option<YearSelector>,
}

/// The persisted catalog: the full parsed listing plus its count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub files: Vec<FileRecord>,
    pub count: usize,
}

impl Catalog {
    /// Build a fresh catalog from an object listing. Malformed keys are
    /// excluded and logged; the result depends only on the listing, so
    /// the same listing always yields the same catalog.
    pub fn from_keys(keys: &[String]) -> Self {
        let total = keys.len();

        let files: Vec<FileRecord> = keys
            .iter()
            .filter_map(|k| FileRecord::parse_key(k))
            .collect();

        if files.len() < total {
            warn!(
                skipped = total - files.len(),
                total, "Some object keys did not match the naming grammar"
            );
        }

        let count = files.len();
        Self { files, count }
    }

    /// Scan all objects under `prefix` and build a fresh catalog from
    /// the listing.
    pub async fn reindex(storage: &ObjectStorage, prefix: &str) -> ClimateResult<Self> {
        let keys = storage.list(prefix).await?;
        let catalog = Self::from_keys(&keys);
        info!(prefix = %prefix, count = catalog.count, "Catalog reindexed");
        Ok(catalog)
    }

    /// Filter the catalog.
    pub fn list(&self, query: &CatalogQuery) -> Vec<&FileRecord> {
        self.files
            .iter()
            .filter(|f| match &query.scenario {
                Some(s) => f.scenario.eq_ignore_ascii_case(s),
                None => true,
            })
            .filter(|f| match query.years {
                Some(YearSelector::Year(y)) => f.covers_year(y),
                Some(YearSelector::Window(y0, y1)) => f.covers_window(y0, y1),
                None => true,
            })
            .collect()
    }

    /// Path of the persisted manifest under a cache directory.
    pub fn manifest_path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(MANIFEST_FILE)
    }

    /// Persist the catalog, replacing any previous manifest.
    pub fn save(&self, cache_dir: &Path) -> ClimateResult<()> {
        let path = Self::manifest_path(cache_dir);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp, json)
            .map_err(|e| ClimateError::CacheError(format!("Failed to write manifest: {}", e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| ClimateError::CacheError(format!("Failed to replace manifest: {}", e)))?;
        Ok(())
    }

    /// Load the persisted catalog. Fails when no reindex has run yet.
    pub fn load(cache_dir: &Path) -> ClimateResult<Self> {
        let path = Self::manifest_path(cache_dir);
        if !path.exists() {
            return Err(ClimateError::CatalogNotFound(
                "no catalog manifest; run a reindex first".to_string(),
            ));
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| ClimateError::CacheError(format!("Failed to read manifest: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
