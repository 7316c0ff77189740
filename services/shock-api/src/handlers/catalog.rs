//! Catalog endpoints: reindex and listing.

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use climate_common::ClimateError;
use storage::{Catalog, CatalogQuery, YearSelector};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReindexResponse {
    pub count: usize,
}

/// Rescan object storage and replace the catalog.
pub async fn reindex_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ReindexResponse>, ApiError> {
    let catalog = Catalog::reindex(&state.storage, &state.config.catalog_prefix).await?;
    catalog.save(&state.cache_dir)?;

    let count = catalog.count;
    *state.catalog.write().await = Some(Arc::new(catalog));
    info!(count, "Catalog replaced");
    Ok(Json(ReindexResponse { count }))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub scenario: Option<String>,
    pub year: Option<i32>,
    pub start: Option<i32>,
    pub end: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ListedFile {
    pub key: String,
    pub model: String,
    pub scenario: String,
    pub run: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub count: usize,
    pub files: Vec<ListedFile>,
}

/// List catalog records, optionally filtered by scenario and years.
pub async fn list_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let catalog = state.require_catalog().await?;

    let years = match (params.year, params.start, params.end) {
        (Some(y), None, None) => Some(YearSelector::Year(y)),
        (None, Some(s), Some(e)) => Some(YearSelector::Window(s, e)),
        (None, None, None) => None,
        _ => {
            return Err(ClimateError::invalid_parameter(
                "year",
                "pass either 'year' or both 'start' and 'end'",
            )
            .into())
        }
    };

    let files: Vec<ListedFile> = catalog
        .list(&CatalogQuery {
            scenario: params.scenario,
            years,
        })
        .into_iter()
        .map(|f| ListedFile {
            key: f.storage_key.clone(),
            model: f.model.clone(),
            scenario: f.scenario.clone(),
            run: f.run.clone(),
            start: f.start.to_string(),
            end: f.end.to_string(),
        })
        .collect();

    Ok(Json(ListResponse {
        count: files.len(),
        files,
    }))
}
