//! Reference (threshold) map endpoints: build and summary.

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use shock::{Basis, ThresholdMap, ThresholdSummary};

use crate::error::ApiError;
use crate::state::AppState;

fn default_q() -> f64 {
    0.95
}

fn default_basis() -> String {
    "ensemble2015".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ThresholdParams {
    pub scenario: String,
    #[serde(default = "default_q")]
    pub q: f64,
    #[serde(default = "default_basis")]
    pub basis: String,
}

#[derive(Debug, Serialize)]
pub struct ThresholdResponse {
    pub scenario: String,
    pub basis: String,
    pub q: f64,
    pub n_members: usize,
    pub n_models: usize,
    pub members: Vec<String>,
    pub dropped_members: Vec<String>,
    pub baseline: ThresholdSummary,
    pub quantile: ThresholdSummary,
}

fn respond(map: &ThresholdMap) -> ThresholdResponse {
    ThresholdResponse {
        scenario: map.scenario.clone(),
        basis: map.basis.as_str().to_string(),
        q: map.q,
        n_members: map.n_members,
        n_models: map.n_models,
        members: map.members.clone(),
        dropped_members: map.errors.clone(),
        baseline: ThresholdMap::summarize(&map.baseline),
        quantile: ThresholdMap::summarize(&map.quantile),
    }
}

/// Build (or reuse) the reference map for a scenario.
pub async fn build_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ThresholdParams>,
) -> Result<Json<ThresholdResponse>, ApiError> {
    let basis = Basis::parse(&params.basis)?;
    let catalog = state.require_catalog().await?;
    let map = state
        .engine
        .ensure_reference(&catalog, &params.scenario, basis, params.q, true)
        .await?;
    Ok(Json(respond(&map)))
}

/// Summarize a cached reference map; 404 when it has not been built.
pub async fn summary_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ThresholdParams>,
) -> Result<Json<ThresholdResponse>, ApiError> {
    let basis = Basis::parse(&params.basis)?;
    let catalog = state.require_catalog().await?;
    let map = state
        .engine
        .ensure_reference(&catalog, &params.scenario, basis, params.q, false)
        .await?;
    Ok(Json(respond(&map)))
}
