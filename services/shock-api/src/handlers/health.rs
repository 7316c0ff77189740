//! Liveness and readiness probes.

use std::sync::Arc;

use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once the catalog and mask artifacts are in place.
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let catalog_loaded = state.catalog.read().await.is_some();
    let mask_loaded = state.mask.read().await.is_some();
    Json(json!({
        "status": if catalog_loaded && mask_loaded { "ready" } else { "initializing" },
        "catalog_loaded": catalog_loaded,
        "mask_loaded": mask_loaded,
    }))
}
