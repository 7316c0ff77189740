//! Download of the country boundary GeoJSON.

use serde_json::Value;
use tracing::info;

use climate_common::{ClimateError, ClimateResult};

/// Fetch a boundary FeatureCollection from a URL.
pub async fn fetch_geojson(url: &str) -> ClimateResult<Value> {
    info!(url = %url, "Fetching country boundaries");
    let response = reqwest::get(url)
        .await
        .map_err(|e| ClimateError::StorageError(format!("Boundary fetch failed: {}", e)))?
        .error_for_status()
        .map_err(|e| ClimateError::StorageError(format!("Boundary fetch failed: {}", e)))?;

    response
        .json::<Value>()
        .await
        .map_err(|e| ClimateError::StorageError(format!("Boundary response is not JSON: {}", e)))
}
