//! Service configuration from environment variables.

use std::env;

use storage::ObjectStorageConfig;

/// Default source for country boundaries (Natural Earth 1:110m admin-0).
const DEFAULT_BOUNDARIES_URL: &str =
    "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_110m_admin_0_countries.geojson";

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Object storage holding the NetCDF archive.
    pub storage: ObjectStorageConfig,

    /// Key prefix the catalog indexes (empty = whole bucket).
    pub catalog_prefix: String,

    /// Local directory for downloads and derived artifacts.
    pub cache_dir: String,

    /// Where the country boundary GeoJSON is fetched from.
    pub boundaries_url: String,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let storage = ObjectStorageConfig {
            endpoint: env::var("S3_ENDPOINT").unwrap_or_else(|_| "http://minio:9000".to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "climate-data".to_string()),
            access_key_id: env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            secret_access_key: env::var("S3_SECRET_KEY")
                .unwrap_or_else(|_| "minioadmin".to_string()),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            allow_http: env::var("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(true),
        };

        Self {
            storage,
            catalog_prefix: env::var("CATALOG_PREFIX").unwrap_or_default(),
            cache_dir: env::var("CACHE_DIR").unwrap_or_else(|_| "/data/cache".to_string()),
            boundaries_url: env::var("BOUNDARIES_URL")
                .unwrap_or_else(|_| DEFAULT_BOUNDARIES_URL.to_string()),
        }
    }
}
