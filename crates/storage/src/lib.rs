//! Object storage access, local download cache and the file catalog.

pub mod catalog;
pub mod download_cache;
pub mod object_store;

pub use catalog::{Catalog, CatalogQuery, FileRecord, YearSelector};
pub use download_cache::DownloadCache;
pub use object_store::{ObjectStorage, ObjectStorageConfig};
