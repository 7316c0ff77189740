//! Country boundaries rasterized onto the canonical grid, and spatial
//! aggregation of canonical fields over one country's cells.

pub mod aggregate;
pub mod fetch;
pub mod geojson;
pub mod mask;
pub mod polygon;

pub use aggregate::{
    aggregate_region, aggregate_region_weighted, AreaWeighting, CosineLatWeighting,
    RegionAggregate, SpatialAgg,
};
pub use fetch::fetch_geojson;
pub use geojson::{parse_countries, CountryShape};
pub use mask::CountryMask;
pub use polygon::Polygon;
