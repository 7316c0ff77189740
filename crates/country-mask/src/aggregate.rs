//! Area-weighted aggregation of a canonical field over a country.
//!
//! Cell area on the 1-degree grid scales with the cosine of latitude, so
//! both the mean and the median weight cells by cos(lat). Cells that are
//! NaN in the field are excluded; a country with no finite cell
//! aggregates to NaN with zero cells used, never to an error.

use climate_common::{CanonicalField, CanonicalGrid, ClimateResult, N_LON};

use crate::mask::CountryMask;

/// Spatial statistic over a country's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialAgg {
    Mean,
    Median,
}

/// Cell weighting policy for spatial aggregation. Weights depend on
/// latitude only; the canonical grid has uniform longitude spacing.
pub trait AreaWeighting: Send + Sync {
    fn weight(&self, lat: f64) -> f64;
}

/// Cosine-latitude weights, proportional to cell area on the 1-degree
/// grid. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineLatWeighting;

impl AreaWeighting for CosineLatWeighting {
    fn weight(&self, lat: f64) -> f64 {
        lat.to_radians().cos()
    }
}

/// Result of aggregating one field over one country.
#[derive(Debug, Clone, Copy)]
pub struct RegionAggregate {
    /// Aggregated value; NaN when no cell had data.
    pub value: f64,
    /// Cells that carried a finite value.
    pub n_cells_used: usize,
    /// Cells the mask assigns to the country.
    pub n_cells_in_country: usize,
}

/// Aggregate a field over a country identified by ISO2 code, with
/// cosine-latitude area weighting.
pub fn aggregate_region(
    field: &CanonicalField,
    mask: &CountryMask,
    iso2: &str,
    agg: SpatialAgg,
) -> ClimateResult<RegionAggregate> {
    aggregate_region_weighted(field, mask, iso2, agg, &CosineLatWeighting)
}

/// Aggregate a field over a country with an explicit weighting policy.
pub fn aggregate_region_weighted(
    field: &CanonicalField,
    mask: &CountryMask,
    iso2: &str,
    agg: SpatialAgg,
    weighting: &dyn AreaWeighting,
) -> ClimateResult<RegionAggregate> {
    let cells = mask.region_cells(iso2)?;
    let grid = CanonicalGrid::new();

    // (value, weight) for finite cells.
    let mut samples: Vec<(f64, f64)> = cells
        .iter()
        .filter_map(|&cell| {
            let v = field.data[cell];
            if v.is_finite() {
                let lat = grid.lat[cell / N_LON];
                Some((v, weighting.weight(lat)))
            } else {
                None
            }
        })
        .collect();

    let n_used = samples.len();
    if n_used == 0 {
        return Ok(RegionAggregate {
            value: f64::NAN,
            n_cells_used: 0,
            n_cells_in_country: cells.len(),
        });
    }

    let value = match agg {
        SpatialAgg::Mean => {
            let (num, den) = samples
                .iter()
                .fold((0.0, 0.0), |(n, d), &(v, w)| (n + v * w, d + w));
            num / den
        }
        SpatialAgg::Median => weighted_median(&mut samples),
    };

    Ok(RegionAggregate {
        value,
        n_cells_used: n_used,
        n_cells_in_country: cells.len(),
    })
}

/// Weighted median: smallest value whose cumulative weight reaches half
/// the total. Midpoint of the straddling pair on an exact split.
fn weighted_median(samples: &mut [(f64, f64)]) -> f64 {
    samples.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let total: f64 = samples.iter().map(|&(_, w)| w).sum();
    let half = total / 2.0;

    let mut acc = 0.0;
    for (i, &(v, w)) in samples.iter().enumerate() {
        acc += w;
        if acc > half {
            return v;
        }
        if acc == half && i + 1 < samples.len() {
            return (v + samples[i + 1].0) / 2.0;
        }
    }
    samples[samples.len() - 1].0
}
