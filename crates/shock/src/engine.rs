//! The shock engine: reference map, projected window, regional
//! aggregation and the final ratio or delta.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use climate_common::{CanonicalField, ClimateError, ClimateResult};
use country_mask::{aggregate_region, CountryMask, SpatialAgg};
use ensemble::{EnsembleBuilder, ReduceOp};
use storage::{Catalog, CatalogQuery, FileRecord, YearSelector};

use crate::threshold::{Basis, ThresholdMap, ThresholdStore, REFERENCE_YEAR};
use crate::window::project_window;

/// Which reference statistic a shock compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Compare against the reference-year member median.
    Baseline,
    /// Compare against the reference-year member quantile at `q`.
    Percentile,
}

impl Mode {
    pub fn parse(s: &str) -> ClimateResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "baseline" => Ok(Mode::Baseline),
            "percentile" => Ok(Mode::Percentile),
            other => Err(ClimateError::invalid_parameter(
                "mode",
                format!("expected 'baseline' or 'percentile', got '{}'", other),
            )),
        }
    }
}

/// How the two regional values combine into a shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    /// projected / reference - 1
    Ratio,
    /// projected - reference
    Delta,
}

impl Stat {
    pub fn parse(s: &str) -> ClimateResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ratio" => Ok(Stat::Ratio),
            "delta" => Ok(Stat::Delta),
            other => Err(ClimateError::invalid_parameter(
                "stat",
                format!("expected 'ratio' or 'delta', got '{}'", other),
            )),
        }
    }
}

/// A fully resolved shock request.
#[derive(Debug, Clone)]
pub struct ShockRequest {
    /// ISO2 country code.
    pub region: String,
    pub scenario: String,
    /// Inclusive projection window.
    pub window: (i32, i32),
    pub mode: Mode,
    /// Quantile for percentile mode; also keys the reference artifact.
    pub q: f64,
    pub basis: Basis,
    pub agg: SpatialAgg,
    pub stat: Stat,
    /// Build the reference map on a cache miss instead of failing.
    pub build_reference: bool,
}

/// One computed shock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShockResponse {
    pub region: String,
    pub scenario: String,
    pub window_start: i32,
    pub window_end: i32,
    pub mode: Mode,
    pub stat: Stat,
    pub q: f64,
    /// Regional reference value for the scenario's reference year.
    pub reference_value: f64,
    /// Regional projected value over the window.
    pub projected_value: f64,
    /// The shock; NaN when either side is missing or a ratio divides by
    /// zero.
    pub shock: f64,
    pub n_members_reference: usize,
    pub n_members_projected: usize,
    pub n_models_projected: usize,
    /// Dropped-member errors from the projected stack, truncated.
    pub dropped_members: Vec<String>,
    pub n_cells_used: usize,
    pub n_cells_in_country: usize,
}

/// Computes shocks against a catalog, reusing cached reference maps.
pub struct ShockEngine {
    builder: EnsembleBuilder,
    store: ThresholdStore,
}

impl ShockEngine {
    pub fn new(builder: EnsembleBuilder, store: ThresholdStore) -> Self {
        Self { builder, store }
    }

    /// Load the reference map for a request, building and caching it when
    /// allowed.
    pub async fn ensure_reference(
        &self,
        catalog: &Catalog,
        scenario: &str,
        basis: Basis,
        q: f64,
        build_if_missing: bool,
    ) -> ClimateResult<ThresholdMap> {
        if self.store.exists(basis, scenario, q) {
            return self.store.load(basis, scenario, q);
        }
        if !build_if_missing {
            return Err(ClimateError::MissingReferenceMap(format!(
                "{}/{}/q{:.2}",
                basis.as_str(),
                scenario,
                q
            )));
        }

        let records = scenario_records(catalog, scenario, YearSelector::Year(REFERENCE_YEAR))?;
        let stack = self
            .builder
            .build_stack(&records, climate_common::TimeReduction::Year(REFERENCE_YEAR))
            .await?;
        let map = ThresholdMap::from_stack(&stack, basis, scenario, q);
        self.store.save(&map)?;
        Ok(map)
    }

    /// Compute one regional shock.
    #[instrument(skip(self, catalog, mask), fields(region = %req.region, scenario = %req.scenario))]
    pub async fn compute_region_shock(
        &self,
        catalog: &Catalog,
        mask: &CountryMask,
        req: &ShockRequest,
    ) -> ClimateResult<ShockResponse> {
        validate_request(req)?;
        mask.check_alignment()?;

        let map = self
            .ensure_reference(catalog, &req.scenario, req.basis, req.q, req.build_reference)
            .await?;

        let reference: CanonicalField = match req.mode {
            Mode::Baseline => map.baseline_field(),
            Mode::Percentile => map.quantile_field(),
        };

        // The projected window is always the member median; the mode only
        // selects which reference field the shock compares against.
        let (start, end) = req.window;
        let records = scenario_records(catalog, &req.scenario, YearSelector::Window(start, end))?;
        let (projected, stack) =
            project_window(&self.builder, &records, start, end, ReduceOp::Median).await?;

        let ref_agg = aggregate_region(&reference, mask, &req.region, req.agg)?;
        let proj_agg = aggregate_region(&projected, mask, &req.region, req.agg)?;

        let shock = match req.stat {
            Stat::Ratio => ratio(proj_agg.value, ref_agg.value),
            Stat::Delta => proj_agg.value - ref_agg.value,
        };

        info!(
            shock,
            reference = ref_agg.value,
            projected = proj_agg.value,
            "Shock computed"
        );
        Ok(ShockResponse {
            region: req.region.to_ascii_uppercase(),
            scenario: req.scenario.clone(),
            window_start: start,
            window_end: end,
            mode: req.mode,
            stat: req.stat,
            q: req.q,
            reference_value: ref_agg.value,
            projected_value: proj_agg.value,
            shock,
            n_members_reference: map.n_members,
            n_members_projected: stack.len(),
            n_models_projected: stack.n_models(),
            dropped_members: stack.errors.iter().take(5).cloned().collect(),
            n_cells_used: proj_agg.n_cells_used,
            n_cells_in_country: proj_agg.n_cells_in_country,
        })
    }
}

/// projected / reference - 1, NaN-guarded against a missing or zero
/// reference.
fn ratio(projected: f64, reference: f64) -> f64 {
    if !projected.is_finite() || !reference.is_finite() || reference == 0.0 {
        f64::NAN
    } else {
        projected / reference - 1.0
    }
}

fn validate_request(req: &ShockRequest) -> ClimateResult<()> {
    if !(0.0..=1.0).contains(&req.q) {
        return Err(ClimateError::invalid_parameter(
            "q",
            format!("quantile must be in [0, 1], got {}", req.q),
        ));
    }
    let (start, end) = req.window;
    if start > end {
        return Err(ClimateError::invalid_parameter(
            "window",
            format!("start {} is after end {}", start, end),
        ));
    }
    Ok(())
}

fn scenario_records(
    catalog: &Catalog,
    scenario: &str,
    years: YearSelector,
) -> ClimateResult<Vec<FileRecord>> {
    let records: Vec<FileRecord> = catalog
        .list(&CatalogQuery {
            scenario: Some(scenario.to_string()),
            years: Some(years),
        })
        .into_iter()
        .cloned()
        .collect();
    if records.is_empty() {
        return Err(ClimateError::InvalidScenario(format!(
            "no catalog records for '{}' in {:?}",
            scenario, years
        )));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use country_mask::{CountryShape, Polygon};
    use regrid::{DatasetSource, RawDataset, RawVariable, TimeAxis};
    use std::collections::HashMap;
    use std::sync::Arc;

    use climate_common::YearMonth;

    struct MemorySource {
        datasets: HashMap<String, RawDataset>,
    }

    #[async_trait]
    impl DatasetSource for MemorySource {
        async fn load(&self, record: &FileRecord) -> ClimateResult<RawDataset> {
            self.datasets
                .get(&record.storage_key)
                .cloned()
                .ok_or_else(|| ClimateError::StorageError(format!("gone: {}", record.storage_key)))
        }
    }

    /// Global dataset spanning 2015..2100 with one July sample per year;
    /// `value_of` maps year to the field value.
    fn yearly_dataset(value_of: impl Fn(i32) -> f64) -> RawDataset {
        let lat: Vec<f64> = (0..90).map(|i| -89.0 + 2.0 * i as f64).collect();
        let lon: Vec<f64> = (0..180).map(|j| 1.0 + 2.0 * j as f64).collect();
        let n = lat.len() * lon.len();
        let years: Vec<i32> = (2015..=2100).collect();

        let mut data = Vec::with_capacity(years.len() * n);
        for &y in &years {
            data.extend(std::iter::repeat(value_of(y)).take(n));
        }

        let mut coords = HashMap::new();
        coords.insert("lat".to_string(), lat.clone());
        coords.insert("lon".to_string(), lon.clone());

        RawDataset {
            variables: vec![RawVariable {
                name: "mmrpm2p5".into(),
                dims: vec!["time".into(), "lat".into(), "lon".into()],
                shape: vec![years.len(), lat.len(), lon.len()],
                data,
            }],
            coords,
            time: Some(TimeAxis {
                dim: "time".into(),
                stamps: years.iter().map(|&y| YearMonth::new(y, 7)).collect(),
            }),
        }
    }

    fn france_mask() -> CountryMask {
        CountryMask::build(&[CountryShape {
            iso2: "FR".to_string(),
            polygons: vec![Polygon::new(
                vec![(-1.0, 43.0), (6.0, 43.0), (6.0, 49.0), (-1.0, 49.0)],
                vec![],
            )],
        }])
    }

    fn engine_with(
        datasets: HashMap<String, RawDataset>,
        cache_dir: &std::path::Path,
    ) -> ShockEngine {
        let builder = EnsembleBuilder::new(Arc::new(MemorySource { datasets }));
        ShockEngine::new(builder, ThresholdStore::new(cache_dir))
    }

    fn catalog_of(keys: &[&str]) -> Catalog {
        let files: Vec<FileRecord> = keys.iter().map(|k| FileRecord::parse_key(k).unwrap()).collect();
        let count = files.len();
        Catalog { files, count }
    }

    fn baseline_request() -> ShockRequest {
        ShockRequest {
            region: "FR".to_string(),
            scenario: "ssp245".to_string(),
            window: (2080, 2100),
            mode: Mode::Baseline,
            q: 0.9,
            basis: Basis::Ensemble2015,
            agg: SpatialAgg::Mean,
            stat: Stat::Ratio,
            build_reference: true,
        }
    }

    const KEY_A: &str = "mmrpm2p5_AERmon_ModelA_ssp245_r1i1p1f1_gn_201501-210012.nc";
    const KEY_B: &str = "mmrpm2p5_AERmon_ModelB_ssp245_r1i1p1f1_gn_201501-210012.nc";

    #[tokio::test]
    async fn test_ratio_shock_end_to_end() {
        // Both members: 9 in 2015, 18 in the window. Ratio = 18/9 - 1 = 1.
        let dir = tempfile::tempdir().unwrap();
        let mut datasets = HashMap::new();
        let value_of = |y: i32| if y == 2015 { 9.0 } else { 18.0 };
        datasets.insert(KEY_A.to_string(), yearly_dataset(value_of));
        datasets.insert(KEY_B.to_string(), yearly_dataset(value_of));
        let engine = engine_with(datasets, dir.path());
        let catalog = catalog_of(&[KEY_A, KEY_B]);

        let resp = engine
            .compute_region_shock(&catalog, &france_mask(), &baseline_request())
            .await
            .unwrap();
        assert!((resp.reference_value - 9.0).abs() < 1e-9);
        assert!((resp.projected_value - 18.0).abs() < 1e-9);
        assert!((resp.shock - 1.0).abs() < 1e-9);
        assert_eq!(resp.n_members_reference, 2);
        assert_eq!(resp.n_members_projected, 2);
        assert_eq!(resp.n_models_projected, 2);
        assert!(resp.dropped_members.is_empty());
        assert!(resp.n_cells_in_country > 0);
        assert_eq!(resp.n_cells_used, resp.n_cells_in_country);
    }

    #[tokio::test]
    async fn test_delta_shock() {
        let dir = tempfile::tempdir().unwrap();
        let mut datasets = HashMap::new();
        datasets.insert(
            KEY_A.to_string(),
            yearly_dataset(|y| if y == 2015 { 100.0 } else { 120.0 }),
        );
        let engine = engine_with(datasets, dir.path());
        let catalog = catalog_of(&[KEY_A]);

        let mut req = baseline_request();
        req.stat = Stat::Delta;
        let resp = engine
            .compute_region_shock(&catalog, &france_mask(), &req)
            .await
            .unwrap();
        assert!((resp.shock - 20.0).abs() < 1e-9);

        // Same setup as a ratio: 120/100 - 1 = 0.2.
        req.stat = Stat::Ratio;
        let resp = engine
            .compute_region_shock(&catalog, &france_mask(), &req)
            .await
            .unwrap();
        assert!((resp.shock - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_percentile_mode_quantile_reference_median_projection() {
        // Members at 10/20/30 in 2015 and 20/40/60 in the window. The
        // quantile applies to the reference side only (q=1.0 -> max = 30);
        // the projection stays the member median (40).
        let dir = tempfile::tempdir().unwrap();
        let key_c = "mmrpm2p5_AERmon_ModelC_ssp245_r1i1p1f1_gn_201501-210012.nc";
        let mut datasets = HashMap::new();
        for (key, base) in [(KEY_A, 10.0), (KEY_B, 20.0), (key_c, 30.0)] {
            datasets.insert(
                key.to_string(),
                yearly_dataset(move |y| if y == 2015 { base } else { 2.0 * base }),
            );
        }
        let engine = engine_with(datasets, dir.path());
        let catalog = catalog_of(&[KEY_A, KEY_B, key_c]);

        let mut req = baseline_request();
        req.mode = Mode::Percentile;
        req.q = 1.0;
        let resp = engine
            .compute_region_shock(&catalog, &france_mask(), &req)
            .await
            .unwrap();
        assert!((resp.reference_value - 30.0).abs() < 1e-9);
        assert!((resp.projected_value - 40.0).abs() < 1e-9);
        assert!((resp.shock - (40.0 / 30.0 - 1.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_reference_map_without_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut datasets = HashMap::new();
        datasets.insert(KEY_A.to_string(), yearly_dataset(|_| 1.0));
        let engine = engine_with(datasets, dir.path());
        let catalog = catalog_of(&[KEY_A]);

        let mut req = baseline_request();
        req.build_reference = false;
        match engine
            .compute_region_shock(&catalog, &france_mask(), &req)
            .await
        {
            Err(ClimateError::MissingReferenceMap(_)) => {}
            other => panic!("expected MissingReferenceMap, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reference_map_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut datasets = HashMap::new();
        datasets.insert(
            KEY_A.to_string(),
            yearly_dataset(|y| if y == 2015 { 5.0 } else { 10.0 }),
        );
        let engine = engine_with(datasets, dir.path());
        let catalog = catalog_of(&[KEY_A]);

        let req = baseline_request();
        engine
            .compute_region_shock(&catalog, &france_mask(), &req)
            .await
            .unwrap();

        // Second engine over an empty source must still answer from the
        // cached map when asked not to rebuild.
        let engine2 = engine_with(HashMap::new(), dir.path());
        let map = engine2
            .ensure_reference(&catalog, "ssp245", Basis::Ensemble2015, 0.9, false)
            .await
            .unwrap();
        assert!((map.baseline[0] - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_zero_reference_ratio_is_nan() {
        let dir = tempfile::tempdir().unwrap();
        let mut datasets = HashMap::new();
        datasets.insert(
            KEY_A.to_string(),
            yearly_dataset(|y| if y == 2015 { 0.0 } else { 10.0 }),
        );
        let engine = engine_with(datasets, dir.path());
        let catalog = catalog_of(&[KEY_A]);

        let resp = engine
            .compute_region_shock(&catalog, &france_mask(), &baseline_request())
            .await
            .unwrap();
        assert!(resp.shock.is_nan());
        assert_eq!(resp.reference_value, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut datasets = HashMap::new();
        datasets.insert(KEY_A.to_string(), yearly_dataset(|_| 1.0));
        let engine = engine_with(datasets, dir.path());
        let catalog = catalog_of(&[KEY_A]);

        let mut req = baseline_request();
        req.region = "ZZ".to_string();
        match engine
            .compute_region_shock(&catalog, &france_mask(), &req)
            .await
        {
            Err(ClimateError::UnknownRegion(_)) => {}
            other => panic!("expected UnknownRegion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(HashMap::new(), dir.path());
        let catalog = catalog_of(&[KEY_A]);

        let mut req = baseline_request();
        req.scenario = "ssp999".to_string();
        match engine
            .compute_region_shock(&catalog, &france_mask(), &req)
            .await
        {
            Err(ClimateError::InvalidScenario(_)) => {}
            other => panic!("expected InvalidScenario, got {:?}", other),
        }
    }

    #[test]
    fn test_ratio_guards() {
        assert!((ratio(120.0, 100.0) - 0.2).abs() < 1e-12);
        assert!(ratio(1.0, 0.0).is_nan());
        assert!(ratio(f64::NAN, 1.0).is_nan());
        assert!(ratio(1.0, f64::NAN).is_nan());
    }

    #[test]
    fn test_validate_request() {
        let mut req = baseline_request();
        req.q = 1.5;
        assert!(validate_request(&req).is_err());
        req.q = 0.9;
        req.window = (2100, 2080);
        assert!(validate_request(&req).is_err());
    }
}
