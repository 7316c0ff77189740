//! Normalization of a decoded source file onto the canonical grid.
//!
//! The pipeline per file: pick the data variable, resolve latitude and
//! longitude axes across naming conventions, collapse any vertical axis
//! to its surface level, average the requested year or window, rewrite
//! longitudes to 0..360 and finally resample nearest-neighbor onto the
//! canonical 180x360 grid.

use tracing::debug;

use climate_common::{
    CanonicalField, CanonicalGrid, ClimateError, ClimateResult, TimeReduction,
};

use crate::dataset::{RawDataset, RawVariable};

/// Variable read preferentially when present.
const PREFERRED_VARIABLE: &str = "mmrpm2p5";

/// Latitude axis names seen across model output, in lookup order.
const LAT_ALIASES: [&str; 4] = ["lat", "latitude", "nav_lat", "y"];
/// Longitude axis names seen across model output, in lookup order.
const LON_ALIASES: [&str; 4] = ["lon", "longitude", "nav_lon", "x"];
/// Vertical axis names. The surface is taken as the level with the
/// largest coordinate value (pressure coordinates grow toward the
/// surface).
const VERTICAL_ALIASES: [&str; 5] = ["lev", "plev", "level", "height", "altitude"];

/// Normalize one dataset to a canonical field for the given reduction.
pub fn normalize(ds: &RawDataset, reduction: &TimeReduction) -> ClimateResult<CanonicalField> {
    Ok(normalize_counted(ds, reduction)?.0)
}

/// Normalize one dataset and also report, per canonical cell, how many
/// finite samples went into its mean. Segment merging weights each
/// segment's cell value by these counts so a member split across files
/// averages exactly as if the files were concatenated first.
pub fn normalize_counted(
    ds: &RawDataset,
    reduction: &TimeReduction,
) -> ClimateResult<(CanonicalField, Vec<f64>)> {
    let var = select_variable(ds)?;

    let lat_dim = resolve_axis(var, ds, &LAT_ALIASES).ok_or_else(|| {
        ClimateError::MissingCoordinate(format!(
            "no latitude axis among dims {:?} of '{}'",
            var.dims, var.name
        ))
    })?;
    let lon_dim = resolve_axis(var, ds, &LON_ALIASES).ok_or_else(|| {
        ClimateError::MissingCoordinate(format!(
            "no longitude axis among dims {:?} of '{}'",
            var.dims, var.name
        ))
    })?;

    let mut lat = ds.coords[&lat_dim].clone();
    let mut lon = ds.coords[&lon_dim].clone();

    let time_keep = select_time_indices(ds, var, reduction)?;
    let axes = sample_axes(ds, var, &lat_dim, &lon_dim, &time_keep);

    let (mut plane, mut counts) = reduce_to_plane(var, &lat_dim, &lon_dim, &axes)?;
    let n_lat = lat.len();
    let n_lon = lon.len();

    // Latitude ascending.
    if n_lat >= 2 && lat[0] > lat[n_lat - 1] {
        lat.reverse();
        for i in 0..n_lat / 2 {
            for j in 0..n_lon {
                plane.swap(i * n_lon + j, (n_lat - 1 - i) * n_lon + j);
                counts.swap(i * n_lon + j, (n_lat - 1 - i) * n_lon + j);
            }
        }
    }

    // Longitudes on 0..360, columns sorted ascending.
    if lon.iter().any(|&x| x < 0.0) {
        for x in lon.iter_mut() {
            *x = (*x + 360.0) % 360.0;
        }
    }
    let mut order: Vec<usize> = (0..n_lon).collect();
    order.sort_by(|&a, &b| lon[a].partial_cmp(&lon[b]).unwrap_or(std::cmp::Ordering::Equal));
    if order.iter().enumerate().any(|(j, &o)| j != o) {
        let lon_sorted: Vec<f64> = order.iter().map(|&o| lon[o]).collect();
        let mut sorted_plane = vec![f64::NAN; plane.len()];
        let mut sorted_counts = vec![0.0; counts.len()];
        for i in 0..n_lat {
            for (j, &o) in order.iter().enumerate() {
                sorted_plane[i * n_lon + j] = plane[i * n_lon + o];
                sorted_counts[i * n_lon + j] = counts[i * n_lon + o];
            }
        }
        lon = lon_sorted;
        plane = sorted_plane;
        counts = sorted_counts;
    }

    debug!(
        variable = %var.name,
        src_lat = n_lat,
        src_lon = n_lon,
        "Resampling onto canonical grid"
    );
    Ok(resample_nearest(&plane, &counts, &lat, &lon, reduction))
}

/// Choose the data variable to read.
fn select_variable(ds: &RawDataset) -> ClimateResult<&RawVariable> {
    if let Some(v) = ds.variable(PREFERRED_VARIABLE) {
        return Ok(v);
    }
    if ds.variables.len() == 1 {
        return Ok(&ds.variables[0]);
    }
    ds.variables
        .iter()
        .find(|v| {
            resolve_axis(v, ds, &LAT_ALIASES).is_some()
                && resolve_axis(v, ds, &LON_ALIASES).is_some()
        })
        .ok_or_else(|| {
            ClimateError::MissingVariable(format!(
                "none of {:?} has both spatial axes",
                ds.variables.iter().map(|v| &v.name).collect::<Vec<_>>()
            ))
        })
}

/// Find the variable dimension that is one of the given axis aliases and
/// has a coordinate variable.
fn resolve_axis(var: &RawVariable, ds: &RawDataset, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(dim) = var.dims.iter().find(|d| d.as_str() == *alias) {
            if ds.coords.contains_key(dim) {
                return Some(dim.clone());
            }
        }
    }
    None
}

/// Indices along the time dimension that fall in the reduction period.
/// Returns an empty vec when the variable has no time dimension.
fn select_time_indices(
    ds: &RawDataset,
    var: &RawVariable,
    reduction: &TimeReduction,
) -> ClimateResult<Vec<usize>> {
    let Some(time) = &ds.time else {
        return Ok(Vec::new());
    };
    if var.dim_index(&time.dim).is_none() {
        return Ok(Vec::new());
    }

    let keep: Vec<usize> = time
        .stamps
        .iter()
        .enumerate()
        .filter(|(_, s)| reduction.contains_year(s.year))
        .map(|(i, _)| i)
        .collect();

    if keep.is_empty() {
        return Err(ClimateError::EmptyWindow(format!(
            "{} has no samples in {}",
            var.name, reduction
        )));
    }
    Ok(keep)
}

/// Per non-spatial dimension, the indices contributing to the cell mean:
/// the time axis keeps the selected window samples, vertical axes keep
/// only the level with the largest coordinate value, and any remaining
/// dimension is averaged out over its whole extent.
fn sample_axes(
    ds: &RawDataset,
    var: &RawVariable,
    lat_dim: &str,
    lon_dim: &str,
    time_keep: &[usize],
) -> Vec<(usize, Vec<usize>)> {
    let time_dim = ds.time.as_ref().map(|t| t.dim.as_str());
    let mut axes = Vec::new();

    for (d, dim) in var.dims.iter().enumerate() {
        if dim == lat_dim || dim == lon_dim {
            continue;
        }
        if Some(dim.as_str()) == time_dim && !time_keep.is_empty() {
            axes.push((d, time_keep.to_vec()));
        } else if VERTICAL_ALIASES.contains(&dim.as_str()) {
            let idx = ds
                .coords
                .get(dim)
                .and_then(|c| argmax(c))
                .unwrap_or(var.shape[d].saturating_sub(1));
            axes.push((d, vec![idx]));
        } else {
            axes.push((d, (0..var.shape[d]).collect()));
        }
    }
    axes
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

/// Collapse the variable to a (lat, lon) plane, averaging every kept
/// sample per cell and skipping NaN. Returns the plane of means and the
/// per-cell finite-sample counts; a cell with no finite sample stays NaN
/// with count 0.
fn reduce_to_plane(
    var: &RawVariable,
    lat_dim: &str,
    lon_dim: &str,
    axes: &[(usize, Vec<usize>)],
) -> ClimateResult<(Vec<f64>, Vec<f64>)> {
    let strides = var.strides();
    let lat_d = var
        .dim_index(lat_dim)
        .ok_or_else(|| ClimateError::NetCdfError(format!("missing dimension '{lat_dim}'")))?;
    let lon_d = var
        .dim_index(lon_dim)
        .ok_or_else(|| ClimateError::NetCdfError(format!("missing dimension '{lon_dim}'")))?;
    let n_lat = var.shape[lat_d];
    let n_lon = var.shape[lon_d];

    // Flat offsets of every sample combination over the non-spatial dims.
    let mut offsets: Vec<usize> = vec![0];
    for (d, indices) in axes {
        let mut next = Vec::with_capacity(offsets.len() * indices.len());
        for &base in &offsets {
            for &idx in indices {
                next.push(base + idx * strides[*d]);
            }
        }
        offsets = next;
    }

    let mut plane = vec![f64::NAN; n_lat * n_lon];
    let mut counts = vec![0.0; n_lat * n_lon];
    for i in 0..n_lat {
        for j in 0..n_lon {
            let cell = i * strides[lat_d] + j * strides[lon_d];
            let mut sum = 0.0;
            let mut n = 0usize;
            for &off in &offsets {
                let v = var.data[cell + off];
                if v.is_finite() {
                    sum += v;
                    n += 1;
                }
            }
            if n > 0 {
                plane[i * n_lon + j] = sum / n as f64;
                counts[i * n_lon + j] = n as f64;
            }
        }
    }
    Ok((plane, counts))
}

/// Index of the value in an ascending slice nearest to `x`.
fn nearest_index(sorted: &[f64], x: f64) -> usize {
    let i = sorted.partition_point(|&v| v < x);
    if i == 0 {
        0
    } else if i == sorted.len() {
        sorted.len() - 1
    } else if (x - sorted[i - 1]).abs() <= (sorted[i] - x).abs() {
        i - 1
    } else {
        i
    }
}

/// Nearest-neighbor resample of a source plane (and its sample counts)
/// onto the canonical grid.
fn resample_nearest(
    plane: &[f64],
    counts: &[f64],
    src_lat: &[f64],
    src_lon: &[f64],
    reduction: &TimeReduction,
) -> (CanonicalField, Vec<f64>) {
    let grid = CanonicalGrid::new();
    let n_src_lon = src_lon.len();
    let mut field = CanonicalField::empty(*reduction);
    let mut field_counts = vec![0.0; field.data.len()];

    let lon_map: Vec<usize> = grid.lon.iter().map(|&x| nearest_index(src_lon, x)).collect();
    for (i, &lat) in grid.lat.iter().enumerate() {
        let si = nearest_index(src_lat, lat);
        for (j, &sj) in lon_map.iter().enumerate() {
            field.set(i, j, plane[si * n_src_lon + sj]);
            field_counts[i * grid.lon.len() + j] = counts[si * n_src_lon + sj];
        }
    }
    (field, field_counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{RawDataset, RawVariable, TimeAxis};
    use climate_common::{YearMonth, N_LAT, N_LON};
    use std::collections::HashMap;

    /// Dataset on a coarse 2-degree grid with two monthly samples.
    fn coarse_dataset(values: [f64; 2]) -> RawDataset {
        let lat: Vec<f64> = (0..90).map(|i| -89.0 + 2.0 * i as f64).collect();
        let lon: Vec<f64> = (0..180).map(|j| 1.0 + 2.0 * j as f64).collect();
        let n = lat.len() * lon.len();

        let mut data = Vec::with_capacity(2 * n);
        for &v in &values {
            data.extend(std::iter::repeat(v).take(n));
        }

        let mut coords = HashMap::new();
        coords.insert("lat".to_string(), lat.clone());
        coords.insert("lon".to_string(), lon.clone());

        RawDataset {
            variables: vec![RawVariable {
                name: "mmrpm2p5".into(),
                dims: vec!["time".into(), "lat".into(), "lon".into()],
                shape: vec![2, lat.len(), lon.len()],
                data,
            }],
            coords,
            time: Some(TimeAxis {
                dim: "time".into(),
                stamps: vec![YearMonth::new(2015, 1), YearMonth::new(2015, 2)],
            }),
        }
    }

    #[test]
    fn test_normalize_shape_and_mean() {
        let ds = coarse_dataset([2.0, 4.0]);
        let field = normalize(&ds, &TimeReduction::Year(2015)).unwrap();
        assert_eq!(field.data.len(), N_LAT * N_LON);
        // Every canonical cell gets the time mean of a constant field.
        assert!((field.get(0, 0) - 3.0).abs() < 1e-12);
        assert!((field.get(N_LAT - 1, N_LON - 1) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window() {
        let ds = coarse_dataset([2.0, 4.0]);
        match normalize(&ds, &TimeReduction::Year(2050)) {
            Err(ClimateError::EmptyWindow(_)) => {}
            other => panic!("expected EmptyWindow, got {:?}", other),
        }
    }

    #[test]
    fn test_skipna_time_mean() {
        let mut ds = coarse_dataset([2.0, 4.0]);
        // Poison the first sample of cell (0, 0); the mean must fall back
        // to the remaining finite sample.
        ds.variables[0].data[0] = f64::NAN;
        let field = normalize(&ds, &TimeReduction::Year(2015)).unwrap();
        assert!((field.get(0, 0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_descending_latitude_is_flipped() {
        let mut ds = coarse_dataset([1.0, 1.0]);
        // Make the field depend on latitude, with lat stored north-first.
        let lat: Vec<f64> = (0..90).map(|i| 89.0 - 2.0 * i as f64).collect();
        ds.coords.insert("lat".to_string(), lat.clone());
        let n_lon = 180;
        for (i, &lat_v) in lat.iter().enumerate() {
            for j in 0..n_lon {
                for t in 0..2 {
                    ds.variables[0].data[t * 90 * n_lon + i * n_lon + j] = lat_v;
                }
            }
        }
        let field = normalize(&ds, &TimeReduction::Year(2015)).unwrap();
        // Southernmost canonical row must hold southern values.
        assert!(field.get(0, 0) < 0.0);
        assert!(field.get(N_LAT - 1, 0) > 0.0);
    }

    #[test]
    fn test_negative_longitudes_are_wrapped() {
        let mut ds = coarse_dataset([1.0, 1.0]);
        // -179..179 convention; value = original longitude.
        let lon: Vec<f64> = (0..180).map(|j| -179.0 + 2.0 * j as f64).collect();
        ds.coords.insert("lon".to_string(), lon.clone());
        for i in 0..90 {
            for (j, &lon_v) in lon.iter().enumerate() {
                for t in 0..2 {
                    ds.variables[0].data[t * 90 * 180 + i * 180 + j] = lon_v;
                }
            }
        }
        let field = normalize(&ds, &TimeReduction::Year(2015)).unwrap();
        // Canonical lon 0.5 should draw from a source cell near lon -1..1.
        assert!(field.get(90, 0).abs() <= 1.0 + 1e-12);
        // Canonical lon 180.5 should draw from near the dateline.
        assert!(field.get(90, 180).abs() >= 179.0 - 1e-12);
    }

    #[test]
    fn test_vertical_axis_takes_surface_level() {
        let lat = vec![-45.0, 45.0];
        let lon = vec![90.0, 270.0];
        let mut coords = HashMap::new();
        coords.insert("lat".to_string(), lat.clone());
        coords.insert("lon".to_string(), lon.clone());
        // Pressure levels: surface (largest value) is first here.
        coords.insert("plev".to_string(), vec![100000.0, 50000.0]);

        // dims (time=1, plev=2, lat=2, lon=2); surface level all 7s,
        // upper level all 9s.
        let data = vec![7.0, 7.0, 7.0, 7.0, 9.0, 9.0, 9.0, 9.0];
        let ds = RawDataset {
            variables: vec![RawVariable {
                name: "mmrpm2p5".into(),
                dims: vec!["time".into(), "plev".into(), "lat".into(), "lon".into()],
                shape: vec![1, 2, 2, 2],
                data,
            }],
            coords,
            time: Some(TimeAxis {
                dim: "time".into(),
                stamps: vec![YearMonth::new(2015, 6)],
            }),
        };
        let field = normalize(&ds, &TimeReduction::Year(2015)).unwrap();
        assert!((field.get(0, 0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_residual_dim_is_mean_reduced() {
        let lat = vec![-45.0, 45.0];
        let lon = vec![90.0, 270.0];
        let mut coords = HashMap::new();
        coords.insert("lat".to_string(), lat.clone());
        coords.insert("lon".to_string(), lon.clone());

        // dims (time=1, sector=2, lat=2, lon=2); sectors at 2 and 4 must
        // average to 3 rather than fail the file.
        let data = vec![2.0, 2.0, 2.0, 2.0, 4.0, 4.0, 4.0, 4.0];
        let ds = RawDataset {
            variables: vec![RawVariable {
                name: "mmrpm2p5".into(),
                dims: vec!["time".into(), "sector".into(), "lat".into(), "lon".into()],
                shape: vec![1, 2, 2, 2],
                data,
            }],
            coords,
            time: Some(TimeAxis {
                dim: "time".into(),
                stamps: vec![YearMonth::new(2015, 6)],
            }),
        };
        let field = normalize(&ds, &TimeReduction::Year(2015)).unwrap();
        assert!((field.get(0, 0) - 3.0).abs() < 1e-12);
        assert!((field.get(N_LAT - 1, N_LON - 1) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_counts_track_finite_samples() {
        let mut ds = coarse_dataset([2.0, 4.0]);
        // Poison the first sample of source cell (0, 0): count drops to 1
        // there while fully finite cells keep both samples.
        ds.variables[0].data[0] = f64::NAN;
        let (field, counts) = normalize_counted(&ds, &TimeReduction::Year(2015)).unwrap();
        assert!((field.get(0, 0) - 4.0).abs() < 1e-12);
        assert!((counts[0] - 1.0).abs() < 1e-12);
        assert!((counts[counts.len() - 1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_alias_axis_names() {
        let mut ds = coarse_dataset([5.0, 5.0]);
        let lat = ds.coords.remove("lat").unwrap();
        let lon = ds.coords.remove("lon").unwrap();
        ds.coords.insert("latitude".to_string(), lat);
        ds.coords.insert("longitude".to_string(), lon);
        ds.variables[0].dims = vec!["time".into(), "latitude".into(), "longitude".into()];
        let field = normalize(&ds, &TimeReduction::Year(2015)).unwrap();
        assert!((field.get(10, 10) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_spatial_axes() {
        let mut ds = coarse_dataset([5.0, 5.0]);
        ds.coords.clear();
        match normalize(&ds, &TimeReduction::Year(2015)) {
            Err(ClimateError::MissingCoordinate(_)) => {}
            other => panic!("expected MissingCoordinate, got {:?}", other),
        }
    }

    #[test]
    fn test_nearest_index() {
        let v = [0.5, 1.5, 2.5];
        assert_eq!(nearest_index(&v, -3.0), 0);
        assert_eq!(nearest_index(&v, 0.9), 0);
        assert_eq!(nearest_index(&v, 1.2), 1);
        assert_eq!(nearest_index(&v, 9.0), 2);
    }
}
