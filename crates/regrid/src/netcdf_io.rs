//! NetCDF reader: decode a source file into a [`RawDataset`].
//!
//! Packed variables are unpacked with `scale_factor`/`add_offset`, and
//! `_FillValue`/`missing_value` samples become NaN so every consumer can
//! treat NaN as the single missing-data marker.

use std::path::Path;

use tracing::debug;

use climate_common::{ClimateError, ClimateResult};

use crate::dataset::{RawDataset, RawVariable, TimeAxis};
use crate::time_decode::decode_time;

/// Dimension names that mark cell-bounds variables, which carry no field
/// data of their own.
const BOUNDS_DIMS: [&str; 4] = ["bnds", "bounds", "nv", "vertices"];

/// Read a NetCDF file into memory.
pub fn read_dataset(path: &Path) -> ClimateResult<RawDataset> {
    let file = netcdf::open(path)
        .map_err(|e| ClimateError::NetCdfError(format!("Failed to open {:?}: {}", path, e)))?;

    let mut ds = RawDataset::default();

    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        if dims.iter().any(|d| BOUNDS_DIMS.contains(&d.as_str()))
            || name.ends_with("_bnds")
            || name.ends_with("_bounds")
        {
            continue;
        }

        // 1-D variables named after their dimension are coordinates; a
        // coordinate whose units say "since" is the time axis.
        if dims.len() == 1 && dims[0] == name {
            let values: Vec<f64> = var.get_values(..).map_err(|e| {
                ClimateError::NetCdfError(format!("Failed to read coordinate {}: {}", name, e))
            })?;

            if let Some(units) = get_str_attr(&var, "units") {
                if units.contains("since") {
                    let calendar = get_str_attr(&var, "calendar");
                    let stamps = decode_time(&values, &units, calendar.as_deref())?;
                    ds.time = Some(TimeAxis { dim: name, stamps });
                    continue;
                }
            }
            ds.coords.insert(name, values);
            continue;
        }

        if dims.len() < 2 {
            continue;
        }

        let raw: Vec<f64> = var.get_values(..).map_err(|e| {
            ClimateError::NetCdfError(format!("Failed to read variable {}: {}", name, e))
        })?;

        let fill = get_f64_attr(&var, "_FillValue").or_else(|| get_f64_attr(&var, "missing_value"));
        let scale = get_f64_attr(&var, "scale_factor").unwrap_or(1.0);
        let offset = get_f64_attr(&var, "add_offset").unwrap_or(0.0);

        let data: Vec<f64> = raw
            .iter()
            .map(|&v| {
                if !v.is_finite() || fill.is_some_and(|f| v == f) {
                    f64::NAN
                } else {
                    v * scale + offset
                }
            })
            .collect();

        debug!(variable = %name, dims = ?dims, "Decoded data variable");
        ds.variables.push(RawVariable {
            name,
            dims,
            shape,
            data,
        });
    }

    if ds.variables.is_empty() {
        return Err(ClimateError::NetCdfError(format!(
            "No data variables in {:?}",
            path
        )));
    }

    Ok(ds)
}

/// Check for an attribute without triggering HDF5 error spam on misses.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

fn get_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
