//! In-memory representation of a source file, decoupled from the NetCDF
//! reader so pipelines can be exercised with synthetic datasets.

use std::collections::HashMap;

use climate_common::YearMonth;

/// One data variable: values in row-major order over its dimensions.
/// Fill values have already been replaced with NaN.
#[derive(Debug, Clone)]
pub struct RawVariable {
    pub name: String,
    /// Dimension names, outermost first.
    pub dims: Vec<String>,
    /// Extent of each dimension, same order as `dims`.
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl RawVariable {
    /// Row-major strides for this variable's shape.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.shape.len()];
        for i in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.shape[i + 1];
        }
        strides
    }

    /// Position of a dimension by name.
    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == name)
    }
}

/// Decoded calendar stamps along the time dimension.
#[derive(Debug, Clone)]
pub struct TimeAxis {
    /// Name of the time dimension.
    pub dim: String,
    /// One stamp per time sample, in file order.
    pub stamps: Vec<YearMonth>,
}

/// A decoded source file: data variables plus 1-D coordinate variables.
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    pub variables: Vec<RawVariable>,
    /// 1-D coordinate variables keyed by name (which equals their
    /// dimension name).
    pub coords: HashMap<String, Vec<f64>>,
    pub time: Option<TimeAxis>,
}

impl RawDataset {
    pub fn variable(&self, name: &str) -> Option<&RawVariable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides_row_major() {
        let var = RawVariable {
            name: "x".into(),
            dims: vec!["time".into(), "lat".into(), "lon".into()],
            shape: vec![2, 3, 4],
            data: vec![0.0; 24],
        };
        assert_eq!(var.strides(), vec![12, 4, 1]);
        assert_eq!(var.dim_index("lat"), Some(1));
        assert_eq!(var.dim_index("plev"), None);
    }
}
