//! Cell-wise reductions across the member axis of an ensemble stack.

use rayon::prelude::*;

use climate_common::{CanonicalField, N_LAT, N_LON};

use crate::stack::EnsembleStack;

/// How to collapse the member axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReduceOp {
    Mean,
    Median,
    /// Quantile in [0, 1], linear interpolation between order statistics.
    Quantile(f64),
}

/// Quantile of a slice with NaN already removed. Linear interpolation,
/// matching the numpy default. Returns NaN for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = h.floor() as usize;
            let hi = h.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64)
        }
    }
}

/// Reduce a stack to a single canonical field, cell by cell. NaN members
/// are skipped per cell; a cell with no finite member stays NaN.
pub fn reduce_stack(stack: &EnsembleStack, op: ReduceOp) -> CanonicalField {
    let n_cells = N_LAT * N_LON;

    let data: Vec<f64> = (0..n_cells)
        .into_par_iter()
        .map(|cell| {
            let mut values: Vec<f64> = stack
                .members
                .iter()
                .map(|m| m.field.data[cell])
                .filter(|v| v.is_finite())
                .collect();
            if values.is_empty() {
                return f64::NAN;
            }
            match op {
                ReduceOp::Mean => values.iter().sum::<f64>() / values.len() as f64,
                ReduceOp::Median => {
                    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
                    quantile(&values, 0.5)
                }
                ReduceOp::Quantile(q) => {
                    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
                    quantile(&values, q)
                }
            }
        })
        .collect();

    CanonicalField::from_data(data, stack.reduction)
}
