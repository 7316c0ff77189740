//! The canonical 1° global grid and fields defined on it.
//!
//! Every dataset in the archive is normalized onto this single grid:
//! 180 latitude cells centered at -89.5..+89.5 and 360 longitude cells
//! centered at 0.5..359.5 (longitudes in [0, 360)). Fields are stored
//! lat-major with NaN marking missing cells.

use serde::{Deserialize, Serialize};

/// Number of latitude cells on the canonical grid.
pub const N_LAT: usize = 180;

/// Number of longitude cells on the canonical grid.
pub const N_LON: usize = 360;

/// The fixed 1°x1° equirectangular target grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGrid {
    /// Latitude cell centers, ascending (-89.5 .. 89.5).
    pub lat: Vec<f64>,
    /// Longitude cell centers, ascending (0.5 .. 359.5).
    pub lon: Vec<f64>,
}

impl CanonicalGrid {
    /// Build the canonical grid definition.
    pub fn new() -> Self {
        let lat: Vec<f64> = (0..N_LAT).map(|i| -89.5 + i as f64).collect();
        let lon: Vec<f64> = (0..N_LON).map(|j| 0.5 + j as f64).collect();
        Self { lat, lon }
    }

    /// Flat array index for (lat index, lon index).
    #[inline]
    pub fn flat_index(&self, i_lat: usize, i_lon: usize) -> usize {
        i_lat * N_LON + i_lon
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        N_LAT * N_LON
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Compare another coordinate pair against this grid.
    ///
    /// Returns the maximum absolute difference over both axes, or None
    /// when the shapes differ. Exact equality (within `tol`) is the
    /// compatibility contract for cached artifacts; a mask built against
    /// a different grid is rejected, never reinterpolated.
    pub fn max_abs_diff(&self, lat: &[f64], lon: &[f64]) -> Option<f64> {
        if lat.len() != self.lat.len() || lon.len() != self.lon.len() {
            return None;
        }
        let lat_diff = self
            .lat
            .iter()
            .zip(lat)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max);
        let lon_diff = self
            .lon
            .iter()
            .zip(lon)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max);
        Some(lat_diff.max(lon_diff))
    }
}

impl Default for CanonicalGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// The time reduction a canonical field represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeReduction {
    /// Mean over one calendar year.
    Year(i32),
    /// Mean over an inclusive year window.
    Window { start: i32, end: i32 },
}

impl TimeReduction {
    /// Check whether a sample's calendar year falls inside this reduction.
    pub fn contains_year(&self, year: i32) -> bool {
        match self {
            TimeReduction::Year(y) => year == *y,
            TimeReduction::Window { start, end } => year >= *start && year <= *end,
        }
    }
}

impl std::fmt::Display for TimeReduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeReduction::Year(y) => write!(f, "{}", y),
            TimeReduction::Window { start, end } => write!(f, "{}-{}", start, end),
        }
    }
}

/// A 2-D field on the canonical grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalField {
    /// Cell values, lat-major (index = i_lat * N_LON + i_lon). NaN = missing.
    pub data: Vec<f64>,
    /// The time reduction this field represents.
    pub reduction: TimeReduction,
}

impl CanonicalField {
    /// Create a field filled with NaN.
    pub fn empty(reduction: TimeReduction) -> Self {
        Self {
            data: vec![f64::NAN; N_LAT * N_LON],
            reduction,
        }
    }

    /// Create a field from existing data. The data length must be 180*360.
    pub fn from_data(data: Vec<f64>, reduction: TimeReduction) -> Self {
        assert_eq!(data.len(), N_LAT * N_LON, "canonical field must be 180x360");
        Self { data, reduction }
    }

    /// Value at (lat index, lon index).
    #[inline]
    pub fn get(&self, i_lat: usize, i_lon: usize) -> f64 {
        self.data[i_lat * N_LON + i_lon]
    }

    /// Set value at (lat index, lon index).
    #[inline]
    pub fn set(&mut self, i_lat: usize, i_lon: usize, value: f64) {
        self.data[i_lat * N_LON + i_lon] = value;
    }

    /// Whether at least one cell holds a finite value.
    pub fn has_finite(&self) -> bool {
        self.data.iter().any(|v| v.is_finite())
    }

    /// Number of finite cells.
    pub fn n_finite(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }
}
