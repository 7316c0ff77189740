//! Common types shared across all climate-shock services.

pub mod error;
pub mod grid;
pub mod time;

pub use error::{ClimateError, ClimateResult};
pub use grid::{CanonicalField, CanonicalGrid, TimeReduction, N_LAT, N_LON};
pub use time::YearMonth;
