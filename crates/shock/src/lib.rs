//! Threshold reference maps and regional shock computation.
//!
//! A shock compares a projected ensemble statistic over a future window
//! against a reference statistic for the scenario's first year, reduced
//! to a single number per country. Reference maps are expensive to build
//! and are cached as JSON artifacts keyed by basis, scenario and
//! quantile.

pub mod engine;
pub mod threshold;
pub mod window;

pub use engine::{Mode, ShockEngine, ShockRequest, ShockResponse, Stat};
pub use threshold::{
    Basis, ThresholdMap, ThresholdStore, ThresholdSummary, REFERENCE_YEAR,
};
pub use window::project_window;
