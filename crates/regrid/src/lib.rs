//! Reading of source NetCDF model output and normalization onto the
//! canonical 1-degree global grid.
//!
//! Model output arrives on heterogeneous native grids with varying
//! coordinate names, vertical axes and longitude conventions. This crate
//! reduces each file to a single (lat, lon) plane for a requested year or
//! window and resamples it onto the shared 180x360 grid so that fields
//! from different models can be stacked cell for cell.

pub mod dataset;
pub mod netcdf_io;
pub mod normalize;
pub mod source;
pub mod time_decode;

pub use dataset::{RawDataset, RawVariable, TimeAxis};
pub use netcdf_io::read_dataset;
pub use normalize::{normalize, normalize_counted};
pub use source::{DatasetSource, StorageDatasetSource};
