//! # colloc
//!
//! A collocation engine for scientific datasets.
//!
//! This library resamples one dataset onto the locations of another, so that
//! values from different instruments or models can be compared point by
//! point. Datasets are either gridded (values on a lattice of coordinate
//! axes) or ungridded (a scatter of points with their own coordinates).
//!
//! ## Key Features
//!
//! - **Separation constraints**: horizontal, vertical and temporal limits on which source points count
//! - **Kernels**: nearest neighbour, multilinear interpolation, cell binning and box reductions
//! - **Spatial indexing**: direct lattice lookup for grids, a k-d tree for scattered points
//! - **Parallel sampling**: target points are processed on a rayon pool with deterministic output
//!
//! ## Architecture
//!
//! - **Data Layer**: gridded and ungridded datasets behind one [`CommonData`] interface
//! - **Frame**: the shared coordinate dimensions of a source/target pair, in canonical units
//! - **Collocator**: indexes the source, gathers candidates per target point and assembles the output

pub mod collocator;
pub mod config;
pub mod constraint;
pub mod data;
pub mod error;
pub mod frame;
pub mod geo;
pub mod index;
pub mod kernel;
pub mod logging;
pub mod point;
pub mod units;

pub use collocator::{
    collocate, CancellationToken, Collocated, CollocationOptions, CollocationSummary, Collocator,
    CollocatorState, OutputNaming,
};
pub use config::Config;
pub use constraint::{SeparationConstraints, SeparationWeights};
pub use data::{CommonData, DataList, Dataset, DimCoord, GriddedData, SubsetSpec, UngriddedData, VariableMeta};
pub use error::{CollocError, Result};
pub use frame::Frame;
pub use kernel::{get_kernel, register_kernel, Kernel, PartialValidity, Reduction};
pub use logging::{
    generate_run_id, init_tracing, log_collocation_stats, log_error, log_operation_end,
    log_operation_start, log_timed_operation,
};
pub use point::{Coord, Dim, Point, Schema};
