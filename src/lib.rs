//! A fast, optionally multithreaded **water polygon merge** library.
//!
//! A base layer of water polygons is reconciled with one or more regional
//! overlay layers: every overlay polygon that crosses the boundary of a base
//! polygon is claimed by exactly one base polygon, the claimed polygons are
//! folded together with a smallest-first [cascade union](cascade), and the
//! result replaces the base polygon. Overlay polygons lying outside every base
//! polygon are appended as new water bodies.
//!
//! Candidate pairs are found through an R-tree ([index]), and the selection
//! and merge phases are split into contiguous index ranges processed on a
//! worker pool ([parallel]).
//!
//! # Features
//! #### Default
//! - **parallel**: use rayon for multithreading
//!
//! With `parallel` disabled every phase runs serially on the calling thread
//! and produces the same results.

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod cascade;
pub mod claims;
pub mod dataset;
pub mod errors;
pub mod float_types;
pub mod index;
pub mod io;
pub mod merge;
pub mod options;
pub mod parallel;
pub mod polygon;
pub mod select;
pub mod traits;
pub mod update;

pub use aabb::Aabb;
pub use cascade::cascade_union;
pub use dataset::Dataset;
pub use errors::{MergeError, ValidationError};
pub use float_types::Real;
pub use merge::{MergeOutcome, merge_overlapping, merge_overlapping_in};
pub use options::MergeOptions;
pub use parallel::{WorkerPool, parallel_for};
pub use polygon::PolygonCollection;
pub use select::{OverlapRecord, select_overlap, select_overlap_in};
pub use traits::PolygonOps;
pub use update::{MergeReport, merge_overlay, merge_overlay_in, update_all};
