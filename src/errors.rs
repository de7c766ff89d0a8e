//! Error kinds raised by the merge engine.

use crate::float_types::Real;
use geo::Coord;

/// All the geometry defects that stop a polygon from entering a collection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// (EmptyRing) The outer ring has no coordinates
    #[error("(EmptyRing) the outer ring has no coordinates")]
    EmptyRing,
    /// (TooFewPoints) A ring has fewer than the minimal number of points
    #[error("(TooFewPoints) ring {ring} has {count} coordinates, at least 4 are required")]
    TooFewPoints { ring: usize, count: usize },
    /// (InvalidCoordinate) The coordinate has a NaN or infinite component
    #[error("(InvalidCoordinate) the coordinate ({}, {}) has a NaN or infinite component", .0.x, .0.y)]
    InvalidCoordinate(Coord<Real>),
}

/// Failures of the selection and merge phases.
///
/// `IndexNotBuilt` and `MalformedGeometry` are programming or input-data
/// errors and abort the current call chain. `WorkerFailure` wraps the error
/// one of the parallel workers returned once every worker has joined.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("spatial index queried before it was built")]
    IndexNotBuilt,

    #[error("malformed geometry: {0}")]
    MalformedGeometry(#[from] ValidationError),

    #[error("worker for range {start}..{end} failed: {source}")]
    WorkerFailure {
        start: usize,
        end: usize,
        #[source]
        source: Box<MergeError>,
    },

    #[cfg(feature = "parallel")]
    #[error("unable to start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl MergeError {
    /// Returns the error a worker originally raised, looking through `WorkerFailure`.
    pub fn root_cause(&self) -> &MergeError {
        match self {
            MergeError::WorkerFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
