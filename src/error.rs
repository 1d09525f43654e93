use thiserror::Error;

use crate::geometry::GeometryKind;
use crate::spatial_indexer::Dimension;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("spatial index has not been built")]
    NotBuilt,

    #[error("cannot build a spatial index over an empty point set")]
    EmptyPointSet,

    #[error("query batch is empty")]
    EmptyQueries,

    #[error("query dimension {query} does not match index dimension {index}")]
    DimensionMismatch { index: Dimension, query: Dimension },

    #[error("neighbor count {requested} must be between 1 and {max}")]
    InvalidNeighborCount { requested: usize, max: usize },

    #[error("neighbor count must be at least 1")]
    ZeroNeighborCount,

    #[error("{queries} queries of width {width} exceed the {max} result slots a search can fill")]
    ResultTooLarge {
        queries: usize,
        width: usize,
        max: usize,
    },

    #[error("search radius {0} must be finite and non-negative")]
    InvalidRadius(f32),

    #[error("unsupported geometry type {0:?}")]
    UnsupportedGeometry(GeometryKind),

    #[error("{0} points cannot be addressed by a 32-bit neighbor index")]
    TooManyPoints(usize),

    #[error("invalid index parameters: {0}")]
    InvalidParameters(&'static str),
}

impl SearchError {
    // Every failure maps onto the same negative code
    pub const SENTINEL: i32 = -1;

    pub fn sentinel(&self) -> i32 {
        Self::SENTINEL
    }
}
