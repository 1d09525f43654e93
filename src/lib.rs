// Nearest neighbour search over 2D and 3D point sets that stay in device memory.
//
// A SpatialIndex is built once over a point buffer and then answers any number of
// k-nearest, radius and hybrid (radius capped at k) queries against it.

pub use device::{Device, DeviceBuffer};
pub use error::{Result, SearchError};
pub use geometry::{Geometry, GeometryKind, PointCloud, TriangleMesh};
pub use neighbors::{NeighborList, NeighborTables, Neighbors, INVALID_DISTANCE, INVALID_INDEX};
pub use query::{
    IndexParameters, QueryParam, DEFAULT_MAX_NEIGHBORS, KD_LEAF_SIZE, MAX_RESULT_SLOTS,
};
pub use spatial_index::SpatialIndex;
pub use spatial_indexer::kd_indexer::KdIndexer;
pub use spatial_indexer::{Dimension, PaddedPoint, Positioned, SearchEngine};

pub mod device;
mod error;
mod geometry;
mod neighbors;
mod query;
mod spatial_index;
pub mod spatial_indexer;
