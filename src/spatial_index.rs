use std::slice;

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::device::{Device, DeviceBuffer};
use crate::error::{Result, SearchError};
use crate::geometry::{Geometry, GeometryKind};
use crate::neighbors::{NeighborList, Neighbors};
use crate::query::{IndexParameters, QueryParam, MAX_RESULT_SLOTS};
use crate::spatial_indexer::kd_indexer::KdIndexer;
use crate::spatial_indexer::{Dimension, PaddedPoint, Positioned, SearchEngine};

// BuiltIndex is the engine plus the padded copy of the points it was built over. It only
// exists after a successful build, and is dropped whole when replaced
struct BuiltIndex<E> {
    dimension: Dimension,
    points: DeviceBuffer<PaddedPoint>,
    engine: E,
}

// SpatialIndex answers nearest neighbour queries over a point set that stays on its device.
//
// Building is the expensive part and happens once per point set. Queries borrow the index
// immutably, so any number of them can follow a build, and callers that query in a loop
// should hand the same Neighbors to every call so its buffers are reused.
pub struct SpatialIndex<E: SearchEngine = KdIndexer> {
    device: Device,
    parameters: IndexParameters,

    built: Option<BuiltIndex<E>>,
}

impl SpatialIndex<KdIndexer> {
    pub fn new(device: Device) -> Self {
        SpatialIndex {
            device,
            parameters: IndexParameters::default(),
            built: None,
        }
    }

    pub fn with_parameters(device: Device, parameters: IndexParameters) -> Result<Self> {
        Self::with_engine(device, parameters)
    }
}

impl<E: SearchEngine> SpatialIndex<E> {
    // with_engine creates an index backed by a different SearchEngine
    pub fn with_engine(device: Device, parameters: IndexParameters) -> Result<Self> {
        parameters.validate()?;

        Ok(SpatialIndex {
            device,
            parameters,
            built: None,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn parameters(&self) -> &IndexParameters {
        &self.parameters
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    pub fn dimension(&self) -> Option<Dimension> {
        self.built.as_ref().map(|b| b.dimension)
    }

    // len is the number of indexed points, 0 before the first build
    pub fn len(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.points.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Builds the index over `points`, replacing any previous index.
    //
    // Fails on an empty point set. On failure the previous index, if there was one, is
    // left untouched and can still be queried.
    pub fn build<P: Positioned>(&mut self, points: &DeviceBuffer<P>) -> Result<()> {
        let points = points.as_slice();
        let count = points.len();

        if count == 0 {
            warn!("refusing to build a spatial index over an empty point set");
            return Err(SearchError::EmptyPointSet);
        }

        if count > i32::MAX as usize {
            warn!(count, "point set is too large to index");
            return Err(SearchError::TooManyPoints(count));
        }

        let mut padded = self.device.alloc(count, PaddedPoint::ZERO);
        padded
            .as_mut_slice()
            .par_iter_mut()
            .zip(points.par_iter())
            .for_each(|(padded, point)| *padded = point.padded());

        let engine = E::build(padded.as_slice(), P::DIMENSION, &self.parameters);

        debug!(count, dimension = %P::DIMENSION, device = self.device.name(), "built spatial index");

        self.built = Some(BuiltIndex {
            dimension: P::DIMENSION,
            points: padded,
            engine,
        });

        Ok(())
    }

    // build_from_points uploads host points to the index's device and builds over them
    pub fn build_from_points<P: Positioned>(&mut self, points: &[P]) -> Result<()> {
        let points = self.device.upload(points);
        self.build(&points)
    }

    // set_geometry indexes the vertices of a point cloud or triangle mesh
    pub fn set_geometry<G: Geometry>(&mut self, geometry: &G) -> Result<()> {
        match geometry.kind() {
            GeometryKind::PointCloud | GeometryKind::TriangleMesh => {
                self.build(geometry.vertices())
            }
            kind => {
                warn!(?kind, "unsupported geometry type, spatial index left unchanged");
                Err(SearchError::UnsupportedGeometry(kind))
            }
        }
    }

    // prepare holds the checks every query shares, so nothing is staged for a bad call
    fn prepare<P: Positioned>(&self, queries: &DeviceBuffer<P>) -> Result<&BuiltIndex<E>> {
        let built = self.built.as_ref().ok_or(SearchError::NotBuilt)?;

        if queries.is_empty() {
            return Err(SearchError::EmptyQueries);
        }

        if P::DIMENSION != built.dimension {
            return Err(SearchError::DimensionMismatch {
                index: built.dimension,
                query: P::DIMENSION,
            });
        }

        Ok(built)
    }

    // Finds the `k` nearest indexed points to every query.
    //
    // `out` is reshaped to `queries.len()` rows of width `k`. Returns the number of
    // neighbours found across the batch, which is less than `k` per query only when fewer
    // than `k` points are indexed.
    pub fn knn_search<P: Positioned>(
        &self,
        queries: &DeviceBuffer<P>,
        k: usize,
        out: &mut Neighbors,
    ) -> Result<usize> {
        let built = self.prepare(queries)?;

        let max = self.parameters.max_neighbors;
        if k == 0 || k > max {
            return Err(SearchError::InvalidNeighborCount { requested: k, max });
        }

        check_table_size(queries.len(), k)?;

        let (staged, tables) = out.stage(queries.as_slice(), k);
        let total = built.engine.knn_search(built.points.as_slice(), staged, tables);

        trace!(queries = queries.len(), width = k, total, "knn search");
        Ok(total)
    }

    // Finds the indexed points within `radius` of every query, nearest first.
    //
    // Rows are `max_neighbors` wide. A row whose count reaches that width is saturated:
    // there may be more points in range than were returned.
    pub fn radius_search<P: Positioned>(
        &self,
        queries: &DeviceBuffer<P>,
        radius: f32,
        out: &mut Neighbors,
    ) -> Result<usize> {
        let built = self.prepare(queries)?;
        let radius2 = squared_radius(radius)?;

        let width = self.parameters.max_neighbors;
        check_table_size(queries.len(), width)?;

        let (staged, tables) = out.stage(queries.as_slice(), width);
        let total = built
            .engine
            .radius_search(built.points.as_slice(), staged, radius2, tables);

        trace!(queries = queries.len(), width, radius, total, "radius search");
        Ok(total)
    }

    // hybrid_search finds the points within `radius`, keeping at most the `max_k` nearest
    pub fn hybrid_search<P: Positioned>(
        &self,
        queries: &DeviceBuffer<P>,
        radius: f32,
        max_k: usize,
        out: &mut Neighbors,
    ) -> Result<usize> {
        let built = self.prepare(queries)?;
        let radius2 = squared_radius(radius)?;

        if max_k == 0 {
            return Err(SearchError::ZeroNeighborCount);
        }

        check_table_size(queries.len(), max_k)?;

        let (staged, tables) = out.stage(queries.as_slice(), max_k);
        let total = built
            .engine
            .hybrid_search(built.points.as_slice(), staged, radius2, max_k, tables);

        trace!(queries = queries.len(), width = max_k, radius, total, "hybrid search");
        Ok(total)
    }

    pub fn search<P: Positioned>(
        &self,
        queries: &DeviceBuffer<P>,
        param: QueryParam,
        out: &mut Neighbors,
    ) -> Result<usize> {
        match param {
            QueryParam::Knn { k } => self.knn_search(queries, k, out),
            QueryParam::Radius { radius } => self.radius_search(queries, radius, out),
            QueryParam::Hybrid { radius, max_k } => {
                self.hybrid_search(queries, radius, max_k, out)
            }
        }
    }

    // search_points uploads host queries and returns a freshly allocated result
    pub fn search_points<P: Positioned>(
        &self,
        queries: &[P],
        param: QueryParam,
    ) -> Result<Neighbors> {
        let queries = self.device.upload(queries);
        let mut out = Neighbors::new(&self.device);

        self.search(&queries, param, &mut out)?;

        Ok(out)
    }

    // search_point runs a batch of one and unwraps its only row
    pub fn search_point<P: Positioned>(&self, query: &P, param: QueryParam) -> Result<NeighborList> {
        let neighbors = self.search_points(slice::from_ref(query), param)?;

        Ok(neighbors.row(0))
    }

    pub fn knn_search_points<P: Positioned>(&self, queries: &[P], k: usize) -> Result<Neighbors> {
        self.search_points(queries, QueryParam::Knn { k })
    }

    pub fn radius_search_points<P: Positioned>(
        &self,
        queries: &[P],
        radius: f32,
    ) -> Result<Neighbors> {
        self.search_points(queries, QueryParam::Radius { radius })
    }

    pub fn hybrid_search_points<P: Positioned>(
        &self,
        queries: &[P],
        radius: f32,
        max_k: usize,
    ) -> Result<Neighbors> {
        self.search_points(queries, QueryParam::Hybrid { radius, max_k })
    }

    pub fn knn_search_point<P: Positioned>(&self, query: &P, k: usize) -> Result<NeighborList> {
        self.search_point(query, QueryParam::Knn { k })
    }

    pub fn radius_search_point<P: Positioned>(&self, query: &P, radius: f32) -> Result<NeighborList> {
        self.search_point(query, QueryParam::Radius { radius })
    }

    pub fn hybrid_search_point<P: Positioned>(
        &self,
        query: &P,
        radius: f32,
        max_k: usize,
    ) -> Result<NeighborList> {
        self.search_point(query, QueryParam::Hybrid { radius, max_k })
    }
}

// check_table_size rejects a result shape that would not fit in a single table, before any
// staging so `out` stays as it was
fn check_table_size(queries: usize, width: usize) -> Result<()> {
    match queries.checked_mul(width) {
        Some(slots) if slots <= MAX_RESULT_SLOTS => Ok(()),
        _ => Err(SearchError::ResultTooLarge {
            queries,
            width,
            max: MAX_RESULT_SLOTS,
        }),
    }
}

fn squared_radius(radius: f32) -> Result<f32> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(radius * radius)
    } else {
        Err(SearchError::InvalidRadius(radius))
    }
}
