use rayon::prelude::*;

use crate::device::{Device, DeviceBuffer};
use crate::spatial_indexer::{PaddedPoint, Positioned};

// Unfilled result slots always hold these, whatever engine wrote the rest of the row
pub const INVALID_INDEX: i32 = -1;
pub const INVALID_DISTANCE: f32 = f32::INFINITY;

// Neighbors holds the result of a batch search: row-major Q x W index and squared distance
// tables plus the number of valid entries in each row. It also keeps the staged queries, so
// one Neighbors reused across calls means no device allocation once it has grown large enough
pub struct Neighbors {
    width: usize,
    query_count: usize,

    indices: DeviceBuffer<i32>,
    distances2: DeviceBuffer<f32>,
    counts: DeviceBuffer<u32>,

    staged: DeviceBuffer<PaddedPoint>,
}

// NeighborTables is the mutable view handed to a SearchEngine, one row of `width` per query
pub struct NeighborTables<'a> {
    pub width: usize,
    pub indices: &'a mut [i32],
    pub distances2: &'a mut [f32],
    pub counts: &'a mut [u32],
}

// NeighborList is the unwrapped result of a single point query, only the valid entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NeighborList {
    pub indices: Vec<usize>,
    pub distances2: Vec<f32>,
}

impl NeighborList {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl Neighbors {
    pub fn new(device: &Device) -> Self {
        Neighbors {
            width: 0,
            query_count: 0,
            indices: device.alloc(0, INVALID_INDEX),
            distances2: device.alloc(0, INVALID_DISTANCE),
            counts: device.alloc(0, 0),
            staged: device.alloc(0, PaddedPoint::ZERO),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn query_count(&self) -> usize {
        self.query_count
    }

    pub fn is_empty(&self) -> bool {
        self.query_count == 0
    }

    // The per row accessors below index like a slice: `query` must be below query_count(),
    // use get for a row that might not exist
    pub fn count(&self, query: usize) -> usize {
        self.counts.as_slice()[query] as usize
    }

    pub fn total(&self) -> usize {
        self.counts.as_slice().iter().map(|c| *c as usize).sum()
    }

    // A saturated row used every slot, there may have been more matches than the width allows
    pub fn is_saturated(&self, query: usize) -> bool {
        self.count(query) == self.width
    }

    pub fn indices(&self, query: usize) -> &[i32] {
        let start = query * self.width;
        &self.indices.as_slice()[start..start + self.count(query)]
    }

    pub fn distances2(&self, query: usize) -> &[f32] {
        let start = query * self.width;
        &self.distances2.as_slice()[start..start + self.count(query)]
    }

    pub fn row(&self, query: usize) -> NeighborList {
        NeighborList {
            indices: self.indices(query).iter().map(|i| *i as usize).collect(),
            distances2: self.distances2(query).to_vec(),
        }
    }

    pub fn get(&self, query: usize) -> Option<NeighborList> {
        if query < self.query_count {
            Some(self.row(query))
        } else {
            None
        }
    }

    // Full tables, including the sentinel slots
    pub fn index_table(&self) -> &DeviceBuffer<i32> {
        &self.indices
    }

    pub fn distance_table(&self) -> &DeviceBuffer<f32> {
        &self.distances2
    }

    pub fn count_table(&self) -> &DeviceBuffer<u32> {
        &self.counts
    }

    // stage pads the queries and resizes every table to exactly queries x width, filled with
    // sentinels, before handing them out for an engine to write into
    pub(crate) fn stage<P: Positioned>(
        &mut self,
        queries: &[P],
        width: usize,
    ) -> (&[PaddedPoint], NeighborTables<'_>) {
        let query_count = queries.len();

        self.width = width;
        self.query_count = query_count;

        self.indices.reset(query_count * width, INVALID_INDEX);
        self.distances2.reset(query_count * width, INVALID_DISTANCE);
        self.counts.reset(query_count, 0);

        self.staged.reset(query_count, PaddedPoint::ZERO);
        self.staged
            .as_mut_slice()
            .par_iter_mut()
            .zip(queries.par_iter())
            .for_each(|(staged, query)| *staged = query.padded());

        (
            self.staged.as_slice(),
            NeighborTables {
                width,
                indices: self.indices.as_mut_slice(),
                distances2: self.distances2.as_mut_slice(),
                counts: self.counts.as_mut_slice(),
            },
        )
    }
}
