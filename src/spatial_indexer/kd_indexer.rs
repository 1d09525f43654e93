use rayon::prelude::*;

use crate::neighbors::NeighborTables;
use crate::query::IndexParameters;
use crate::spatial_indexer::{Dimension, PaddedPoint, SearchEngine};

// Subtrees smaller than this are built on the calling thread, splitting below it costs more
// in scheduling than it saves
const PARALLEL_BUILD_SIZE: usize = 4096;

#[derive(Debug, Copy, Clone, PartialEq)]
enum SplitAxis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl SplitAxis {
    fn next(&self, dimension: Dimension) -> SplitAxis {
        match (self, dimension) {
            (SplitAxis::X, _) => SplitAxis::Y,
            (SplitAxis::Y, Dimension::Two) => SplitAxis::X,
            (SplitAxis::Y, Dimension::Three) => SplitAxis::Z,
            (SplitAxis::Z, _) => SplitAxis::X,
        }
    }

    fn component(&self, p: &PaddedPoint) -> f32 {
        p.component(*self as usize)
    }
}

#[derive(Debug)]
enum KdTree {
    Leaf(Vec<u32>),
    Node(KdNode),
}

// Everything in `left` is <= midpoint along axis, everything in `right` is >= midpoint
#[derive(Debug)]
struct KdNode {
    axis: SplitAxis,
    midpoint: f32,

    left: Box<KdTree>,
    right: Box<KdTree>,
}

fn _construct(
    points: &[PaddedPoint],
    items: Vec<u32>,
    axis: SplitAxis,
    dimension: Dimension,
    leaf_size: usize,
) -> KdTree {
    if items.len() <= leaf_size {
        return KdTree::Leaf(items);
    }

    let parallel = items.len() >= PARALLEL_BUILD_SIZE;
    let (midpoint, left, right) = _split(points, items, axis);
    let next = axis.next(dimension);

    let (left_node, right_node) = if parallel {
        rayon::join(
            || _construct(points, left, next, dimension, leaf_size),
            || _construct(points, right, next, dimension, leaf_size),
        )
    } else {
        (
            _construct(points, left, next, dimension, leaf_size),
            _construct(points, right, next, dimension, leaf_size),
        )
    };

    KdTree::Node(KdNode {
        axis,
        midpoint,
        left: Box::new(left_node),
        right: Box::new(right_node),
    })
}

// _split partitions around the median, so both halves are non-empty for 2 or more items and
// the tree stays balanced even with repeated coordinates
fn _split(
    points: &[PaddedPoint],
    mut items: Vec<u32>,
    axis: SplitAxis,
) -> (f32, Vec<u32>, Vec<u32>) {
    let median = items.len() / 2;

    items.select_nth_unstable_by(median, |a, b| {
        axis.component(&points[*a as usize])
            .total_cmp(&axis.component(&points[*b as usize]))
    });

    let midpoint = axis.component(&points[items[median] as usize]);
    let right = items.split_off(median);

    (midpoint, items, right)
}

// Candidates is the sorted list of best matches found so far for a single query
#[derive(Debug, Default)]
struct Candidates {
    k: usize,
    bound2: f32,
    items: Vec<(f32, u32)>,
}

impl Candidates {
    fn reset(&mut self, k: usize, bound2: f32) {
        self.k = k;
        self.bound2 = bound2;
        self.items.clear();
    }

    // worst is the squared distance a point has to beat to be worth looking at
    fn worst(&self) -> f32 {
        if self.items.len() < self.k {
            self.bound2
        } else {
            self.items[self.k - 1].0
        }
    }

    fn offer(&mut self, distance2: f32, index: u32) {
        // Also turns away NaN
        if !(distance2 <= self.bound2) {
            return;
        }

        if self.items.len() == self.k {
            let (worst_distance2, worst_index) = self.items[self.k - 1];
            if distance2 > worst_distance2
                || (distance2 == worst_distance2 && index > worst_index)
            {
                return;
            }
        }

        let at = self
            .items
            .partition_point(|(d, i)| *d < distance2 || (*d == distance2 && *i < index));
        self.items.insert(at, (distance2, index));
        self.items.truncate(self.k);
    }
}

fn _nearest(
    points: &[PaddedPoint],
    tree: &KdTree,
    query: &PaddedPoint,
    candidates: &mut Candidates,
) {
    match tree {
        KdTree::Leaf(l) => {
            for item_idx in l {
                candidates.offer(points[*item_idx as usize].distance_squared(query), *item_idx);
            }
        }
        KdTree::Node(n) => {
            let offset = n.axis.component(query) - n.midpoint;

            let (near, far) = if offset <= 0.0 {
                (&n.left, &n.right)
            } else {
                (&n.right, &n.left)
            };

            _nearest(points, near, query, candidates);

            // Every point on the far side is at least `offset` away along the split axis
            if offset * offset <= candidates.worst() {
                _nearest(points, far, query, candidates);
            }
        }
    }
}

// KdIndexer uses a KdTree to provide spatial indexing
#[derive(Debug)]
pub struct KdIndexer {
    root: KdTree,
}

impl KdIndexer {
    // _search_batch finds up to `k` points within sqrt(bound2) of every query, one query per
    // rayon task, writing each into its own row of `out`
    fn _search_batch(
        &self,
        points: &[PaddedPoint],
        queries: &[PaddedPoint],
        k: usize,
        bound2: f32,
        out: NeighborTables<'_>,
    ) -> usize {
        let width = out.width;
        let k = k.min(width);

        if k == 0 {
            return 0;
        }

        queries
            .par_iter()
            .zip(out.indices.par_chunks_mut(width))
            .zip(out.distances2.par_chunks_mut(width))
            .zip(out.counts.par_iter_mut())
            .map_init(Candidates::default, |candidates, (((query, indices), distances2), count)| {
                candidates.reset(k, bound2);
                _nearest(points, &self.root, query, candidates);

                for (slot, (distance2, index)) in candidates.items.iter().enumerate() {
                    indices[slot] = *index as i32;
                    distances2[slot] = *distance2;
                }

                *count = candidates.items.len() as u32;
                candidates.items.len()
            })
            .sum()
    }
}

impl SearchEngine for KdIndexer {
    fn build(points: &[PaddedPoint], dimension: Dimension, parameters: &IndexParameters) -> Self {
        let items = (0..points.len() as u32).collect();

        KdIndexer {
            root: _construct(points, items, SplitAxis::X, dimension, parameters.leaf_size.max(1)),
        }
    }

    fn knn_search(
        &self,
        points: &[PaddedPoint],
        queries: &[PaddedPoint],
        out: NeighborTables<'_>,
    ) -> usize {
        let k = out.width;
        self._search_batch(points, queries, k, f32::INFINITY, out)
    }

    fn radius_search(
        &self,
        points: &[PaddedPoint],
        queries: &[PaddedPoint],
        radius2: f32,
        out: NeighborTables<'_>,
    ) -> usize {
        let cap = out.width;
        self._search_batch(points, queries, cap, radius2, out)
    }

    fn hybrid_search(
        &self,
        points: &[PaddedPoint],
        queries: &[PaddedPoint],
        radius2: f32,
        max_k: usize,
        out: NeighborTables<'_>,
    ) -> usize {
        self._search_batch(points, queries, max_k, radius2, out)
    }
}
