use std::fmt;

use nalgebra::{Point2, Point3, Vector2, Vector3};

use crate::neighbors::NeighborTables;
use crate::query::IndexParameters;

pub mod kd_indexer;

// Dimension is the closed set of point dimensions an index can hold
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    Two = 2,
    Three = 3,
}

impl Dimension {
    pub fn components(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.components())
    }
}

// PaddedPoint is a point stored with a uniform 4 float stride, unused components are zero
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[repr(C, align(16))]
pub struct PaddedPoint(pub [f32; 4]);

impl PaddedPoint {
    pub const ZERO: PaddedPoint = PaddedPoint([0.0; 4]);

    pub fn distance_squared(&self, other: &PaddedPoint) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    pub fn component(&self, axis: usize) -> f32 {
        self.0[axis]
    }
}

mod sealed {
    pub trait Sealed {}
}

// Positioned is anything an index can be built from or queried with. The dimension is part
// of the type, so every call site is specialised for 2D or 3D
pub trait Positioned: Copy + Send + Sync + sealed::Sealed {
    const DIMENSION: Dimension;

    fn padded(&self) -> PaddedPoint;
}

macro_rules! positioned_2d {
    ($t:ty) => {
        impl sealed::Sealed for $t {}

        impl Positioned for $t {
            const DIMENSION: Dimension = Dimension::Two;

            fn padded(&self) -> PaddedPoint {
                PaddedPoint([self.x, self.y, 0.0, 0.0])
            }
        }
    };
}

macro_rules! positioned_3d {
    ($t:ty) => {
        impl sealed::Sealed for $t {}

        impl Positioned for $t {
            const DIMENSION: Dimension = Dimension::Three;

            fn padded(&self) -> PaddedPoint {
                PaddedPoint([self.x, self.y, self.z, 0.0])
            }
        }
    };
}

positioned_2d!(Point2<f32>);
positioned_2d!(Vector2<f32>);
positioned_3d!(Point3<f32>);
positioned_3d!(Vector3<f32>);

// SearchEngine builds and searches the underlying tree. It doesn't own any point data, just
// indices into the padded buffer it was built over, which is handed back on every search.
//
// Every search writes rows sorted nearest first (ties by lower index), leaves unused slots as
// they were staged and returns the number of neighbours written across the whole batch
pub trait SearchEngine: Send + Sync + Sized {
    fn build(points: &[PaddedPoint], dimension: Dimension, parameters: &IndexParameters) -> Self;

    // knn_search finds the `k` nearest points, k is the table width
    fn knn_search(
        &self,
        points: &[PaddedPoint],
        queries: &[PaddedPoint],
        out: NeighborTables<'_>,
    ) -> usize;

    // radius_search finds points within sqrt(radius2), keeping the nearest that fit the table
    fn radius_search(
        &self,
        points: &[PaddedPoint],
        queries: &[PaddedPoint],
        radius2: f32,
        out: NeighborTables<'_>,
    ) -> usize;

    // hybrid_search finds points within sqrt(radius2), capped at `max_k` per query
    fn hybrid_search(
        &self,
        points: &[PaddedPoint],
        queries: &[PaddedPoint],
        radius2: f32,
        max_k: usize,
        out: NeighborTables<'_>,
    ) -> usize;
}
