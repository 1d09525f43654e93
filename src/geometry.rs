use crate::device::{Device, DeviceBuffer};
use crate::spatial_indexer::Positioned;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum GeometryKind {
    PointCloud,
    TriangleMesh,
    LineSet,
    VoxelGrid,
    Image,
}

// Geometry is what the index needs from a geometry type: its kind and its vertex buffer.
// Only point clouds and triangle meshes can be indexed, everything else is turned away
pub trait Geometry {
    type Point: Positioned;

    fn kind(&self) -> GeometryKind;

    fn vertices(&self) -> &DeviceBuffer<Self::Point>;
}

pub struct PointCloud<P: Positioned> {
    points: DeviceBuffer<P>,
}

impl<P: Positioned> PointCloud<P> {
    pub fn new(points: DeviceBuffer<P>) -> Self {
        PointCloud { points }
    }

    pub fn from_points(device: &Device, points: &[P]) -> Self {
        Self::new(device.upload(points))
    }

    pub fn points(&self) -> &DeviceBuffer<P> {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl<P: Positioned> Geometry for PointCloud<P> {
    type Point = P;

    fn kind(&self) -> GeometryKind {
        GeometryKind::PointCloud
    }

    fn vertices(&self) -> &DeviceBuffer<P> {
        &self.points
    }
}

pub struct TriangleMesh<P: Positioned> {
    vertices: DeviceBuffer<P>,
    triangles: Vec<[u32; 3]>,
}

impl<P: Positioned> TriangleMesh<P> {
    pub fn new(vertices: DeviceBuffer<P>, triangles: Vec<[u32; 3]>) -> Self {
        TriangleMesh {
            vertices,
            triangles,
        }
    }

    pub fn from_vertices(device: &Device, vertices: &[P], triangles: Vec<[u32; 3]>) -> Self {
        Self::new(device.upload(vertices), triangles)
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }
}

impl<P: Positioned> Geometry for TriangleMesh<P> {
    type Point = P;

    fn kind(&self) -> GeometryKind {
        GeometryKind::TriangleMesh
    }

    fn vertices(&self) -> &DeviceBuffer<P> {
        &self.vertices
    }
}
