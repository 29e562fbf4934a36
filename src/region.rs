//! Axis-aligned crop regions and thresholded volume measurement.
//!
//! A [`BoundingBox`] lives in world coordinates (it normally comes from an
//! interactive box widget). Before counting, each bound is mapped onto the
//! voxel grid with the same floor transform the brush uses and the result is
//! treated as a half-open index range `[floor(min), floor(max))`, clipped to
//! `[0, dim]`. A voxel whose index equals `floor(max)` is therefore not
//! counted, while the voxel containing `min` is.

use crate::volume::{VoxelVolume, WorldPoint};

use ndarray::{Axis, s};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RegionError {
    #[error("Invalid bounding box {0:?}: bounds must be finite with min <= max")]
    InvalidBounds([f64; 6]),
}

/// World-space axis-aligned box, `(xmin, xmax, ymin, ymax, zmin, zmax)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
}

/// Clipping plane given by a point on it and the normal pointing into the
/// kept half-space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub origin: WorldPoint,
    pub normal: (f64, f64, f64),
}

impl BoundingBox {
    pub fn new(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        zmin: f64,
        zmax: f64,
    ) -> Result<Self, RegionError> {
        Self::from_array([xmin, xmax, ymin, ymax, zmin, zmax])
    }

    /// Build from the six-value bounds layout used by box widgets
    pub fn from_array(bounds: [f64; 6]) -> Result<Self, RegionError> {
        let [xmin, xmax, ymin, ymax, zmin, zmax] = bounds;
        let valid = bounds.iter().all(|b| b.is_finite())
            && xmin <= xmax
            && ymin <= ymax
            && zmin <= zmax;
        if !valid {
            return Err(RegionError::InvalidBounds(bounds));
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
            zmin,
            zmax,
        })
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.xmin, self.xmax, self.ymin, self.ymax, self.zmin, self.zmax,
        ]
    }

    /// Overlap of two boxes, `None` when they are disjoint
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        Self::from_array([
            self.xmin.max(other.xmin),
            self.xmax.min(other.xmax),
            self.ymin.max(other.ymin),
            self.ymax.min(other.ymax),
            self.zmin.max(other.zmin),
            self.zmax.min(other.zmax),
        ])
        .ok()
    }

    /// Same box cut at `z` from above. `None` when `z` lies below `zmin`.
    pub fn with_z_max(&self, z: f64) -> Option<BoundingBox> {
        Self::from_array([
            self.xmin,
            self.xmax,
            self.ymin,
            self.ymax,
            self.zmin,
            self.zmax.min(z),
        ])
        .ok()
    }

    /// The six planes that clip a rendered volume to this box, in
    /// z-min, z-max, y-min, y-max, x-min, x-max order
    pub fn clipping_planes(&self) -> [Plane; 6] {
        let plane = |x, y, z, normal| Plane {
            origin: WorldPoint::new(x, y, z),
            normal,
        };
        [
            plane(0.0, 0.0, self.zmin, (0.0, 0.0, 1.0)),
            plane(0.0, 0.0, self.zmax, (0.0, 0.0, -1.0)),
            plane(0.0, self.ymin, 0.0, (0.0, 1.0, 0.0)),
            plane(0.0, self.ymax, 0.0, (0.0, -1.0, 0.0)),
            plane(self.xmin, 0.0, 0.0, (1.0, 0.0, 0.0)),
            plane(self.xmax, 0.0, 0.0, (-1.0, 0.0, 0.0)),
        ]
    }
}

impl Plane {
    /// True when `point` is on the kept side of (or on) the plane
    pub fn keeps(&self, point: WorldPoint) -> bool {
        let (nx, ny, nz) = self.normal;
        let d = (point.x - self.origin.x) * nx
            + (point.y - self.origin.y) * ny
            + (point.z - self.origin.z) * nz;
        d >= 0.0
    }
}

/// Half-open voxel index ranges, `start..end` per axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelRegion {
    pub i: (usize, usize),
    pub j: (usize, usize),
    pub k: (usize, usize),
}

impl VoxelRegion {
    pub fn full(volume: &VoxelVolume) -> Self {
        let (nx, ny, nz) = volume.dimensions();
        Self {
            i: (0, nx),
            j: (0, ny),
            k: (0, nz),
        }
    }

    /// Map a world box onto the grid, clipping every bound to `[0, dim]`
    pub fn from_bounds(volume: &VoxelVolume, bounds: &BoundingBox) -> Self {
        let (nx, ny, nz) = volume.dimensions();
        let (imin, jmin, kmin) =
            volume.world_to_voxel(WorldPoint::new(bounds.xmin, bounds.ymin, bounds.zmin));
        let (imax, jmax, kmax) =
            volume.world_to_voxel(WorldPoint::new(bounds.xmax, bounds.ymax, bounds.zmax));
        let clip = |v: i64, dim: usize| v.clamp(0, dim as i64) as usize;
        Self {
            i: (clip(imin, nx), clip(imax, nx)),
            j: (clip(jmin, ny), clip(jmax, ny)),
            k: (clip(kmin, nz), clip(kmax, nz)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.i.0 >= self.i.1 || self.j.0 >= self.j.1 || self.k.0 >= self.k.1
    }

    pub fn voxel_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.i.1 - self.i.0) * (self.j.1 - self.j.0) * (self.k.1 - self.k.0)
    }
}

/// Counts voxels at or above a threshold and converts the count to a
/// physical volume. Results are in the cube of the spacing unit.
pub struct RegionVolumeEstimator;

impl RegionVolumeEstimator {
    pub fn estimate(volume: &VoxelVolume, threshold: f32, bounds: Option<&BoundingBox>) -> f64 {
        let region = match bounds {
            Some(bounds) => VoxelRegion::from_bounds(volume, bounds),
            None => VoxelRegion::full(volume),
        };
        if region.is_empty() {
            log::debug!("Estimation region {:?} is empty", region);
            return 0.0;
        }
        let count = Self::count_above(volume, threshold, &region);
        count as f64 * volume.voxel_volume_unit()
    }

    /// Number of voxels in `region` whose value is `>= threshold`
    pub fn count_above(volume: &VoxelVolume, threshold: f32, region: &VoxelRegion) -> usize {
        if region.is_empty() {
            return 0;
        }
        let data = volume.data();
        let sub = data.slice(s![
            region.k.0..region.k.1,
            region.j.0..region.j.1,
            region.i.0..region.i.1
        ]);
        sub.axis_iter(Axis(0))
            .into_par_iter()
            .map(|plane| plane.iter().filter(|&&v| v >= threshold).count())
            .sum()
    }
}

/// Convert cubic millimetres to cubic centimetres
pub fn mm3_to_cm3(volume_mm3: f64) -> f64 {
    volume_mm3 / 1000.0
}
