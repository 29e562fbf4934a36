//! Back-and-forth sweep of a Z slice plane.
//!
//! Each tick moves the plane by a fixed fraction of the Z range and reports
//! the thresholded volume of the half-space below it.

use crate::enums::SweepDirection;
use crate::region::{BoundingBox, RegionVolumeEstimator, VoxelRegion};
use crate::volume::{VoxelVolume, WorldPoint};

pub const DEFAULT_STEPS_PER_SWEEP: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceReport {
    pub position: f64,
    pub direction: SweepDirection,
    pub volume_mm3: f64,
}

#[derive(Clone, Debug)]
pub struct SliceAnimator {
    min: f64,
    max: f64,
    step: f64,
    position: f64,
    direction: SweepDirection,
}

impl SliceAnimator {
    /// Start at `min` moving up. `steps_per_sweep` of zero is treated as one.
    pub fn new(min: f64, max: f64, steps_per_sweep: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            step: (max - min) / f64::from(steps_per_sweep.max(1)),
            position: min,
            direction: SweepDirection::Up,
        }
    }

    /// Animator spanning the Z extent of a volume
    pub fn for_volume(volume: &VoxelVolume, steps_per_sweep: u32) -> Self {
        let bounds = volume.bounds();
        Self::new(bounds.zmin, bounds.zmax, steps_per_sweep)
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn direction(&self) -> SweepDirection {
        self.direction
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Advance one step, bouncing off the limits. Returns the new position.
    pub fn tick(&mut self) -> f64 {
        self.position += self.step * self.direction.sign();
        if self.position >= self.max {
            self.position = self.max;
            self.direction = SweepDirection::Down;
        } else if self.position <= self.min {
            self.position = self.min;
            self.direction = SweepDirection::Up;
        }
        self.position
    }

    /// Advance, then estimate the volume of the voxels at or below the plane,
    /// limited to `crop` when given.
    pub fn tick_and_estimate(
        &mut self,
        volume: &VoxelVolume,
        threshold: f32,
        crop: Option<&BoundingBox>,
    ) -> SliceReport {
        let position = self.tick();
        let region = self.region_below(volume, crop);
        let volume_mm3 = RegionVolumeEstimator::count_above(volume, threshold, &region) as f64
            * volume.voxel_volume_unit();
        log::debug!(
            "Slice plane at z={:.3} ({:?}): {:.3} mm^3",
            position,
            self.direction,
            volume_mm3
        );
        SliceReport {
            position,
            direction: self.direction,
            volume_mm3,
        }
    }

    /// Voxels in slices `k <= floor((z - oz) / sz)`, inside `crop` (or the
    /// whole grid). The cut is taken from `world_to_voxel` so it agrees with
    /// picks and crop boxes at exact multiples of the spacing.
    fn region_below(&self, volume: &VoxelVolume, crop: Option<&BoundingBox>) -> VoxelRegion {
        let mut region = match crop {
            Some(crop) => VoxelRegion::from_bounds(volume, crop),
            None => VoxelRegion::full(volume),
        };
        let (_, _, plane_k) = volume.world_to_voxel(WorldPoint::new(0.0, 0.0, self.position));
        let (_, _, nz) = volume.dimensions();
        let end = plane_k.saturating_add(1).clamp(0, nz as i64) as usize;
        region.k.1 = region.k.1.min(end);
        region
    }

    /// Origin and the two spanning points of the plane quad at the current
    /// position, covering the X/Y extent of `bounds`
    pub fn plane_corners(&self, bounds: &BoundingBox) -> [WorldPoint; 3] {
        let z = self.position;
        [
            WorldPoint::new(bounds.xmin, bounds.ymin, z),
            WorldPoint::new(bounds.xmax, bounds.ymin, z),
            WorldPoint::new(bounds.xmin, bounds.ymax, z),
        ]
    }
}
