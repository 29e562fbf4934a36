use crate::enums::BrushMode;
use crate::volume::{VolumeError, VoxelVolume, WorldPoint};

/// A single spherical edit, centred on a world point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushStroke {
    pub center: WorldPoint,
    /// Sphere radius in voxels
    pub radius: u32,
    /// Added to every voxel inside the sphere
    pub increment: f32,
}

impl BrushStroke {
    pub fn new(center: WorldPoint, radius: u32, increment: f32) -> Self {
        Self {
            center,
            radius,
            increment,
        }
    }

    /// Stroke with the increment signed for the given mode
    pub fn with_mode(center: WorldPoint, radius: u32, increment: f32, mode: BrushMode) -> Self {
        Self::new(center, radius, mode.signed(increment))
    }
}

pub struct BrushEditor;

impl BrushEditor {
    /// Add the stroke's increment to every voxel within `radius` (index
    /// distance) of the voxel containing the stroke centre.
    ///
    /// Values are not clamped; repeated strokes accumulate.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::OutOfBounds`] when the centre maps outside the
    /// grid. The volume is left untouched in that case.
    ///
    /// Returns the number of voxels modified.
    pub fn apply_stroke(volume: &mut VoxelVolume, stroke: &BrushStroke) -> Result<usize, VolumeError> {
        let (ci, cj, ck) = if stroke.center.is_finite() {
            volume.world_to_voxel(stroke.center)
        } else {
            (i64::MIN, i64::MIN, i64::MIN)
        };
        if !volume.contains(ci, cj, ck) {
            return Err(VolumeError::OutOfBounds {
                index: (ci, cj, ck),
                dimensions: volume.dimensions(),
            });
        }

        let (nx, ny, nz) = volume.dimensions();
        let r = i64::from(stroke.radius);
        let r_squared = r * r;
        let clip = |c: i64, dim: usize| (c - r).max(0)..=(c + r).min(dim as i64 - 1);

        let mut data = volume.data_mut();
        let mut modified = 0;
        for k in clip(ck, nz) {
            for j in clip(cj, ny) {
                for i in clip(ci, nx) {
                    let (di, dj, dk) = (i - ci, j - cj, k - ck);
                    if di * di + dj * dj + dk * dk <= r_squared {
                        data[[k as usize, j as usize, i as usize]] += stroke.increment;
                        modified += 1;
                    }
                }
            }
        }

        log::debug!(
            "Brush stroke at voxel ({}, {}, {}) radius {} modified {} voxels",
            ci,
            cj,
            ck,
            stroke.radius,
            modified
        );
        Ok(modified)
    }
}
