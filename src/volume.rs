use crate::enums::Interpolation;
use crate::enums::Orientation;
use crate::interpolator::Interpolator;
use crate::region::BoundingBox;

use image::GrayImage;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::ArrayView3;
use ndarray::ArrayViewMut3;
use ndarray::s;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VolumeError {
    #[error("Voxel index {index:?} is outside of volume dimensions {dimensions:?}")]
    OutOfBounds {
        index: (i64, i64, i64),
        dimensions: (usize, usize, usize),
    },

    #[error("Scalar buffer holds {actual} values, dimensions require {expected}")]
    DataLength { expected: usize, actual: usize },

    #[error("Volume must have at least one voxel along every axis")]
    Empty,

    #[error("Spacing must be finite and positive, got {0:?}")]
    InvalidSpacing((f64, f64, f64)),
}

/// A point in physical (patient) coordinates, same frame as the volume origin
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<(f64, f64, f64)> for WorldPoint {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// Scalar voxel grid with physical spacing and origin.
///
/// Data is stored as (depth, height, width) = (nz, ny, nx) in standard
/// layout, so the flat buffer index of voxel (i, j, k) is
/// `i + j * nx + k * nx * ny`.
#[derive(Clone, Debug)]
pub struct VoxelVolume {
    data: Array3<f32>,
    spacing: (f64, f64, f64),
    origin: (f64, f64, f64),
    interpolated_dim: (u32, u32, u32),
}

impl VoxelVolume {
    pub fn new(
        data: Array3<f32>,
        spacing: (f64, f64, f64),
        origin: (f64, f64, f64),
    ) -> Result<Self, VolumeError> {
        let (depth, height, width) = data.dim();
        if depth == 0 || height == 0 || width == 0 {
            return Err(VolumeError::Empty);
        }
        let (sx, sy, sz) = spacing;
        if [sx, sy, sz].iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(VolumeError::InvalidSpacing(spacing));
        }
        // Views handed out by slicing assume contiguous rows.
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        let interpolated_dim = Interpolator::get_isotropic_dimensions(spacing, data.dim());
        Ok(Self {
            data,
            spacing,
            origin,
            interpolated_dim,
        })
    }

    /// Build a volume from a flat buffer addressed as `i + j * nx + k * nx * ny`
    pub fn from_flat(
        dimensions: (usize, usize, usize),
        spacing: (f64, f64, f64),
        origin: (f64, f64, f64),
        values: Vec<f32>,
    ) -> Result<Self, VolumeError> {
        let (nx, ny, nz) = dimensions;
        let expected = nx * ny * nz;
        let actual = values.len();
        if actual != expected {
            return Err(VolumeError::DataLength { expected, actual });
        }
        let data = Array3::from_shape_vec((nz, ny, nx), values)
            .map_err(|_| VolumeError::DataLength { expected, actual })?;
        Self::new(data, spacing, origin)
    }

    pub fn filled(
        dimensions: (usize, usize, usize),
        spacing: (f64, f64, f64),
        origin: (f64, f64, f64),
        value: f32,
    ) -> Result<Self, VolumeError> {
        let (nx, ny, nz) = dimensions;
        Self::new(Array3::from_elem((nz, ny, nx), value), spacing, origin)
    }

    /// Get the dimensions of the underlying array (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get the dimensions in voxel index order (nx, ny, nz)
    pub fn dimensions(&self) -> (usize, usize, usize) {
        let (depth, height, width) = self.data.dim();
        (width, height, depth)
    }

    pub fn spacing(&self) -> (f64, f64, f64) {
        self.spacing
    }

    pub fn origin(&self) -> (f64, f64, f64) {
        self.origin
    }

    pub fn voxel_count(&self) -> usize {
        self.data.len()
    }

    /// Get a read-only view of the underlying data
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Get a mutable view of the underlying data. The shape cannot change
    /// through it.
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        self.data.view_mut()
    }

    pub fn contains(&self, i: i64, j: i64, k: i64) -> bool {
        let (nx, ny, nz) = self.dimensions();
        (0..nx as i64).contains(&i) && (0..ny as i64).contains(&j) && (0..nz as i64).contains(&k)
    }

    fn checked_index(&self, i: i64, j: i64, k: i64) -> Result<[usize; 3], VolumeError> {
        if self.contains(i, j, k) {
            Ok([k as usize, j as usize, i as usize])
        } else {
            Err(VolumeError::OutOfBounds {
                index: (i, j, k),
                dimensions: self.dimensions(),
            })
        }
    }

    pub fn get(&self, i: i64, j: i64, k: i64) -> Result<f32, VolumeError> {
        let index = self.checked_index(i, j, k)?;
        Ok(self.data[index])
    }

    pub fn set(&mut self, i: i64, j: i64, k: i64, value: f32) -> Result<(), VolumeError> {
        let index = self.checked_index(i, j, k)?;
        self.data[index] = value;
        Ok(())
    }

    /// Map a world point to the voxel containing it, flooring toward the
    /// lower index. The result is not bounds checked.
    pub fn world_to_voxel(&self, point: WorldPoint) -> (i64, i64, i64) {
        let (ox, oy, oz) = self.origin;
        let (sx, sy, sz) = self.spacing;
        (
            ((point.x - ox) / sx).floor() as i64,
            ((point.y - oy) / sy).floor() as i64,
            ((point.z - oz) / sz).floor() as i64,
        )
    }

    pub fn voxel_to_world(&self, i: i64, j: i64, k: i64) -> WorldPoint {
        let (ox, oy, oz) = self.origin;
        let (sx, sy, sz) = self.spacing;
        WorldPoint::new(
            ox + i as f64 * sx,
            oy + j as f64 * sy,
            oz + k as f64 * sz,
        )
    }

    /// Physical volume of a single voxel
    pub fn voxel_volume_unit(&self) -> f64 {
        let (sx, sy, sz) = self.spacing;
        sx * sy * sz
    }

    /// World extent spanned by the voxel grid, `origin + (dim - 1) * spacing`
    pub fn bounds(&self) -> BoundingBox {
        let (nx, ny, nz) = self.dimensions();
        let (ox, oy, oz) = self.origin;
        let (sx, sy, sz) = self.spacing;
        BoundingBox {
            xmin: ox,
            xmax: ox + (nx - 1) as f64 * sx,
            ymin: oy,
            ymax: oy + (ny - 1) as f64 * sy,
            zmin: oz,
            zmax: oz + (nz - 1) as f64 * sz,
        }
    }

    /// World box covering every voxel cell, `origin + dim * spacing`. Maps
    /// onto the full grid under the half-open region convention.
    pub fn cell_bounds(&self) -> BoundingBox {
        let (nx, ny, nz) = self.dimensions();
        let (ox, oy, oz) = self.origin;
        let (sx, sy, sz) = self.spacing;
        BoundingBox {
            xmin: ox,
            xmax: ox + nx as f64 * sx,
            ymin: oy,
            ymax: oy + ny as f64 * sy,
            zmin: oz,
            zmax: oz + nz as f64 * sz,
        }
    }

    pub fn center(&self) -> WorldPoint {
        let b = self.bounds();
        WorldPoint::new(
            (b.xmin + b.xmax) / 2.0,
            (b.ymin + b.ymax) / 2.0,
            (b.zmin + b.zmax) / 2.0,
        )
    }

    /// Minimum and maximum finite scalar, `None` when no value is finite
    pub fn scalar_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    #[inline]
    fn normalize_to_u8(value: f32, min: f32, max: f32) -> u8 {
        if max <= min {
            return 0;
        }
        (((value - min) / (max - min)) * 255.0).clamp(0.0, 255.0) as u8
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    fn get_output_dimensions(&self, orientation: &Orientation) -> (u32, u32) {
        // Always return (width, height) - standard image convention
        match orientation {
            Orientation::Axial => (self.interpolated_dim.2, self.interpolated_dim.1),
            Orientation::Coronal => (self.interpolated_dim.2, self.interpolated_dim.0),
            Orientation::Sagittal => (self.interpolated_dim.1, self.interpolated_dim.0),
        }
    }

    fn slice_to_image(slice: &ArrayView2<'_, f32>, min: f32, max: f32) -> Option<GrayImage> {
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&v| Self::normalize_to_u8(v, min, max))
            .collect();
        GrayImage::from_raw(width as u32, height as u32, pixel_data)
    }

    /// Render a slice as an 8-bit preview, windowed by the volume's scalar range
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        interpolation: Interpolation,
    ) -> Option<GrayImage> {
        let slice = self.get_slice_from_axis(index, &orientation)?;
        let (min, max) = self.scalar_range()?;

        match interpolation {
            Interpolation::None => Self::slice_to_image(&slice, min, max),
            Interpolation::Bilinear => {
                // Axial doesn't need interpolation (already isotropic in-plane)
                if matches!(orientation, Orientation::Axial) {
                    return Self::slice_to_image(&slice, min, max);
                }
                let (width, height) = self.get_output_dimensions(&orientation);
                Self::interpolate_slice(&slice, width, height, min, max)
            }
        }
    }

    fn interpolate_slice(
        slice: &ArrayView2<'_, f32>,
        width: u32,
        height: u32,
        min: f32,
        max: f32,
    ) -> Option<GrayImage> {
        let (slice_height, slice_width) = slice.dim();
        if width == 0 || height == 0 {
            return None;
        }

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..width).map(move |x| {
                    let norm_x = (x as f32 + 0.5) / width as f32;
                    let norm_y = (y as f32 + 0.5) / height as f32;

                    let src_x = norm_x * slice_width as f32 - 0.5;
                    let src_y = norm_y * slice_height as f32 - 0.5;

                    let src_x = src_x.clamp(0.0, (slice_width - 1) as f32);
                    let src_y = src_y.clamp(0.0, (slice_height - 1) as f32);

                    let value = Interpolator::bilinear_interpolate(slice, src_y, src_x);
                    Self::normalize_to_u8(value, min, max)
                })
            })
            .collect();

        GrayImage::from_raw(width, height, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(n: usize) -> VoxelVolume {
        VoxelVolume::filled((n, n, n), (1.0, 1.0, 1.0), (0.0, 0.0, 0.0), 0.0).unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let mut volume = cube(4);
        for (i, j, k) in [(0, 0, 0), (3, 2, 1), (3, 3, 3)] {
            let value = (i * 100 + j * 10 + k) as f32;
            volume.set(i, j, k, value).unwrap();
            assert_eq!(volume.get(i, j, k).unwrap(), value);
        }
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut volume = cube(4);
        assert!(matches!(
            volume.get(4, 0, 0),
            Err(VolumeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            volume.get(0, -1, 0),
            Err(VolumeError::OutOfBounds { .. })
        ));
        assert_eq!(
            volume.set(0, 0, 7, 1.0),
            Err(VolumeError::OutOfBounds {
                index: (0, 0, 7),
                dimensions: (4, 4, 4)
            })
        );
    }

    #[test]
    fn test_flat_index_layout() {
        let values: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let volume =
            VoxelVolume::from_flat((4, 3, 2), (1.0, 1.0, 1.0), (0.0, 0.0, 0.0), values).unwrap();
        assert_eq!(volume.dimensions(), (4, 3, 2));
        assert_eq!(volume.dim(), (2, 3, 4));
        // i + j * nx + k * nx * ny
        assert_eq!(volume.get(1, 2, 1).unwrap(), (1 + 2 * 4 + 12) as f32);
    }

    #[test]
    fn test_from_flat_length_mismatch() {
        let result = VoxelVolume::from_flat((2, 2, 2), (1.0, 1.0, 1.0), (0.0, 0.0, 0.0), vec![0.0; 7]);
        assert!(matches!(
            result,
            Err(VolumeError::DataLength {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_invalid_spacing_and_empty() {
        assert!(matches!(
            VoxelVolume::filled((2, 2, 2), (1.0, 0.0, 1.0), (0.0, 0.0, 0.0), 0.0),
            Err(VolumeError::InvalidSpacing(_))
        ));
        assert_eq!(
            VoxelVolume::filled((0, 2, 2), (1.0, 1.0, 1.0), (0.0, 0.0, 0.0), 0.0).unwrap_err(),
            VolumeError::Empty
        );
    }

    #[test]
    fn test_world_to_voxel_floors() {
        let volume =
            VoxelVolume::filled((10, 10, 10), (0.5, 2.0, 1.0), (-1.0, 0.0, 10.0), 0.0).unwrap();
        assert_eq!(volume.world_to_voxel(WorldPoint::new(-1.0, 0.0, 10.0)), (0, 0, 0));
        assert_eq!(volume.world_to_voxel(WorldPoint::new(0.24, 3.9, 12.5)), (2, 1, 2));
        assert_eq!(volume.world_to_voxel(WorldPoint::new(-1.1, -0.1, 9.9)), (-1, -1, -1));
    }

    #[test]
    fn test_voxel_unit_and_bounds() {
        let volume =
            VoxelVolume::filled((10, 20, 5), (0.5, 0.5, 2.0), (1.0, 2.0, 3.0), 0.0).unwrap();
        assert_relative_eq!(volume.voxel_volume_unit(), 0.5);
        let bounds = volume.bounds();
        assert_relative_eq!(bounds.xmax, 5.5);
        assert_relative_eq!(bounds.ymax, 11.5);
        assert_relative_eq!(bounds.zmax, 11.0);
        let center = volume.center();
        assert_relative_eq!(center.z, 7.0);
        let cells = volume.cell_bounds();
        assert_relative_eq!(cells.xmax, 6.0);
        assert_relative_eq!(cells.zmax, 13.0);
    }

    #[test]
    fn test_scalar_range_skips_nan() {
        let mut volume = cube(2);
        volume.set(0, 0, 0, -5.0).unwrap();
        volume.set(1, 1, 1, f32::NAN).unwrap();
        volume.set(1, 0, 0, 7.5).unwrap();
        assert_eq!(volume.scalar_range(), Some((-5.0, 7.5)));
    }

    #[test]
    fn test_slice_image_normalized() {
        let mut volume = cube(3);
        volume.set(2, 1, 0, 10.0).unwrap();
        let image = volume
            .get_image_from_axis(0, Orientation::Axial, Interpolation::None)
            .unwrap();
        assert_eq!(image.dimensions(), (3, 3));
        assert_eq!(image.get_pixel(2, 1).0[0], 255);
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
        assert!(
            volume
                .get_image_from_axis(3, Orientation::Sagittal, Interpolation::None)
                .is_none()
        );
    }

    #[test]
    fn test_coronal_resampled_to_isotropic() {
        let volume =
            VoxelVolume::filled((4, 4, 2), (1.0, 1.0, 2.0), (0.0, 0.0, 0.0), 1.0).unwrap();
        let image = volume
            .get_image_from_axis(1, Orientation::Coronal, Interpolation::Bilinear)
            .unwrap();
        // depth of 2 slices at 2mm becomes 4 rows at 1mm
        assert_eq!(image.dimensions(), (4, 4));
    }
}
