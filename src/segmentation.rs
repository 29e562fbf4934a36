//! Builds the editable volume by masking every axial slice with a 2D
//! segmentation model.
//!
//! The model itself is external and reached through [`Segmenter`]. Each
//! slice is normalized to 8 bits, fitted to the model's square input,
//! segmented, and the mask is scaled back with nearest-neighbour sampling
//! so voxels outside it can be zeroed at the original resolution.

use crate::interpolator::Interpolator;
use crate::volume::{VolumeError, VoxelVolume};

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use thiserror::Error;

pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("Model input size must be non-zero")]
    InputSize,

    #[error("Mask is {actual:?}, model input was {expected:?}")]
    MaskSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Segmentation model failed: {0}")]
    Model(String),

    #[error("Could not assemble masked volume: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// A 2D segmentation model. Non-zero mask pixels mark the region of
/// interest; the mask must match the input image size.
pub trait Segmenter {
    fn segment(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError>;
}

impl<F> Segmenter for F
where
    F: Fn(&GrayImage) -> Result<GrayImage, SegmentationError>,
{
    fn segment(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
        self(image)
    }
}

/// Marks pixels whose 8-bit intensity lies in `lower..=upper`
#[derive(Clone, Copy, Debug)]
pub struct ThresholdSegmenter {
    pub lower: u8,
    pub upper: u8,
}

impl Segmenter for ThresholdSegmenter {
    fn segment(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
        let mut mask = image.clone();
        for pixel in mask.pixels_mut() {
            let inside = (self.lower..=self.upper).contains(&pixel.0[0]);
            pixel.0[0] = if inside { 255 } else { 0 };
        }
        Ok(mask)
    }
}

pub struct MaskPipeline {
    pub input_size: u32,
}

impl Default for MaskPipeline {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_MODEL_INPUT_SIZE,
        }
    }
}

impl MaskPipeline {
    pub fn new(input_size: u32) -> Self {
        Self { input_size }
    }

    /// Copy of `volume` with every voxel outside the per-slice masks set to 0.
    /// Slices are segmented in parallel.
    pub fn mask_volume<S>(&self, volume: &VoxelVolume, segmenter: &S) -> Result<VoxelVolume, SegmentationError>
    where
        S: Segmenter + Sync + ?Sized,
    {
        if self.input_size == 0 {
            return Err(SegmentationError::InputSize);
        }
        let data = volume.data();
        let slices: Vec<Array2<f32>> = data
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|slice| self.mask_slice(&slice, segmenter))
            .collect::<Result<_, _>>()?;

        let views: Vec<ArrayView2<'_, f32>> = slices.iter().map(|s| s.view()).collect();
        let masked = ndarray::stack(Axis(0), &views)?;
        log::info!(
            "Masked {} slices at model input {}x{}",
            slices.len(),
            self.input_size,
            self.input_size
        );
        Ok(VoxelVolume::new(masked, volume.spacing(), volume.origin())?)
    }

    pub fn mask_slice<S>(&self, slice: &ArrayView2<'_, f32>, segmenter: &S) -> Result<Array2<f32>, SegmentationError>
    where
        S: Segmenter + ?Sized,
    {
        if self.input_size == 0 {
            return Err(SegmentationError::InputSize);
        }
        let (height, width) = slice.dim();
        let image = Self::normalize_slice(slice);
        let fitted = DynamicImage::ImageLuma8(image)
            .resize_to_fill(self.input_size, self.input_size, FilterType::Lanczos3)
            .to_luma8();

        let mask = segmenter.segment(&fitted)?;
        if mask.dimensions() != fitted.dimensions() {
            return Err(SegmentationError::MaskSize {
                expected: fitted.dimensions(),
                actual: mask.dimensions(),
            });
        }

        let (mask_width, mask_height) = mask.dimensions();
        let mask = Array2::from_shape_fn((mask_height as usize, mask_width as usize), |(y, x)| {
            mask.get_pixel(x as u32, y as u32).0[0] > 0
        });
        let mask = Interpolator::nearest_resize(&mask.view(), height, width);

        let mut masked = slice.to_owned();
        masked.zip_mut_with(&mask, |value, &keep| {
            if !keep {
                *value = 0.0;
            }
        });
        Ok(masked)
    }

    /// Stretch the slice's own min..max onto 0..255. Constant slices map to 0.
    fn normalize_slice(slice: &ArrayView2<'_, f32>) -> GrayImage {
        let (height, width) = slice.dim();
        let (min, max) = slice
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        let pixels: Vec<u8> = slice
            .iter()
            .map(|&v| {
                if range > 0.0 && v.is_finite() {
                    (((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
            .collect();
        GrayImage::from_raw(width as u32, height as u32, pixels)
            .unwrap_or_else(|| GrayImage::new(width as u32, height as u32))
    }
}
