use crate::enums::SortBy;
use crate::volume::{VolumeError, VoxelVolume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Invalid volume: {0}")]
    Volume(#[from] VolumeError),
}

/// One decoded slice with the keys used to order and place it
struct SliceImage {
    order: Option<f32>,
    position: Option<(f64, f64, f64)>,
    pixels: Array2<f32>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects
    ///
    /// Slices are stacked in ascending `sort_by` order, then flipped when
    /// their positions run downwards, so that voxel index `k` always grows
    /// with the patient z coordinate. Pixel values keep the
    /// modality rescale; no VOI window is applied.
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<VoxelVolume, VolumeLoaderError> {
        let mut images: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_image(dicom_object, &sort_by))
            .collect();

        if images.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_images(&mut images, sort_by);
        Self::orient_by_position(&mut images);
        Self::validate_dimensions(&images)?;

        let (pixel_x, pixel_y, thickness) =
            Self::get_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        let slice_spacing = Self::slice_spacing_from_positions(&images).unwrap_or(thickness);
        let origin = images[0].position.unwrap_or((0.0, 0.0, 0.0));

        let volume_array = Self::build_volume_array(&images);
        let volume = VoxelVolume::new(volume_array, (pixel_x, pixel_y, slice_spacing), origin)?;
        log::info!(
            "Loaded {} slices into {:?} volume, spacing {:?}",
            images.len(),
            volume.dimensions(),
            volume.spacing()
        );
        Ok(volume)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<VoxelVolume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<VoxelVolume, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        log::debug!("Found {} DICOM files in {}", paths.len(), path.as_ref().display());
        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_image(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<SliceImage> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let pixels = Self::decode_image(dicom_object)?;
        Some(SliceImage {
            order,
            position: Self::get_position(dicom_object),
            pixels,
        })
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<(f64, f64, f64)> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        match pos[..] {
            [x, y, z, ..] => Some((x, y, z)),
            _ => None,
        }
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(images: &mut [SliceImage], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    /// Reverse the stack when the last slice lies below the first one.
    /// Instance numbers and table positions often count from the top.
    fn orient_by_position(images: &mut [SliceImage]) {
        let first = images.first().and_then(|image| image.position);
        let last = images.last().and_then(|image| image.position);
        if let (Some((_, _, z_first)), Some((_, _, z_last))) = (first, last) {
            if z_last < z_first {
                log::debug!("Slice positions descend from z={z_first} to z={z_last}, reversing");
                images.reverse();
            }
        }
    }

    fn validate_dimensions(images: &[SliceImage]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].pixels.dim();
        if images.iter().any(|img| img.pixels.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    /// Distance between the first two slice positions, when both are known
    /// and distinct
    fn slice_spacing_from_positions(images: &[SliceImage]) -> Option<f64> {
        let (_, _, z0) = images.first()?.position?;
        let (_, _, z1) = images.get(1)?.position?;
        let spacing = (z1 - z0).abs();
        (spacing > f64::EPSILON).then_some(spacing)
    }

    fn build_volume_array(images: &[SliceImage]) -> Array3<f32> {
        let (height, width) = images[0].pixels.dim();
        let depth = images.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&image.pixels);
        }

        volume
    }

    /// Returns (x, y, slice) spacing. PixelSpacing is stored as
    /// (row spacing, column spacing), i.e. (y, x).
    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f64, f64, f64)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float64()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float64()
                .ok()?;

            match pixel_spacing[..] {
                [row, column, ..] => Some((column, row, slice_thickness)),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::WorldPoint;

    fn slice(order: Option<f32>, z: Option<f64>, value: f32, dim: (usize, usize)) -> SliceImage {
        SliceImage {
            order,
            position: z.map(|z| (-100.0, -50.0, z)),
            pixels: Array2::from_elem(dim, value),
        }
    }

    #[test]
    fn test_sort_ascending() {
        let mut images = vec![
            slice(Some(3.0), None, 3.0, (2, 2)),
            slice(Some(1.0), None, 1.0, (2, 2)),
            slice(Some(2.0), None, 2.0, (2, 2)),
        ];
        VolumeLoader::sort_images(&mut images, SortBy::InstanceNumber);
        let values: Vec<f32> = images.iter().map(|i| i.pixels[[0, 0]]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sort_none_keeps_order() {
        let mut images = vec![
            slice(Some(3.0), None, 3.0, (2, 2)),
            slice(Some(1.0), None, 1.0, (2, 2)),
        ];
        VolumeLoader::sort_images(&mut images, SortBy::None);
        assert_eq!(images[0].pixels[[0, 0]], 3.0);
    }

    #[test]
    fn test_descending_positions_are_reversed() {
        // instance 1 is the top slice
        let mut images = vec![
            slice(Some(1.0), Some(10.0), 1.0, (2, 2)),
            slice(Some(2.0), Some(7.5), 2.0, (2, 2)),
            slice(Some(3.0), Some(5.0), 3.0, (2, 2)),
        ];
        VolumeLoader::sort_images(&mut images, SortBy::InstanceNumber);
        VolumeLoader::orient_by_position(&mut images);

        let zs: Vec<f64> = images.iter().filter_map(|i| i.position).map(|p| p.2).collect();
        assert_eq!(zs, vec![5.0, 7.5, 10.0]);
        assert_eq!(VolumeLoader::slice_spacing_from_positions(&images), Some(2.5));

        let origin = images[0].position.unwrap();
        let volume = VoxelVolume::new(
            VolumeLoader::build_volume_array(&images),
            (1.0, 1.0, 2.5),
            origin,
        )
        .unwrap();
        let bottom = volume.world_to_voxel(WorldPoint::new(-100.0, -50.0, 5.0));
        assert_eq!(bottom.2, 0);
        assert_eq!(volume.get(0, 0, bottom.2).unwrap(), 3.0);
        let top = volume.world_to_voxel(WorldPoint::new(-100.0, -50.0, 10.0));
        assert_eq!(top.2, 2);
        assert_eq!(volume.get(0, 0, top.2).unwrap(), 1.0);
    }

    #[test]
    fn test_ascending_positions_are_kept() {
        let mut images = vec![
            slice(Some(1.0), Some(5.0), 1.0, (1, 1)),
            slice(Some(2.0), Some(7.5), 2.0, (1, 1)),
        ];
        VolumeLoader::orient_by_position(&mut images);
        assert_eq!(images[0].pixels[[0, 0]], 1.0);
    }

    #[test]
    fn test_inconsistent_dimensions() {
        let images = vec![
            slice(None, None, 0.0, (2, 2)),
            slice(None, None, 0.0, (2, 3)),
        ];
        assert!(matches!(
            VolumeLoader::validate_dimensions(&images),
            Err(VolumeLoaderError::InconsistentDimensions)
        ));
    }

    #[test]
    fn test_slice_spacing_from_positions() {
        let images = vec![
            slice(None, Some(-20.0), 0.0, (1, 1)),
            slice(None, Some(-17.5), 0.0, (1, 1)),
        ];
        assert_eq!(VolumeLoader::slice_spacing_from_positions(&images), Some(2.5));

        let duplicate = vec![
            slice(None, Some(4.0), 0.0, (1, 1)),
            slice(None, Some(4.0), 0.0, (1, 1)),
        ];
        assert_eq!(VolumeLoader::slice_spacing_from_positions(&duplicate), None);
        assert_eq!(VolumeLoader::slice_spacing_from_positions(&images[..1]), None);
    }

    #[test]
    fn test_build_volume_array_stacks_slices() {
        let images = vec![
            slice(None, None, 1.0, (2, 3)),
            slice(None, None, 2.0, (2, 3)),
        ];
        let array = VolumeLoader::build_volume_array(&images);
        assert_eq!(array.dim(), (2, 2, 3));
        assert_eq!(array[[1, 1, 2]], 2.0);
        assert_eq!(array[[0, 0, 0]], 1.0);
    }

    #[test]
    fn test_empty_input_has_no_images() {
        assert!(matches!(
            VolumeLoader::load_from_dicom_objects(&[], SortBy::None),
            Err(VolumeLoaderError::NoValidImages)
        ));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        assert!(matches!(
            VolumeLoader::load_from_directory("/no/such/series", SortBy::None),
            Err(VolumeLoaderError::Io(_))
        ));
    }
}
