//! Session state shared by the interaction callbacks.
//!
//! A [`ViewerSession`] owns the loaded volumes and is passed explicitly to
//! whatever UI layer drives it. The UI forwards picks, box-widget updates
//! and timer ticks through [`InteractionHandler`] and re-renders whenever
//! [`ViewerSession::revision`] changes.

use crate::animator::{SliceAnimator, SliceReport};
use crate::brush::{BrushEditor, BrushStroke};
use crate::config::ViewerConfig;
use crate::enums::BrushMode;
use crate::region::{BoundingBox, Plane, RegionVolumeEstimator, mm3_to_cm3};
use crate::segmentation::{MaskPipeline, SegmentationError, Segmenter};
use crate::transfer::{RenderMode, ShadingParams};
use crate::volume::{VolumeError, VoxelVolume, WorldPoint};
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No volume loaded")]
    MissingVolume,

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Loader(#[from] VolumeLoaderError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
}

/// Capability a UI layer uses to drive the session
pub trait InteractionHandler {
    /// A world-space pick on the rendered volume
    fn on_pick(&mut self, point: WorldPoint) -> Result<usize, SessionError>;
    /// The crop box widget moved; returns the cropped volume in mm^3
    fn on_box_update(&mut self, bounds: BoundingBox) -> Result<f64, SessionError>;
    /// Periodic timer tick for the slice animation
    fn on_tick(&mut self) -> Result<SliceReport, SessionError>;
}

#[derive(Debug, Default)]
pub struct ViewerSession {
    config: ViewerConfig,
    body: Option<VoxelVolume>,
    editable: Option<VoxelVolume>,
    crop: Option<BoundingBox>,
    animator: Option<SliceAnimator>,
    brush_mode: BrushMode,
    render_mode: Option<RenderMode>,
    revision: u64,
}

impl ViewerSession {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Replace both volumes. Crop box and slice animation start over.
    pub fn load(&mut self, body: VoxelVolume, editable: VoxelVolume) {
        log::info!(
            "Session loaded body {:?} and editable {:?}",
            body.dimensions(),
            editable.dimensions()
        );
        self.body = Some(body);
        self.editable = Some(editable);
        self.crop = None;
        self.animator = None;
        self.revision += 1;
    }

    /// Load both series from the directories named in the config
    pub fn load_from_config(&mut self) -> Result<(), SessionError> {
        let sort_by = self.config.sort_by;
        let body = VolumeLoader::load_from_directory(&self.config.body_dir, sort_by)?;
        let editable = VolumeLoader::load_from_directory(&self.config.editable_dir, sort_by)?;
        self.load(body, editable);
        Ok(())
    }

    /// Derive the editable volume from `body` by masking it slice by slice
    pub fn load_with_segmenter<S>(&mut self, body: VoxelVolume, segmenter: &S) -> Result<(), SessionError>
    where
        S: Segmenter + Sync + ?Sized,
    {
        let editable =
            MaskPipeline::new(self.config.model_input_size).mask_volume(&body, segmenter)?;
        self.load(body, editable);
        Ok(())
    }

    pub fn body(&self) -> Result<&VoxelVolume, SessionError> {
        self.body.as_ref().ok_or(SessionError::MissingVolume)
    }

    pub fn editable(&self) -> Result<&VoxelVolume, SessionError> {
        self.editable.as_ref().ok_or(SessionError::MissingVolume)
    }

    /// Bumped on every change a renderer has to pick up
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn crop(&self) -> Option<&BoundingBox> {
        self.crop.as_ref()
    }

    pub fn brush_mode(&self) -> BrushMode {
        self.brush_mode
    }

    pub fn set_brush_mode(&mut self, mode: BrushMode) {
        log::info!("Brush mode switched to {:?}", mode);
        self.brush_mode = mode;
    }

    /// Keyboard shortcuts: '1' adds, '2' removes. Returns whether the key
    /// was handled.
    pub fn handle_key(&mut self, key: char) -> bool {
        match key {
            '1' => self.set_brush_mode(BrushMode::Add),
            '2' => self.set_brush_mode(BrushMode::Remove),
            _ => return false,
        }
        true
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode.unwrap_or(RenderMode::RayCast)
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = Some(mode);
        self.revision += 1;
    }

    pub fn shading(&self) -> ShadingParams {
        ShadingParams::from(self.config.shading)
    }

    /// Planes clipping the rendered volumes to the crop box, if one is set
    pub fn clipping_planes(&self) -> Option<[Plane; 6]> {
        self.crop.as_ref().map(BoundingBox::clipping_planes)
    }

    /// Thresholded volume of the whole editable series, in mm^3
    pub fn total_volume(&self) -> Result<f64, SessionError> {
        let editable = self.editable()?;
        let volume = RegionVolumeEstimator::estimate(editable, self.config.threshold, None);
        log::info!("Total volume: {:.4} cm^3", mm3_to_cm3(volume));
        Ok(volume)
    }

    /// Thresholded volume of the editable series inside the crop box
    pub fn visible_volume(&self) -> Result<f64, SessionError> {
        let editable = self.editable()?;
        Ok(RegionVolumeEstimator::estimate(
            editable,
            self.config.threshold,
            self.crop.as_ref(),
        ))
    }

    /// Stop the slice animation; the next tick restarts from the bottom
    pub fn reset_animation(&mut self) {
        self.animator = None;
    }

    pub fn animator(&self) -> Option<&SliceAnimator> {
        self.animator.as_ref()
    }
}

impl InteractionHandler for ViewerSession {
    fn on_pick(&mut self, point: WorldPoint) -> Result<usize, SessionError> {
        let stroke = BrushStroke::with_mode(
            point,
            self.config.brush_radius,
            self.config.brush_increment,
            self.brush_mode,
        );
        let editable = self.editable.as_mut().ok_or(SessionError::MissingVolume)?;
        match BrushEditor::apply_stroke(editable, &stroke) {
            Ok(modified) => {
                self.revision += 1;
                Ok(modified)
            }
            Err(err) => {
                log::warn!("Brush stroke skipped: {}", err);
                Err(err.into())
            }
        }
    }

    fn on_box_update(&mut self, bounds: BoundingBox) -> Result<f64, SessionError> {
        self.editable()?;
        self.crop = Some(bounds);
        self.revision += 1;
        let volume = self.visible_volume()?;
        log::info!("Visible volume: {:.4} cm^3", mm3_to_cm3(volume));
        Ok(volume)
    }

    fn on_tick(&mut self) -> Result<SliceReport, SessionError> {
        let body = self.body.as_ref().ok_or(SessionError::MissingVolume)?;
        let editable = self.editable.as_ref().ok_or(SessionError::MissingVolume)?;
        let steps = self.config.steps_per_sweep;
        let animator = self
            .animator
            .get_or_insert_with(|| SliceAnimator::for_volume(body, steps));
        let report = animator.tick_and_estimate(editable, self.config.threshold, self.crop.as_ref());
        self.revision += 1;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::SweepDirection;
    use approx::assert_relative_eq;
    use image::GrayImage;

    fn scenario_volume() -> VoxelVolume {
        let mut volume =
            VoxelVolume::filled((10, 10, 10), (1.0, 1.0, 1.0), (0.0, 0.0, 0.0), 0.0).unwrap();
        volume.set(5, 5, 5, 100.0).unwrap();
        volume
    }

    fn scenario_session() -> ViewerSession {
        let config = ViewerConfig {
            brush_radius: 1,
            brush_increment: 50.0,
            threshold: 60.0,
            steps_per_sweep: 9,
            ..Default::default()
        };
        let mut session = ViewerSession::new(config);
        session.load(scenario_volume(), scenario_volume());
        session
    }

    #[test]
    fn test_operations_require_volume() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        assert!(matches!(
            session.on_pick(WorldPoint::new(1.0, 1.0, 1.0)),
            Err(SessionError::MissingVolume)
        ));
        let bounds = BoundingBox::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0).unwrap();
        assert!(matches!(
            session.on_box_update(bounds),
            Err(SessionError::MissingVolume)
        ));
        assert!(matches!(session.on_tick(), Err(SessionError::MissingVolume)));
        assert!(matches!(session.total_volume(), Err(SessionError::MissingVolume)));
        assert!(session.crop().is_none());
    }

    #[test]
    fn test_scenario_volume_unchanged_by_stroke() {
        let mut session = scenario_session();
        assert_relative_eq!(session.total_volume().unwrap(), 1.0);
        let modified = session.on_pick(WorldPoint::new(5.5, 5.5, 5.5)).unwrap();
        assert_eq!(modified, 7);
        let editable = session.editable().unwrap();
        assert_eq!(editable.get(5, 5, 5).unwrap(), 150.0);
        assert_eq!(editable.get(5, 6, 5).unwrap(), 50.0);
        assert_eq!(editable.get(6, 6, 6).unwrap(), 0.0);
        assert_relative_eq!(session.total_volume().unwrap(), 1.0);
        // the body volume is never edited
        assert_eq!(session.body().unwrap().get(5, 6, 5).unwrap(), 0.0);
    }

    #[test]
    fn test_pick_outside_is_reported_and_harmless() {
        let mut session = scenario_session();
        let revision = session.revision();
        let result = session.on_pick(WorldPoint::new(-3.0, 5.0, 5.0));
        assert!(matches!(
            result,
            Err(SessionError::Volume(VolumeError::OutOfBounds { .. }))
        ));
        assert_eq!(session.revision(), revision);
        assert_eq!(
            session.editable().unwrap().data(),
            scenario_volume().data()
        );
    }

    #[test]
    fn test_remove_mode_via_key() {
        let mut session = scenario_session();
        assert!(session.handle_key('2'));
        assert!(!session.handle_key('x'));
        assert_eq!(session.brush_mode(), BrushMode::Remove);
        session.on_pick(WorldPoint::new(5.0, 5.0, 5.0)).unwrap();
        assert_eq!(session.editable().unwrap().get(5, 5, 5).unwrap(), 50.0);
        assert_eq!(session.total_volume().unwrap(), 0.0);
        assert!(session.handle_key('1'));
        assert_eq!(session.brush_mode(), BrushMode::Add);
    }

    #[test]
    fn test_box_update_crops_estimate() {
        let mut session = scenario_session();
        let around = BoundingBox::new(4.0, 7.0, 4.0, 7.0, 4.0, 7.0).unwrap();
        assert_relative_eq!(session.on_box_update(around).unwrap(), 1.0);
        assert!(session.clipping_planes().is_some());
        let away = BoundingBox::new(0.0, 3.0, 0.0, 3.0, 0.0, 3.0).unwrap();
        assert_eq!(session.on_box_update(away).unwrap(), 0.0);
        assert_eq!(session.crop(), Some(&away));
        // the uncropped total ignores the box
        assert_relative_eq!(session.total_volume().unwrap(), 1.0);
    }

    #[test]
    fn test_tick_sweeps_body_extent() {
        let mut session = scenario_session();
        let first = session.on_tick().unwrap();
        assert_relative_eq!(first.position, 1.0);
        assert_eq!(first.volume_mm3, 0.0);

        let mut report = first;
        while report.position < 5.0 {
            report = session.on_tick().unwrap();
        }
        assert_relative_eq!(report.volume_mm3, 1.0);

        while report.direction == SweepDirection::Up {
            report = session.on_tick().unwrap();
        }
        assert_relative_eq!(report.position, 9.0);

        session.reset_animation();
        assert!(session.animator().is_none());
        assert_relative_eq!(session.on_tick().unwrap().position, 1.0);
    }

    #[test]
    fn test_load_resets_crop_and_animation() {
        let mut session = scenario_session();
        let bounds = BoundingBox::new(0.0, 3.0, 0.0, 3.0, 0.0, 3.0).unwrap();
        session.on_box_update(bounds).unwrap();
        session.on_tick().unwrap();
        session.load(scenario_volume(), scenario_volume());
        assert!(session.crop().is_none());
        assert!(session.animator().is_none());
    }

    #[test]
    fn test_load_with_segmenter_masks_body() {
        let config = ViewerConfig {
            model_input_size: 8,
            threshold: 60.0,
            ..Default::default()
        };
        let mut session = ViewerSession::new(config);
        let keep_nothing = |image: &GrayImage| -> Result<GrayImage, SegmentationError> {
            Ok(GrayImage::new(image.width(), image.height()))
        };
        session
            .load_with_segmenter(scenario_volume(), &keep_nothing)
            .unwrap();
        assert_eq!(session.total_volume().unwrap(), 0.0);
        assert_eq!(session.body().unwrap().get(5, 5, 5).unwrap(), 100.0);
    }

    #[test]
    fn test_zero_model_input_is_an_error() {
        let config = ViewerConfig {
            model_input_size: 0,
            ..Default::default()
        };
        let mut session = ViewerSession::new(config);
        let keep_all = |image: &GrayImage| -> Result<GrayImage, SegmentationError> {
            Ok(GrayImage::from_pixel(image.width(), image.height(), image::Luma([255])))
        };
        let result = session.load_with_segmenter(scenario_volume(), &keep_all);
        assert!(matches!(
            result,
            Err(SessionError::Segmentation(SegmentationError::InputSize))
        ));
        assert!(matches!(session.body(), Err(SessionError::MissingVolume)));
    }

    #[test]
    fn test_render_settings() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        assert_eq!(session.render_mode(), RenderMode::RayCast);
        let iso = RenderMode::iso_surface(session.config().iso_value);
        session.set_render_mode(iso);
        assert_eq!(session.render_mode(), RenderMode::IsoSurface { iso_value: 50 });
        assert_relative_eq!(session.shading().diffuse, 0.6);
    }
}
