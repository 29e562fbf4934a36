//! # DICOM voxel editor
//!
//! This crate is the computational core of a DICOM liver-volume viewer. It
//! owns the voxel data, edits it and measures it; rendering, widgets and
//! neural inference stay with the host application.
//!
//! A session holds two volumes loaded from DICOM series:
//!  - the body volume, shown as anatomy and used to bound the slice plane
//!  - the editable volume, a masked copy the user paints on and measures
//!
//! The editable volume can also be derived from the body volume by running
//! any 2D segmentation model over its axial slices (see [`segmentation`]).
//!
//! Operations:
//!  - Spherical, additive brush strokes at a world-space pick point
//!  - Thresholded volume estimation, optionally cropped to a world-space box
//!  - A slice plane that sweeps along Z and re-measures on every tick
//!
//! Region bounds map to voxel indices with `floor`, and the resulting index
//! range is half-open: `[floor(min), floor(max))`.
//!
//! # Examples
//!
//! ## Painting and measuring
//!
//! ```
//! # use dicom_voxel_editor::{BrushEditor, BrushStroke, RegionVolumeEstimator, VoxelVolume, WorldPoint};
//! let mut volume = VoxelVolume::filled((10, 10, 10), (1.0, 1.0, 1.0), (0.0, 0.0, 0.0), 0.0)
//!     .expect("should have created volume");
//! let stroke = BrushStroke::new(WorldPoint::new(5.5, 5.5, 5.5), 1, 200.0);
//! BrushEditor::apply_stroke(&mut volume, &stroke).expect("stroke should be inside the volume");
//! let mm3 = RegionVolumeEstimator::estimate(&volume, 50.0, None);
//! assert_eq!(mm3, 7.0);
//! ```
//!
//! ## Loading a session
//!
//! ```no_run
//! # use dicom_voxel_editor::{InteractionHandler, ViewerConfig, ViewerSession, WorldPoint};
//! let mut session = ViewerSession::new(ViewerConfig::default());
//! session.load_from_config().expect("should have loaded both series");
//! session.on_pick(WorldPoint::new(0.0, 0.0, 0.0)).ok();
//! let report = session.on_tick().expect("volumes are loaded");
//! println!("{:.2} mm^3 below z={:.1}", report.volume_mm3, report.position);
//! ```

pub mod animator;
pub mod brush;
pub mod config;
pub mod enums;
mod interpolator;
pub mod logging;
pub mod region;
pub mod segmentation;
pub mod session;
pub mod transfer;
pub mod volume;
pub mod volume_loader;

pub use animator::{SliceAnimator, SliceReport};
pub use brush::{BrushEditor, BrushStroke};
pub use config::ViewerConfig;
pub use region::{BoundingBox, RegionVolumeEstimator};
pub use session::{InteractionHandler, SessionError, ViewerSession};
pub use volume::{VolumeError, VoxelVolume, WorldPoint};
pub use volume_loader::VolumeLoader;
