use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Bilinear,
    #[default]
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

/// Whether a brush stroke adds to or subtracts from voxel intensities
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BrushMode {
    #[default]
    Add,
    Remove,
}

impl BrushMode {
    /// Signed increment for this mode
    pub fn signed(self, increment: f32) -> f32 {
        match self {
            BrushMode::Add => increment,
            BrushMode::Remove => -increment,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SweepDirection {
    #[default]
    Up,
    Down,
}

impl SweepDirection {
    pub fn sign(self) -> f64 {
        match self {
            SweepDirection::Up => 1.0,
            SweepDirection::Down => -1.0,
        }
    }
}
