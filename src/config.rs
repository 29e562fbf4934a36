//! Viewer configuration, loaded from JSON.
//!
//! Every field has a default so a partial file (or none at all) is valid.

use crate::animator::DEFAULT_STEPS_PER_SWEEP;
use crate::enums::SortBy;
use crate::segmentation::DEFAULT_MODEL_INPUT_SIZE;
use crate::transfer::ShadingSliders;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Series rendered as anatomy
    pub body_dir: PathBuf,
    /// Masked series that the brush edits and the estimator measures
    pub editable_dir: PathBuf,
    pub sort_by: SortBy,
    /// Brush sphere radius in voxels
    pub brush_radius: u32,
    pub brush_increment: f32,
    /// Voxels at or above this value count toward the measured volume
    pub threshold: f32,
    pub steps_per_sweep: u32,
    /// Period of the external timer driving the slice animation
    pub tick_interval_ms: u64,
    pub iso_value: u8,
    pub shading: ShadingSliders,
    pub model_input_size: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            body_dir: PathBuf::from("DICOM_DATASET"),
            editable_dir: PathBuf::from("DICOM_MASKED"),
            sort_by: SortBy::default(),
            brush_radius: 10,
            brush_increment: 200.0,
            threshold: 50.0,
            steps_per_sweep: DEFAULT_STEPS_PER_SWEEP,
            tick_interval_ms: 20,
            iso_value: 50,
            shading: ShadingSliders::default(),
            model_input_size: DEFAULT_MODEL_INPUT_SIZE,
        }
    }
}

impl ViewerConfig {
    /// Read and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Delay between slice animation ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps_per_sweep == 0 {
            return Err(ConfigError::Invalid("steps_per_sweep must be positive".into()));
        }
        if self.model_input_size == 0 {
            return Err(ConfigError::Invalid("model_input_size must be positive".into()));
        }
        if !self.brush_increment.is_finite() || !self.threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "brush_increment and threshold must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.brush_radius, 10);
        assert_eq!(config.brush_increment, 200.0);
        assert_eq!(config.threshold, 50.0);
        assert_eq!(config.steps_per_sweep, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            ViewerConfig::from_json(r#"{ "brush_radius": 3, "sort_by": "InstanceNumber" }"#)
                .unwrap();
        assert_eq!(config.brush_radius, 3);
        assert_eq!(config.sort_by, SortBy::InstanceNumber);
        assert_eq!(config.editable_dir, PathBuf::from("DICOM_MASKED"));
        assert_eq!(config.shading, ShadingSliders::default());
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(ViewerConfig::default().tick_interval(), Duration::from_millis(20));
        let config = ViewerConfig::from_json(r#"{ "tick_interval_ms": 5 }"#).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ViewerConfig::from_json(r#"{ "steps_per_sweep": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = ViewerConfig {
            threshold: 75.5,
            ..Default::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(ViewerConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            ViewerConfig::from_file("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
