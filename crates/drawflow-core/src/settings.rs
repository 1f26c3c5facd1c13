//! Editor configuration.

use crate::input::DOUBLE_CLICK_TIME_MS;
use crate::selection::MIN_RESIZE_SIZE;
use crate::snap::{ALIGNMENT_THRESHOLD, GRID_SIZE};
use crate::tools::MIN_DRAW_SIZE;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunable editor behavior. Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSettings {
    pub grid_size: f64,
    pub snap_to_grid: bool,
    pub grid_visible: bool,
    /// Distance in world units within which alignment guides engage.
    pub alignment_threshold: f64,
    /// Drawn elements must exceed this on both axes.
    pub min_draw_size: f64,
    /// Resizes apply only while both sides exceed this.
    pub min_resize_size: f64,
    pub double_click_ms: u64,
    pub canvas_size: Size,
    /// Size of elements dropped from the shape catalog.
    pub drop_size: Size,
    /// Offset applied to duplicated elements.
    pub duplicate_offset: f64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            snap_to_grid: true,
            grid_visible: true,
            alignment_threshold: ALIGNMENT_THRESHOLD,
            min_draw_size: MIN_DRAW_SIZE,
            min_resize_size: MIN_RESIZE_SIZE,
            double_click_ms: DOUBLE_CLICK_TIME_MS,
            canvas_size: Size::new(1920.0, 1080.0),
            drop_size: Size::new(100.0, 60.0),
            duplicate_offset: 20.0,
        }
    }
}

impl EditorSettings {
    /// Parse and validate settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::debug!("Loaded editor settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        fn positive(field: &'static str, value: f64) -> Result<(), SettingsError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SettingsError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {value}"),
                })
            }
        }
        fn non_negative(field: &'static str, value: f64) -> Result<(), SettingsError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(SettingsError::Invalid {
                    field,
                    reason: format!("must be zero or more, got {value}"),
                })
            }
        }

        positive("gridSize", self.grid_size)?;
        non_negative("alignmentThreshold", self.alignment_threshold)?;
        non_negative("minDrawSize", self.min_draw_size)?;
        non_negative("minResizeSize", self.min_resize_size)?;
        positive("canvasSize.width", self.canvas_size.width)?;
        positive("canvasSize.height", self.canvas_size.height)?;
        positive("dropSize.width", self.drop_size.width)?;
        positive("dropSize.height", self.drop_size.height)?;
        if !self.duplicate_offset.is_finite() {
            return Err(SettingsError::Invalid {
                field: "duplicateOffset",
                reason: "must be finite".to_string(),
            });
        }
        if self.double_click_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "doubleClickMs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
