//! Configuration types for the import and relief pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::processors::smoothing::EdgeMode;
use crate::visualization::{RenderMode, ViewPreset};

/// Errors that can occur while loading or saving a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration for tabular import and rasterization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Emit a row progress event every N rows (the last row is always reported)
    #[serde(default = "default_progress_stride")]
    pub progress_stride: usize,

    /// Largest raster (width * height) the importer will allocate
    #[serde(default = "default_max_raster_pixels")]
    pub max_raster_pixels: usize,

    /// Suffix appended to the source base name for saved PNGs
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

fn default_progress_stride() -> usize {
    1
}

fn default_max_raster_pixels() -> usize {
    100_000_000
}

fn default_output_suffix() -> String {
    "_processed".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            progress_stride: default_progress_stride(),
            max_raster_pixels: default_max_raster_pixels(),
            output_suffix: default_output_suffix(),
        }
    }
}

/// Configuration for the elevation field transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Smoothing radius; the kernel is (2 * sigma + 1) square
    #[serde(default = "default_sigma")]
    pub sigma: usize,

    /// Boundary handling of the smoothing convolution
    #[serde(default)]
    pub edge_mode: EdgeMode,

    /// Height multiplier applied at render/export time (1 to 100)
    #[serde(default = "default_exaggeration")]
    pub exaggeration: f32,
}

fn default_sigma() -> usize {
    1
}

fn default_exaggeration() -> f32 {
    50.0
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            sigma: default_sigma(),
            edge_mode: EdgeMode::default(),
            exaggeration: default_exaggeration(),
        }
    }
}

/// Configuration for 3D relief rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Output image width in pixels
    #[serde(default = "default_render_width")]
    pub width: u32,

    /// Output image height in pixels
    #[serde(default = "default_render_height")]
    pub height: u32,

    /// Colormap name or a color (`#RRGGBB`) for a white-to-color gradient
    #[serde(default = "default_colormap")]
    pub colormap: String,

    #[serde(default)]
    pub mode: RenderMode,

    #[serde(default)]
    pub view: ViewPreset,

    /// Maximum grid samples per axis; larger fields are strided
    #[serde(default = "default_max_grid_points")]
    pub max_grid_points: usize,

    /// Directional light intensity
    #[serde(default = "default_light_intensity")]
    pub light_intensity: f32,

    /// Ambient light floor so unlit facets keep their hue
    #[serde(default = "default_ambient")]
    pub ambient: f32,
}

fn default_render_width() -> u32 {
    1280
}

fn default_render_height() -> u32 {
    960
}

fn default_colormap() -> String {
    "coolwarm".to_string()
}

fn default_max_grid_points() -> usize {
    160
}

fn default_light_intensity() -> f32 {
    0.7
}

fn default_ambient() -> f32 {
    0.35
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_render_width(),
            height: default_render_height(),
            colormap: default_colormap(),
            mode: RenderMode::default(),
            view: ViewPreset::default(),
            max_grid_points: default_max_grid_points(),
            light_intensity: default_light_intensity(),
            ambient: default_ambient(),
        }
    }
}

/// Configuration for the contact sheet grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Maximum number of columns in the grid
    #[serde(default = "default_max_columns")]
    pub max_columns: usize,

    /// Width of one grid cell in pixels (padding included)
    #[serde(default = "default_cell_width")]
    pub cell_width: u32,

    /// Height of one grid cell in pixels (padding included)
    #[serde(default = "default_cell_height")]
    pub cell_height: u32,

    /// Padding around each image inside its cell
    #[serde(default = "default_padding")]
    pub padding: u32,
}

fn default_max_columns() -> usize {
    3
}

fn default_cell_width() -> u32 {
    480
}

fn default_cell_height() -> u32 {
    360
}

fn default_padding() -> u32 {
    20
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_columns: default_max_columns(),
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
            padding: default_padding(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub surface: SurfaceConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub layout: LayoutConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.surface.sigma, 1);
        assert_eq!(config.surface.exaggeration, 50.0);
        assert_eq!(config.surface.edge_mode, EdgeMode::Clamp);
        assert_eq!(config.render.colormap, "coolwarm");
        assert_eq!(config.layout.max_columns, 3);
        assert_eq!(config.import.output_suffix, "_processed");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "surface:\n  sigma: 2\n  edge_mode: zero\nrender:\n  view: top\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.surface.sigma, 2);
        assert_eq!(config.surface.edge_mode, EdgeMode::Zero);
        assert_eq!(config.surface.exaggeration, 50.0);
        assert_eq!(config.render.view, ViewPreset::Top);
        assert_eq!(config.render.mode, RenderMode::Surface);
        assert_eq!(config.import.progress_stride, 1);
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = PipelineConfig::default();
        config.render.colormap = "#ff8800".to_string();
        config.layout.max_columns = 4;
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.render.colormap, "#ff8800");
        assert_eq!(loaded.layout.max_columns, 4);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = PipelineConfig::from_yaml(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
