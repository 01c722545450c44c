//! Relief rendering of elevation fields.
//!
//! Oblique views are drawn as a 3D surface with the plotters library; the
//! top view is an orthographic hillshaded map built pixel by pixel.

pub mod contact_sheet;

use std::f64::consts::FRAC_PI_2;
use std::path::Path;

use clap::ValueEnum;
use image::{imageops, ImageFormat, RgbImage};
use ndarray::Array2;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RenderConfig;
use crate::core::transforms::{hillshade, shade_color, Colormap, Light};
use crate::processors::surface::{ElevationField, Exaggeration};

pub use contact_sheet::{fit_size, render_contact_sheet, GridLayout};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Nothing to render")]
    Empty,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// How the surface facets are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Filled facets colored by elevation
    #[default]
    Surface,
    /// Facet outlines only
    Wireframe,
}

/// Camera presets for the relief view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewPreset {
    /// Oblique view from above the front-right corner
    #[default]
    Perspective,
    /// Straight down onto the XY plane
    Top,
    /// Along the Y axis, showing X against height
    Front,
    /// Along the X axis, showing Y against height
    Side,
}

impl ViewPreset {
    /// Projection `(yaw, pitch)` in radians for oblique views.
    pub fn angles(self) -> (f64, f64) {
        match self {
            ViewPreset::Perspective => (0.7, 0.55),
            ViewPreset::Top => (0.0, FRAC_PI_2),
            ViewPreset::Front => (0.0, 0.0),
            ViewPreset::Side => (FRAC_PI_2, 0.0),
        }
    }
}

/// Everything needed to render one relief image.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub colormap: Colormap,
    pub mode: RenderMode,
    pub view: ViewPreset,
    pub exaggeration: Exaggeration,
    pub max_grid_points: usize,
    pub light: Light,
}

impl RenderOptions {
    pub fn from_config(config: &RenderConfig, exaggeration: Exaggeration) -> Self {
        Self {
            width: config.width,
            height: config.height,
            colormap: Colormap::parse_or_default(&config.colormap),
            mode: config.mode,
            view: config.view,
            exaggeration,
            max_grid_points: config.max_grid_points.max(2),
            light: Light {
                intensity: config.light_intensity,
                ambient: config.ambient,
                ..Light::default()
            },
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default(), Exaggeration::default())
    }
}

/// Step between sampled grid lines so that at most `max_points` remain.
fn grid_stride(len: usize, max_points: usize) -> usize {
    if len <= max_points {
        1
    } else {
        (len + max_points - 1) / max_points
    }
}

/// Sampled indices along one axis, always including the last one.
fn grid_indices(len: usize, max_points: usize) -> Vec<usize> {
    let step = grid_stride(len, max_points);
    let mut idx: Vec<usize> = (0..len).step_by(step).collect();
    if let Some(&last) = idx.last() {
        if last + 1 != len {
            idx.push(len - 1);
        }
    }
    idx
}

/// Render an elevation field to a PNG file.
///
/// `ViewPreset::Top` produces a hillshaded map; the other presets draw a 3D
/// surface.
pub fn render_relief(output_path: &Path, field: &ElevationField, options: &RenderOptions) -> Result<()> {
    if field.width() == 0 || field.height() == 0 {
        return Err(VisualizationError::Empty);
    }

    log::info!(
        "Rendering {:?} relief ({:?}, {}, x{}) -> {}",
        options.view,
        options.mode,
        options.colormap,
        options.exaggeration.factor(),
        output_path.display()
    );

    match options.view {
        ViewPreset::Top => render_shaded_map(output_path, field, options),
        _ => render_surface(output_path, field, options),
    }
}

fn render_surface(output_path: &Path, field: &ElevationField, options: &RenderOptions) -> Result<()> {
    let (rows, cols) = (field.height(), field.width());
    let heights = field.heights(options.exaggeration);
    let k = options.exaggeration.factor() as f64;

    let xs: Vec<f64> = grid_indices(cols, options.max_grid_points)
        .into_iter()
        .map(|c| c as f64)
        .collect();
    // Depth axis runs from the bottom raster row (z = 0) to the top row
    let zs: Vec<f64> = grid_indices(rows, options.max_grid_points)
        .into_iter()
        .map(|r| (rows - 1 - r) as f64)
        .collect();

    let root = BitMapBackend::new(output_path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let x_max = (cols.max(2) - 1) as f64;
    let z_max = (rows.max(2) - 1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_3d(0.0..x_max, 0.0..k, 0.0..z_max)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let (yaw, pitch) = options.view.angles();
    chart.with_projection(|mut pb| {
        pb.yaw = yaw;
        pb.pitch = pitch;
        pb.scale = 0.85;
        pb.into_matrix()
    });

    let colormap = options.colormap;
    let color_at = move |h: f64| {
        let [r, g, b] = colormap.sample((h / k) as f32);
        RGBColor(r, g, b)
    };
    let height_at = |x: f64, z: f64| heights[[rows - 1 - z as usize, x as usize]] as f64;

    match options.mode {
        RenderMode::Surface => {
            let style = |h: &f64| color_at(*h).filled();
            chart
                .draw_series(
                    SurfaceSeries::xoz(xs.iter().copied(), zs.iter().copied(), height_at)
                        .style_func(&style),
                )
                .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        }
        RenderMode::Wireframe => {
            // Polygons are always filled by plotters, so grid lines are drawn as paths
            let point = |x: f64, z: f64| (x, height_at(x, z), z);
            let mut segments = Vec::with_capacity(2 * xs.len() * zs.len());
            for &z in &zs {
                for pair in xs.windows(2) {
                    segments.push((point(pair[0], z), point(pair[1], z)));
                }
            }
            for &x in &xs {
                for pair in zs.windows(2) {
                    segments.push((point(x, pair[0]), point(x, pair[1])));
                }
            }

            chart
                .draw_series(segments.into_iter().map(|(a, b)| {
                    let color = color_at((a.1 + b.1) / 2.0);
                    PathElement::new(vec![a, b], color.stroke_width(1))
                }))
                .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        }
    }

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Orthographic top-down render: colormap by elevation, darkened by a
/// directional light. One pixel per field cell.
pub fn shaded_relief_image(
    field: &ElevationField,
    exaggeration: Exaggeration,
    colormap: &Colormap,
    light: &Light,
) -> RgbImage {
    let heights: Array2<f32> = field.heights(exaggeration);
    let shade = hillshade(&heights, light);
    let values = field.values();

    RgbImage::from_fn(field.width() as u32, field.height() as u32, |x, y| {
        let (r, c) = (y as usize, x as usize);
        let base = colormap.sample(values[[r, c]]);
        image::Rgb(shade_color(base, shade[[r, c]]))
    })
}

fn render_shaded_map(output_path: &Path, field: &ElevationField, options: &RenderOptions) -> Result<()> {
    let img = shaded_relief_image(field, options.exaggeration, &options.colormap, &options.light);
    let (w, h) = fit_size(img.width(), img.height(), options.width, options.height);
    let scaled = imageops::resize(&img, w, h, imageops::FilterType::Lanczos3);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    scaled.save_with_format(output_path, ImageFormat::Png)?;
    Ok(())
}
