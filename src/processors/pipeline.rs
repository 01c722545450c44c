//! End-to-end steps combining import, transform and output.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::batch::NamedImage;
use super::surface::{ElevationField, Exaggeration, SurfaceTransformer};
use crate::config::PipelineConfig;
use crate::core::loaders::import_file;
use crate::core::raster::ProgressSink;
use crate::core::transforms::Colormap;
use crate::core::writers::{default_png_path, save_png, write_surface_csv, write_surface_ply};

/// Output format for a surface export, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    Ply,
    Csv,
}

impl SurfaceFormat {
    /// `.ply` (any case) selects a mesh; everything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ply") => SurfaceFormat::Ply,
            _ => SurfaceFormat::Csv,
        }
    }
}

/// Import one file and derive its elevation field.
///
/// # Returns
///
/// The field and the number of samples read.
pub fn load_elevation_field(
    input: &Path,
    config: &PipelineConfig,
    progress: &mut dyn ProgressSink,
) -> Result<(ElevationField, usize)> {
    let (raster, samples) = import_file(input, &config.import, progress)
        .with_context(|| format!("Failed to import {}", input.display()))?;

    let field = SurfaceTransformer::from_config(&config.surface)
        .transform(&raster)
        .with_context(|| format!("Failed to derive elevation field for {}", input.display()))?;

    log::debug!(
        "Elevation field {}x{} range {:?}",
        field.width(),
        field.height(),
        field.range()
    );

    Ok((field, samples))
}

/// Save every imported image as `<base><suffix>.png`.
///
/// Images go to `output_dir` when given, otherwise next to their source.
pub fn save_images(images: &[NamedImage], output_dir: Option<&Path>, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(images.len());
    for named in images {
        let path = default_png_path(&named.source, output_dir, suffix);
        save_png(&path, &named.image)
            .with_context(|| format!("Failed to save {}", named.display_name()))?;
        written.push(path);
    }
    Ok(written)
}

/// Write an elevation field in the format implied by `output`.
pub fn export_surface(
    output: &Path,
    field: &ElevationField,
    exaggeration: Exaggeration,
    colormap: &Colormap,
) -> Result<SurfaceFormat> {
    let format = SurfaceFormat::from_path(output);
    let written = match format {
        SurfaceFormat::Ply => write_surface_ply(output, field, exaggeration, colormap),
        SurfaceFormat::Csv => write_surface_csv(output, field, exaggeration),
    };
    written.with_context(|| format!("Failed to write surface to {}", output.display()))?;

    Ok(format)
}
