//! Data writers for rasters and elevation fields.
//!
//! This module provides functions for writing:
//! - Raster images as single-channel 8-bit PNG
//! - Elevation fields as ASCII PLY surface meshes with RGB vertex colors
//! - Elevation fields as CSV with one row per cell

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat};
use thiserror::Error;

use super::raster::RasterImage;
use super::transforms::{elevation_to_colors, Colormap};
use crate::processors::surface::{ElevationField, Exaggeration};

/// Errors raised while writing rasters or elevation fields.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV output to {} failed: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("PNG encoding of {} failed: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot write an empty {0}")]
    Empty(&'static str),
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> WriteError + '_ {
    move |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> WriteError + '_ {
    move |source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Missing directories above `path` are created first.
fn prepare_output_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_error(parent))
        }
        _ => Ok(()),
    }
}

/// Buffered handle on a freshly truncated output file.
fn open_output(path: &Path) -> Result<BufWriter<File>> {
    prepare_output_dir(path)?;
    let file = File::create(path).map_err(io_error(path))?;
    Ok(BufWriter::new(file))
}

/// File name for a saved raster: `<base><suffix>.png`.
pub fn default_png_name(base: &str, suffix: &str) -> String {
    format!("{}{}.png", base, suffix)
}

/// Output path for a saved raster next to `source`, or inside `output_dir`.
pub fn default_png_path(source: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let base = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let name = default_png_name(&base, suffix);

    match output_dir {
        Some(dir) => dir.join(name),
        None => source.with_file_name(name),
    }
}

/// Convert a raster to an `image` buffer.
pub fn raster_to_gray_image(raster: &RasterImage) -> GrayImage {
    let width = raster.width() as u32;
    let height = raster.height() as u32;
    GrayImage::from_fn(width, height, |x, y| {
        image::Luma([raster.get(y as usize, x as usize).unwrap_or(0)])
    })
}

/// Save a raster as a single-channel 8-bit PNG.
///
/// The file is always PNG-encoded regardless of the extension.
///
/// # Errors
///
/// Returns an error if the raster is empty, parent directories cannot be
/// created, or encoding fails.
pub fn save_png(path: &Path, raster: &RasterImage) -> Result<()> {
    if raster.is_empty() {
        return Err(WriteError::Empty("raster"));
    }
    prepare_output_dir(path)?;

    raster_to_gray_image(raster)
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| WriteError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    log::info!("Image saved as {}", path.display());
    Ok(())
}

/// World X/Y of a field cell; row 0 is the top of the raster (largest Y).
#[inline]
fn cell_xy(field: &ElevationField, row: usize, col: usize) -> (f32, f32) {
    (col as f32, (field.height() - 1 - row) as f32)
}

/// Write an elevation field to an ASCII PLY surface mesh.
///
/// One vertex per cell at `(col, flipped row, elevation * exaggeration)`
/// colored with `colormap`, and two triangles per grid quad.
///
/// # Errors
///
/// Returns an error if the field is empty or the file cannot be written.
pub fn write_surface_ply(
    path: &Path,
    field: &ElevationField,
    exaggeration: Exaggeration,
    colormap: &Colormap,
) -> Result<()> {
    let (rows, cols) = (field.height(), field.width());
    if rows == 0 || cols == 0 {
        return Err(WriteError::Empty("elevation field"));
    }

    let mut writer = open_output(path)?;
    let io_err = io_error(path);

    let heights = field.heights(exaggeration);
    let flat: Vec<f32> = field.values().iter().copied().collect();
    let colors = elevation_to_colors(&flat, colormap);

    let num_vertices = rows * cols;
    let num_faces = 2 * rows.saturating_sub(1) * cols.saturating_sub(1);

    write!(
        writer,
        "ply\n\
         format ascii 1.0\n\
         comment exaggeration {}\n\
         element vertex {}\n\
         property float x\n\
         property float y\n\
         property float z\n\
         property uchar red\n\
         property uchar green\n\
         property uchar blue\n\
         element face {}\n\
         property list uchar int vertex_indices\n\
         end_header\n",
        exaggeration.factor(),
        num_vertices,
        num_faces
    )
    .map_err(&io_err)?;

    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = cell_xy(field, row, col);
            let z = heights[[row, col]];
            let [r, g, b] = colors[row * cols + col];
            writeln!(writer, "{:.6} {:.6} {:.6} {} {} {}", x, y, z, r, g, b).map_err(&io_err)?;
        }
    }

    for row in 0..rows.saturating_sub(1) {
        for col in 0..cols.saturating_sub(1) {
            let tl = row * cols + col;
            let tr = tl + 1;
            let bl = tl + cols;
            let br = bl + 1;
            writeln!(writer, "3 {} {} {}", tl, bl, tr).map_err(&io_err)?;
            writeln!(writer, "3 {} {} {}", tr, bl, br).map_err(&io_err)?;
        }
    }

    writer.flush().map_err(&io_err)?;

    log::info!(
        "Surface PLY -> {} ({} vertices, {} faces)",
        path.display(),
        num_vertices,
        num_faces
    );
    Ok(())
}

/// Write an elevation field to CSV with `x,y,elevation,height` columns.
///
/// # Errors
///
/// Returns an error if the field is empty or the file cannot be written.
pub fn write_surface_csv(
    path: &Path,
    field: &ElevationField,
    exaggeration: Exaggeration,
) -> Result<()> {
    if field.height() == 0 || field.width() == 0 {
        return Err(WriteError::Empty("elevation field"));
    }

    let mut csv_writer = csv::Writer::from_writer(open_output(path)?);

    csv_writer
        .write_record(["x", "y", "elevation", "height"])
        .map_err(csv_error(path))?;

    let k = exaggeration.factor();
    for ((row, col), &e) in field.values().indexed_iter() {
        let (x, y) = cell_xy(field, row, col);
        csv_writer
            .write_record(&[
                format!("{}", x),
                format!("{}", y),
                format!("{:.6}", e),
                format!("{:.6}", e * k),
            ])
            .map_err(csv_error(path))?;
    }

    csv_writer.flush().map_err(io_error(path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_raster() -> RasterImage {
        RasterImage::from_rows(&[vec![30, 0, 7], vec![10, 20, 255]])
    }

    fn create_test_field() -> ElevationField {
        ElevationField::from_array(Array2::from_shape_vec((2, 2), vec![1.0, 0.5, 0.25, 0.0]).unwrap())
    }

    #[test]
    fn test_default_png_name() {
        assert_eq!(default_png_name("scan", "_processed"), "scan_processed.png");
    }

    #[test]
    fn test_default_png_path() {
        let src = Path::new("/data/run1/scan.csv");
        assert_eq!(
            default_png_path(src, None, "_processed"),
            PathBuf::from("/data/run1/scan_processed.png")
        );
        assert_eq!(
            default_png_path(src, Some(Path::new("/out")), "_processed"),
            PathBuf::from("/out/scan_processed.png")
        );
    }

    #[test]
    fn test_save_png_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("scan_processed.png");
        let raster = create_test_raster();

        save_png(&path, &raster).unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.color(), image::ColorType::L8);
        let gray = loaded.to_luma8();
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.get_pixel(0, 0).0, [30]);
        assert_eq!(gray.get_pixel(2, 1).0, [255]);
        assert_eq!(gray.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn test_write_surface_ply() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("surface.ply");

        write_surface_ply(&path, &create_test_field(), Exaggeration::default(), &Colormap::Grayscale)
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "ply");
        assert!(lines.contains(&"element vertex 4"));
        assert!(lines.contains(&"element face 2"));
        let header_end = lines.iter().position(|l| *l == "end_header").unwrap();
        // Top-left cell: x 0, y 1 (flipped), height 1.0 * 50, white
        assert_eq!(lines[header_end + 1], "0.000000 1.000000 50.000000 255 255 255");
        assert_eq!(lines[header_end + 4], "1.000000 0.000000 0.000000 0 0 0");
        assert_eq!(lines.len(), header_end + 1 + 4 + 2);
    }

    #[test]
    fn test_write_surface_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("surface.csv");

        write_surface_csv(&path, &create_test_field(), Exaggeration::new(10.0).unwrap()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "x,y,elevation,height");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "0,1,1.000000,10.000000");
        assert_eq!(lines[2], "1,1,0.500000,5.000000");
    }

    #[test]
    fn test_empty_raster_rejected() {
        let dir = tempdir().unwrap();
        let raster = RasterImage::from_array(Array2::zeros((0, 3)));
        let result = save_png(&dir.path().join("x.png"), &raster);
        assert!(matches!(result, Err(WriteError::Empty(_))));
    }

    #[test]
    fn test_output_under_a_file_reports_that_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let result = write_surface_csv(&blocker.join("out.csv"), &create_test_field(), Exaggeration::default());

        match result {
            Err(WriteError::Io { path, .. }) => assert_eq!(path, blocker),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_png_created_in_missing_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("img.png");

        save_png(&path, &create_test_raster()).unwrap();

        assert!(path.exists());
    }
}
