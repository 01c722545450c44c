//! Grid montage of imported rasters.

use std::path::Path;

use image::{imageops, GrayImage, ImageFormat, Luma};

use super::{Result, VisualizationError};
use crate::config::LayoutConfig;
use crate::core::writers::raster_to_gray_image;
use crate::processors::batch::NamedImage;

const BACKGROUND: Luma<u8> = Luma([255]);
const BORDER: Luma<u8> = Luma([0]);
/// Frame thickness, reserved inside the cell padding.
const FRAME: u32 = 1;

/// Rows and columns of a grid holding `count` images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
}

impl GridLayout {
    /// At most `max_columns` columns, as many rows as needed.
    pub fn for_count(count: usize, max_columns: usize) -> Self {
        if count == 0 {
            return Self { columns: 0, rows: 0 };
        }
        let columns = count.min(max_columns.max(1));
        let rows = (count + columns - 1) / columns;
        Self { columns, rows }
    }

    /// Grid cell `(row, column)` of the image at `index`.
    #[inline]
    pub fn cell(&self, index: usize) -> (usize, usize) {
        (index / self.columns, index % self.columns)
    }
}

/// Largest size that fits in `max_w` x `max_h` with the same aspect ratio.
pub fn fit_size(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    let w = ((width as f64 * scale) as u32).max(1);
    let h = ((height as f64 * scale) as u32).max(1);
    (w, h)
}

fn draw_border(canvas: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
    if w == 0 || h == 0 {
        return;
    }
    let (x1, y1) = (x + w - 1, y + h - 1);
    for px in x..=x1 {
        canvas.put_pixel(px, y, BORDER);
        canvas.put_pixel(px, y1, BORDER);
    }
    for py in y..=y1 {
        canvas.put_pixel(x, py, BORDER);
        canvas.put_pixel(x1, py, BORDER);
    }
}

/// Compose all images into one grayscale grid.
///
/// Each image is scaled to fit its cell (Lanczos3), centered, and framed
/// with a one-pixel border. The frame stays inside the cell for any padding.
pub fn compose_contact_sheet(images: &[NamedImage], layout: &LayoutConfig) -> Option<GrayImage> {
    let grid = GridLayout::for_count(images.len(), layout.max_columns);
    if grid.columns == 0 {
        return None;
    }

    let margin = layout.padding + FRAME;
    let cell_w = layout.cell_width.max(2 * margin + 1);
    let cell_h = layout.cell_height.max(2 * margin + 1);
    let inner_w = cell_w - 2 * margin;
    let inner_h = cell_h - 2 * margin;

    let mut canvas = GrayImage::from_pixel(
        cell_w * grid.columns as u32,
        cell_h * grid.rows as u32,
        BACKGROUND,
    );

    for (i, named) in images.iter().enumerate() {
        if named.image.is_empty() {
            continue;
        }
        let src = raster_to_gray_image(&named.image);
        let (w, h) = fit_size(src.width(), src.height(), inner_w, inner_h);
        let scaled = imageops::resize(&src, w, h, imageops::FilterType::Lanczos3);

        let (row, col) = grid.cell(i);
        let x = col as u32 * cell_w + margin + (inner_w - w) / 2;
        let y = row as u32 * cell_h + margin + (inner_h - h) / 2;

        imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
        draw_border(&mut canvas, x - FRAME, y - FRAME, w + 2 * FRAME, h + 2 * FRAME);

        log::debug!("Placed {} at cell ({}, {}) as {}x{}", named.display_name(), row, col, w, h);
    }

    Some(canvas)
}

/// Write the contact sheet of `images` as a PNG.
pub fn render_contact_sheet(output_path: &Path, images: &[NamedImage], layout: &LayoutConfig) -> Result<()> {
    let canvas = compose_contact_sheet(images, layout).ok_or(VisualizationError::Empty)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    canvas.save_with_format(output_path, ImageFormat::Png)?;

    log::info!(
        "Contact sheet with {} images -> {}",
        images.len(),
        output_path.display()
    );
    Ok(())
}
