//! Rasterization of sparse (X, Y, Grayscale) samples into a dense image.
//!
//! A sample at `(x, y)` lands in cell `[max_y - y][x - min_x]`, so larger Y
//! values render toward the top of the image. Cells without a sample stay 0.

use ndarray::Array2;

use super::loaders::{ImportError, Result};

/// One parsed input row with coordinates and intensity already truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRow {
    pub x: i64,
    pub y: i64,
    pub grayscale: u8,
}

impl SampleRow {
    #[inline]
    pub fn new(x: i64, y: i64, grayscale: u8) -> Self {
        Self { x, y, grayscale }
    }
}

/// Inclusive bounds of all sample coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl BoundingBox {
    /// Compute the bounds of a sample set, or `None` when it is empty.
    pub fn from_samples(samples: &[SampleRow]) -> Option<Self> {
        let first = samples.first()?;
        let mut bbox = Self {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };

        for s in &samples[1..] {
            bbox.min_x = bbox.min_x.min(s.x);
            bbox.max_x = bbox.max_x.max(s.x);
            bbox.min_y = bbox.min_y.min(s.y);
            bbox.max_y = bbox.max_y.max(s.y);
        }

        Some(bbox)
    }

    /// Raster width covering the box inclusively, or `None` if it does not
    /// fit in `usize`.
    #[inline]
    pub fn width(&self) -> Option<usize> {
        inclusive_span(self.min_x, self.max_x)
    }

    /// Raster height covering the box inclusively, or `None` if it does not
    /// fit in `usize`.
    #[inline]
    pub fn height(&self) -> Option<usize> {
        inclusive_span(self.min_y, self.max_y)
    }

    /// Raster cell `(row, col)` for a coordinate inside the box.
    ///
    /// Only meaningful once `width` and `height` are known to fit.
    #[inline]
    pub fn cell(&self, x: i64, y: i64) -> (usize, usize) {
        let row = i128::from(self.max_y) - i128::from(y);
        let col = i128::from(x) - i128::from(self.min_x);
        (row as usize, col as usize)
    }
}

/// `max - min + 1` without overflowing for any pair of `i64`.
#[inline]
fn inclusive_span(min: i64, max: i64) -> Option<usize> {
    let span = i128::from(max) - i128::from(min) + 1;
    usize::try_from(span.max(1)).ok()
}

/// Dense 8-bit grayscale image. Shape is `(height, width)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pixels: Array2<u8>,
}

impl RasterImage {
    /// Wrap an existing pixel array.
    pub fn from_array(pixels: Array2<u8>) -> Self {
        Self { pixels }
    }

    /// Build an image from row-major pixel data.
    pub fn from_rows(rows: &[Vec<u8>]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let pixels = Array2::from_shape_fn((height, width), |(r, c)| {
            rows[r].get(c).copied().unwrap_or(0)
        });
        Self { pixels }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// Returns true if the image has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Pixel at `(row, col)`, if in bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.pixels.get((row, col)).copied()
    }

    /// Borrow the underlying array.
    #[inline]
    pub fn pixels(&self) -> &Array2<u8> {
        &self.pixels
    }

    /// Row-major copy of the pixel data.
    pub fn to_raw(&self) -> Vec<u8> {
        self.pixels.iter().copied().collect()
    }
}

/// Receives `(rows completed, total rows)` while a raster is being built.
pub trait ProgressSink {
    fn report(&mut self, completed: usize, total: usize);
}

impl<F: FnMut(usize, usize)> ProgressSink for F {
    fn report(&mut self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Progress sink that discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _completed: usize, _total: usize) {}
}

/// Build a raster image from sparse samples.
///
/// Samples sharing a coordinate overwrite each other in input order, so the
/// last one wins. The progress sink is called once after every sample.
///
/// # Errors
///
/// `EmptyFile` if there are no samples, `RasterTooLarge` if the bounding box
/// covers more than `max_pixels` cells.
pub fn rasterize(
    samples: &[SampleRow],
    max_pixels: usize,
    progress: &mut dyn ProgressSink,
) -> Result<RasterImage> {
    let bbox = BoundingBox::from_samples(samples).ok_or(ImportError::EmptySamples)?;

    let too_large = |width: Option<usize>, height: Option<usize>| ImportError::RasterTooLarge {
        width: width.unwrap_or(usize::MAX),
        height: height.unwrap_or(usize::MAX),
        limit: max_pixels,
    };

    let (width, height) = match (bbox.width(), bbox.height()) {
        (Some(w), Some(h)) => (w, h),
        (w, h) => return Err(too_large(w, h)),
    };
    // No allocation may exceed isize::MAX bytes
    let fits = width
        .checked_mul(height)
        .map_or(false, |area| area <= max_pixels && area <= isize::MAX as usize);
    if !fits {
        return Err(too_large(Some(width), Some(height)));
    }

    log::debug!(
        "Rasterizing {} samples into {}x{} (x: {}..={}, y: {}..={})",
        samples.len(),
        width,
        height,
        bbox.min_x,
        bbox.max_x,
        bbox.min_y,
        bbox.max_y
    );

    let mut pixels = Array2::<u8>::zeros((height, width));
    let mut written = Array2::<bool>::from_elem((height, width), false);
    let mut duplicates = 0usize;
    let total = samples.len();

    for (i, sample) in samples.iter().enumerate() {
        let cell = bbox.cell(sample.x, sample.y);
        if std::mem::replace(&mut written[cell], true) {
            duplicates += 1;
        }
        pixels[cell] = sample.grayscale;
        progress.report(i + 1, total);
    }

    if duplicates > 0 {
        log::debug!("{} samples overwrote an earlier sample at the same cell", duplicates);
    }

    Ok(RasterImage { pixels })
}
