//! Raster to elevation field transform for relief rendering.
//!
//! Dark pixels become ridges: intensities are min-max normalized, inverted,
//! square-root contrast-enhanced and then smoothed. The result always lies in
//! `[0, 1]`; exaggeration is applied only when heights are requested.

use ndarray::Array2;
use thiserror::Error;

use super::smoothing::{EdgeMode, GaussianKernel};
use crate::config::SurfaceConfig;
use crate::core::raster::RasterImage;

/// Smallest allowed exaggeration factor.
pub const MIN_EXAGGERATION: f32 = 1.0;

/// Largest allowed exaggeration factor.
pub const MAX_EXAGGERATION: f32 = 100.0;

/// Errors that can occur while deriving an elevation field.
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Raster image is empty")]
    EmptyRaster,

    #[error("Exaggeration {0} is outside 1..=100")]
    InvalidExaggeration(f32),
}

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Height multiplier applied to an elevation field at render time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exaggeration(f32);

impl Exaggeration {
    pub fn new(factor: f32) -> Result<Self> {
        if (MIN_EXAGGERATION..=MAX_EXAGGERATION).contains(&factor) {
            Ok(Self(factor))
        } else {
            Err(SurfaceError::InvalidExaggeration(factor))
        }
    }

    #[inline]
    pub fn factor(self) -> f32 {
        self.0
    }
}

impl Default for Exaggeration {
    fn default() -> Self {
        Self(50.0)
    }
}

/// Smoothed, inverted height map with values in `[0, 1]`. Shape matches the
/// source raster: `(height, width)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationField {
    values: Array2<f32>,
}

impl ElevationField {
    /// Wrap precomputed elevations, clamping them into `[0, 1]`.
    pub fn from_array(values: Array2<f32>) -> Self {
        Self {
            values: values.mapv(|v| v.clamp(0.0, 1.0)),
        }
    }

    #[inline]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    /// Elevation at `(row, col)`, if in bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.values.get((row, col)).copied()
    }

    /// Rendered heights: elevation multiplied by the exaggeration factor.
    pub fn heights(&self, exaggeration: Exaggeration) -> Array2<f32> {
        let k = exaggeration.factor();
        self.values.mapv(|v| v * k)
    }

    /// Smallest and largest elevation.
    pub fn range(&self) -> (f32, f32) {
        min_max(self.values.iter().copied())
    }
}

fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Derives elevation fields from raster images.
#[derive(Debug, Clone)]
pub struct SurfaceTransformer {
    kernel: GaussianKernel,
    edge_mode: EdgeMode,
}

impl SurfaceTransformer {
    pub fn new(sigma: usize, edge_mode: EdgeMode) -> Self {
        Self {
            kernel: GaussianKernel::new(sigma),
            edge_mode,
        }
    }

    pub fn from_config(config: &SurfaceConfig) -> Self {
        Self::new(config.sigma, config.edge_mode)
    }

    /// Transform a raster into an elevation field.
    ///
    /// A constant raster has no contrast to normalize and yields an all-zero
    /// field.
    ///
    /// # Errors
    ///
    /// `EmptyRaster` if the raster has no pixels.
    pub fn transform(&self, raster: &RasterImage) -> Result<ElevationField> {
        if raster.is_empty() {
            return Err(SurfaceError::EmptyRaster);
        }

        let pixels = raster.pixels().mapv(f32::from);
        let (lo, hi) = min_max(pixels.iter().copied());

        if hi <= lo {
            log::debug!("Constant raster ({}), elevation is flat", lo);
            return Ok(ElevationField {
                values: Array2::zeros(pixels.raw_dim()),
            });
        }

        let span = hi - lo;
        let enhanced = pixels.mapv(|v| {
            let normalized = (v - lo) / span;
            (1.0 - normalized).sqrt()
        });

        let smoothed = self.kernel.convolve(&enhanced, self.edge_mode);
        // Kernel weights are rounded to f32 and may sum slightly above 1
        let values = smoothed.mapv(|v| v.clamp(0.0, 1.0));

        log::debug!(
            "Elevation field {}x{} (sigma {}, {:?} edges)",
            values.ncols(),
            values.nrows(),
            self.kernel.radius(),
            self.edge_mode
        );

        Ok(ElevationField { values })
    }
}

impl Default for SurfaceTransformer {
    fn default() -> Self {
        Self::from_config(&SurfaceConfig::default())
    }
}
