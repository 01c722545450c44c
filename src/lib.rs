//! Rasterize tabular grayscale scans and render them as 3D relief.
//!
//! This crate provides tools for:
//! - Importing `X`, `Y`, `Grayscale` tables from CSV and Excel files
//! - Rasterizing samples into 8-bit grayscale images
//! - Deriving smoothed elevation fields where dark pixels become ridges
//! - Rendering relief views, contact sheets and exporting surface meshes
//!
//! # Example
//!
//! ```no_run
//! use relief_raster::config::ImportConfig;
//! use relief_raster::core::{import_file, NoProgress};
//! use relief_raster::processors::SurfaceTransformer;
//!
//! let (raster, _samples) = import_file("scan.csv", &ImportConfig::default(), &mut NoProgress).unwrap();
//! let field = SurfaceTransformer::default().transform(&raster).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ImportConfig, LayoutConfig, PipelineConfig, RenderConfig, SurfaceConfig};
pub use core::raster::RasterImage;
pub use processors::surface::{ElevationField, Exaggeration};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
