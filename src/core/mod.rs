//! Core data types and I/O operations.

pub mod loaders;
pub mod raster;
pub mod transforms;
pub mod writers;

pub use loaders::{import_file, read_samples, ImportError, TabularFormat};
pub use raster::{rasterize, BoundingBox, NoProgress, ProgressSink, RasterImage, SampleRow};
pub use transforms::{Colormap, Light};
pub use writers::{save_png, write_surface_csv, write_surface_ply, WriteError};
