//! Raster processing stages.

pub mod batch;
pub mod pipeline;
pub mod smoothing;
pub mod surface;

pub use batch::{import_batch, spawn_batch_import, BatchError, BatchHandle, ImportEvent, NamedImage};
pub use smoothing::{EdgeMode, GaussianKernel};
pub use surface::{ElevationField, Exaggeration, SurfaceError, SurfaceTransformer};
