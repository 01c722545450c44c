//! Batch import of several files on a background worker.
//!
//! Files are imported one after another in input order. Progress is published
//! as [`ImportEvent`]s; the first failing file aborts the whole batch and the
//! images imported so far are dropped.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::config::ImportConfig;
use crate::core::loaders::{import_file, ImportError};
use crate::core::raster::{ProgressSink, RasterImage};
use crate::core::writers::default_png_name;

/// Errors that can occur during a batch import.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("File {} of {total} ({}) failed: {source}", .index + 1, .path.display())]
    Import {
        index: usize,
        total: usize,
        path: PathBuf,
        #[source]
        source: ImportError,
    },

    #[error("Import worker panicked")]
    WorkerPanicked,
}

/// Result type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    /// A file is about to be read. `index` is zero-based.
    FileStarted {
        index: usize,
        total_files: usize,
        path: PathBuf,
    },
    /// Rows rasterized so far in the current file.
    RowProgress {
        index: usize,
        total_files: usize,
        row: usize,
        total_rows: usize,
    },
    /// A file was imported successfully.
    FileFinished {
        index: usize,
        total_files: usize,
        name: String,
        samples: usize,
    },
}

impl ImportEvent {
    /// Overall batch completion in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        match *self {
            ImportEvent::FileStarted { index, total_files, .. } => {
                index as f64 / total_files.max(1) as f64
            }
            ImportEvent::RowProgress {
                index,
                total_files,
                row,
                total_rows,
            } => {
                let within = row as f64 / total_rows.max(1) as f64;
                (index as f64 + within) / total_files.max(1) as f64
            }
            ImportEvent::FileFinished { index, total_files, .. } => {
                (index + 1) as f64 / total_files.max(1) as f64
            }
        }
    }
}

/// Raster image paired with the label shown for it.
#[derive(Debug, Clone)]
pub struct NamedImage {
    pub image: RasterImage,
    pub source: PathBuf,
    pub samples: usize,
}

impl NamedImage {
    /// Source file name without directory or extension.
    pub fn base_name(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Label of the form `"<base> (<n> points)"`.
    pub fn display_name(&self) -> String {
        format!("{} ({} points)", self.base_name(), self.samples)
    }

    /// Suggested PNG file name, e.g. `scan_processed.png`.
    pub fn default_png_name(&self, suffix: &str) -> String {
        default_png_name(&self.base_name(), suffix)
    }
}

/// Forwards row progress as events, throttled to every `stride` rows.
struct RowForwarder<'a, F: FnMut(ImportEvent)> {
    emit: &'a mut F,
    index: usize,
    total_files: usize,
    stride: usize,
}

impl<F: FnMut(ImportEvent)> ProgressSink for RowForwarder<'_, F> {
    fn report(&mut self, completed: usize, total: usize) {
        if completed % self.stride == 0 || completed == total {
            (self.emit)(ImportEvent::RowProgress {
                index: self.index,
                total_files: self.total_files,
                row: completed,
                total_rows: total,
            });
        }
    }
}

/// Import every file in order, reporting events to `emit`.
///
/// # Errors
///
/// Returns the first file's error; no images are returned in that case.
pub fn import_batch<P, F>(paths: &[P], config: &ImportConfig, mut emit: F) -> Result<Vec<NamedImage>>
where
    P: AsRef<Path>,
    F: FnMut(ImportEvent),
{
    let total_files = paths.len();
    let mut images = Vec::with_capacity(total_files);

    for (index, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        emit(ImportEvent::FileStarted {
            index,
            total_files,
            path: path.to_path_buf(),
        });

        let mut forwarder = RowForwarder {
            emit: &mut emit,
            index,
            total_files,
            stride: config.progress_stride.max(1),
        };

        let (image, samples) =
            import_file(path, config, &mut forwarder).map_err(|source| BatchError::Import {
                index,
                total: total_files,
                path: path.to_path_buf(),
                source,
            })?;

        let named = NamedImage {
            image,
            source: path.to_path_buf(),
            samples,
        };

        emit(ImportEvent::FileFinished {
            index,
            total_files,
            name: named.display_name(),
            samples,
        });
        images.push(named);
    }

    Ok(images)
}

/// Handle to a batch import running on a worker thread.
pub struct BatchHandle {
    events: Receiver<ImportEvent>,
    worker: JoinHandle<Result<Vec<NamedImage>>>,
}

impl BatchHandle {
    /// Event stream. Iteration ends once the worker has finished.
    pub fn events(&self) -> &Receiver<ImportEvent> {
        &self.events
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<Vec<NamedImage>> {
        drop(self.events);
        self.worker.join().map_err(|_| BatchError::WorkerPanicked)?
    }
}

/// Start [`import_batch`] on one background thread.
///
/// The worker sends events over a channel with a single consumer; a dropped
/// receiver does not stop the import.
pub fn spawn_batch_import(paths: Vec<PathBuf>, config: ImportConfig) -> BatchHandle {
    let (tx, rx): (Sender<ImportEvent>, Receiver<ImportEvent>) = mpsc::channel();

    let worker = thread::spawn(move || {
        log::debug!("Import worker started for {} files", paths.len());
        import_batch(&paths, &config, |event| {
            let _ = tx.send(event);
        })
    });

    BatchHandle { events: rx, worker }
}
