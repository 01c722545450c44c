//! Loaders for X/Y/Grayscale tables stored as CSV or Excel workbooks.
//!
//! Both formats go through the same steps:
//! - The first row is the header; `X`, `Y` and `Grayscale` must be present
//!   (case-sensitive, extra columns are ignored)
//! - Numeric cells may be integers or decimals and are truncated toward zero
//! - Grayscale values are clamped into `0..=255`

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use thiserror::Error;

use super::raster::{rasterize, ProgressSink, RasterImage, SampleRow};
use crate::config::ImportConfig;

/// Header name of the X coordinate column.
pub const X_COLUMN: &str = "X";

/// Header name of the Y coordinate column.
pub const Y_COLUMN: &str = "Y";

/// Header name of the intensity column.
pub const GRAYSCALE_COLUMN: &str = "Grayscale";

/// Errors that can occur while importing a table.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Failed to parse {}: {message}", .path.display())]
    ParseFailure { path: PathBuf, message: String },

    #[error("Empty file: {}", .0.display())]
    EmptyFile(PathBuf),

    /// `rasterize` was handed no samples. File imports never get here:
    /// `read_samples` rejects a table without data rows as `EmptyFile`,
    /// which carries the path that `rasterize` does not know.
    #[error("No samples to rasterize")]
    EmptySamples,

    #[error("Raster of {width}x{height} exceeds the limit of {limit} pixels")]
    RasterTooLarge {
        width: usize,
        height: usize,
        limit: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;

/// Tabular file format, decided from the file extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    /// Comma-delimited text with a header row
    Csv,
    /// Excel workbook; only the first worksheet is read
    Excel,
}

impl TabularFormat {
    /// Detect the format from the path's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for any extension other than csv, xlsx, xlsm or
    /// xls. The file is never opened.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("xlsx") | Some("xlsm") | Some("xls") => Ok(Self::Excel),
            _ => Err(ImportError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Indices of the required columns inside a header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    x: usize,
    y: usize,
    grayscale: usize,
}

impl ColumnIndices {
    fn locate<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.as_ref() == name);

        let x = find(X_COLUMN);
        let y = find(Y_COLUMN);
        let grayscale = find(GRAYSCALE_COLUMN);

        match (x, y, grayscale) {
            (Some(x), Some(y), Some(grayscale)) => Ok(Self { x, y, grayscale }),
            _ => {
                let missing = [(X_COLUMN, x), (Y_COLUMN, y), (GRAYSCALE_COLUMN, grayscale)]
                    .iter()
                    .filter(|(_, idx)| idx.is_none())
                    .map(|(name, _)| name.to_string())
                    .collect();
                Err(ImportError::MissingColumns(missing))
            }
        }
    }
}

/// Truncate a parsed number toward zero.
#[inline]
fn truncate(value: f64) -> Option<i64> {
    if value.is_finite() {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

/// Clamp a truncated intensity into the 8-bit range.
#[inline]
fn clamp_gray(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

fn parse_failure(path: &Path, message: impl Into<String>) -> ImportError {
    ImportError::ParseFailure {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Read samples from a CSV or Excel file.
///
/// # Errors
///
/// Returns an error if the extension is not recognized, a required column is
/// missing, a required cell is not numeric, or the file has no data rows.
pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<Vec<SampleRow>> {
    let path = path.as_ref();
    let samples = match TabularFormat::from_path(path)? {
        TabularFormat::Csv => read_csv_samples(path)?,
        TabularFormat::Excel => read_excel_samples(path)?,
    };

    if samples.is_empty() {
        return Err(ImportError::EmptyFile(path.to_path_buf()));
    }

    log::debug!("Read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

fn read_csv_samples(path: &Path) -> Result<Vec<SampleRow>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_failure(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    let cols = ColumnIndices::locate(&headers)?;

    let mut samples = Vec::with_capacity(4096);

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| parse_failure(path, e.to_string()))?;
        // Header is line 1
        let line = row_idx + 2;

        let field = |idx: usize, name: &str| -> Result<i64> {
            let raw = record.get(idx).unwrap_or("");
            raw.parse::<f64>()
                .ok()
                .and_then(truncate)
                .ok_or_else(|| {
                    parse_failure(path, format!("row {}: invalid {} value '{}'", line, name, raw))
                })
        };

        let x = field(cols.x, X_COLUMN)?;
        let y = field(cols.y, Y_COLUMN)?;
        let gray = field(cols.grayscale, GRAYSCALE_COLUMN)?;

        samples.push(SampleRow::new(x, y, clamp_gray(gray)));
    }

    Ok(samples)
}

/// Numeric value of a spreadsheet cell, truncated toward zero.
fn cell_to_i64(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(v) => Some(*v),
        Data::Float(v) => truncate(*v),
        Data::String(s) => s.trim().parse::<f64>().ok().and_then(truncate),
        _ => None,
    }
}

/// Header text of a spreadsheet cell.
fn cell_to_header(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn read_excel_samples(path: &Path) -> Result<Vec<SampleRow>> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| parse_failure(path, e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_failure(path, "workbook has no worksheets"))?
        .map_err(|e| parse_failure(path, e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_to_header).collect(),
        None => return Err(ImportError::EmptyFile(path.to_path_buf())),
    };
    let cols = ColumnIndices::locate(&headers)?;

    let mut samples = Vec::with_capacity(range.height().saturating_sub(1));

    for (row_idx, row) in rows.enumerate() {
        let line = row_idx + 2;

        let field = |idx: usize, name: &str| -> Result<i64> {
            let cell = row.get(idx);
            cell.and_then(cell_to_i64).ok_or_else(|| {
                let shown = cell.map(ToString::to_string).unwrap_or_default();
                parse_failure(path, format!("row {}: invalid {} value '{}'", line, name, shown))
            })
        };

        let x = field(cols.x, X_COLUMN)?;
        let y = field(cols.y, Y_COLUMN)?;
        let gray = field(cols.grayscale, GRAYSCALE_COLUMN)?;

        samples.push(SampleRow::new(x, y, clamp_gray(gray)));
    }

    Ok(samples)
}

/// Import one file into a raster image.
///
/// # Returns
///
/// The raster and the number of samples read from the file.
pub fn import_file<P: AsRef<Path>>(
    path: P,
    config: &ImportConfig,
    progress: &mut dyn ProgressSink,
) -> Result<(RasterImage, usize)> {
    let path = path.as_ref();
    let samples = read_samples(path)?;
    let raster = rasterize(&samples, config.max_raster_pixels, progress)?;

    log::info!(
        "Imported {} ({} points) -> {}x{} raster",
        path.display(),
        samples.len(),
        raster.width(),
        raster.height()
    );

    Ok((raster, samples.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::NoProgress;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;
    use tempfile::{tempdir, Builder};

    /// Workbook whose first sheet holds `header` and `rows`; a second sheet
    /// with different data follows it.
    fn xlsx_file(dir: &Path, header: &[&str], rows: &[&[f64]]) -> PathBuf {
        let path = dir.join("scan.xlsx");
        let mut workbook = Workbook::new();

        let first = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            first.write_string(0, col as u16, *name).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                first.write_number(r as u32 + 1, col as u16, *value).unwrap();
            }
        }

        let second = workbook.add_worksheet();
        for (col, name) in ["X", "Y", "Grayscale"].iter().enumerate() {
            second.write_string(0, col as u16, *name).unwrap();
        }
        second.write_number(1, 0, 99.0).unwrap();
        second.write_number(1, 1, 99.0).unwrap();
        second.write_number(1, 2, 99.0).unwrap();

        workbook.save(&path).unwrap();
        path
    }

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(TabularFormat::from_path(Path::new("a.csv")).unwrap(), TabularFormat::Csv);
        assert_eq!(TabularFormat::from_path(Path::new("a.CSV")).unwrap(), TabularFormat::Csv);
        assert_eq!(TabularFormat::from_path(Path::new("b.xlsx")).unwrap(), TabularFormat::Excel);
        assert_eq!(TabularFormat::from_path(Path::new("b.xls")).unwrap(), TabularFormat::Excel);
        assert!(TabularFormat::from_path(Path::new("c")).is_err());
    }

    #[test]
    fn test_txt_is_unsupported_without_opening() {
        // The file does not exist; an IO error would mean we tried to open it
        let result = read_samples("/nonexistent/points.txt");
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_read_csv_samples() -> Result<()> {
        let file = csv_file(&["X,Y,Grayscale", "0,0,10", "1,0,20", "0,1,30"]);

        let samples = read_samples(file.path())?;
        assert_eq!(
            samples,
            vec![
                SampleRow::new(0, 0, 10),
                SampleRow::new(1, 0, 20),
                SampleRow::new(0, 1, 30)
            ]
        );
        Ok(())
    }

    #[test]
    fn test_extra_columns_and_order_ignored() -> Result<()> {
        let file = csv_file(&["Grayscale,Note,Y,X", "7,a,2,3"]);

        let samples = read_samples(file.path())?;
        assert_eq!(samples, vec![SampleRow::new(3, 2, 7)]);
        Ok(())
    }

    #[test]
    fn test_fractional_values_truncate() -> Result<()> {
        let file = csv_file(&["X,Y,Grayscale", "1.9,-2.7,100.8", "300,0,-5", "0,0,999"]);

        let samples = read_samples(file.path())?;
        assert_eq!(samples[0], SampleRow::new(1, -2, 100));
        assert_eq!(samples[1], SampleRow::new(300, 0, 0));
        assert_eq!(samples[2], SampleRow::new(0, 0, 255));
        Ok(())
    }

    #[test]
    fn test_missing_grayscale_column() {
        let file = csv_file(&["X,Y,Gray", "0,0,1"]);

        match read_samples(file.path()) {
            Err(ImportError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["Grayscale".to_string()]);
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_column_names_are_case_sensitive() {
        let file = csv_file(&["x,y,grayscale", "0,0,1"]);

        match read_samples(file.path()) {
            Err(ImportError::MissingColumns(missing)) => assert_eq!(missing.len(), 3),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_cell_is_parse_failure() {
        let file = csv_file(&["X,Y,Grayscale", "0,0,1", "a,1,2"]);

        match read_samples(file.path()) {
            Err(ImportError::ParseFailure { message, .. }) => {
                assert!(message.contains("row 3"));
                assert!(message.contains("X"));
            }
            other => panic!("Expected ParseFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_is_empty_file() {
        let file = csv_file(&["X,Y,Grayscale"]);
        assert!(matches!(read_samples(file.path()), Err(ImportError::EmptyFile(_))));
    }

    #[test]
    fn test_import_file_counts_all_rows() -> Result<()> {
        let file = csv_file(&["X,Y,Grayscale", "0,0,10", "0,0,20", "2,1,30"]);

        let (raster, count) = import_file(file.path(), &ImportConfig::default(), &mut NoProgress)?;
        assert_eq!(count, 3);
        assert_eq!((raster.height(), raster.width()), (2, 3));
        assert_eq!(raster.get(1, 0), Some(20));
        assert_eq!(raster.get(0, 2), Some(30));
        Ok(())
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_i64(&Data::Int(4)), Some(4));
        assert_eq!(cell_to_i64(&Data::Float(-3.9)), Some(-3));
        assert_eq!(cell_to_i64(&Data::String(" 12 ".to_string())), Some(12));
        assert_eq!(cell_to_i64(&Data::Empty), None);
        assert_eq!(cell_to_i64(&Data::Bool(true)), None);
    }

    #[test]
    fn test_read_excel_first_sheet() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = xlsx_file(
            dir.path(),
            &["X", "Y", "Grayscale"],
            &[&[0.0, 0.0, 10.0], &[1.0, 0.0, 20.0], &[0.0, 1.0, 30.0]],
        );

        let samples = read_samples(&path)?;
        assert_eq!(
            samples,
            vec![
                SampleRow::new(0, 0, 10),
                SampleRow::new(1, 0, 20),
                SampleRow::new(0, 1, 30)
            ]
        );
        Ok(())
    }

    #[test]
    fn test_excel_decimal_cells_truncate() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = xlsx_file(dir.path(), &["Grayscale", "X", "Y"], &[&[100.8, 2.7, -1.5]]);

        assert_eq!(read_samples(&path)?, vec![SampleRow::new(2, -1, 100)]);
        Ok(())
    }

    #[test]
    fn test_excel_missing_column() {
        let dir = tempdir().unwrap();
        let path = xlsx_file(dir.path(), &["X", "Gray"], &[&[0.0, 1.0]]);

        match read_samples(&path) {
            Err(ImportError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["Y".to_string(), "Grayscale".to_string()]);
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_excel_header_only_is_empty_file() {
        let dir = tempdir().unwrap();
        let path = xlsx_file(dir.path(), &["X", "Y", "Grayscale"], &[]);
        assert!(matches!(read_samples(&path), Err(ImportError::EmptyFile(_))));
    }

    #[test]
    fn test_import_header_only_reports_file_not_samples() {
        let file = csv_file(&["X,Y,Grayscale"]);
        let result = import_file(file.path(), &ImportConfig::default(), &mut NoProgress);
        assert!(matches!(result, Err(ImportError::EmptyFile(_))));
    }

    #[test]
    fn test_import_huge_coordinate_span_is_too_large() {
        let file = csv_file(&["X,Y,Grayscale", "-1e19,0,1", "1e19,0,2"]);

        let result = import_file(file.path(), &ImportConfig::default(), &mut NoProgress);
        assert!(matches!(result, Err(ImportError::RasterTooLarge { .. })));
    }
}
