//! Command-line interface for the relief pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::raster::NoProgress;
use crate::core::transforms::Colormap;
use crate::core::writers::default_png_path;
use crate::processors::batch::{spawn_batch_import, ImportEvent, NamedImage};
use crate::processors::pipeline::{export_surface, load_elevation_field, save_images, SurfaceFormat};
use crate::processors::smoothing::EdgeMode;
use crate::processors::surface::{ElevationField, Exaggeration};
use crate::visualization::{self, RenderMode, RenderOptions, ViewPreset};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "relief-raster")]
#[command(about = "Rasterize tabular grayscale scans and render them as 3D relief", version)]
pub struct Cli {
    /// YAML file overriding the default pipeline settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more detail: -v for info, -vv for debug
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import CSV/Excel files and save each as a grayscale PNG
    Import {
        /// Input files (.csv, .xlsx, .xlsm, .xls)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory for the PNGs (defaults to next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Also write a grid of all imported images to this PNG
        #[arg(long)]
        contact_sheet: Option<PathBuf>,
    },

    /// Render one file as a 3D relief PNG
    Relief {
        /// Input file
        file: PathBuf,
        /// Output PNG path (defaults to <base>_relief.png next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Height exaggeration (1 to 100)
        #[arg(short, long)]
        exaggeration: Option<f32>,
        /// Colormap name or a #RRGGBB color
        #[arg(long)]
        colormap: Option<String>,
        /// Camera preset
        #[arg(long, value_enum)]
        view: Option<ViewPreset>,
        /// Draw facet outlines instead of filled facets
        #[arg(long)]
        wireframe: bool,
        /// Smoothing radius
        #[arg(long)]
        sigma: Option<usize>,
        /// Boundary handling for smoothing
        #[arg(long, value_enum)]
        edge_mode: Option<EdgeMode>,
    },

    /// Export the elevation field as a PLY mesh or CSV table
    ExportSurface {
        /// Input file
        file: PathBuf,
        /// Output path; `.ply` writes a mesh, anything else a CSV
        #[arg(short, long)]
        output: PathBuf,
        /// Height exaggeration (1 to 100)
        #[arg(short, long)]
        exaggeration: Option<f32>,
        /// Colormap for PLY vertex colors
        #[arg(long)]
        colormap: Option<String>,
    },

    /// Write the default configuration to a YAML file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

const SUMMARY_KEY_WIDTH: usize = 20;
const SUMMARY_VALUE_WIDTH: usize = 39;

fn styled_bar(pb: ProgressBar, template: &str) -> ProgressBar {
    match ProgressStyle::with_template(template) {
        Ok(style) => pb.with_style(style.progress_chars("=>-")),
        Err(e) => {
            warn!("Progress template rejected: {}", e);
            pb
        }
    }
}

/// Ticking spinner shown while a single file is processed
fn create_spinner(message: &str) -> ProgressBar {
    let pb = styled_bar(ProgressBar::new_spinner(), "{spinner:.green} {msg}");
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Batch bar; position is the completed fraction in thousandths
fn create_batch_bar() -> ProgressBar {
    styled_bar(
        ProgressBar::new(1000),
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}",
    )
}

/// Shorten `value` to the summary column, marking the cut with an ellipsis.
fn fit_summary_value(value: &str) -> String {
    if value.chars().count() <= SUMMARY_VALUE_WIDTH {
        return value.to_string();
    }
    let kept: String = value.chars().take(SUMMARY_VALUE_WIDTH - 3).collect();
    format!("{}...", kept)
}

/// Boxed key/value report printed after each command
fn print_summary(title: &str, items: &[(&str, String)]) {
    let inner = SUMMARY_KEY_WIDTH + SUMMARY_VALUE_WIDTH + 3;
    let rule = "═".repeat(inner + 2);

    println!();
    println!("╔{}╗", rule);
    println!("║ {:<width$} ║", title, width = inner);
    println!("╠{}╣", rule);
    for (key, value) in items {
        println!(
            "║ {:<kw$}: {:<vw$} ║",
            key,
            fit_summary_value(value),
            kw = SUMMARY_KEY_WIDTH,
            vw = SUMMARY_VALUE_WIDTH
        );
    }
    println!("╚{}╝", rule);
    println!();
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", context, err);
    std::process::exit(1);
}

fn resolve_exaggeration(cli_value: Option<f32>, config: &PipelineConfig) -> Exaggeration {
    let factor = cli_value.unwrap_or(config.surface.exaggeration);
    Exaggeration::new(factor).unwrap_or_else(|e| fail("Invalid exaggeration", e))
}

pub fn run() {
    let cli = Cli::parse();

    // Logging first so config loading is visible
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Import { files, output_dir, contact_sheet } => {
            cmd_import(files, output_dir.as_deref(), contact_sheet.as_deref(), &config);
        }
        Commands::Relief {
            file,
            output,
            exaggeration,
            colormap,
            view,
            wireframe,
            sigma,
            edge_mode,
        } => {
            let mut config = config;
            if let Some(sigma) = sigma {
                config.surface.sigma = sigma;
            }
            if let Some(edge_mode) = edge_mode {
                config.surface.edge_mode = edge_mode;
            }
            if let Some(colormap) = colormap {
                config.render.colormap = colormap;
            }
            if let Some(view) = view {
                config.render.view = view;
            }
            if wireframe {
                config.render.mode = RenderMode::Wireframe;
            }
            let exaggeration = resolve_exaggeration(exaggeration, &config);
            cmd_relief(&file, output, exaggeration, &config);
        }
        Commands::ExportSurface { file, output, exaggeration, colormap } => {
            let mut config = config;
            if let Some(colormap) = colormap {
                config.render.colormap = colormap;
            }
            let exaggeration = resolve_exaggeration(exaggeration, &config);
            cmd_export_surface(&file, &output, exaggeration, &config);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path, &config);
        }
    }
}

fn cmd_import(
    files: Vec<PathBuf>,
    output_dir: Option<&Path>,
    contact_sheet: Option<&Path>,
    config: &PipelineConfig,
) {
    let start = Instant::now();
    let total_files = files.len();

    println!("Importing {} file(s)...", total_files);

    let bar = create_batch_bar();
    let handle = spawn_batch_import(files, config.import.clone());

    for event in handle.events().iter() {
        bar.set_position((event.fraction() * 1000.0).round() as u64);
        if let ImportEvent::FileStarted { index, path, .. } = &event {
            bar.set_message(format!(
                "[{}/{}] {}",
                index + 1,
                total_files,
                path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
            ));
        }
    }

    let images: Vec<NamedImage> = match handle.join() {
        Ok(images) => {
            bar.finish_and_clear();
            images
        }
        Err(e) => {
            bar.abandon();
            fail("Import failed", e);
        }
    };

    let written = save_images(&images, output_dir, &config.import.output_suffix)
        .unwrap_or_else(|e| fail("Saving images failed", format!("{:#}", e)));

    if let Some(sheet) = contact_sheet {
        if let Err(e) = visualization::render_contact_sheet(sheet, &images, &config.layout) {
            fail("Contact sheet failed", e);
        }
    }

    let names: Vec<String> = images.iter().map(NamedImage::display_name).collect();
    let total_points: usize = images.iter().map(|n| n.samples).sum();

    print_summary(
        "Import Complete",
        &[
            ("Files imported", images.len().to_string()),
            ("Images", names.join(", ")),
            ("Total points", total_points.to_string()),
            (
                "Output directory",
                output_dir
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "next to inputs".to_string()),
            ),
            (
                "Contact sheet",
                contact_sheet
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("PNGs written", written.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

/// Import and transform one file behind a spinner.
fn load_field(file: &Path, config: &PipelineConfig) -> (ElevationField, usize) {
    let spinner = create_spinner("Importing and deriving elevation field...");
    let loaded = load_elevation_field(file, config, &mut NoProgress);
    spinner.finish_and_clear();
    loaded.unwrap_or_else(|e| fail("Loading failed", format!("{:#}", e)))
}

fn cmd_relief(file: &Path, output: Option<PathBuf>, exaggeration: Exaggeration, config: &PipelineConfig) {
    let start = Instant::now();

    let output_path = output.unwrap_or_else(|| default_png_path(file, None, "_relief"));

    println!("Rendering relief...");
    println!("Input: {}", file.display());
    println!("Output: {}", output_path.display());

    let (field, samples) = load_field(file, config);
    let options = RenderOptions::from_config(&config.render, exaggeration);

    let spinner = create_spinner("Rendering surface...");
    if let Err(e) = visualization::render_relief(&output_path, &field, &options) {
        spinner.finish_and_clear();
        fail("Rendering failed", e);
    }
    spinner.finish_and_clear();

    print_summary(
        "Relief Complete",
        &[
            ("Input file", file.display().to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Points", samples.to_string()),
            ("Field size", format!("{}x{}", field.width(), field.height())),
            ("Exaggeration", exaggeration.factor().to_string()),
            ("Colormap", options.colormap.to_string()),
            ("View", format!("{:?}", options.view)),
            ("Mode", format!("{:?}", options.mode)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_export_surface(file: &Path, output: &Path, exaggeration: Exaggeration, config: &PipelineConfig) {
    let start = Instant::now();

    let (field, samples) = load_field(file, config);
    let colormap = Colormap::parse_or_default(&config.render.colormap);

    let format = export_surface(output, &field, exaggeration, &colormap)
        .unwrap_or_else(|e| fail("Export failed", format!("{:#}", e)));

    let (lo, hi) = field.range();
    print_summary(
        "Surface Export Complete",
        &[
            ("Input file", file.display().to_string()),
            ("Output file", output.display().to_string()),
            (
                "Format",
                match format {
                    SurfaceFormat::Ply => "PLY mesh".to_string(),
                    SurfaceFormat::Csv => "CSV".to_string(),
                },
            ),
            ("Points", samples.to_string()),
            ("Vertices", (field.width() * field.height()).to_string()),
            ("Elevation range", format!("{:.3} .. {:.3}", lo, hi)),
            ("Exaggeration", exaggeration.factor().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_init_config(path: &Path, config: &PipelineConfig) {
    if let Err(e) = config.to_yaml(path) {
        fail("Writing config failed", e);
    }
    print_summary("Config Written", &[("Path", path.display().to_string())]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_relief_overrides() {
        let cli = Cli::try_parse_from([
            "relief-raster",
            "-vv",
            "relief",
            "scan.csv",
            "--exaggeration",
            "20",
            "--view",
            "top",
            "--wireframe",
            "--colormap",
            "#ff0000",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Relief {
                file,
                exaggeration,
                view,
                wireframe,
                colormap,
                ..
            } => {
                assert_eq!(file, PathBuf::from("scan.csv"));
                assert_eq!(exaggeration, Some(20.0));
                assert_eq!(view, Some(ViewPreset::Top));
                assert!(wireframe);
                assert_eq!(colormap.as_deref(), Some("#ff0000"));
            }
            _ => panic!("Expected relief command"),
        }
    }

    #[test]
    fn test_fit_summary_value() {
        assert_eq!(fit_summary_value("short"), "short");
        let long = "x".repeat(50);
        let shown = fit_summary_value(&long);
        assert_eq!(shown.chars().count(), SUMMARY_VALUE_WIDTH);
        assert!(shown.ends_with("..."));
        // Multi-byte characters are cut on char boundaries
        let wide = "é".repeat(45);
        assert_eq!(fit_summary_value(&wide).chars().count(), SUMMARY_VALUE_WIDTH);
    }

    #[test]
    fn test_import_requires_files() {
        assert!(Cli::try_parse_from(["relief-raster", "import"]).is_err());
        let cli = Cli::try_parse_from(["relief-raster", "import", "a.csv", "b.xlsx"]).unwrap();
        match cli.command {
            Commands::Import { files, .. } => assert_eq!(files.len(), 2),
            _ => panic!("Expected import command"),
        }
    }
}
