//! Définition et implémentation des commandes CLI
//!
//! - `export` : fichiers texte -> SHP/FGB/GPKG/GDB (writer externe) ou GeoJSON
//! - `inspect` : diagnostic d'un fichier

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use cadtxt::{charset, parse, preprocess, GeometryOptions};
use txt2geo::config::{
    ExportConfig, DEFAULT_NAME_TEMPLATE, DEFAULT_WRITER_TIMEOUT, WRITER_ENV, WRITER_TIMEOUT_ENV,
};
use txt2geo::export::Exporter;
use txt2geo::files::read_source;
use txt2geo::report::ExportStatus;

#[derive(Subcommand)]
pub enum Commands {
    /// Export coordinate text files to a GIS vector format
    Export(ExportArgs),

    /// Decode and convert a single file, then print what was understood
    Inspect {
        /// Coordinate text file
        file: PathBuf,

        /// Snapping tolerance in metres (default: file `精度`, then 0.0001)
        #[arg(long)]
        precision: Option<f64>,
    },
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Input file or directory (repeatable)
    #[arg(short, long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory, or container path for GPKG/GDB
    #[arg(short, long)]
    output: PathBuf,

    /// Recursion depth: -1 unlimited, 0 = files directly in the directory
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    depth: i32,

    /// Output format: SHP|FGB|GPKG|GDB|GEOJSON
    #[arg(long, default_value = "FGB")]
    format: String,

    /// Merge every input into a single dataset
    #[arg(long)]
    merge: bool,

    /// Name template: {name} {index[:width]} {count} {date[:fmt]} {uuid} {rand[:len]}
    #[arg(long, default_value = DEFAULT_NAME_TEMPLATE)]
    name: String,

    /// Show the export plan without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing outputs
    #[arg(long)]
    overwrite: bool,

    /// Reprocess files already recorded in the history
    #[arg(long)]
    force_refresh: bool,

    /// Snapping tolerance in metres (default: file `精度`, then 0.0001)
    #[arg(long)]
    precision: Option<f64>,

    /// Keep near-duplicate vertices
    #[arg(long)]
    no_dedup: bool,

    /// Do not close open rings
    #[arg(long)]
    no_auto_close: bool,

    /// External writer command (défaut : env TXT2GEO_WRITER)
    #[arg(long)]
    writer: Option<String>,

    /// External writer timeout in seconds (défaut : env TXT2GEO_WRITER_TIMEOUT / 60)
    #[arg(long)]
    writer_timeout: Option<u64>,

    /// Maximum number of worker threads
    #[arg(long, alias = "threads")]
    jobs: Option<usize>,

    /// Write the JSON report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn geometry_options(precision: Option<f64>, no_dedup: bool, no_auto_close: bool) -> GeometryOptions {
    GeometryOptions {
        precision,
        deduplicate: !no_dedup,
        auto_close: !no_auto_close,
    }
}

/// Commande du writer : flag, sinon variable d'environnement
fn resolve_writer(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(WRITER_ENV).ok())
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
}

fn resolve_writer_timeout(flag: Option<u64>) -> Result<Duration> {
    if let Some(secs) = flag {
        return Ok(Duration::from_secs(secs));
    }
    match std::env::var(WRITER_TIMEOUT_ENV) {
        Ok(value) if !value.trim().is_empty() => {
            let secs: u64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: '{}'", WRITER_TIMEOUT_ENV, value))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Ok(DEFAULT_WRITER_TIMEOUT),
    }
}

fn configure_threads(jobs: Option<usize>) -> Result<usize> {
    let jobs = jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .context("Failed to configure the worker pool")?;
    Ok(jobs)
}

/// Exécute la commande export
pub async fn cmd_export(args: ExportArgs) -> Result<()> {
    let jobs = configure_threads(args.jobs)?;

    let config = ExportConfig {
        inputs: args.inputs,
        depth: args.depth,
        format: args.format,
        output: args.output,
        merge: args.merge,
        name_template: args.name,
        dry_run: args.dry_run,
        overwrite: args.overwrite,
        force_refresh: args.force_refresh,
        geometry: geometry_options(args.precision, args.no_dedup, args.no_auto_close),
        writer: resolve_writer(args.writer),
        writer_timeout: resolve_writer_timeout(args.writer_timeout)?,
    };

    let exporter = Exporter::new(config)?;
    let config = exporter.config();

    println!("=== Export {} ===", exporter.format().code);
    println!("Inputs: {}", config.inputs.len());
    println!("Output: {}", config.output.display());
    println!("Mode: {}", if config.merge { "merge" } else { "split" });
    println!("Name template: {}", config.name_template);
    println!("Jobs: {}", jobs);
    println!("Dry run: {}", config.dry_run);
    println!("History: {} entries", exporter.history().len());

    let report = exporter.execute().await?;
    report.display();

    if let Some(path) = &args.report {
        report.save_to_file(path)?;
        info!(path = %path.display(), "Rapport enregistré");
    }

    if report.status == ExportStatus::Failed {
        anyhow::bail!("Export failed: {}", report.summary());
    }

    Ok(())
}

/// Exécute la commande inspect
pub fn cmd_inspect(file: &Path, precision: Option<f64>) -> Result<()> {
    let source = read_source(file)?;
    let decoded = charset::decode(&source.content);

    println!("=== {} ===", file.display());
    println!("Size: {} bytes", source.content.len());
    println!("Fingerprint: {}", source.fingerprint);
    println!("Encoding: {}", decoded.encoding);
    if let Some(warning) = &decoded.warning {
        println!("Warning: {}", warning);
    }

    let doc = parse(&decoded.text).with_context(|| format!("Failed to parse {}", file.display()))?;

    println!("\n--- ATTRIBUTES ---");
    let mut attributes: Vec<_> = doc.file_attributes.iter().collect();
    attributes.sort();
    for (key, value) in attributes {
        println!("  {} = {}", key, value);
    }

    println!("\n--- CONTENT ---");
    println!(
        "Parcels: {}, rings: {}, points: {}",
        doc.parcels.len(),
        doc.ring_count(),
        doc.point_count()
    );

    let result = preprocess(doc, geometry_options(precision, false, false))
        .with_context(|| format!("Failed to convert {}", file.display()))?;
    let cs = &result.coordinate_system;

    println!("\n--- COORDINATE SYSTEM ---");
    println!("Name: {}", cs.name);
    println!("Zone: {}° band {}", cs.degree, cs.band);
    println!(
        "Central meridian: {}{}",
        cs.central_meridian,
        if cs.is_custom_meridian { " (custom)" } else { "" }
    );
    if result.epsg > 0 {
        println!("EPSG: {}", result.epsg);
    } else {
        println!("EPSG: none, WKT:\n{}", result.crs);
    }

    println!("\nFeatures: {}", result.features.len());
    Ok(())
}
