//! Point d'entrée CLI pour txt2geo

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Convertir des fichiers texte de coordonnées de parcelles en données SIG
#[derive(Parser)]
#[command(name = "txt2geo")]
#[command(author, version)]
#[command(about = "Convert land-parcel coordinate text files to GIS vector datasets")]
#[command(long_about = "Convertit les exports texte de coordonnées (界址点坐标) en polygones CGCS2000.\n\nGeoJSON est écrit directement ; SHP, FGB, GPKG et GDB passent par un writer externe (--writer ou TXT2GEO_WRITER).")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Export(args) => {
            info!("Export");
            cli::cmd_export(args).await?;
        }
        Commands::Inspect { file, precision } => {
            info!(file = %file.display(), "Inspection");
            cli::cmd_inspect(&file, precision)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
