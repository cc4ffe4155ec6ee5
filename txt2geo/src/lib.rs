//! # txt2geo
//!
//! Conversion des exports texte de coordonnées de parcelles vers des formats
//! SIG, au-dessus de `cadtxt`.
//!
//! ## Features
//!
//! - Collecte récursive des fichiers, empreintes blake3, historique des
//!   fichiers déjà exportés
//! - Prétraitement parallèle (rayon), un fichier en échec n'arrête pas les autres
//! - Plans d'export séparés ou fusionnés, gabarits de noms
//! - GeoJSON natif (geozero) ou writer externe GDAL/OGR piloté en JSON
//! - Rapport d'export JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Un GeoJSON par fichier
//! txt2geo export -i ./data -o ./out --format GEOJSON
//!
//! # Fusion dans un GeoPackage via le writer externe
//! txt2geo export -i a.txt -i b.txt -o ./out/parcels.gpkg --format GPKG --merge \
//!     --writer "python3 ogr_writer.py"
//!
//! # Diagnostic d'un fichier
//! txt2geo inspect ./data/parcelles.txt
//! ```

pub mod config;
pub mod export;
pub mod files;
pub mod history;
pub mod naming;
pub mod report;

pub use config::{ExportConfig, OutputFormat};
pub use export::Exporter;
pub use history::ProcessingHistory;
pub use report::{ExportReport, ExportStatus};
