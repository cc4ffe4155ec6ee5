//! # cadtxt
//!
//! Parser pour les exports texte de coordonnées de parcelles (界址点坐标),
//! avec déduction du système de coordonnées CGCS2000 Gauss-Krüger.
//!
//! ## Features
//!
//! - Parser à états strict (`[属性描述]` puis `[地块坐标]`)
//! - Nettoyage des anneaux à tolérance : dédoublonnage sur grille, fermeture,
//!   tri déterministe
//! - Déduction du fuseau, du méridien central, du code EPSG et du WKT ESRI
//! - Détection d'encodage (UTF-8/BOM, UTF-16, GB18030) via `simdutf8` et `encoding_rs`
//! - Polygones `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadtxt::{charset, convert, GeometryOptions};
//!
//! let bytes = std::fs::read("parcelles.txt")?;
//! let decoded = charset::decode(&bytes);
//! let result = convert(&decoded.text, GeometryOptions::default())?;
//! println!("CRS: {}", result.crs);
//!
//! for feature in &result.features {
//!     println!("{}", feature.wkt);
//! }
//! ```

pub mod charset;
pub mod crs;
pub mod error;
pub mod parser;
pub mod repair;
pub mod types;
pub mod wkt;

pub use error::{CadtxtError, CrsError, GeometryBuildError, ParseError};
pub use parser::attributes::fold_full_width;
pub use parser::parse;
pub use types::{
    CoordinateSystem, Feature, GeometryOptions, Parcel, ParsedDocument, Point, PreprocessResult,
    MAX_TOLERANCE,
};

/// Post-traite un document parsé et construit les features.
///
/// Étapes : tolérance effective (option > 0, puis attribut `精度`, puis
/// `MAX_TOLERANCE`) -> nettoyage géométrique -> système de coordonnées ->
/// rendu WKT.
///
/// # Errors
///
/// `CadtxtError::NoParcels` si le document ne contient aucune parcelle, sinon
/// la première erreur de système de coordonnées ou de géométrie rencontrée.
pub fn preprocess(
    mut doc: ParsedDocument,
    options: GeometryOptions,
) -> Result<PreprocessResult, CadtxtError> {
    if doc.parcels.is_empty() {
        return Err(CadtxtError::NoParcels);
    }

    let precision = repair::resolve_precision(&doc, &options);
    let decimal_places = repair::decimal_places(precision);

    let options = GeometryOptions {
        precision: Some(precision),
        ..options
    };
    repair::process(&mut doc, &options);

    let coordinate_system = crs::build(&doc)?;
    let result = wkt::assemble(&doc, &coordinate_system, decimal_places)?;

    tracing::debug!(
        features = result.features.len(),
        crs = %coordinate_system.name,
        precision,
        decimal_places,
        "Prétraitement terminé"
    );

    Ok(result)
}

/// Parse puis post-traite un texte décodé
pub fn convert(text: &str, options: GeometryOptions) -> Result<PreprocessResult, CadtxtError> {
    let doc = parse(text)?;
    preprocess(doc, options)
}
