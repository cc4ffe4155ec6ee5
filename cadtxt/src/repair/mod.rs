//! Post-traitement géométrique des anneaux
//!
//! Pour chaque anneau, dans l'ordre : dédoublonnage sur grille, fermeture
//! automatique, tri déterministe par numéro de point. Aucune autre validation
//! (auto-intersection, orientation) n'est effectuée.

pub mod dedup;
pub mod precision;
pub mod ring;

use crate::types::{GeometryOptions, ParsedDocument, ATTR_PRECISION};

pub use precision::{decimal_places, grid_scale, normalize_precision, parse_precision};

/// Tolérance effective : option (> 0), puis attribut `精度`, puis MAX_TOLERANCE
pub fn resolve_precision(doc: &ParsedDocument, options: &GeometryOptions) -> f64 {
    match options.precision {
        Some(p) if p > 0.0 => normalize_precision(p),
        _ => doc
            .file_attributes
            .get(ATTR_PRECISION)
            .map(|s| parse_precision(s))
            .unwrap_or(crate::types::MAX_TOLERANCE),
    }
}

/// Nettoie tous les anneaux du document en place
pub fn process(doc: &mut ParsedDocument, options: &GeometryOptions) {
    let tolerance = resolve_precision(doc, options);
    let scale = grid_scale(tolerance);

    let mut dropped = 0usize;
    let mut closed = 0usize;

    for parcel in &mut doc.parcels {
        for points in &mut parcel.rings {
            if points.is_empty() {
                continue;
            }

            if options.deduplicate {
                let before = points.len();
                *points = dedup::dedup_ring(points, scale);
                dropped += before - points.len();
            }

            let was_closed = points.len() > 1
                && ring::is_closing_point(&points[0], &points[points.len() - 1], tolerance);

            ring::close_and_order(points, tolerance, options.auto_close);

            if options.auto_close && points.len() > 1 && !was_closed {
                closed += 1;
            }
        }
    }

    tracing::debug!(
        tolerance,
        scale,
        dropped_points = dropped,
        closed_rings = closed,
        "Géométries post-traitées"
    );
}
