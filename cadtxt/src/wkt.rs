//! Rendu WKT des parcelles et assemblage des features
//!
//! Les anneaux sont écrits Y puis X : dans les exports levés, X est le nord et
//! Y l'est (préfixé du numéro de fuseau).

use geo::{Coord, LineString, Polygon};

use crate::error::{GeometryBuildError, GeometryDefect};
use crate::repair::ring::is_closed;
use crate::types::{CoordinateSystem, Feature, Parcel, ParsedDocument, Point, PreprocessResult};

/// Nombre minimal de points d'un anneau rendu
pub const MIN_RING_POINTS: usize = 4;

/// Vérifie qu'une parcelle peut être rendue en polygone
fn check_parcel(parcel: &Parcel) -> Result<(), GeometryBuildError> {
    if parcel.rings.is_empty() {
        return Err(GeometryBuildError::new(parcel.id(), GeometryDefect::NoRings));
    }

    for ring in &parcel.rings {
        if ring.len() < MIN_RING_POINTS {
            return Err(GeometryBuildError::new(
                parcel.id(),
                GeometryDefect::TooFewPoints { count: ring.len() },
            ));
        }
        if !is_closed(ring) {
            return Err(GeometryBuildError::new(
                parcel.id(),
                GeometryDefect::Unclosed,
            ));
        }
    }

    Ok(())
}

fn write_ring(out: &mut String, ring: &[Point], decimal_places: usize) {
    out.push('(');
    for (i, p) in ring.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{:.*} {:.*}", decimal_places, p.y, decimal_places, p.x));
    }
    out.push(')');
}

/// Rend une parcelle en `POLYGON ((y x, ...), ...)`
pub fn polygon_wkt(parcel: &Parcel, decimal_places: usize) -> Result<String, GeometryBuildError> {
    check_parcel(parcel)?;

    let capacity = parcel
        .rings
        .iter()
        .map(|r| r.len() * (decimal_places * 2 + 20))
        .sum::<usize>()
        + 16;
    let mut out = String::with_capacity(capacity);

    out.push_str("POLYGON (");
    for (i, ring) in parcel.rings.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_ring(&mut out, ring, decimal_places);
    }
    out.push(')');

    Ok(out)
}

#[inline]
fn round_to(value: f64, decimal_places: usize) -> f64 {
    let factor = 10f64.powi(decimal_places as i32);
    (value * factor).round() / factor
}

fn ring_to_linestring(ring: &[Point], decimal_places: usize) -> LineString<f64> {
    ring.iter()
        .map(|p| Coord {
            x: round_to(p.y, decimal_places),
            y: round_to(p.x, decimal_places),
        })
        .collect()
}

/// Même géométrie que [`polygon_wkt`] sous forme de `geo::Polygon` (axes Y, X)
pub fn polygon(parcel: &Parcel, decimal_places: usize) -> Result<Polygon<f64>, GeometryBuildError> {
    check_parcel(parcel)?;

    let mut rings = parcel
        .rings
        .iter()
        .map(|r| ring_to_linestring(r, decimal_places));

    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, rings.collect()))
}

/// Assemble le résultat final : une feature par parcelle
pub fn assemble(
    doc: &ParsedDocument,
    coordinate_system: &CoordinateSystem,
    decimal_places: usize,
) -> Result<PreprocessResult, GeometryBuildError> {
    let features = doc
        .parcels
        .iter()
        .map(|parcel| {
            Ok(Feature {
                wkt: polygon_wkt(parcel, decimal_places)?,
                geometry: polygon(parcel, decimal_places)?,
                attributes: parcel.attributes.clone(),
            })
        })
        .collect::<Result<Vec<_>, GeometryBuildError>>()?;

    Ok(PreprocessResult {
        crs: coordinate_system.crs_string(),
        epsg: coordinate_system.epsg,
        coordinate_system: coordinate_system.clone(),
        features,
    })
}
