//! Déduction du système de coordonnées CGCS2000 Gauss-Krüger
//!
//! Les attributs déclarés (`几度分带`, `带号`) sont confrontés au numéro de
//! fuseau lu dans les coordonnées (millions de Y). En cas de désaccord, la
//! géométrie l'emporte.

use tracing::{debug, warn};

use crate::error::CrsError;
use crate::types::{
    CoordinateSystem, ParsedDocument, ATTR_BAND, ATTR_COORDINATE_SYSTEM, ATTR_DEGREE,
};

/// Sous-chaîne obligatoire du nom de système de coordonnées
pub const DATUM_MARKER: &str = "2000国家大地坐标系";

/// Fuseaux 3° valides
pub const BANDS_3_DEGREE: std::ops::RangeInclusive<i64> = 25..=45;
/// Fuseaux 6° valides
pub const BANDS_6_DEGREE: std::ops::RangeInclusive<i64> = 13..=23;

/// Bornes du méridien central (Chine)
const MERIDIAN_MIN: f64 = 75.0;
const MERIDIAN_MAX: f64 = 135.0;

const EPSG_6_DEGREE_ZONE: u32 = 4491;
const EPSG_6_DEGREE_CM: u32 = 4502;
const EPSG_3_DEGREE_ZONE: u32 = 4513;
const EPSG_3_DEGREE_CM: u32 = 4534;

const BAND_DIVISOR: f64 = 1_000_000.0;
const FALSE_EASTING_BASE: f64 = 500_000.0;

/// Construit le système de coordonnées d'un document parsé
pub fn build(doc: &ParsedDocument) -> Result<CoordinateSystem, CrsError> {
    if doc.parcels.is_empty() {
        return Err(CrsError::NoParcels);
    }

    let name = attribute(doc, ATTR_COORDINATE_SYSTEM);
    if name.is_empty() {
        return Err(CrsError::MissingName);
    }
    if !name.contains(DATUM_MARKER) {
        return Err(CrsError::UnsupportedDatum(name.to_string()));
    }

    let declared_degree = parse_degree(attribute(doc, ATTR_DEGREE))?;
    let band_raw = attribute(doc, ATTR_BAND);
    let declared_band = band_raw
        .parse::<i64>()
        .map_err(|_| CrsError::InvalidBand(band_raw.to_string()))?;

    let geometric_band = geometric_band(doc);
    let has_band = geometric_band.is_some();

    let (degree, band) = match geometric_band {
        Some(band) if band != declared_band => {
            warn!(
                declared_band,
                geometric_band = band,
                "Numéro de fuseau déclaré incohérent avec les coordonnées, fuseau géométrique retenu"
            );
            (degree_for_band(band).unwrap_or(declared_degree), band)
        }
        _ => (declared_degree, declared_band),
    };

    if !band_matches_degree(degree, band) {
        return Err(CrsError::BandOutOfRange {
            degree: declared_degree,
            band,
            expected: expected_range(declared_degree),
        });
    }

    let custom_meridian = custom_central_meridian(name);
    let central_meridian = match custom_meridian {
        Some(cm) => cm,
        None => standard_central_meridian(degree, band),
    };

    if !(MERIDIAN_MIN..=MERIDIAN_MAX).contains(&central_meridian) {
        return Err(CrsError::CentralMeridianOutOfRange(central_meridian));
    }

    let standard = is_standard_meridian(central_meridian);
    let epsg = if standard {
        epsg_code(band, has_band)
    } else {
        0
    };

    let projection_name = projection_name(band, central_meridian, has_band, standard);
    let wkt = esri_wkt(&projection_name, central_meridian, band, has_band);

    debug!(
        name = %projection_name,
        degree,
        band,
        central_meridian,
        epsg,
        "Système de coordonnées déduit"
    );

    Ok(CoordinateSystem {
        name: projection_name,
        degree,
        band,
        central_meridian,
        epsg,
        is_custom_meridian: custom_meridian.is_some(),
        wkt,
    })
}

fn attribute<'a>(doc: &'a ParsedDocument, key: &str) -> &'a str {
    doc.file_attributes
        .get(key)
        .map(|v| v.trim())
        .unwrap_or("")
}

fn parse_degree(raw: &str) -> Result<u8, CrsError> {
    match raw.parse::<u8>() {
        Ok(d @ (3 | 6)) => Ok(d),
        _ => Err(CrsError::InvalidDegree(raw.to_string())),
    }
}

/// Fuseau lu dans le premier point de Y non nul (premier anneau, première parcelle)
pub fn geometric_band(doc: &ParsedDocument) -> Option<i64> {
    let ring = doc.parcels.first()?.rings.first()?;
    let point = ring.iter().find(|p| p.y != 0.0)?;
    let candidate = (point.y / BAND_DIVISOR).floor() as i64;
    (candidate > 0).then_some(candidate)
}

/// Largeur de fuseau compatible avec un numéro de fuseau
pub fn degree_for_band(band: i64) -> Option<u8> {
    if BANDS_3_DEGREE.contains(&band) {
        Some(3)
    } else if BANDS_6_DEGREE.contains(&band) {
        Some(6)
    } else {
        None
    }
}

fn band_matches_degree(degree: u8, band: i64) -> bool {
    match degree {
        3 => BANDS_3_DEGREE.contains(&band),
        6 => BANDS_6_DEGREE.contains(&band),
        _ => false,
    }
}

fn expected_range(degree: u8) -> &'static str {
    match degree {
        3 => "[25,45]",
        _ => "[13,23]",
    }
}

/// Méridien central entre les dernières parenthèses du nom, ex. `...(114.3)`
pub fn custom_central_meridian(name: &str) -> Option<f64> {
    let start = name.rfind('(')?;
    let end = name.rfind(')')?;
    if end <= start + 1 {
        return None;
    }

    let numeric: String = name[start + 1..end]
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
        .collect();

    if numeric.is_empty() {
        return None;
    }
    numeric.parse().ok()
}

/// Méridien central standard d'un fuseau
pub fn standard_central_meridian(degree: u8, band: i64) -> f64 {
    if degree == 3 {
        band as f64 * 3.0
    } else {
        band as f64 * 6.0 - 3.0
    }
}

/// Méridien multiple de 3 (tolérance 1e-8)
pub fn is_standard_meridian(central_meridian: f64) -> bool {
    (central_meridian % 3.0).abs() < 1e-8
}

/// Code EPSG CGCS2000 GK ; familles "Zone" si le fuseau vient de la géométrie
pub fn epsg_code(band: i64, has_band: bool) -> u32 {
    let (zone_base, cm_base, first) = if BANDS_6_DEGREE.contains(&band) {
        (EPSG_6_DEGREE_ZONE, EPSG_6_DEGREE_CM, *BANDS_6_DEGREE.start())
    } else if BANDS_3_DEGREE.contains(&band) {
        (EPSG_3_DEGREE_ZONE, EPSG_3_DEGREE_CM, *BANDS_3_DEGREE.start())
    } else {
        return 0;
    };

    let offset = (band - first) as u32;
    if has_band {
        zone_base + offset
    } else {
        cm_base + offset
    }
}

/// Nom PROJCS : `CGCS2000_[3_Degree_]GK_` + `Zone_<n>` ou `CM_<cm>E`
pub fn projection_name(band: i64, central_meridian: f64, has_band: bool, standard: bool) -> String {
    let prefix = if BANDS_6_DEGREE.contains(&band) {
        "CGCS2000_GK_"
    } else if BANDS_3_DEGREE.contains(&band) {
        "CGCS2000_3_Degree_GK_"
    } else {
        ""
    };

    if has_band {
        return format!("{prefix}Zone_{band}");
    }

    if standard {
        format!("{prefix}CM_{}E", central_meridian as i64)
    } else {
        format!("{prefix}CM_{central_meridian:.1}E")
    }
}

/// Définition ESRI WKT de la projection
pub fn esri_wkt(name: &str, central_meridian: f64, band: i64, has_band: bool) -> String {
    let false_easting = if has_band {
        band as f64 * BAND_DIVISOR + FALSE_EASTING_BASE
    } else {
        FALSE_EASTING_BASE
    };

    format!(
        "PROJCS[\"{name}\",\
         GEOGCS[\"GCS_China_Geodetic_Coordinate_System_2000\",\
         DATUM[\"D_China_2000\",SPHEROID[\"CGCS2000\",6378137.0,298.257222101]],\
         PRIMEM[\"Greenwich\",0.0],\
         UNIT[\"Degree\",0.0174532925199433]],\
         PROJECTION[\"Gauss_Kruger\"],\
         PARAMETER[\"False_Easting\",{false_easting:.1}],\
         PARAMETER[\"False_Northing\",0.0],\
         PARAMETER[\"Central_Meridian\",{central_meridian:.1}],\
         PARAMETER[\"Scale_Factor\",1.0],\
         PARAMETER[\"Latitude_Of_Origin\",0.0],\
         UNIT[\"Meter\",1.0]]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Parcel, Point};
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn document(name: &str, degree: &str, band: &str, first_y: f64) -> ParsedDocument {
        let mut file_attributes = HashMap::new();
        file_attributes.insert(ATTR_COORDINATE_SYSTEM.to_string(), name.to_string());
        file_attributes.insert(ATTR_DEGREE.to_string(), degree.to_string());
        file_attributes.insert(ATTR_BAND.to_string(), band.to_string());

        ParsedDocument {
            parcels: vec![Parcel {
                attributes: HashMap::new(),
                rings: vec![vec![
                    Point::new(1, 1, 3_500_000.0, first_y),
                    Point::new(2, 1, 3_500_010.0, first_y + 10.0),
                ]],
            }],
            file_attributes,
        }
    }

    #[test]
    fn test_declared_band_confirmed_by_geometry() {
        let doc = document(DATUM_MARKER, "3", "39", 39_500_000.0);
        let cs = build(&doc).unwrap();

        assert_eq!(cs.degree, 3);
        assert_eq!(cs.band, 39);
        assert_relative_eq!(cs.central_meridian, 117.0);
        assert_eq!(cs.epsg, 4527);
        assert!(cs.name.ends_with("Zone_39"));
        assert_eq!(cs.name, "CGCS2000_3_Degree_GK_Zone_39");
        assert!(!cs.is_custom_meridian);
        assert!(cs.wkt.contains("PARAMETER[\"False_Easting\",39500000.0]"));
        assert!(cs.wkt.contains("PARAMETER[\"Central_Meridian\",117.0]"));
        assert_eq!(cs.crs_string(), "EPSG:4527");
    }

    #[test]
    fn test_custom_meridian_from_name() {
        let name = format!("{DATUM_MARKER}(114.3)");
        let doc = document(&name, "3", "38", 38_400_000.0);
        let cs = build(&doc).unwrap();

        assert_relative_eq!(cs.central_meridian, 114.3);
        assert_eq!(cs.epsg, 0);
        assert!(cs.is_custom_meridian);
        assert!(cs.wkt.contains("PARAMETER[\"Central_Meridian\",114.3]"));
        assert_eq!(cs.crs_string(), cs.wkt);
    }

    #[test]
    fn test_geometry_band_wins_and_changes_degree() {
        // Déclaré 3°/39, coordonnées en fuseau 6° n°20
        let doc = document(DATUM_MARKER, "3", "39", 20_500_000.0);
        let cs = build(&doc).unwrap();

        assert_eq!(cs.degree, 6);
        assert_eq!(cs.band, 20);
        assert_relative_eq!(cs.central_meridian, 117.0);
        assert_eq!(cs.epsg, 4498);
        assert_eq!(cs.name, "CGCS2000_GK_Zone_20");
    }

    #[test]
    fn test_no_geometric_band_uses_declared_pair() {
        // Y sans préfixe de fuseau
        let doc = document(DATUM_MARKER, "6", "19", 500_000.0);
        let cs = build(&doc).unwrap();

        assert_eq!(cs.band, 19);
        assert_relative_eq!(cs.central_meridian, 111.0);
        assert_eq!(cs.epsg, 4508);
        assert_eq!(cs.name, "CGCS2000_GK_CM_111E");
        assert!(cs.wkt.contains("PARAMETER[\"False_Easting\",500000.0]"));
    }

    #[test]
    fn test_zero_y_is_skipped_for_band_sample() {
        let mut doc = document(DATUM_MARKER, "3", "39", 39_500_000.0);
        doc.parcels[0].rings[0].insert(0, Point::new(9, 1, 1.0, 0.0));
        assert_eq!(geometric_band(&doc), Some(39));
    }

    #[test]
    fn test_errors() {
        let doc = document("1980西安坐标系", "3", "39", 39_500_000.0);
        assert!(matches!(build(&doc), Err(CrsError::UnsupportedDatum(_))));

        let doc = document("", "3", "39", 39_500_000.0);
        assert_eq!(build(&doc), Err(CrsError::MissingName));

        let doc = document(DATUM_MARKER, "4", "39", 39_500_000.0);
        assert_eq!(build(&doc), Err(CrsError::InvalidDegree("4".to_string())));

        let doc = document(DATUM_MARKER, "3", "x", 39_500_000.0);
        assert_eq!(build(&doc), Err(CrsError::InvalidBand("x".to_string())));

        let doc = document(DATUM_MARKER, "3", "20", 500_000.0);
        assert_eq!(
            build(&doc),
            Err(CrsError::BandOutOfRange {
                degree: 3,
                band: 20,
                expected: "[25,45]"
            })
        );

        let name = format!("{DATUM_MARKER}(150)");
        let doc = document(&name, "3", "39", 39_500_000.0);
        assert_eq!(build(&doc), Err(CrsError::CentralMeridianOutOfRange(150.0)));

        let mut doc = document(DATUM_MARKER, "3", "39", 39_500_000.0);
        doc.parcels.clear();
        assert_eq!(build(&doc), Err(CrsError::NoParcels));
    }

    #[test]
    fn test_custom_central_meridian_parsing() {
        assert_eq!(custom_central_meridian("x(114.3)"), Some(114.3));
        assert_eq!(custom_central_meridian("x(a)(E 120.5)"), Some(120.5));
        assert_eq!(custom_central_meridian("x()"), None);
        assert_eq!(custom_central_meridian("x(abc)"), None);
        assert_eq!(custom_central_meridian("no parens"), None);
    }

    #[test]
    fn test_epsg_families() {
        assert_eq!(epsg_code(13, true), 4491);
        assert_eq!(epsg_code(23, false), 4512);
        assert_eq!(epsg_code(25, true), 4513);
        assert_eq!(epsg_code(45, false), 4554);
        assert_eq!(epsg_code(24, true), 0);
    }

    #[test]
    fn test_projection_name_non_standard_meridian() {
        assert_eq!(
            projection_name(38, 114.3, false, false),
            "CGCS2000_3_Degree_GK_CM_114.3E"
        );
    }
}
