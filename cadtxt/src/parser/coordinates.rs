//! Lignes de la section `[地块坐标]` : en-têtes de parcelle et points

use std::collections::{BTreeMap, HashMap};

use crate::error::SyntaxKind;
use crate::types::{Parcel, Point, PARCEL_ATTRIBUTE_KEYS};

/// Suffixe d'une ligne d'en-tête de parcelle
pub const PARCEL_HEADER_SUFFIX: &str = ",@";

/// Parcelle en cours de lecture : attributs + points groupés par anneau.
///
/// Remplacée à chaque nouvelle ligne `,@` ; aucune correction géométrique
/// n'est faite ici.
#[derive(Debug, Default)]
pub struct ParcelBuilder {
    attributes: HashMap<String, String>,
    rings: BTreeMap<i64, Vec<Point>>,
}

impl ParcelBuilder {
    /// Démarre une parcelle depuis sa ligne d'en-tête
    pub fn from_header(line: &str) -> Self {
        Self {
            attributes: parse_parcel_header(line),
            rings: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, point: Point) {
        self.rings.entry(point.ring_id).or_default().push(point);
    }

    pub fn is_empty(&self) -> bool {
        self.rings.values().all(Vec::is_empty)
    }

    /// Termine la parcelle : anneaux triés par numéro, groupes vides ignorés.
    /// Une parcelle sans aucun point n'est pas émise.
    pub fn finish(self) -> Option<Parcel> {
        if self.is_empty() {
            return None;
        }

        let rings = self
            .rings
            .into_values()
            .filter(|points| !points.is_empty())
            .collect();

        Some(Parcel {
            attributes: self.attributes,
            rings,
        })
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }
}

/// Parse une ligne d'en-tête `...,@` en attributs positionnels.
///
/// Ordre : bp_cnt, area, pid, pname, gtype, sheet, usage, code. Les champs
/// manquants valent "".
pub fn parse_parcel_header(line: &str) -> HashMap<String, String> {
    let core = line
        .strip_suffix(PARCEL_HEADER_SUFFIX)
        .unwrap_or(line)
        .trim();

    let mut fields = core.split(',').map(str::trim);
    let empty = core.is_empty();

    PARCEL_ATTRIBUTE_KEYS
        .iter()
        .map(|&key| {
            let value = if empty { "" } else { fields.next().unwrap_or("") };
            (key.to_string(), value.to_string())
        })
        .collect()
}

/// Parse une ligne de coordonnées `点号,圈号,x,y[,...]`
pub fn parse_point(line: &str) -> Result<Point, SyntaxKind> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 4 {
        return Err(SyntaxKind::TooFewFields {
            found: fields.len(),
        });
    }

    let id = extract_first_int(fields[0]);

    let ring_raw = fields[1].trim();
    let ring_id = ring_raw
        .parse::<i64>()
        .map_err(|_| SyntaxKind::InvalidRingId(ring_raw.to_string()))?;

    let x_raw = fields[2].trim();
    let x = fast_parse_f64(x_raw).ok_or_else(|| SyntaxKind::InvalidX(x_raw.to_string()))?;

    let y_raw = fields[3].trim();
    let y = fast_parse_f64(y_raw).ok_or_else(|| SyntaxKind::InvalidY(y_raw.to_string()))?;

    Ok(Point::new(id, ring_id, x, y))
}

/// Extrait la première suite de chiffres ASCII (0 si aucune ou si elle déborde)
pub fn extract_first_int(s: &str) -> i64 {
    let Some(start) = s.find(|c: char| c.is_ascii_digit()) else {
        return 0;
    };
    let digits = &s[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse().unwrap_or(0)
}

#[inline]
fn fast_parse_f64(s: &str) -> Option<f64> {
    fast_float::parse(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        let point = parse_point("J12,1,3512345.678,39512345.123").unwrap();
        assert_eq!(point.id, 12);
        assert_eq!(point.ring_id, 1);
        assert_eq!(point.x, 3512345.678);
        assert_eq!(point.y, 39512345.123);
    }

    #[test]
    fn test_parse_point_extra_fields_and_spaces() {
        let point = parse_point("3, 2 , 10.5 , 20.25 ,extra,fields").unwrap();
        assert_eq!(point.id, 3);
        assert_eq!(point.ring_id, 2);
        assert_eq!(point.x, 10.5);
        assert_eq!(point.y, 20.25);
    }

    #[test]
    fn test_parse_point_errors() {
        assert_eq!(
            parse_point("J1,1,10.0"),
            Err(SyntaxKind::TooFewFields { found: 3 })
        );
        assert_eq!(
            parse_point("J1,a,10.0,20.0"),
            Err(SyntaxKind::InvalidRingId("a".to_string()))
        );
        assert_eq!(
            parse_point("J1,1,abc,20.0"),
            Err(SyntaxKind::InvalidX("abc".to_string()))
        );
        assert_eq!(
            parse_point("J1,1,10.0,"),
            Err(SyntaxKind::InvalidY(String::new()))
        );
    }

    #[test]
    fn test_extract_first_int() {
        assert_eq!(extract_first_int("J12"), 12);
        assert_eq!(extract_first_int("JZD-007a3"), 7);
        assert_eq!(extract_first_int("42"), 42);
        assert_eq!(extract_first_int("J"), 0);
        assert_eq!(extract_first_int(""), 0);
        assert_eq!(extract_first_int("J99999999999999999999999"), 0);
    }

    #[test]
    fn test_parse_parcel_header_full() {
        let attrs = parse_parcel_header("5,0.1234,P001,Parcel A,面,H-50-1,Residential,C01,@");
        assert_eq!(attrs["bp_cnt"], "5");
        assert_eq!(attrs["area"], "0.1234");
        assert_eq!(attrs["pid"], "P001");
        assert_eq!(attrs["pname"], "Parcel A");
        assert_eq!(attrs["gtype"], "面");
        assert_eq!(attrs["sheet"], "H-50-1");
        assert_eq!(attrs["usage"], "Residential");
        assert_eq!(attrs["code"], "C01");
    }

    #[test]
    fn test_parse_parcel_header_short_and_empty() {
        let attrs = parse_parcel_header(" 4 , 1.5 ,P2,@");
        assert_eq!(attrs.len(), 8);
        assert_eq!(attrs["bp_cnt"], "4");
        assert_eq!(attrs["pid"], "P2");
        assert_eq!(attrs["pname"], "");
        assert_eq!(attrs["code"], "");

        let attrs = parse_parcel_header(",@");
        assert_eq!(attrs.len(), 8);
        assert!(attrs.values().all(String::is_empty));
    }

    #[test]
    fn test_builder_groups_rings_by_id() {
        let mut builder = ParcelBuilder::from_header("3,1.0,P1,,,,,,@");
        builder.push(Point::new(1, 2, 0.0, 0.0));
        builder.push(Point::new(2, 1, 1.0, 0.0));
        builder.push(Point::new(3, 2, 1.0, 1.0));
        builder.push(Point::new(4, 1, 0.0, 1.0));

        let parcel = builder.finish().unwrap();
        assert_eq!(parcel.rings.len(), 2);
        assert!(parcel.rings[0].iter().all(|p| p.ring_id == 1));
        assert!(parcel.rings[1].iter().all(|p| p.ring_id == 2));
        // L'ordre du fichier est conservé dans chaque anneau
        assert_eq!(parcel.rings[1][0].id, 1);
        assert_eq!(parcel.rings[1][1].id, 3);
    }

    #[test]
    fn test_builder_without_points_is_dropped() {
        let builder = ParcelBuilder::from_header("0,0,P1,@");
        assert!(builder.finish().is_none());
    }
}
