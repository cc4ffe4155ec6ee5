//! Tolérance : normalisation, décimales de rendu et pas de grille

use crate::types::MAX_TOLERANCE;

/// Décimales minimales de rendu WKT
pub const MIN_DECIMAL_PLACES: i32 = 4;
/// Décimales maximales de rendu WKT
pub const MAX_DECIMAL_PLACES: i32 = 6;

/// Exposant maximal de la grille : une ordonnée à préfixe de fuseau
/// (< 1e8) multipliée par `10^10` reste loin de `i64::MAX`
pub const MAX_GRID_DIGITS: i32 = 10;

/// Marge absorbant l'erreur d'arrondi de `log10` (ex. 1e-4 -> 4.000000000000001)
const LOG_EPSILON: f64 = 1e-9;

/// Ramène une tolérance dans `(0, MAX_TOLERANCE]`.
///
/// Valeurs <= 0, > MAX_TOLERANCE ou non finies -> MAX_TOLERANCE.
pub fn normalize_precision(precision: f64) -> f64 {
    if precision.is_finite() && precision > 0.0 && precision <= MAX_TOLERANCE {
        precision
    } else {
        MAX_TOLERANCE
    }
}

/// Parse une tolérance textuelle (attribut `精度`) ; vide ou invalide -> MAX_TOLERANCE
pub fn parse_precision(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return MAX_TOLERANCE;
    }

    fast_float::parse::<f64, _>(s)
        .map(normalize_precision)
        .unwrap_or(MAX_TOLERANCE)
}

/// Nombre de chiffres significatifs après la virgule pour une tolérance
fn precision_digits(precision: f64) -> i32 {
    (-precision.log10() - LOG_EPSILON).ceil() as i32
}

/// Décimales de rendu, bornées à `[4, 6]`
pub fn decimal_places(precision: f64) -> usize {
    let digits = precision_digits(normalize_precision(precision));
    digits.clamp(MIN_DECIMAL_PLACES, MAX_DECIMAL_PLACES) as usize
}

/// Facteur de discrétisation `10^d`, avec `d` au moins celui de MAX_TOLERANCE
/// et au plus `MAX_GRID_DIGITS`
pub fn grid_scale(precision: f64) -> f64 {
    let digits = precision_digits(normalize_precision(precision));
    let min_digits = precision_digits(MAX_TOLERANCE);
    10f64.powi(digits.clamp(min_digits, MAX_GRID_DIGITS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_precision() {
        assert_eq!(normalize_precision(0.00005), 0.00005);
        assert_eq!(normalize_precision(MAX_TOLERANCE), MAX_TOLERANCE);
        assert_eq!(normalize_precision(0.0), MAX_TOLERANCE);
        assert_eq!(normalize_precision(-1.0), MAX_TOLERANCE);
        assert_eq!(normalize_precision(0.01), MAX_TOLERANCE);
        assert_eq!(normalize_precision(f64::NAN), MAX_TOLERANCE);
    }

    #[test]
    fn test_parse_precision() {
        assert_eq!(parse_precision("0.00005"), 0.00005);
        assert_eq!(parse_precision(" 0.00001 "), 0.00001);
        assert_eq!(parse_precision(""), MAX_TOLERANCE);
        assert_eq!(parse_precision("abc"), MAX_TOLERANCE);
        assert_eq!(parse_precision("0.5"), MAX_TOLERANCE);
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places(0.0001), 4);
        assert_eq!(decimal_places(0.00005), 5);
        assert_eq!(decimal_places(0.00001), 5);
        assert_eq!(decimal_places(0.000001), 6);
        assert_eq!(decimal_places(1e-9), 6);
        assert_eq!(decimal_places(0.1), 4);
    }

    #[test]
    fn test_decimal_places_bounds() {
        let mut p = MAX_TOLERANCE;
        while p > 1e-12 {
            let d = decimal_places(p);
            assert!((4..=6).contains(&d), "precision {p} gave {d}");
            p *= 0.37;
        }
    }

    #[test]
    fn test_grid_scale() {
        assert_relative_eq!(grid_scale(0.0001), 1e4);
        assert_relative_eq!(grid_scale(0.00003), 1e5);
        assert_relative_eq!(grid_scale(0.0), 1e4);
        assert_relative_eq!(grid_scale(1e-8), 1e8);
        assert_relative_eq!(grid_scale(1e-10), 1e10);
        assert_relative_eq!(grid_scale(1e-15), 1e10);
        assert_relative_eq!(grid_scale(f64::MIN_POSITIVE), 1e10);
    }
}
