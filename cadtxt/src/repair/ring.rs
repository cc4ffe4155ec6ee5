//! Fermeture et ordonnancement des anneaux

use crate::types::Point;

/// Égalité de deux points à la tolérance près, sur chaque axe
#[inline]
pub fn points_equal(a: &Point, b: &Point, tolerance: f64) -> bool {
    (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance
}

/// Le dernier point referme l'anneau : même numéro et même position que le
/// premier. Un point voisin portant un autre numéro est un sommet distinct.
#[inline]
pub fn is_closing_point(first: &Point, last: &Point, tolerance: f64) -> bool {
    first.id == last.id && points_equal(first, last, tolerance)
}

/// Ferme l'anneau et trie ses points par numéro.
///
/// Avec `auto_close` (et plus d'un point) : les points de fermeture en fin sont
/// retirés, le corps est trié (tri stable par `id`) puis une copie du premier
/// point trié est ajoutée en fin. Aucun sommet d'un autre numéro n'est
/// supprimé. Sans `auto_close`, tous les points sont triés.
pub fn close_and_order(ring: &mut Vec<Point>, tolerance: f64, auto_close: bool) {
    if !auto_close || ring.len() <= 1 {
        ring.sort_by_key(|p| p.id);
        return;
    }

    while ring.len() > 1 && is_closing_point(&ring[0], &ring[ring.len() - 1], tolerance) {
        ring.pop();
    }
    if ring.len() <= 1 {
        return;
    }

    ring.sort_by_key(|p| p.id);

    if let Some(&first) = ring.first() {
        ring.push(first);
    }
}

/// L'anneau est fermé au sens du rendu WKT (même numéro aux deux bouts)
pub fn is_closed(ring: &[Point]) -> bool {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => first.id == last.id,
        _ => false,
    }
}
