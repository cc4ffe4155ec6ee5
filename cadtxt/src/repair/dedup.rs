//! Dédoublonnage des points sur grille (8-voisinage)

use std::collections::HashSet;

use crate::types::Point;

/// Case de grille (coordonnées discrétisées)
type Cell = (i64, i64);

const NEIGHBOURS: [(i64, i64); 9] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 0),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Borne des coordonnées discrétisées, avec de la marge pour le voisinage
const CELL_LIMIT: f64 = (1u64 << 62) as f64;

#[inline]
fn discretize(value: f64, scale: f64) -> Option<i64> {
    let scaled = (value * scale).round();
    (scaled.is_finite() && scaled.abs() < CELL_LIMIT).then_some(scaled as i64)
}

#[inline]
fn cell(point: &Point, scale: f64) -> Option<Cell> {
    Some((discretize(point.x, scale)?, discretize(point.y, scale)?))
}

/// Supprime les points dont la case, ou une case voisine, est déjà occupée
/// par un point conservé. Le premier point rencontré gagne.
///
/// Un point hors de la plage représentable sur la grille est conservé tel
/// quel, sans occuper de case.
pub fn dedup_ring(ring: &[Point], scale: f64) -> Vec<Point> {
    let mut occupied: HashSet<Cell> = HashSet::with_capacity(ring.len());
    let mut kept = Vec::with_capacity(ring.len());

    for point in ring {
        let Some((cx, cy)) = cell(point, scale) else {
            kept.push(*point);
            continue;
        };
        let taken = NEIGHBOURS
            .iter()
            .any(|(dx, dy)| occupied.contains(&(cx + dx, cy + dy)));

        if taken {
            continue;
        }

        occupied.insert((cx, cy));
        kept.push(*point);
    }

    kept
}
