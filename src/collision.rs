//! Collision oracle (C4): `collides(candidate, obstacles, index, min_gap)`.
//! Pure and side-effect free — it never mutates the index (spec §4.4).

use geo::Polygon;

use crate::geometry::{self, Bounds};
use crate::model::Obstacle;
use crate::spatial_index::SpatialIndex;

/// True iff any obstacle lies within `min_gap` of `candidate`.
///
/// 1. Expand `candidate`'s bounds by `min_gap` and query the index —
///    obstacles not returned cannot collide.
/// 2. For each returned obstacle, reject on an axis-separated bbox gap
///    before falling back to the exact polygon distance.
pub fn collides<O: Obstacle>(
    candidate: &Polygon<f64>,
    obstacles: &[O],
    index: &SpatialIndex,
    min_gap: f64,
) -> bool {
    let cbounds = geometry::bounds(candidate);
    let expanded = (
        cbounds.0 - min_gap,
        cbounds.1 - min_gap,
        cbounds.2 + min_gap,
        cbounds.3 + min_gap,
    );

    for slot in index.query(expanded) {
        let obstacle = &obstacles[slot];
        let obounds = obstacle.bounds();

        if bbox_gap(cbounds, obounds) > min_gap {
            continue;
        }

        let d = geometry::distance(candidate, obstacle.polygon());
        if d < min_gap - geometry::EPSILON {
            return true;
        }
    }
    false
}

/// Lower bound on the true distance between two axis-aligned boxes: the
/// Euclidean norm of the per-axis separations (0 where the boxes overlap
/// on that axis). Always `<=` the true polygon distance, so `> min_gap`
/// here is a sound early reject.
fn bbox_gap(a: Bounds, b: Bounds) -> f64 {
    let dx = (a.0 - b.2).max(b.0 - a.2).max(0.0);
    let dy = (a.1 - b.3).max(b.1 - a.3).max(0.0);
    (dx * dx + dy * dy).sqrt()
}
