//! Spatial index (C3): a bulk-loaded R-tree over the bounding boxes of
//! currently placed polygons, rebuilt after each successful placement.
//! Grounded on the teacher's `SpatialIndex`/`Rectangle` pair and on
//! `Ben1152000-openmander-core`'s `BoundingBox { idx, bbox }` + `rstar`
//! pattern (see DESIGN.md) — generalized here to return the slot index of
//! every intersecting box rather than a single bool, since the collision
//! oracle (C4) needs to inspect each candidate obstacle in turn.

use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::Bounds;
use crate::model::Obstacle;

#[derive(Debug, Clone, Copy)]
struct IndexedBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    slot: usize,
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Bulk-loaded R-tree keyed by the position of each obstacle in the slice
/// it was built from, so callers can map a hit back to the original object.
pub struct SpatialIndex {
    tree: RTree<IndexedBox>,
}

impl SpatialIndex {
    /// Build an index over `obstacles`. Rebuild whenever the placed set on
    /// a sheet changes — cheap for the small per-sheet `N` this engine
    /// expects (spec §4.3).
    pub fn build<O: Obstacle>(obstacles: &[O]) -> Self {
        let boxes = obstacles
            .iter()
            .enumerate()
            .map(|(slot, o)| {
                let (min_x, min_y, max_x, max_y) = o.bounds();
                IndexedBox { min_x, min_y, max_x, max_y, slot }
            })
            .collect();
        SpatialIndex { tree: RTree::bulk_load(boxes) }
    }

    pub fn empty() -> Self {
        SpatialIndex { tree: RTree::new() }
    }

    /// Slot indices (into the slice the index was built from) of every
    /// obstacle whose bbox intersects `bbox`.
    pub fn query(&self, bbox: Bounds) -> impl Iterator<Item = usize> + '_ {
        let envelope = AABB::from_corners([bbox.0, bbox.1], [bbox.2, bbox.3]);
        self.tree.locate_in_envelope_intersecting(&envelope).map(|b| b.slot)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
