//! Rotation cache (C2): memoizes a rotated polygon per `(carpet_id, angle)`.
//!
//! Keyed by carpet id deliberately — identical geometry on different
//! carpets must not share an entry, because diagnostic trails downstream
//! rely on object identity per carpet (spec §4.2).

use std::collections::HashMap;

use geo::Polygon;

use crate::geometry::{self, Angle};
use crate::model::{Carpet, CarpetId};

/// `{cached_carpets, cached_rotations}` as returned by [`RotationCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub cached_carpets: usize,
    pub cached_rotations: usize,
}

#[derive(Debug, Default)]
pub struct RotationCache {
    entries: HashMap<(CarpetId, Angle), Polygon<f64>>,
}

impl RotationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the carpet's polygon rotated by `angle`, computing and
    /// caching it if this is the first request for this `(carpet_id, angle)`
    /// pair. `angle == Deg0` always returns the ingest polygon unchanged
    /// without touching the cache.
    pub fn get_or_rotate(&mut self, carpet: &Carpet, angle: Angle) -> Polygon<f64> {
        if angle == Angle::Deg0 {
            return carpet.polygon.clone();
        }
        self.entries
            .entry((carpet.id, angle))
            .or_insert_with(|| geometry::rotate(&carpet.polygon, angle))
            .clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let cached_carpets = self
            .entries
            .keys()
            .map(|(id, _)| *id)
            .collect::<std::collections::HashSet<_>>()
            .len();
        CacheStats {
            cached_carpets,
            cached_rotations: self.entries.len(),
        }
    }
}
