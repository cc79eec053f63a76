//! Irregular-shape nesting engine: given a stream of polygonal carpets and
//! an inventory of rectangular sheets, assigns every carpet a sheet,
//! position and cardinal rotation with no overlaps, maximizing per-sheet
//! utilization and minimizing the number of sheets consumed.
//!
//! The engine is organized bottom-up:
//!
//! - [`geometry`] — polygon primitives: rotate, translate, bounds, distance, repair.
//! - [`rotation_cache`] — memoizes rotated polygons per carpet.
//! - [`spatial_index`] — bulk-loaded R-tree over placed bounding boxes.
//! - [`collision`] — the collision oracle built on the index.
//! - [`placer`] — single-sheet placement search.
//! - [`compaction`] — gravity and horizontal-pull void closing.
//! - [`scheduler`] — multi-sheet inventory scheduling (priority 1).
//! - [`filler`] — priority-2 void filling on already-opened sheets.
//!
//! [`NestEngine`] ties the pipeline together for callers who want to reuse
//! a rotation cache across repeated scheduling calls; [`schedule`] and
//! [`place_on_sheet`] are free functions for one-shot use.

pub mod collision;
pub mod compaction;
pub mod error;
pub mod filler;
pub mod geometry;
pub mod model;
pub mod placer;
pub mod rotation_cache;
pub mod scheduler;
pub mod spatial_index;

#[cfg(feature = "python")]
mod python;

pub use error::{GeometryError, UnplacedReason};
pub use geometry::Angle;
pub use model::{
    Carpet, CarpetId, CarpetIdGenerator, Obstacle, PlacedCarpet, PlacedSheet, Priority,
    SheetDescriptor, UnplacedCarpet,
};
pub use placer::{place_on_sheet, PlacementOptions};
pub use rotation_cache::{CacheStats, RotationCache};
pub use scheduler::{new_cancel_token, schedule, CancelToken, ScheduleOptions, ScheduleResult};

use log::info;

/// Stateful entry point for callers that run many scheduling passes and
/// want a single place to hold the rotation cache between them (e.g. an
/// interactive layout tool re-nesting after the user edits one carpet).
/// Construct once, call `.schedule()` as many times as needed.
pub struct NestEngine {
    cache: RotationCache,
}

impl NestEngine {
    pub fn new() -> Self {
        NestEngine { cache: RotationCache::new() }
    }

    /// Runs the full pipeline: geometry repair, priority-1 scheduling
    /// (placement + compaction per sheet as it fills), then priority-2
    /// filling over whatever sheets priority-1 opened. Clears this
    /// engine's cache afterward since a fresh schedule pass owns its own.
    pub fn schedule(
        &mut self,
        carpets: Vec<Carpet>,
        inventory: Vec<SheetDescriptor>,
        options: ScheduleOptions,
    ) -> ScheduleResult {
        info!("NestEngine::schedule: {} carpets, {} sheet descriptors", carpets.len(), inventory.len());
        let result = scheduler::schedule(carpets, inventory, options);
        self.cache.clear();
        result
    }

    /// Places a single carpet against an already-placed set on one sheet,
    /// reusing this engine's rotation cache across repeated calls (e.g.
    /// interactive nudging in a UI).
    pub fn place_on_sheet(
        &mut self,
        carpet: &Carpet,
        existing: &[PlacedCarpet],
        sheet_w_mm: f64,
        sheet_h_mm: f64,
        opts: &PlacementOptions,
    ) -> Option<PlacedCarpet> {
        placer::search(carpet, &mut self.cache, existing, sheet_w_mm, sheet_h_mm, opts)
    }

    pub fn clear_caches(&mut self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for NestEngine {
    fn default() -> Self {
        Self::new()
    }
}
