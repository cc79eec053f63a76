//! Inventory scheduler (C7): sorts carpets, chooses a sheet, delegates to
//! the placer per carpet, opens new sheets on failure, and honors priority
//! and color discipline (spec §4.7).
//!
//! Single-threaded cooperative per call (spec §5): the scheduler state,
//! rotation cache and each sheet's spatial index are only ever touched by
//! the thread driving `schedule()` — only the placer's internal rotation
//! search parallelizes.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, warn};
use ordered_float::OrderedFloat;

use crate::compaction::{self, CompactionOptions};
use crate::error::UnplacedReason;
use crate::filler;
use crate::geometry;
use crate::model::{Carpet, PlacedCarpet, PlacedSheet, Priority, SheetDescriptor, UnplacedCarpet};
use crate::placer::{self, PlacementOptions};
use crate::rotation_cache::RotationCache;

/// Cooperative cancellation handle shared with the caller (spec §5).
pub type CancelToken = Arc<AtomicBool>;

pub fn new_cancel_token() -> CancelToken {
    Arc::new(AtomicBool::new(false))
}

fn is_cancelled(token: &Option<CancelToken>) -> bool {
    token.as_ref().map(|t| t.load(AtomicOrdering::Relaxed)).unwrap_or(false)
}

/// `schedule()` options (spec §6). `progress` receives `(percent, stage)`
/// where `stage` is one of `"sorting"`, `"priority1"`, `"compaction"`,
/// `"priority2"`, `"done"` (SPEC_FULL.md §A).
pub struct ScheduleOptions {
    pub min_gap_mm: f64,
    pub tetris_weight: f64,
    pub compaction_iterations: usize,
    pub progress: Option<Box<dyn FnMut(f32, &str)>>,
    pub cancel: Option<CancelToken>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        ScheduleOptions {
            min_gap_mm: 2.0,
            tetris_weight: 1.0,
            compaction_iterations: 3,
            progress: None,
            cancel: None,
        }
    }
}

impl ScheduleOptions {
    fn placement_options(&self) -> PlacementOptions {
        PlacementOptions { min_gap_mm: self.min_gap_mm, tetris_weight: self.tetris_weight }
    }

    fn compaction_options(&self) -> CompactionOptions {
        CompactionOptions { min_gap_mm: self.min_gap_mm, max_iterations: self.compaction_iterations }
    }

    fn report(&mut self, percent: f32, stage: &str) {
        if let Some(cb) = self.progress.as_mut() {
            cb(percent, stage);
        }
    }
}

pub struct ScheduleResult {
    pub sheets: Vec<PlacedSheet>,
    pub unplaced: Vec<UnplacedCarpet>,
}

/// An open sheet being filled during scheduling. Kept separate from
/// [`PlacedSheet`] (the output type) until emit time, when sequence
/// numbers and derived diagnostics are assigned.
pub(crate) struct SheetState {
    pub width_mm: f64,
    pub height_mm: f64,
    pub color: String,
    pub placed: Vec<PlacedCarpet>,
    pub dirty: bool,
}

impl SheetState {
    fn new(descriptor: &SheetDescriptor) -> Self {
        SheetState {
            width_mm: descriptor.width_mm(),
            height_mm: descriptor.height_mm(),
            color: descriptor.color.clone(),
            placed: Vec::new(),
            dirty: false,
        }
    }
}

/// Composite sort key (spec §4.7): larger, more elongated, less compact
/// pieces sort first within a priority class (higher key = placed earlier).
pub(crate) fn sort_key(carpet: &Carpet) -> f64 {
    let b = carpet.bounds();
    let (w, h) = (geometry::width(b), geometry::height(b));
    let area = geometry::area(&carpet.polygon);
    let aspect_ratio = if w.min(h) <= geometry::EPSILON { 1.0 } else { w.max(h) / w.min(h) };
    let bbox_area = w * h;
    let compactness = if bbox_area <= geometry::EPSILON { 1.0 } else { area / bbox_area };
    let perimeter_estimate = 2.0 * (w + h);

    area + (aspect_ratio - 1.0) * area * 0.3 + (1.0 - compactness) * area * 0.2
        + perimeter_estimate * 0.05
}

fn fits_any_descriptor(inventory: &[SheetDescriptor], color: &str, cw: f64, ch: f64) -> bool {
    inventory.iter().any(|d| d.color == color && d.can_hold_bbox(cw, ch))
}

/// `schedule()` (spec §6): the top-level scheduler entry point.
pub fn schedule(
    carpets: Vec<Carpet>,
    inventory: Vec<SheetDescriptor>,
    mut options: ScheduleOptions,
) -> ScheduleResult {
    let mut inventory = inventory;
    let mut unplaced: Vec<UnplacedCarpet> = Vec::new();
    let mut sheets: Vec<SheetState> = Vec::new();
    let mut cache = RotationCache::new();
    let placement_opts = options.placement_options();

    options.report(0.0, "sorting");

    let mut repaired: Vec<Carpet> = Vec::with_capacity(carpets.len());
    for carpet in carpets {
        match geometry::repair(&carpet.polygon) {
            Ok(polygon) => repaired.push(Carpet { polygon, ..carpet }),
            Err(_) => {
                warn!("carpet {} failed geometry repair, skipping", carpet.id);
                unplaced.push(UnplacedCarpet::from_carpet(&carpet, UnplacedReason::InvalidGeometry));
            }
        }
    }

    let (priority1, priority2): (Vec<Carpet>, Vec<Carpet>) =
        repaired.into_iter().partition(|c| c.priority == Priority::First);
    // Largest/most-awkward-to-place carpets first (spec §4.7).
    let priority1: Vec<Carpet> =
        priority1.into_iter().sorted_by_cached_key(|c| Reverse(OrderedFloat(sort_key(c)))).collect();

    let total = priority1.len().max(1) as f32;
    let mut deferred: Vec<Carpet> = Vec::new();

    for (i, carpet) in priority1.into_iter().enumerate() {
        if is_cancelled(&options.cancel) {
            info!("schedule cancelled during priority-1 pass at carpet {}/{}", i, total as usize);
            unplaced.push(UnplacedCarpet::from_carpet(&carpet, UnplacedReason::Cancelled));
            continue;
        }
        options.report(100.0 * i as f32 / total, "priority1");

        place_priority1_carpet(&carpet, &mut sheets, &mut inventory, &placement_opts, &mut cache, &mut unplaced, &mut deferred);
    }

    // Retry deferred carpets once more across all open sheets (spec §4.7).
    let still_unplaced = retry_deferred(deferred, &mut sheets, &placement_opts, &mut cache);
    unplaced.extend(still_unplaced);

    options.report(90.0, "compaction");
    let compaction_opts = options.compaction_options();
    for sheet in sheets.iter_mut() {
        if sheet.dirty {
            compaction::compact(&mut sheet.placed, sheet.width_mm, sheet.height_mm, &compaction_opts);
            sheet.dirty = false;
        }
    }

    options.report(95.0, "priority2");
    if is_cancelled(&options.cancel) {
        for carpet in priority2 {
            unplaced.push(UnplacedCarpet::from_carpet(&carpet, UnplacedReason::Cancelled));
        }
    } else {
        let filler_unplaced =
            filler::fill_priority2(priority2, &mut sheets, &placement_opts, &compaction_opts, &mut cache);
        unplaced.extend(filler_unplaced);
    }

    options.report(100.0, "done");

    let placed_sheets = emit_sheets(sheets);
    debug!(
        "schedule finished: {} sheets, {} unplaced",
        placed_sheets.len(),
        unplaced.len()
    );

    ScheduleResult { sheets: placed_sheets, unplaced }
}

#[allow(clippy::too_many_arguments)]
fn place_priority1_carpet(
    carpet: &Carpet,
    sheets: &mut Vec<SheetState>,
    inventory: &mut [SheetDescriptor],
    opts: &PlacementOptions,
    cache: &mut RotationCache,
    unplaced: &mut Vec<UnplacedCarpet>,
    deferred: &mut Vec<Carpet>,
) {
    // Step 1: try every open sheet of matching color, in insertion order.
    for sheet in sheets.iter_mut().filter(|s| s.color == carpet.color) {
        if let Some(placement) =
            placer::search(carpet, cache, &sheet.placed, sheet.width_mm, sheet.height_mm, opts)
        {
            sheet.placed.push(placement);
            sheet.dirty = true;
            return;
        }
    }

    // Step 2: no open sheet accepted it — open a new one from inventory.
    if !inventory.iter().any(|d| d.color == carpet.color) {
        unplaced.push(UnplacedCarpet::from_carpet(carpet, UnplacedReason::NoInventoryForColor));
        return;
    }

    let (cw, ch) = {
        let b = carpet.bounds();
        (geometry::width(b), geometry::height(b))
    };

    if !fits_any_descriptor(inventory, &carpet.color, cw, ch) {
        unplaced.push(UnplacedCarpet::from_carpet(carpet, UnplacedReason::OversizeForColor));
        return;
    }

    let descriptor_index = inventory
        .iter()
        .position(|d| d.color == carpet.color && d.count > 0 && d.can_hold_bbox(cw, ch));

    let Some(descriptor_index) = descriptor_index else {
        unplaced.push(UnplacedCarpet::from_carpet(carpet, UnplacedReason::Exhausted));
        return;
    };

    inventory[descriptor_index].count -= 1;
    let mut sheet = SheetState::new(&inventory[descriptor_index]);
    info!(
        "opening sheet #{} ({}x{} {})",
        sheets.len() + 1,
        sheet.width_mm,
        sheet.height_mm,
        sheet.color
    );

    match placer::search(carpet, cache, &sheet.placed, sheet.width_mm, sheet.height_mm, opts) {
        Some(placement) => {
            sheet.placed.push(placement);
            sheet.dirty = true;
            sheets.push(sheet);
        }
        None => {
            // Passed the bbox-fits check against some descriptor but the
            // exact search still failed (concave-shape edge case) — defer
            // and retry later without burning more inventory.
            deferred.push(carpet.clone());
        }
    }
}

fn retry_deferred(
    deferred: Vec<Carpet>,
    sheets: &mut [SheetState],
    opts: &PlacementOptions,
    cache: &mut RotationCache,
) -> Vec<UnplacedCarpet> {
    let mut still_unplaced = Vec::new();
    for carpet in deferred {
        let mut placed_somewhere = false;
        for sheet in sheets.iter_mut().filter(|s| s.color == carpet.color) {
            if let Some(placement) =
                placer::search(&carpet, cache, &sheet.placed, sheet.width_mm, sheet.height_mm, opts)
            {
                sheet.placed.push(placement);
                sheet.dirty = true;
                placed_somewhere = true;
                break;
            }
        }
        if !placed_somewhere {
            still_unplaced.push(UnplacedCarpet::from_carpet(&carpet, UnplacedReason::OversizeForColor));
        }
    }
    still_unplaced
}

pub(crate) fn emit_sheets(sheets: Vec<SheetState>) -> Vec<PlacedSheet> {
    sheets
        .into_iter()
        .enumerate()
        .map(|(i, sheet)| {
            let area_placed: f64 = sheet.placed.iter().map(|p| geometry::area(&p.polygon)).sum();
            let sheet_area = sheet.width_mm * sheet.height_mm;
            let usage_percent = if sheet_area > 0.0 { 100.0 * area_placed / sheet_area } else { 0.0 };

            let mut orders_on_sheet: Vec<String> =
                sheet.placed.iter().map(|p| p.order_id.clone()).collect();
            orders_on_sheet.sort();
            orders_on_sheet.dedup();

            PlacedSheet {
                sheet_number: (i + 1) as u32,
                width_mm: sheet.width_mm,
                height_mm: sheet.height_mm,
                color: sheet.color,
                placed: sheet.placed,
                usage_percent,
                orders_on_sheet,
            }
        })
        .collect()
}
