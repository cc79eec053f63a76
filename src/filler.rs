//! Priority-2 filler (C8): a second, lower-priority pass that tucks smaller
//! carpets into whatever void priority-1 scheduling left behind. Never opens
//! a sheet and never consumes inventory (spec §4.8).

use std::cmp::Reverse;

use itertools::Itertools;
use log::debug;
use ordered_float::OrderedFloat;

use crate::compaction::{self, CompactionOptions};
use crate::error::UnplacedReason;
use crate::model::{Carpet, UnplacedCarpet};
use crate::placer::{self, PlacementOptions};
use crate::rotation_cache::RotationCache;
use crate::scheduler::SheetState;

/// Places as many `priority2` carpets as will fit on the sheets already
/// opened by the priority-1 pass, sorted by the same composite key
/// (largest first) so big fillers claim voids before small ones fragment
/// them. Any sheet a filler lands on is marked dirty for a final
/// compaction pass.
pub fn fill_priority2(
    priority2: Vec<Carpet>,
    sheets: &mut [SheetState],
    placement_opts: &PlacementOptions,
    compaction_opts: &CompactionOptions,
    cache: &mut RotationCache,
) -> Vec<UnplacedCarpet> {
    let priority2: Vec<Carpet> = priority2
        .into_iter()
        .sorted_by_cached_key(|c| Reverse(OrderedFloat(crate::scheduler::sort_key(c))))
        .collect();

    let mut unplaced = Vec::new();

    if sheets.is_empty() {
        debug!("priority-2 pass skipped: no open sheets");
    }

    // Whether no sheet is open at all, or some are open but none match this
    // carpet's color, or a matching sheet is open but has no room left — all
    // three collapse to the same outcome for a filler that never opens a
    // sheet: there is no void of this color to put the carpet in.
    'carpet: for carpet in priority2 {
        for sheet in sheets.iter_mut().filter(|s| s.color == carpet.color) {
            if let Some(placement) =
                placer::search(&carpet, cache, &sheet.placed, sheet.width_mm, sheet.height_mm, placement_opts)
            {
                sheet.placed.push(placement);
                sheet.dirty = true;
                continue 'carpet;
            }
        }
        unplaced.push(UnplacedCarpet::from_carpet(&carpet, UnplacedReason::NoVoidForColor));
    }

    // Re-compact any sheet a filler landed on, so a following filler sees
    // the tightest possible void.
    for sheet in sheets.iter_mut() {
        if sheet.dirty {
            compaction::compact(&mut sheet.placed, sheet.width_mm, sheet.height_mm, compaction_opts);
        }
    }

    unplaced
}
