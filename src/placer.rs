//! Single-sheet placer (C5): search rotations × candidate positions and
//! pick the best placement under the composite score of spec §4.5.
//!
//! The rotation × position reduction runs through `rayon` (licensed by
//! spec §5 as "an embarrassingly parallel reduction returning the argmin")
//! using an ordered `min()` over [`Candidate`], so the result is identical
//! regardless of how the search is scheduled across threads.

use geo::Polygon;
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::collision;
use crate::geometry::{self, Angle};
use crate::model::{Carpet, Obstacle, PlacedCarpet};
use crate::rotation_cache::RotationCache;
use crate::spatial_index::SpatialIndex;

/// Tunable scalar weight on the tetris penalty (spec §4.5, §9: "a single
/// scalar constant"). The sign semantics of the three penalty components
/// must not change even if this is retuned.
pub const K_TETRIS: f64 = 1000.0;

const GRID_MIN_STEP_MM: f64 = 5.0;
const FLOOR_BAND_MM: f64 = 5.0;
const WALL_BAND_MM: f64 = 5.0;

#[derive(Debug, Clone, Copy)]
pub struct PlacementOptions {
    pub min_gap_mm: f64,
    pub tetris_weight: f64,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        PlacementOptions { min_gap_mm: 2.0, tetris_weight: 1.0 }
    }
}

/// Public single-sheet placement API (spec §6). Builds a throwaway
/// rotation cache; batch callers (the scheduler) should call [`search`]
/// directly with a cache shared across the whole scheduling pass.
pub fn place_on_sheet(
    carpet: &Carpet,
    existing: &[PlacedCarpet],
    sheet_w_mm: f64,
    sheet_h_mm: f64,
    min_gap_mm: f64,
) -> Option<PlacedCarpet> {
    let mut cache = RotationCache::new();
    let opts = PlacementOptions { min_gap_mm, ..PlacementOptions::default() };
    search(carpet, &mut cache, existing, sheet_w_mm, sheet_h_mm, &opts)
}

/// The one decision procedure behind both `place_on_sheet` and the
/// scheduler's internal fast path, generic over the obstacle
/// representation (spec §9 Open Question, resolved — see SPEC_FULL.md §C.1).
pub fn search<O: Obstacle + Sync>(
    carpet: &Carpet,
    cache: &mut RotationCache,
    existing: &[O],
    sheet_w_mm: f64,
    sheet_h_mm: f64,
    opts: &PlacementOptions,
) -> Option<PlacedCarpet> {
    let index = SpatialIndex::build(existing);

    // Skip any rotation whose bbox cannot possibly fit the sheet; if none
    // remain, the carpet cannot be placed here in any orientation (§4.5
    // edge-case policy).
    let rotations: Vec<(Angle, Polygon<f64>)> = Angle::ALL
        .into_iter()
        .map(|angle| (angle, cache.get_or_rotate(carpet, angle)))
        .filter(|(_, poly)| {
            let b = geometry::bounds(poly);
            geometry::width(b) <= sheet_w_mm + geometry::EPSILON
                && geometry::height(b) <= sheet_h_mm + geometry::EPSILON
        })
        .collect();

    if rotations.is_empty() {
        return None;
    }

    let best = rotations
        .par_iter()
        .filter_map(|(angle, rotated)| {
            best_for_rotation(*angle, rotated, existing, &index, sheet_w_mm, sheet_h_mm, opts)
        })
        .min();

    best.map(|candidate| PlacedCarpet {
        carpet_id: carpet.id,
        priority: carpet.priority,
        color: carpet.color.clone(),
        order_id: carpet.order_id.clone(),
        filename: carpet.filename.clone(),
        x_offset: *candidate.x,
        y_offset: *candidate.y,
        angle: candidate.angle,
        polygon: candidate.polygon,
    })
}

#[derive(Debug, Clone)]
struct Candidate {
    total: OrderedFloat<f64>,
    y: OrderedFloat<f64>,
    x: OrderedFloat<f64>,
    angle_index: usize,
    angle: Angle,
    polygon: Polygon<f64>,
}

impl Candidate {
    fn key(&self) -> (OrderedFloat<f64>, OrderedFloat<f64>, OrderedFloat<f64>, usize) {
        (self.total, self.y, self.x, self.angle_index)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

fn best_for_rotation<O: Obstacle>(
    angle: Angle,
    rotated: &Polygon<f64>,
    existing: &[O],
    index: &SpatialIndex,
    sheet_w: f64,
    sheet_h: f64,
    opts: &PlacementOptions,
) -> Option<Candidate> {
    let rbounds = geometry::bounds(rotated);
    let (pw, ph) = (geometry::width(rbounds), geometry::height(rbounds));

    let mut best: Option<Candidate> = None;
    for (x, y) in candidate_positions(pw, ph, existing, sheet_w, sheet_h, opts.min_gap_mm) {
        let candidate_poly = geometry::translate(rotated, x - rbounds.0, y - rbounds.1);
        let cb = geometry::bounds(&candidate_poly);
        if cb.0 < -geometry::EPSILON
            || cb.1 < -geometry::EPSILON
            || cb.2 > sheet_w + geometry::EPSILON
            || cb.3 > sheet_h + geometry::EPSILON
        {
            continue;
        }
        if collision::collides(&candidate_poly, existing, index, opts.min_gap_mm) {
            continue;
        }

        let cost = score(x, y, pw, ph, &candidate_poly, existing, sheet_h, opts);
        let candidate = Candidate {
            total: OrderedFloat(cost),
            y: OrderedFloat(y),
            x: OrderedFloat(x),
            angle_index: angle.index(),
            angle,
            polygon: candidate_poly,
        };
        best = Some(match best {
            None => candidate,
            Some(b) => std::cmp::min(b, candidate),
        });
    }
    best
}

/// Union of (a) the origin, (b) "to the right of"/"above" every already
/// placed obstacle, and (c) a regular grid sweep — de-duplicated (spec §4.5).
fn candidate_positions<O: Obstacle>(
    pw: f64,
    ph: f64,
    existing: &[O],
    sheet_w: f64,
    sheet_h: f64,
    gap: f64,
) -> Vec<(f64, f64)> {
    let mut seen = std::collections::HashSet::new();
    let mut positions = Vec::new();
    let mut push = |x: f64, y: f64| {
        if x < -geometry::EPSILON || y < -geometry::EPSILON {
            return;
        }
        if x + pw > sheet_w + geometry::EPSILON || y + ph > sheet_h + geometry::EPSILON {
            return;
        }
        let key = ((x * 100.0).round() as i64, (y * 100.0).round() as i64);
        if seen.insert(key) {
            positions.push((x, y));
        }
    };

    push(0.0, 0.0);

    for o in existing {
        let (omin_x, omin_y, omax_x, omax_y) = o.bounds();
        push(omax_x + gap, omin_y);
        push(omin_x, omax_y + gap);
    }

    let step = (sheet_w.min(sheet_h) / 3.0).max(GRID_MIN_STEP_MM);
    let max_x = sheet_w - pw;
    let max_y = sheet_h - ph;
    if max_x >= -geometry::EPSILON && max_y >= -geometry::EPSILON {
        let mut gy = 0.0;
        while gy <= max_y + geometry::EPSILON {
            let mut gx = 0.0;
            while gx <= max_x + geometry::EPSILON {
                push(gx.min(max_x.max(0.0)), gy.min(max_y.max(0.0)));
                gx += step;
            }
            gy += step;
        }
    }

    positions
}

#[allow(clippy::too_many_arguments)]
fn score<O: Obstacle>(
    x: f64,
    y: f64,
    pw: f64,
    ph: f64,
    candidate_poly: &Polygon<f64>,
    existing: &[O],
    sheet_h: f64,
    opts: &PlacementOptions,
) -> f64 {
    let position_cost = y * 10.0 + x * 100.0;

    let aspect_ratio = if pw.min(ph) <= geometry::EPSILON {
        1.0
    } else {
        pw.max(ph) / pw.min(ph)
    };
    let mut shape_bonus = 0.0;
    if aspect_ratio > 1.05 {
        shape_bonus -= ((aspect_ratio - 1.0) * 2000.0).min(2000.0);
        if y < FLOOR_BAND_MM {
            shape_bonus -= 3000.0;
        }
        if x < WALL_BAND_MM {
            shape_bonus -= 2000.0;
        }
    }

    let bbox_fill = bbox_fill_ratio(geometry::area(candidate_poly), pw, ph);
    let below = below_accessibility(x, y, pw, existing);
    let top = top_space_fraction(y + ph, sheet_h);
    let tetris_penalty = 0.3 * (1.0 - bbox_fill) + 0.4 * (1.0 - below) + 0.3 * (1.0 - top);

    position_cost + shape_bonus + tetris_penalty * K_TETRIS * opts.tetris_weight
}

fn bbox_fill_ratio(area: f64, pw: f64, ph: f64) -> f64 {
    let bbox_area = pw * ph;
    if bbox_area <= geometry::EPSILON {
        1.0
    } else {
        (area / bbox_area).clamp(0.0, 1.0)
    }
}

/// Fraction of the column directly beneath the candidate that remains free
/// — low values mean the placement would trap inaccessible space under it.
fn below_accessibility<O: Obstacle>(x: f64, y: f64, pw: f64, existing: &[O]) -> f64 {
    if y <= FLOOR_BAND_MM {
        return 1.0;
    }
    let shadow_area = pw * y;
    if shadow_area <= geometry::EPSILON {
        return 1.0;
    }
    let mut covered = 0.0;
    for o in existing {
        let (omin_x, omin_y, omax_x, omax_y) = o.bounds();
        let ox = (omax_x.min(x + pw) - omin_x.max(x)).max(0.0);
        let oy = (omax_y.min(y) - omin_y.max(0.0)).max(0.0);
        covered += ox * oy;
    }
    (1.0 - (covered / shadow_area)).clamp(0.0, 1.0)
}

/// Fraction of the sheet's height left free above the candidate's top edge.
fn top_space_fraction(top_y: f64, sheet_h: f64) -> f64 {
    if sheet_h <= geometry::EPSILON {
        0.0
    } else {
        ((sheet_h - top_y) / sheet_h).clamp(0.0, 1.0)
    }
}
