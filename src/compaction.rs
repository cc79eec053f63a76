//! Compaction (C6): alternating gravity (pull toward −Y) and horizontal
//! pull (toward −X) passes that close interior voids after placement.
//!
//! Each pass binary-searches, per carpet, the largest translation that
//! keeps it inside the sheet and collision-free against every *other*
//! placed carpet, then commits it. The combined pass terminates because
//! each half weakly decreases `Σ(min_x + min_y)`, which is bounded below
//! by zero (spec §4.6).

use crate::collision;
use crate::geometry::{self, Bounds};
use crate::model::PlacedCarpet;
use crate::spatial_index::SpatialIndex;

const MOVEMENT_EPSILON_MM: f64 = 0.5;
const BISECTION_STEPS: u32 = 40;

#[derive(Debug, Clone, Copy)]
pub struct CompactionOptions {
    pub min_gap_mm: f64,
    pub max_iterations: usize,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        CompactionOptions { min_gap_mm: 2.0, max_iterations: 3 }
    }
}

/// Alternates gravity and horizontal-pull passes until a full round moves
/// nothing by more than [`MOVEMENT_EPSILON_MM`], or `max_iterations` rounds
/// have run.
pub fn compact(placed: &mut [PlacedCarpet], sheet_w: f64, sheet_h: f64, opts: &CompactionOptions) {
    for round in 0..opts.max_iterations.max(1) {
        let moved_down = gravity_pass(placed, sheet_w, sheet_h, opts.min_gap_mm);
        let moved_left = horizontal_pull_pass(placed, sheet_w, sheet_h, opts.min_gap_mm);
        log::debug!(
            "[compaction] round {round}: gravity_moved={moved_down} pull_moved={moved_left}"
        );
        if !moved_down && !moved_left {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Y,
    X,
}

/// Order placed carpets by `min_y` ascending; for each, find the largest
/// downward shift that stays in-bounds and collision-free. Returns true if
/// any carpet moved more than [`MOVEMENT_EPSILON_MM`].
fn gravity_pass(placed: &mut [PlacedCarpet], sheet_w: f64, sheet_h: f64, min_gap: f64) -> bool {
    let order = order_by(placed, |b| b.1);
    let mut moved_any = false;

    for idx in order {
        let max_shift = placed[idx].bounds().1;
        if max_shift <= MOVEMENT_EPSILON_MM {
            continue;
        }
        let shift = largest_feasible_shift(placed, idx, sheet_w, sheet_h, min_gap, max_shift, Axis::Y);
        if shift > MOVEMENT_EPSILON_MM {
            let poly = placed[idx].polygon.clone();
            placed[idx].polygon = geometry::translate(&poly, 0.0, -shift);
            placed[idx].y_offset -= shift;
            moved_any = true;
        }
    }
    moved_any
}

/// Same algorithm on the x axis, pulling toward `-x`, ordered by `min_x`.
fn horizontal_pull_pass(placed: &mut [PlacedCarpet], sheet_w: f64, sheet_h: f64, min_gap: f64) -> bool {
    let order = order_by(placed, |b| b.0);
    let mut moved_any = false;

    for idx in order {
        let max_shift = placed[idx].bounds().0;
        if max_shift <= MOVEMENT_EPSILON_MM {
            continue;
        }
        let shift = largest_feasible_shift(placed, idx, sheet_w, sheet_h, min_gap, max_shift, Axis::X);
        if shift > MOVEMENT_EPSILON_MM {
            let poly = placed[idx].polygon.clone();
            placed[idx].polygon = geometry::translate(&poly, -shift, 0.0);
            placed[idx].x_offset -= shift;
            moved_any = true;
        }
    }
    moved_any
}

fn order_by(placed: &[PlacedCarpet], key: impl Fn(Bounds) -> f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..placed.len()).collect();
    order.sort_by(|&a, &b| {
        key(placed[a].bounds())
            .partial_cmp(&key(placed[b].bounds()))
            .unwrap()
    });
    order
}

/// Binary search the largest `d` in `[0, max_shift]` such that shifting
/// `placed[idx]` by `d` along `axis` (toward `-x` or `-y`) stays within the
/// sheet and collision-free against every other placed carpet.
fn largest_feasible_shift(
    placed: &[PlacedCarpet],
    idx: usize,
    sheet_w: f64,
    sheet_h: f64,
    min_gap: f64,
    max_shift: f64,
    axis: Axis,
) -> f64 {
    let others: Vec<&PlacedCarpet> = placed
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, p)| p)
        .collect();
    let index = SpatialIndex::build(&others);
    let poly = &placed[idx].polygon;
    let bounds = placed[idx].bounds();

    let shifted_bounds = |d: f64| -> Bounds {
        match axis {
            Axis::Y => (bounds.0, bounds.1 - d, bounds.2, bounds.3 - d),
            Axis::X => (bounds.0 - d, bounds.1, bounds.2 - d, bounds.3),
        }
    };

    let feasible = |d: f64| -> bool {
        let b = shifted_bounds(d);
        if b.0 < -geometry::EPSILON || b.1 < -geometry::EPSILON {
            return false;
        }
        if b.2 > sheet_w + geometry::EPSILON || b.3 > sheet_h + geometry::EPSILON {
            return false;
        }
        let candidate = match axis {
            Axis::Y => geometry::translate(poly, 0.0, -d),
            Axis::X => geometry::translate(poly, -d, 0.0),
        };
        !collision::collides(&candidate, &others, &index, min_gap)
    };

    if !feasible(0.0) {
        // Caller's starting placement is itself infeasible against the
        // current set (shouldn't happen given placer invariants, but a
        // zero shift is always safe to report).
        return 0.0;
    }

    let mut lo = 0.0_f64;
    let mut hi = max_shift;
    for _ in 0..BISECTION_STEPS {
        let mid = (lo + hi) / 2.0;
        if feasible(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{rect_polygon, translate};
    use crate::model::{CarpetId, Priority};

    fn placed_at(id: CarpetId, x: f64, y: f64, w: f64, h: f64) -> PlacedCarpet {
        PlacedCarpet {
            carpet_id: id,
            priority: Priority::First,
            color: "black".into(),
            order_id: "o1".into(),
            filename: "a.dxf".into(),
            x_offset: x,
            y_offset: y,
            angle: crate::geometry::Angle::Deg0,
            polygon: translate(&rect_polygon(w, h), x, y),
        }
    }

    #[test]
    fn single_carpet_falls_to_the_floor_and_wall() {
        let mut placed = vec![placed_at(1, 100.0, 400.0, 50.0, 50.0)];
        compact(&mut placed, 1400.0, 2000.0, &CompactionOptions::default());
        let b = geometry::bounds(&placed[0].polygon);
        assert!(b.1.abs() < 1e-3);
        assert!(b.0.abs() < 1e-3);
    }

    #[test]
    fn gravity_respects_a_carpet_already_on_the_floor() {
        let mut placed = vec![
            placed_at(1, 0.0, 0.0, 100.0, 100.0),
            placed_at(2, 0.0, 500.0, 100.0, 100.0),
        ];
        compact(&mut placed, 1400.0, 2000.0, &CompactionOptions::default());
        let top = geometry::bounds(&placed[1].polygon);
        // Second carpet should now rest just above the first, not overlap it.
        assert!(top.1 >= 100.0 - 1e-6);
        assert!(geometry::distance(&placed[0].polygon, &placed[1].polygon) >= 2.0 - 1e-3);
    }

    #[test]
    fn compaction_closes_a_400mm_vertical_gap() {
        // S6: floor carpet's top at y=100, next carpet starts at y=500 (400mm gap).
        let mut placed = vec![
            placed_at(1, 100.0, 0.0, 100.0, 100.0),
            placed_at(2, 100.0, 500.0, 100.0, 100.0),
        ];
        compact(&mut placed, 1400.0, 2000.0, &CompactionOptions::default());
        let a = geometry::bounds(&placed[0].polygon);
        let b = geometry::bounds(&placed[1].polygon);
        assert!(b.1 - a.3 < 5.0);
    }

    #[test]
    fn re_running_compaction_is_a_near_fixed_point() {
        let mut placed = vec![
            placed_at(1, 50.0, 300.0, 100.0, 100.0),
            placed_at(2, 400.0, 50.0, 80.0, 80.0),
        ];
        let opts = CompactionOptions::default();
        compact(&mut placed, 1400.0, 2000.0, &opts);
        let before: Vec<Bounds> = placed.iter().map(|p| geometry::bounds(&p.polygon)).collect();
        compact(&mut placed, 1400.0, 2000.0, &opts);
        let after: Vec<Bounds> = placed.iter().map(|p| geometry::bounds(&p.polygon)).collect();
        for (b, a) in before.iter().zip(after.iter()) {
            assert!((b.0 - a.0).abs() < MOVEMENT_EPSILON_MM);
            assert!((b.1 - a.1).abs() < MOVEMENT_EPSILON_MM);
        }
    }
}
