//! Python bindings (feature `python`), built only as part of the `cdylib`
//! the ingestion/rendering layer imports. Carries forward the teacher's
//! original low-level grid-search/collision primitives (kept as fast
//! bbox-only helpers a caller can use ahead of the full engine) and adds
//! bindings for the engine's own `schedule`/`place_on_sheet` entry points.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

use crate::geometry;
use crate::model::{Carpet, CarpetIdGenerator, Priority, SheetDescriptor};
use crate::scheduler::{self, ScheduleOptions};

/// Axis-aligned box used by the bbox-only fast paths below. These never
/// touch polygon geometry and exist purely as a cheap pre-filter a Python
/// caller can run before invoking the full engine on a shortlist.
#[derive(Debug, Clone, Copy)]
struct Rectangle {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Rectangle {
    fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Rectangle { min_x, min_y, max_x, max_y }
    }

    fn intersects(&self, other: &Rectangle) -> bool {
        !(self.max_x <= other.min_x
            || other.max_x <= self.min_x
            || self.max_y <= other.min_y
            || other.max_y <= self.min_y)
    }

    fn translate(&self, dx: f64, dy: f64) -> Rectangle {
        Rectangle::new(self.min_x + dx, self.min_y + dy, self.max_x + dx, self.max_y + dy)
    }
}

impl RTreeObject for Rectangle {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Bbox-only grid search, a coarse pre-pass before the real placer runs on
/// a narrowed-down candidate set.
#[pyfunction]
fn fast_grid_search(
    carpet_bounds: (f64, f64, f64, f64),
    placed_bounds: Vec<(f64, f64, f64, f64)>,
    sheet_width: f64,
    sheet_height: f64,
    grid_size: usize,
) -> Option<(f64, f64)> {
    let carpet_rect = Rectangle::new(carpet_bounds.0, carpet_bounds.1, carpet_bounds.2, carpet_bounds.3);
    let carpet_width = carpet_bounds.2 - carpet_bounds.0;
    let carpet_height = carpet_bounds.3 - carpet_bounds.1;

    let obstacles: Vec<Rectangle> = placed_bounds
        .into_iter()
        .map(|(min_x, min_y, max_x, max_y)| Rectangle::new(min_x, min_y, max_x, max_y))
        .collect();

    let x_step = if grid_size > 1 { (sheet_width - carpet_width) / (grid_size as f64 - 1.0) } else { 0.0 };
    let y_step = if grid_size > 1 { (sheet_height - carpet_height) / (grid_size as f64 - 1.0) } else { 0.0 };

    let positions: Vec<(f64, f64)> = (0..grid_size)
        .flat_map(|i| {
            (0..grid_size).map(move |j| {
                let x = if grid_size == 1 { 0.0 } else { i as f64 * x_step };
                let y = if grid_size == 1 { 0.0 } else { j as f64 * y_step };
                (x, y)
            })
        })
        .collect();

    positions
        .par_iter()
        .find_first(|(x, y)| {
            let test_rect = carpet_rect.translate(x - carpet_bounds.0, y - carpet_bounds.1);
            if test_rect.min_x < 0.0
                || test_rect.min_y < 0.0
                || test_rect.max_x > sheet_width
                || test_rect.max_y > sheet_height
            {
                return false;
            }
            !obstacles.iter().any(|obstacle| test_rect.intersects(obstacle))
        })
        .map(|(x, y)| (*x, *y))
}

/// Bbox collision test against a batch of candidate positions at once.
#[pyfunction]
fn batch_collision_check(
    carpet_bounds: (f64, f64, f64, f64),
    positions: Vec<(f64, f64)>,
    placed_bounds: Vec<(f64, f64, f64, f64)>,
    sheet_width: f64,
    sheet_height: f64,
) -> Vec<bool> {
    let carpet_rect = Rectangle::new(carpet_bounds.0, carpet_bounds.1, carpet_bounds.2, carpet_bounds.3);
    let obstacles: Vec<Rectangle> = placed_bounds
        .into_iter()
        .map(|(min_x, min_y, max_x, max_y)| Rectangle::new(min_x, min_y, max_x, max_y))
        .collect();

    positions
        .par_iter()
        .map(|(x, y)| {
            let test_rect = carpet_rect.translate(x - carpet_bounds.0, y - carpet_bounds.1);
            if test_rect.min_x < 0.0
                || test_rect.min_y < 0.0
                || test_rect.max_x > sheet_width
                || test_rect.max_y > sheet_height
            {
                return false;
            }
            !obstacles.iter().any(|obstacle| test_rect.intersects(obstacle))
        })
        .collect()
}

/// Bulk-loaded bbox index exposed for ad-hoc collision queries from Python.
#[pyclass]
struct SpatialIndex {
    rtree: RTree<Rectangle>,
}

#[pymethods]
impl SpatialIndex {
    #[new]
    fn new(bounds_list: Vec<(f64, f64, f64, f64)>) -> Self {
        let rectangles: Vec<Rectangle> = bounds_list
            .into_iter()
            .map(|(min_x, min_y, max_x, max_y)| Rectangle::new(min_x, min_y, max_x, max_y))
            .collect();
        SpatialIndex { rtree: RTree::bulk_load(rectangles) }
    }

    fn query_collisions(&self, test_bounds: (f64, f64, f64, f64)) -> bool {
        let test_rect = Rectangle::new(test_bounds.0, test_bounds.1, test_bounds.2, test_bounds.3);
        self.rtree
            .locate_in_envelope_intersecting(&AABB::from_corners(
                [test_rect.min_x, test_rect.min_y],
                [test_rect.max_x, test_rect.max_y],
            ))
            .next()
            .is_some()
    }
}

/// `(x_mm, y_mm, width_cm, height_cm, x, y)` polygon ring as a flat list of
/// `(x, y)` tuples in millimetres, carpet color, order id, priority (1 or
/// 2) and source filename — the wire shape the Python ingestion layer
/// already produces for each DXF-derived carpet.
type PyCarpetTuple = (Vec<(f64, f64)>, String, String, u8, String);

fn carpet_from_py(
    id_gen: &mut CarpetIdGenerator,
    tuple: PyCarpetTuple,
) -> PyResult<Carpet> {
    let (ring, color, order_id, priority, filename) = tuple;
    let coords: Vec<geo::Coord<f64>> = ring.into_iter().map(|(x, y)| geo::Coord { x, y }).collect();
    let polygon = geo::Polygon::new(geo::LineString::from(coords), vec![]);
    let polygon = geometry::repair(&polygon)
        .map_err(|e| PyValueError::new_err(format!("invalid carpet polygon for order {order_id}: {e}")))?;
    let priority = Priority::try_from(priority)
        .map_err(|_| PyValueError::new_err(format!("priority must be 1 or 2, got {priority}")))?;
    Ok(Carpet::new(id_gen, polygon, color, order_id, priority, filename))
}

/// `schedule()` exposed to Python. Returns
/// `(sheets, unplaced)` where each sheet is
/// `(sheet_number, width_mm, height_mm, color, usage_percent, placements)`
/// and each placement is `(carpet_index, x_offset, y_offset, angle_degrees)`;
/// `unplaced` is a list of `(carpet_index, reason)`.
#[pyfunction]
#[pyo3(signature = (carpets, inventory, min_gap_mm=2.0))]
fn schedule_py(
    carpets: Vec<PyCarpetTuple>,
    inventory: Vec<(f64, f64, String, u32)>,
    min_gap_mm: f64,
) -> PyResult<(Vec<(u32, f64, f64, String, f64, Vec<(usize, f64, f64, u16)>)>, Vec<(usize, String)>)> {
    let mut id_gen = CarpetIdGenerator::new();
    let mut index_by_id = std::collections::HashMap::new();
    let mut built = Vec::with_capacity(carpets.len());
    for (i, tuple) in carpets.into_iter().enumerate() {
        let carpet = carpet_from_py(&mut id_gen, tuple)?;
        index_by_id.insert(carpet.id, i);
        built.push(carpet);
    }

    let descriptors: Vec<SheetDescriptor> = inventory
        .into_iter()
        .map(|(width_cm, height_cm, color, count)| SheetDescriptor { width_cm, height_cm, color, count })
        .collect();

    let options = ScheduleOptions { min_gap_mm, ..ScheduleOptions::default() };
    let result = scheduler::schedule(built, descriptors, options);

    let sheets = result
        .sheets
        .into_iter()
        .map(|sheet| {
            let placements = sheet
                .placed
                .iter()
                .map(|p| (index_by_id[&p.carpet_id], p.x_offset, p.y_offset, p.angle.as_degrees_u16()))
                .collect();
            (sheet.sheet_number, sheet.width_mm, sheet.height_mm, sheet.color, sheet.usage_percent, placements)
        })
        .collect();

    let unplaced = result
        .unplaced
        .into_iter()
        .map(|u| (index_by_id[&u.carpet_id], u.reason.to_string()))
        .collect();

    Ok((sheets, unplaced))
}

/// `place_on_sheet()` exposed to Python for single-carpet, single-sheet use.
/// Returns `Some((x_offset, y_offset, angle_degrees))` or `None`.
#[pyfunction]
#[pyo3(signature = (carpet, existing, sheet_width_mm, sheet_height_mm, min_gap_mm=2.0))]
fn place_on_sheet_py(
    carpet: PyCarpetTuple,
    existing: Vec<Vec<(f64, f64)>>,
    sheet_width_mm: f64,
    sheet_height_mm: f64,
    min_gap_mm: f64,
) -> PyResult<Option<(f64, f64, u16)>> {
    let mut id_gen = CarpetIdGenerator::new();
    let carpet = carpet_from_py(&mut id_gen, carpet)?;

    let existing_polygons: Vec<geo::Polygon<f64>> = existing
        .into_iter()
        .map(|ring| {
            let coords: Vec<geo::Coord<f64>> = ring.into_iter().map(|(x, y)| geo::Coord { x, y }).collect();
            geo::Polygon::new(geo::LineString::from(coords), vec![])
        })
        .collect();

    let placed = crate::placer::place_on_sheet(
        &carpet,
        &existing_polygons,
        sheet_width_mm,
        sheet_height_mm,
        min_gap_mm,
    );

    Ok(placed.map(|p| (p.x_offset, p.y_offset, p.angle.as_degrees_u16())))
}

#[pymodule]
fn eva_nest(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(fast_grid_search, m)?)?;
    m.add_function(wrap_pyfunction!(batch_collision_check, m)?)?;
    m.add_function(wrap_pyfunction!(schedule_py, m)?)?;
    m.add_function(wrap_pyfunction!(place_on_sheet_py, m)?)?;
    m.add_class::<SpatialIndex>()?;
    Ok(())
}
