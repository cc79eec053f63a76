//! Data model (spec §3). Identity for `Carpet`/`PlacedCarpet`/`UnplacedCarpet`
//! is by `id` alone — geometry is not a participant in equality or hashing,
//! mirroring `carpet.py`'s `@dataclass(eq=False)` + manual `__eq__`/`__hash__`
//! (see DESIGN.md and SPEC_FULL.md §B).

use std::hash::{Hash, Hasher};

use geo::Polygon;

use crate::error::UnplacedReason;
use crate::geometry::{self, Angle, Bounds};

pub type CarpetId = u64;

/// Scheduling class. Priority-2 carpets may only fill voids left by
/// priority-1 scheduling and never cause a new sheet to open (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    First,
    Second,
}

impl TryFrom<u8> for Priority {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::First),
            2 => Ok(Priority::Second),
            _ => Err(()),
        }
    }
}

/// Caller-owned id source (spec §9: "a caller-owned id generator passed at
/// construction so that repeatability tests do not depend on global
/// state"), replacing the Python source's class-level mutable counter.
#[derive(Debug, Default, Clone)]
pub struct CarpetIdGenerator {
    next: CarpetId,
}

impl CarpetIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> CarpetId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// An input polygon with metadata. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Carpet {
    pub id: CarpetId,
    pub polygon: Polygon<f64>,
    pub color: String,
    pub order_id: String,
    pub priority: Priority,
    pub filename: String,
}

impl Carpet {
    pub fn new(
        id_gen: &mut CarpetIdGenerator,
        polygon: Polygon<f64>,
        color: impl Into<String>,
        order_id: impl Into<String>,
        priority: Priority,
        filename: impl Into<String>,
    ) -> Self {
        Carpet {
            id: id_gen.next_id(),
            polygon,
            color: color.into(),
            order_id: order_id.into(),
            priority,
            filename: filename.into(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        geometry::bounds(&self.polygon)
    }
}

impl PartialEq for Carpet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Carpet {}
impl Hash for Carpet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A carpet plus its placement. `polygon` is the materialized, authoritative
/// geometry (rotated about the carpet's own centroid, then translated); the
/// offsets are diagnostic only (spec §3 invariant).
#[derive(Debug, Clone)]
pub struct PlacedCarpet {
    pub carpet_id: CarpetId,
    pub priority: Priority,
    pub color: String,
    pub order_id: String,
    pub filename: String,
    pub x_offset: f64,
    pub y_offset: f64,
    pub angle: Angle,
    pub polygon: Polygon<f64>,
}

impl PlacedCarpet {
    pub fn bounds(&self) -> Bounds {
        geometry::bounds(&self.polygon)
    }
}

impl PartialEq for PlacedCarpet {
    fn eq(&self, other: &Self) -> bool {
        self.carpet_id == other.carpet_id
    }
}
impl Eq for PlacedCarpet {}
impl Hash for PlacedCarpet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.carpet_id.hash(state);
    }
}

/// A carpet that did not make it onto any sheet, with the reason (spec §7).
#[derive(Debug, Clone)]
pub struct UnplacedCarpet {
    pub carpet_id: CarpetId,
    pub priority: Priority,
    pub color: String,
    pub order_id: String,
    pub filename: String,
    pub polygon: Polygon<f64>,
    pub reason: UnplacedReason,
}

impl UnplacedCarpet {
    pub fn from_carpet(carpet: &Carpet, reason: UnplacedReason) -> Self {
        UnplacedCarpet {
            carpet_id: carpet.id,
            priority: carpet.priority,
            color: carpet.color.clone(),
            order_id: carpet.order_id.clone(),
            filename: carpet.filename.clone(),
            polygon: carpet.polygon.clone(),
            reason,
        }
    }
}

impl PartialEq for UnplacedCarpet {
    fn eq(&self, other: &Self) -> bool {
        self.carpet_id == other.carpet_id
    }
}
impl Eq for UnplacedCarpet {}
impl Hash for UnplacedCarpet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.carpet_id.hash(state);
    }
}

/// Rectangular sheet inventory entry. Internally everything operates in mm;
/// `width_cm`/`height_cm` name the unit explicitly so adapters doing the
/// ×10 conversion (spec §6) cannot accidentally skip it.
#[derive(Debug, Clone)]
pub struct SheetDescriptor {
    pub width_cm: f64,
    pub height_cm: f64,
    pub color: String,
    pub count: u32,
}

impl SheetDescriptor {
    pub fn width_mm(&self) -> f64 {
        self.width_cm * 10.0
    }

    pub fn height_mm(&self) -> f64 {
        self.height_cm * 10.0
    }

    /// True if a carpet with bounding-box dimensions `(cw, ch)` mm could fit
    /// this sheet in at least one of the four cardinal rotations (0/180
    /// share a bbox, as do 90/270 — so only the swapped case needs checking).
    pub fn can_hold_bbox(&self, cw: f64, ch: f64) -> bool {
        let (w, h) = (self.width_mm(), self.height_mm());
        (cw <= w + geometry::EPSILON && ch <= h + geometry::EPSILON)
            || (ch <= w + geometry::EPSILON && cw <= h + geometry::EPSILON)
    }
}

/// The sheet descriptor chosen, its placed carpets (insertion order
/// preserved) and derived diagnostics (spec §3, SPEC_FULL §B).
#[derive(Debug, Clone)]
pub struct PlacedSheet {
    pub sheet_number: u32,
    pub width_mm: f64,
    pub height_mm: f64,
    pub color: String,
    pub placed: Vec<PlacedCarpet>,
    pub usage_percent: f64,
    pub orders_on_sheet: Vec<String>,
}

impl PlacedSheet {
    pub fn area_mm2(&self) -> f64 {
        self.width_mm * self.height_mm
    }
}

/// Duck-typed `placed` parameter unification (spec §9): anything the
/// placer/compactor treats as an obstacle exposes its materialized polygon
/// and bounds through this trait, so the same generic code serves both the
/// raw-`Polygon` call path and the `PlacedCarpet` call path.
pub trait Obstacle {
    fn polygon(&self) -> &Polygon<f64>;

    fn bounds(&self) -> Bounds {
        geometry::bounds(self.polygon())
    }
}

impl Obstacle for Polygon<f64> {
    fn polygon(&self) -> &Polygon<f64> {
        self
    }
}

impl Obstacle for PlacedCarpet {
    fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_polygon;

    #[test]
    fn carpet_equality_is_id_only() {
        let mut gen = CarpetIdGenerator::new();
        let a = Carpet::new(&mut gen, rect_polygon(10.0, 10.0), "black", "o1", Priority::First, "a.dxf");
        let mut gen2 = CarpetIdGenerator::new();
        let b = Carpet::new(&mut gen2, rect_polygon(999.0, 999.0), "gray", "o2", Priority::Second, "b.dxf");
        // Same first id from independent generators, different geometry/metadata.
        assert_eq!(a, b);
    }

    #[test]
    fn id_generator_is_monotonic_and_not_global() {
        let mut gen_a = CarpetIdGenerator::new();
        let mut gen_b = CarpetIdGenerator::new();
        let first_a = gen_a.next_id();
        let first_b = gen_b.next_id();
        assert_eq!(first_a, first_b);
        assert_eq!(gen_a.next_id(), first_a + 1);
    }

    #[test]
    fn sheet_can_hold_bbox_accounts_for_rotation() {
        let sheet = SheetDescriptor {
            width_cm: 140.0,
            height_cm: 200.0,
            color: "black".into(),
            count: 1,
        };
        assert!(sheet.can_hold_bbox(1300.0, 1900.0));
        // Swapped dims still fit via a 90-degree rotation.
        assert!(sheet.can_hold_bbox(1900.0, 1300.0));
        assert!(!sheet.can_hold_bbox(3000.0, 3000.0));
    }
}
