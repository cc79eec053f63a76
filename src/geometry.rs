//! Polygon primitives (C1): rotation, translation, bounds, area, intersection,
//! distance and zero-width-buffer repair. Everything here operates in
//! millimetres and treats two coordinates within [`EPSILON`] as equal.

use geo::{
    AffineOps, AffineTransform, Area, BooleanOps, BoundingRect, Centroid, Coord, Intersects,
    LineString, MultiPolygon, Polygon,
};

use crate::error::GeometryError;

/// Coordinates within this distance (mm) are considered equal.
pub const EPSILON: f64 = 1e-6;

/// One of the four cardinal rotations the nesting engine is allowed to try.
/// Ordered 0 < 90 < 180 < 270, matching the tie-break rule of spec §4.5
/// ("smaller rotation index").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Angle {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Angle {
    /// All four rotations in tie-break order.
    pub const ALL: [Angle; 4] = [Angle::Deg0, Angle::Deg90, Angle::Deg180, Angle::Deg270];

    pub fn degrees(self) -> f64 {
        match self {
            Angle::Deg0 => 0.0,
            Angle::Deg90 => 90.0,
            Angle::Deg180 => 180.0,
            Angle::Deg270 => 270.0,
        }
    }

    /// Position in [`Angle::ALL`]; used as the final tie-break key.
    pub fn index(self) -> usize {
        match self {
            Angle::Deg0 => 0,
            Angle::Deg90 => 1,
            Angle::Deg180 => 2,
            Angle::Deg270 => 3,
        }
    }

    pub fn as_degrees_u16(self) -> u16 {
        self.degrees() as u16
    }
}

impl TryFrom<u16> for Angle {
    type Error = GeometryError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Angle::Deg0),
            90 => Ok(Angle::Deg90),
            180 => Ok(Angle::Deg180),
            270 => Ok(Angle::Deg270),
            other => Err(GeometryError::InvalidAngle(other)),
        }
    }
}

/// Axis-aligned bounds `(min_x, min_y, max_x, max_y)`.
pub type Bounds = (f64, f64, f64, f64);

/// Bounding box of a polygon. Panics if the polygon has no points — an
/// internal invariant violation, never something user data can trigger
/// once ingested (see spec §7, "programming bugs ... fail loudly").
pub fn bounds(poly: &Polygon<f64>) -> Bounds {
    let rect = poly
        .bounding_rect()
        .expect("polygon must have at least one point to have bounds");
    (rect.min().x, rect.min().y, rect.max().x, rect.max().y)
}

pub fn width(b: Bounds) -> f64 {
    b.2 - b.0
}

pub fn height(b: Bounds) -> f64 {
    b.3 - b.1
}

/// Non-negative area, mm².
pub fn area(poly: &Polygon<f64>) -> f64 {
    poly.unsigned_area()
}

/// True iff the closed polygons share any point.
pub fn intersects(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.intersects(b)
}

/// Minimum Euclidean distance between the two polygons; `0` iff intersecting.
pub fn distance(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    if intersects(a, b) {
        return 0.0;
    }
    euclidean_distance(a, b)
}

/// Polygon-to-polygon distance via closest point on either boundary.
/// `geo`'s `EuclideanDistance` was folded into the newer `Distance` metric
/// trait upstream; to stay on the teacher's pinned `geo = "0.28"` API we
/// implement the boundary-to-boundary minimum directly instead of pulling
/// in a newer `geo` release.
fn euclidean_distance(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    let mut best = f64::INFINITY;
    for seg_a in ring_segments(a.exterior()) {
        for seg_b in ring_segments(b.exterior()) {
            best = best.min(segment_distance(seg_a, seg_b));
        }
    }
    best
}

type Segment = (Coord<f64>, Coord<f64>);

fn ring_segments(ring: &LineString<f64>) -> impl Iterator<Item = Segment> + '_ {
    ring.coords().zip(ring.coords().skip(1)).map(|(a, b)| (*a, *b))
}

fn segment_distance(a: Segment, b: Segment) -> f64 {
    point_to_segment(a.0, b)
        .min(point_to_segment(a.1, b))
        .min(point_to_segment(b.0, a))
        .min(point_to_segment(b.1, a))
}

fn point_to_segment(p: Coord<f64>, seg: Segment) -> f64 {
    let (a, b) = seg;
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= EPSILON {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Rotate `poly` by `angle` around its own centroid, then re-normalize so
/// the result's bounds start at `(0, 0)`.
pub fn rotate(poly: &Polygon<f64>, angle: Angle) -> Polygon<f64> {
    let centroid = poly.centroid().unwrap_or(geo::Point::new(0.0, 0.0));
    let transform = AffineTransform::rotate(angle.degrees(), centroid);
    let rotated = poly.affine_transform(&transform);
    normalize_to_origin(&rotated)
}

/// Translate `poly` by `(dx, dy)`.
pub fn translate(poly: &Polygon<f64>, dx: f64, dy: f64) -> Polygon<f64> {
    let transform = AffineTransform::translate(dx, dy);
    poly.affine_transform(&transform)
}

/// Shift `poly` so its bounding box's lower-left corner sits at `(0, 0)`.
pub fn normalize_to_origin(poly: &Polygon<f64>) -> Polygon<f64> {
    let (min_x, min_y, _, _) = bounds(poly);
    translate(poly, -min_x, -min_y)
}

/// Zero-width buffer repair: dedupe degenerate points and resolve
/// self-intersections via a self-union, keeping the largest resulting ring.
/// Mirrors `dxf_utils.py`'s single repair attempt — called once at ingest;
/// callers must not retry.
pub fn repair(poly: &Polygon<f64>) -> Result<Polygon<f64>, GeometryError> {
    let cleaned = dedupe_ring(poly);
    if cleaned.exterior().0.len() < 4 {
        return Err(GeometryError::RepairFailed);
    }

    let unioned: MultiPolygon<f64> = cleaned.union(&cleaned);
    let best = unioned
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()));

    match best {
        Some(p) if p.unsigned_area() > EPSILON => Ok(p),
        _ => Err(GeometryError::RepairFailed),
    }
}

fn dedupe_ring(poly: &Polygon<f64>) -> Polygon<f64> {
    let mut points: Vec<Coord<f64>> = Vec::new();
    for c in poly.exterior().coords() {
        if points
            .last()
            .map(|last| (last.x - c.x).abs() > EPSILON || (last.y - c.y).abs() > EPSILON)
            .unwrap_or(true)
        {
            points.push(*c);
        }
    }
    if points.len() > 1 {
        let first = points[0];
        let last = points[points.len() - 1];
        if (first.x - last.x).abs() <= EPSILON && (first.y - last.y).abs() <= EPSILON {
            points.pop();
        }
    }
    Polygon::new(LineString::from(points), vec![])
}

/// Rectangle polygon helper, used throughout tests and by callers that only
/// have a bounding box (e.g. the priority-2 filler's void probing).
pub fn rect_polygon(w: f64, h: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![(0.0, 0.0), (w, 0.0), (w, h), (0.0, h), (0.0, 0.0)]),
        vec![],
    )
}
