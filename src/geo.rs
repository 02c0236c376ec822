//! Distance metrics, projection, and polyline slicing

use geo::{Distance, Haversine};

/// Tolerance for coordinate comparisons and degenerate segments.
pub const COORD_EPS: f64 = 1e-9;

/// A network coordinate. `z` is carried through untouched; distances are
/// computed in the horizontal plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn close_to(&self, other: &Point) -> bool {
        (self.x - other.x).abs() < COORD_EPS
            && (self.y - other.y).abs() < COORD_EPS
            && (self.z - other.z).abs() < COORD_EPS
    }
}

/// Distance computation mode, fixed for the whole run when the graph is
/// built. Geodesic expects x=longitude, y=latitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Planar,
    Geodesic,
}

impl DistanceMetric {
    pub fn distance(&self, a: &Point, b: &Point) -> f64 {
        match self {
            DistanceMetric::Planar => (b.x - a.x).hypot(b.y - a.y),
            DistanceMetric::Geodesic => {
                Haversine::distance(geo::Point::new(a.x, a.y), geo::Point::new(b.x, b.y))
            }
        }
    }
}

/// Planar projection of `q` onto the segment `a`-`b`. Returns the clamped
/// segment parameter in [0, 1] and the closest point.
pub fn project_to_segment(q: &Point, a: &Point, b: &Point) -> (f64, Point) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 <= COORD_EPS * COORD_EPS {
        return (0.0, *a);
    }
    let t = (((q.x - a.x) * dx + (q.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    (t, Point::new(a.x + t * dx, a.y + t * dy, a.z + t * (b.z - a.z)))
}

pub fn polyline_length(points: &[Point], metric: DistanceMetric) -> f64 {
    points.windows(2).map(|w| metric.distance(&w[0], &w[1])).sum()
}

/// A query point projected onto a polyline. `t` is the fraction of the
/// polyline's metric length at the projected point.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub t: f64,
    pub point: Point,
    pub distance: f64,
}

/// Project `q` onto the whole polyline. Ties between segments keep the
/// earlier segment.
pub fn project_to_polyline(q: &Point, points: &[Point], metric: DistanceMetric) -> Option<Projection> {
    if points.len() < 2 {
        return None;
    }

    let mut best: Option<(f64, usize, Point)> = None;
    for (i, pair) in points.windows(2).enumerate() {
        let (_, closest) = project_to_segment(q, &pair[0], &pair[1]);
        let d = metric.distance(q, &closest);
        if best.map_or(true, |(bd, _, _)| d < bd - COORD_EPS) {
            best = Some((d, i, closest));
        }
    }
    let (distance, seg, point) = best?;

    let total = polyline_length(points, metric);
    if total <= COORD_EPS {
        return Some(Projection { t: 0.0, point, distance });
    }

    let mut along = 0.0;
    for (i, pair) in points.windows(2).enumerate() {
        if i == seg {
            along += metric.distance(&pair[0], &point);
            break;
        }
        along += metric.distance(&pair[0], &pair[1]);
    }

    Some(Projection { t: (along / total).clamp(0.0, 1.0), point, distance })
}

/// Point at length fraction `t` along the polyline.
pub fn point_along(points: &[Point], t: f64, metric: DistanceMetric) -> Point {
    let total = polyline_length(points, metric);
    let target = t.clamp(0.0, 1.0) * total;

    let mut acc = 0.0;
    for pair in points.windows(2) {
        let seg = metric.distance(&pair[0], &pair[1]);
        if seg <= COORD_EPS {
            continue;
        }
        if acc + seg >= target - COORD_EPS {
            let r = ((target - acc) / seg).clamp(0.0, 1.0);
            return Point::new(
                pair[0].x + r * (pair[1].x - pair[0].x),
                pair[0].y + r * (pair[1].y - pair[0].y),
                pair[0].z + r * (pair[1].z - pair[0].z),
            );
        }
        acc += seg;
    }
    *points.last().expect("polyline has at least one point")
}

/// Slice the polyline between length fractions `t0` and `t1`. The result
/// runs from `t0` to `t1`, so `t0 > t1` yields a reversed slice.
pub fn slice_polyline(points: &[Point], t0: f64, t1: f64, metric: DistanceMetric) -> Vec<Point> {
    if points.len() < 2 {
        return points.to_vec();
    }
    if t0 > t1 {
        let mut out = slice_polyline(points, t1, t0, metric);
        out.reverse();
        return out;
    }

    let total = polyline_length(points, metric);
    let lo = t0.clamp(0.0, 1.0) * total;
    let hi = t1.clamp(0.0, 1.0) * total;

    let mut out = vec![point_along(points, t0, metric)];
    let mut acc = 0.0;
    for pair in points.windows(2) {
        let at_vertex = acc + metric.distance(&pair[0], &pair[1]);
        if at_vertex > lo + COORD_EPS && at_vertex < hi - COORD_EPS {
            out.push(pair[1]);
        }
        acc = at_vertex;
    }
    out.push(point_along(points, t1, metric));

    out.dedup_by(|a, b| a.close_to(b));
    if out.len() == 1 {
        out.push(out[0]);
    }
    out
}
