//! Spatial locator: snapping free coordinates onto the network
//!
//! An R-tree over the individual polyline segments of every arc answers
//! nearest-element queries. Candidates come out in planar order; the
//! true metric distance is evaluated per candidate and the best
//! admissible arc wins, with exact ties resolved to the lower arc index
//! so runs are reproducible. The chosen arc never depends on the snap
//! threshold, which is only applied to the final distance.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::config::ArcTypeFilter;
use crate::geo::{project_to_polyline, project_to_segment, DistanceMetric, Point, COORD_EPS};
use crate::graph::{ArcId, CostGraph, GraphPosition};

/// How many R-tree candidates are scanned past the first admissible hit
/// in geodesic mode, where planar ordering is only approximate.
const GEODESIC_SCAN: usize = 32;
/// Hard bound on candidates examined per query.
const MAX_SCAN: usize = 512;

/// One polyline segment of an arc, indexed planar.
#[derive(Debug, Clone, Copy)]
struct ArcSegment {
    p0: [f64; 2],
    p1: [f64; 2],
    arc: ArcId,
}

impl RTreeObject for ArcSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.p0, self.p1)
    }
}

impl PointDistance for ArcSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let q = Point::xy(point[0], point[1]);
        let a = Point::xy(self.p0[0], self.p0[1]);
        let b = Point::xy(self.p1[0], self.p1[1]);
        let (_, closest) = project_to_segment(&q, &a, &b);
        let dx = closest.x - point[0];
        let dy = closest.y - point[1];
        dx * dx + dy * dy
    }
}

/// Nearest-arc index over the whole graph. Built once, read-only.
#[derive(Debug)]
pub struct Locator {
    tree: RTree<ArcSegment>,
}

impl Locator {
    pub fn build(graph: &CostGraph) -> Self {
        let mut segments = Vec::new();
        for (id, arc) in graph.arcs() {
            for pair in arc.geometry.windows(2) {
                segments.push(ArcSegment {
                    p0: [pair[0].x, pair[0].y],
                    p1: [pair[1].x, pair[1].y],
                    arc: id,
                });
            }
        }
        Self { tree: RTree::bulk_load(segments) }
    }

    /// Snap `coord` onto the nearest admissible arc within `max_distance`.
    /// A projection landing on an arc endpoint collapses to the node.
    pub fn locate(
        &self,
        graph: &CostGraph,
        coord: &Point,
        max_distance: f64,
        types: &ArcTypeFilter,
        layer: Option<u32>,
    ) -> Option<GraphPosition> {
        let metric = graph.metric();
        let query = [coord.x, coord.y];

        let mut best: Option<(f64, ArcId)> = None;
        let mut past_best = 0usize;
        for (scanned, (segment, d2)) in self
            .tree
            .nearest_neighbor_iter_with_distance_2(&query)
            .enumerate()
        {
            if scanned >= MAX_SCAN {
                break;
            }
            match metric {
                DistanceMetric::Planar => {
                    // candidates arrive in true distance order: stop once
                    // they cannot beat (or tie) the current best, or can
                    // no longer fall under the threshold
                    let cutoff = best.map_or(max_distance, |(bd, _)| bd);
                    if d2 > (cutoff + COORD_EPS) * (cutoff + COORD_EPS) {
                        break;
                    }
                }
                DistanceMetric::Geodesic => {
                    if best.is_some() {
                        past_best += 1;
                        if past_best > GEODESIC_SCAN {
                            break;
                        }
                    }
                }
            }

            let arc = graph.arc(segment.arc);
            if !types.matches(arc.kind) {
                continue;
            }
            if let Some(layer) = layer {
                if arc.layer != layer {
                    continue;
                }
            }

            let a = Point::xy(segment.p0[0], segment.p0[1]);
            let b = Point::xy(segment.p1[0], segment.p1[1]);
            let (_, closest) = project_to_segment(coord, &a, &b);
            let d = metric.distance(coord, &closest);

            let better = match best {
                None => true,
                Some((bd, ba)) => {
                    d < bd - COORD_EPS || ((d - bd).abs() <= COORD_EPS && segment.arc < ba)
                }
            };
            if better {
                best = Some((d, segment.arc));
            }
        }

        let (_, arc_id) = best?;
        // project onto the full arc polyline so the interpolation
        // parameter and distance stay consistent with the geometry
        let arc = graph.arc(arc_id);
        let projection = project_to_polyline(coord, &arc.geometry, metric)?;
        if projection.distance > max_distance {
            return None;
        }

        if projection.t <= 0.0 {
            return Some(GraphPosition::Node { node: arc.from, snap_distance: projection.distance });
        }
        if projection.t >= 1.0 {
            return Some(GraphPosition::Node { node: arc.to, snap_distance: projection.distance });
        }
        Some(GraphPosition::OnArc {
            arc: arc_id,
            t: projection.t,
            coord: projection.point,
            snap_distance: projection.distance,
        })
    }
}
