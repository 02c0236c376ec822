//! Result emitter: turning a solved path into output features
//!
//! `merged` concatenates the traversed arc geometries, trimmed at the
//! interpolated endpoints, into one line feature. `segments` writes each
//! traversed arc's original, untrimmed geometry as its own feature,
//! grouped by the request id. Both modes carry the endpoint snap
//! distances for diagnostics.

use serde_json::{json, Map, Value};

use crate::geo::slice_polyline;
use crate::graph::CostGraph;
use crate::solver::PathResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    Merged,
    Segments,
}

/// One output feature: a line geometry plus attributes.
#[derive(Debug, Clone)]
pub struct RouteFeature {
    pub geometry: Vec<crate::geo::Point>,
    pub properties: Map<String, Value>,
}

/// Build the output features for one solved query.
pub fn route_features(
    graph: &CostGraph,
    path: &PathResult,
    request_id: i64,
    mode: EmitMode,
) -> Vec<RouteFeature> {
    match mode {
        EmitMode::Merged => vec![merged_feature(graph, path, request_id)],
        EmitMode::Segments => segment_features(graph, path, request_id),
    }
}

fn base_properties(path: &PathResult, request_id: i64) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("id".to_string(), json!(request_id));
    props.insert("start_distance".to_string(), json!(path.start.snap_distance()));
    props.insert("end_distance".to_string(), json!(path.end.snap_distance()));
    props
}

fn merged_feature(graph: &CostGraph, path: &PathResult, request_id: i64) -> RouteFeature {
    let metric = graph.metric();
    let mut geometry: Vec<crate::geo::Point> = Vec::new();
    for segment in &path.segments {
        let arc = graph.arc(segment.arc);
        let part = slice_polyline(&arc.geometry, segment.enter_t, segment.exit_t, metric);
        for point in part {
            if geometry.last().map_or(true, |last| !last.close_to(&point)) {
                geometry.push(point);
            }
        }
    }
    if geometry.is_empty() {
        // zero-arc self path: a degenerate line at the resolved position
        let at = path.start.coord(graph);
        geometry = vec![at, at];
    }
    if geometry.len() == 1 {
        geometry.push(geometry[0]);
    }

    let mut props = base_properties(path, request_id);
    props.insert("cost".to_string(), json!(path.cost));
    RouteFeature { geometry, properties: props }
}

fn segment_features(graph: &CostGraph, path: &PathResult, request_id: i64) -> Vec<RouteFeature> {
    path.segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let arc = graph.arc(segment.arc);
            let mut props = base_properties(path, request_id);
            props.insert("cost".to_string(), json!(path.cost));
            props.insert("sequence".to_string(), json!(index));
            props.insert("direction".to_string(), json!(segment.direction.as_str()));
            props.insert("category".to_string(), json!(arc.category));
            RouteFeature { geometry: arc.geometry.clone(), properties: props }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::geo::{slice_polyline, Point};
    use crate::graph::{CostGraph, GraphPosition};
    use crate::solver::PathSolver;

    fn graph() -> CostGraph {
        CostGraph::build(&fixtures::three_node_line(), &fixtures::column_config()).unwrap()
    }

    fn solve(graph: &CostGraph, start: GraphPosition, end: GraphPosition) -> crate::solver::PathResult {
        PathSolver::new(graph, None, None).shortest_path(&start, &end).unwrap()
    }

    #[test]
    fn merged_concatenates_trimmed_geometry() {
        let graph = graph();
        let start = GraphPosition::OnArc {
            arc: 0,
            t: 0.5,
            coord: Point::xy(0.5, 0.0),
            snap_distance: 0.1,
        };
        let end = GraphPosition::at_node(graph.node_by_external_id(3).unwrap());
        let path = solve(&graph, start, end);

        let features = route_features(&graph, &path, 7, EmitMode::Merged);
        assert_eq!(features.len(), 1);
        let f = &features[0];
        assert_eq!(f.properties["id"], 7);
        assert_eq!(f.properties["start_distance"], 0.1);
        assert_eq!(f.properties["end_distance"], 0.0);
        assert!(f.geometry[0].close_to(&Point::xy(0.5, 0.0)));
        assert!(f.geometry.last().unwrap().close_to(&Point::xy(2.0, 0.0)));
        // the joint vertex at N2 appears once
        assert_eq!(
            f.geometry.iter().filter(|p| p.close_to(&Point::xy(1.0, 0.0))).count(),
            1
        );
    }

    #[test]
    fn segments_carry_order_and_direction() {
        let graph = graph();
        let start = GraphPosition::at_node(graph.node_by_external_id(1).unwrap());
        let end = GraphPosition::at_node(graph.node_by_external_id(3).unwrap());
        let path = solve(&graph, start, end);

        let features = route_features(&graph, &path, 3, EmitMode::Segments);
        assert_eq!(features.len(), 2);
        for (i, f) in features.iter().enumerate() {
            assert_eq!(f.properties["id"], 3);
            assert_eq!(f.properties["sequence"], i);
            assert_eq!(f.properties["direction"], "forward");
            // untrimmed original geometry: both endpoints of the arc
            assert_eq!(f.geometry.len(), 2);
        }
    }

    #[test]
    fn segment_slices_reconstruct_merged_geometry() {
        let graph = graph();
        let start = GraphPosition::OnArc {
            arc: 0,
            t: 0.25,
            coord: Point::xy(0.25, 0.0),
            snap_distance: 0.0,
        };
        let end = GraphPosition::OnArc {
            arc: 1,
            t: 0.75,
            coord: Point::xy(1.75, 0.0),
            snap_distance: 0.0,
        };
        let path = solve(&graph, start, end);

        let merged = &route_features(&graph, &path, 1, EmitMode::Merged)[0].geometry;

        // slicing each traversed segment by its parameters and chaining
        // them reproduces the merged line
        let mut chained: Vec<Point> = Vec::new();
        for seg in &path.segments {
            let arc = graph.arc(seg.arc);
            for p in slice_polyline(&arc.geometry, seg.enter_t, seg.exit_t, graph.metric()) {
                if chained.last().map_or(true, |last| !last.close_to(&p)) {
                    chained.push(p);
                }
            }
        }
        assert_eq!(merged.len(), chained.len());
        for (a, b) in merged.iter().zip(&chained) {
            assert!(a.close_to(b));
        }
    }

    #[test]
    fn self_path_emits_degenerate_line() {
        let graph = graph();
        let pos = GraphPosition::at_node(graph.node_by_external_id(2).unwrap());
        let path = solve(&graph, pos, pos);
        let features = route_features(&graph, &path, 9, EmitMode::Merged);
        assert_eq!(features[0].geometry.len(), 2);
        assert_eq!(features[0].properties["cost"], 0.0);
        assert!(features[0].geometry[0].close_to(&Point::xy(1.0, 0.0)));
    }
}
