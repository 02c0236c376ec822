//! Shared unit-test networks

use std::collections::HashMap;

use crate::config::RouteConfig;
use crate::network::{ArcRecord, FeatureType, NetworkFile, NodeRecord, TurnRecord};

pub(crate) fn node(id: i64, x: f64, y: f64, category: Option<i64>) -> NodeRecord {
    NodeRecord {
        id,
        x,
        y,
        z: 0.0,
        layer: 2,
        category,
        attributes: HashMap::new(),
    }
}

pub(crate) fn arc(id: i64, from: i64, to: i64, attributes: &[(&str, f64)]) -> ArcRecord {
    ArcRecord {
        id,
        kind: FeatureType::Line,
        layer: 1,
        category: id,
        turn_category: None,
        from,
        to,
        geometry: Vec::new(),
        attributes: attributes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

pub(crate) fn network(nodes: Vec<NodeRecord>, arcs: Vec<ArcRecord>, turns: Vec<TurnRecord>) -> NetworkFile {
    NetworkFile { name: None, latlon: false, nodes, arcs, turns }
}

/// N1 --A101--> N2 --A102--> N3, one unit apart on the x axis,
/// forward cost 1, backward closed. Node categories 1..3 in layer 2.
pub(crate) fn three_node_line() -> NetworkFile {
    network(
        vec![
            node(1, 0.0, 0.0, Some(1)),
            node(2, 1.0, 0.0, Some(2)),
            node(3, 2.0, 0.0, Some(3)),
        ],
        vec![
            arc(101, 1, 2, &[("cost", 1.0), ("backcost", -1.0)]),
            arc(102, 2, 3, &[("cost", 1.0), ("backcost", -1.0)]),
        ],
        Vec::new(),
    )
}

/// Config selecting the `cost`/`backcost` columns of `three_node_line`.
pub(crate) fn column_config() -> RouteConfig {
    RouteConfig {
        forward_cost_column: Some("cost".to_string()),
        backward_cost_column: Some("backcost".to_string()),
        ..RouteConfig::default()
    }
}

pub(crate) fn forbidden_turn(node: i64, from_arc: i64, to_arc: i64) -> TurnRecord {
    TurnRecord { node, from_arc, to_arc, forbidden: true, cost: 0.0 }
}

pub(crate) fn turn_penalty(node: i64, from_arc: i64, to_arc: i64, cost: f64) -> TurnRecord {
    TurnRecord { node, from_arc, to_arc, forbidden: false, cost }
}
