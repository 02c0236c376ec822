//! Immutable cost graph
//!
//! Nodes and arcs live in arenas addressed by dense `u32` indices; the
//! graph is built once per run and only read afterwards, which is what
//! makes the parallel query fan-out safe. A closed direction (negative
//! or missing cost) is stored as `f64::INFINITY` and never enters the
//! outgoing adjacency.

use rustc_hash::FxHashMap;

use crate::config::RouteConfig;
use crate::error::NetworkError;
use crate::geo::{polyline_length, DistanceMetric, Point};
use crate::network::{ArcRecord, FeatureType, NetworkFile};

pub type NodeId = u32;
pub type ArcId = u32;

/// Traversal orientation relative to the arc's digitized direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

#[derive(Debug)]
pub struct GraphNode {
    pub coord: Point,
    /// Cost of passing through this node; infinite when the node is
    /// closed for through traffic.
    pub cost: f64,
    pub external_id: i64,
}

#[derive(Debug)]
pub struct GraphArc {
    pub from: NodeId,
    pub to: NodeId,
    pub forward_cost: f64,
    pub backward_cost: f64,
    /// Polyline oriented from `from` to `to`, at least two points.
    pub geometry: Vec<Point>,
    pub length: f64,
    pub kind: FeatureType,
    pub layer: u32,
    pub category: i64,
    pub external_id: i64,
}

/// One traversable direction of an arc, precomputed per tail node.
#[derive(Debug, Clone, Copy)]
pub struct HalfArc {
    pub arc: ArcId,
    pub head: NodeId,
    pub direction: Direction,
    pub cost: f64,
}

#[derive(Debug)]
pub struct CostGraph {
    nodes: Vec<GraphNode>,
    arcs: Vec<GraphArc>,
    outgoing: Vec<Vec<HalfArc>>,
    ext_nodes: FxHashMap<i64, NodeId>,
    node_categories: FxHashMap<(u32, i64), NodeId>,
    turn_categories: FxHashMap<i64, ArcId>,
    metric: DistanceMetric,
}

impl CostGraph {
    /// Build the run's cost graph from a network file: filter arcs by
    /// type and layer, resolve per-direction costs from the configured
    /// attribute columns, and precompute the outgoing adjacency.
    pub fn build(network: &NetworkFile, config: &RouteConfig) -> Result<Self, NetworkError> {
        let metric = config.metric();

        let mut nodes = Vec::with_capacity(network.nodes.len());
        let mut ext_nodes = FxHashMap::default();
        let mut node_categories = FxHashMap::default();
        for rec in &network.nodes {
            if ext_nodes.contains_key(&rec.id) {
                return Err(NetworkError::DuplicateNode(rec.id));
            }
            let id = nodes.len() as NodeId;
            ext_nodes.insert(rec.id, id);

            let cost = match &config.node_cost_column {
                Some(col) => sanitize_cost(rec.attributes.get(col).copied().unwrap_or(0.0)),
                None => 0.0,
            };
            nodes.push(GraphNode {
                coord: Point::new(rec.x, rec.y, rec.z),
                cost,
                external_id: rec.id,
            });
            if let Some(cat) = rec.category {
                if rec.layer == config.node_layer {
                    node_categories.entry((rec.layer, cat)).or_insert(id);
                }
            }
        }

        let mut arcs = Vec::new();
        let mut turn_categories = FxHashMap::default();
        for rec in &network.arcs {
            if !config.arc_types.matches(rec.kind) || rec.layer != config.arc_layer {
                continue;
            }
            let from = *ext_nodes
                .get(&rec.from)
                .ok_or(NetworkError::UnknownNode { arc: rec.id, node: rec.from })?;
            let to = *ext_nodes
                .get(&rec.to)
                .ok_or(NetworkError::UnknownNode { arc: rec.id, node: rec.to })?;

            let geometry = arc_geometry(rec, &nodes[from as usize], &nodes[to as usize])?;
            let length = polyline_length(&geometry, metric);

            let forward_cost =
                arc_cost(rec, config.forward_cost_column.as_deref(), length)?;
            let backward_cost = arc_cost(
                rec,
                config
                    .backward_cost_column
                    .as_deref()
                    .or(config.forward_cost_column.as_deref()),
                length,
            )?;

            let id = arcs.len() as ArcId;
            turn_categories
                .entry(rec.turn_category.unwrap_or(rec.id))
                .or_insert(id);
            arcs.push(GraphArc {
                from,
                to,
                forward_cost,
                backward_cost,
                geometry,
                length,
                kind: rec.kind,
                layer: rec.layer,
                category: rec.category,
                external_id: rec.id,
            });
        }

        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (idx, arc) in arcs.iter().enumerate() {
            if arc.forward_cost.is_finite() {
                outgoing[arc.from as usize].push(HalfArc {
                    arc: idx as ArcId,
                    head: arc.to,
                    direction: Direction::Forward,
                    cost: arc.forward_cost,
                });
            }
            if arc.backward_cost.is_finite() {
                outgoing[arc.to as usize].push(HalfArc {
                    arc: idx as ArcId,
                    head: arc.from,
                    direction: Direction::Backward,
                    cost: arc.backward_cost,
                });
            }
        }

        Ok(Self {
            nodes,
            arcs,
            outgoing,
            ext_nodes,
            node_categories,
            turn_categories,
            metric,
        })
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id as usize]
    }

    pub fn arc(&self, id: ArcId) -> &GraphArc {
        &self.arcs[id as usize]
    }

    pub fn arcs(&self) -> impl Iterator<Item = (ArcId, &GraphArc)> {
        self.arcs.iter().enumerate().map(|(i, a)| (i as ArcId, a))
    }

    pub fn outgoing(&self, node: NodeId) -> &[HalfArc] {
        &self.outgoing[node as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn node_by_external_id(&self, id: i64) -> Option<NodeId> {
        self.ext_nodes.get(&id).copied()
    }

    /// Direct lookup for category-based query endpoints.
    pub fn node_by_category(&self, layer: u32, category: i64) -> Option<NodeId> {
        self.node_categories.get(&(layer, category)).copied()
    }

    /// Arc carrying the given unique turntable category.
    pub fn arc_by_turn_category(&self, category: i64) -> Option<ArcId> {
        self.turn_categories.get(&category).copied()
    }
}

/// A resolved query endpoint: exactly at a node, or interpolated onto an
/// arc at length fraction `t`. Query-scoped; never outlives the query
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphPosition {
    Node { node: NodeId, snap_distance: f64 },
    OnArc { arc: ArcId, t: f64, coord: Point, snap_distance: f64 },
}

impl GraphPosition {
    pub fn at_node(node: NodeId) -> Self {
        GraphPosition::Node { node, snap_distance: 0.0 }
    }

    pub fn snap_distance(&self) -> f64 {
        match self {
            GraphPosition::Node { snap_distance, .. } => *snap_distance,
            GraphPosition::OnArc { snap_distance, .. } => *snap_distance,
        }
    }

    pub fn coord(&self, graph: &CostGraph) -> Point {
        match self {
            GraphPosition::Node { node, .. } => graph.node(*node).coord,
            GraphPosition::OnArc { coord, .. } => *coord,
        }
    }

    /// Whether two positions denote the same place on the network.
    pub fn same_place(&self, other: &GraphPosition) -> bool {
        match (self, other) {
            (GraphPosition::Node { node: a, .. }, GraphPosition::Node { node: b, .. }) => a == b,
            (
                GraphPosition::OnArc { arc: a, t: ta, .. },
                GraphPosition::OnArc { arc: b, t: tb, .. },
            ) => a == b && (ta - tb).abs() < crate::geo::COORD_EPS,
            _ => false,
        }
    }
}

fn arc_geometry(
    rec: &ArcRecord,
    from: &GraphNode,
    to: &GraphNode,
) -> Result<Vec<Point>, NetworkError> {
    if rec.geometry.is_empty() {
        return Ok(vec![from.coord, to.coord]);
    }
    let mut points = Vec::with_capacity(rec.geometry.len().max(2));
    for raw in &rec.geometry {
        if raw.len() < 2 {
            return Err(NetworkError::BadGeometry(rec.id));
        }
        points.push(Point::new(raw[0], raw[1], raw.get(2).copied().unwrap_or(0.0)));
    }
    if points.len() < 2 {
        return Err(NetworkError::BadGeometry(rec.id));
    }
    Ok(points)
}

fn arc_cost(rec: &ArcRecord, column: Option<&str>, length: f64) -> Result<f64, NetworkError> {
    let value = match column {
        Some(col) => *rec.attributes.get(col).ok_or_else(|| NetworkError::MissingColumn {
            arc: rec.id,
            column: col.to_string(),
        })?,
        None => length,
    };
    Ok(sanitize_cost(value))
}

/// Negative (or non-finite) costs mark a closed direction.
fn sanitize_cost(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        f64::INFINITY
    }
}
