//! Network interchange format
//!
//! The engine consumes a prepared vector network rather than raw map
//! storage: nodes, arcs with per-direction cost attributes, and optional
//! turn records, as one JSON document. `load` plus `CostGraph::build`
//! (graph.rs) together realize the graph-building collaborator contract.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::NetworkError;

/// Feature type of a digitized arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Line,
    Boundary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkFile {
    #[serde(default)]
    pub name: Option<String>,
    /// Coordinates are longitude/latitude degrees (enables meaningful
    /// geodesic runs).
    #[serde(default)]
    pub latlon: bool,
    pub nodes: Vec<NodeRecord>,
    pub arcs: Vec<ArcRecord>,
    #[serde(default)]
    pub turns: Vec<TurnRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeRecord {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Layer of the node's category, for direct (non-coordinate) queries.
    #[serde(default = "default_node_layer")]
    pub layer: u32,
    #[serde(default)]
    pub category: Option<i64>,
    #[serde(default)]
    pub attributes: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArcRecord {
    pub id: i64,
    #[serde(rename = "type", default = "default_arc_kind")]
    pub kind: FeatureType,
    #[serde(default = "default_arc_layer")]
    pub layer: u32,
    #[serde(default)]
    pub category: i64,
    /// Unique category in the turntable-categories layer; turn records
    /// reference arcs through it. Defaults to the arc id.
    #[serde(default)]
    pub turn_category: Option<i64>,
    pub from: i64,
    pub to: i64,
    /// Polyline oriented from `from` to `to`; points are [x, y] or
    /// [x, y, z]. A straight segment between the endpoint nodes when
    /// omitted.
    #[serde(default)]
    pub geometry: Vec<Vec<f64>>,
    #[serde(default)]
    pub attributes: HashMap<String, f64>,
}

/// One turntable entry: the move arriving at `node` via the arc with
/// unique category `from_arc` and leaving via `to_arc`.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRecord {
    pub node: i64,
    pub from_arc: i64,
    pub to_arc: i64,
    #[serde(default)]
    pub forbidden: bool,
    #[serde(default)]
    pub cost: f64,
}

fn default_node_layer() -> u32 {
    2
}

fn default_arc_layer() -> u32 {
    1
}

fn default_arc_kind() -> FeatureType {
    FeatureType::Line
}

/// Read a network file from disk.
pub fn load(path: &Path) -> Result<NetworkFile, NetworkError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
