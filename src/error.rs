//! Error types for the netpath engine
//!
//! `QueryError` covers per-query failures that never abort a batch;
//! `NetworkError` covers fatal problems while building the cost graph or
//! the turntable, raised before any query runs.

use thiserror::Error;

/// Recoverable, per-query failure. Reported as a diagnostic for the
/// offending record; sibling queries continue.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No admissible network element within the snap threshold.
    #[error("no network element within {max_distance} map units of ({x}, {y})")]
    NotFound { x: f64, y: f64, max_distance: f64 },

    /// No node carries the requested category.
    #[error("no node with category {category} in layer {layer}")]
    UnknownCategory { layer: u32, category: i64 },

    /// The resolved endpoints are not connected (or every route is
    /// blocked by turn restrictions or the cost ceiling).
    #[error("no path between the resolved endpoints")]
    Unreachable,

    /// The input record does not match any supported form.
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Fatal failure while constructing shared run state.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("duplicate node id {0}")]
    DuplicateNode(i64),

    #[error("arc {arc} references unknown node {node}")]
    UnknownNode { arc: i64, node: i64 },

    #[error("arc {arc} is missing cost column {column:?}")]
    MissingColumn { arc: i64, column: String },

    #[error("arc {0} has an invalid geometry point (need x and y)")]
    BadGeometry(i64),

    #[error("turn record at node {node} references unknown arc category {category}")]
    UnknownTurnArc { node: i64, category: i64 },

    #[error("turn record references unknown node {0}")]
    UnknownTurnNode(i64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid network file: {0}")]
    Parse(#[from] serde_json::Error),
}
