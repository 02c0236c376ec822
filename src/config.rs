//! Run configuration threaded into the locator, solver, and emitter

use std::str::FromStr;

use crate::geo::DistanceMetric;
use crate::network::FeatureType;

/// Which feature types count as arcs of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcTypeFilter {
    pub line: bool,
    pub boundary: bool,
}

impl ArcTypeFilter {
    pub fn matches(&self, kind: FeatureType) -> bool {
        match kind {
            FeatureType::Line => self.line,
            FeatureType::Boundary => self.boundary,
        }
    }
}

impl Default for ArcTypeFilter {
    fn default() -> Self {
        Self { line: true, boundary: true }
    }
}

impl FromStr for ArcTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut filter = Self { line: false, boundary: false };
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "line" => filter.line = true,
                "boundary" => filter.boundary = true,
                other => return Err(format!("unknown arc type {other:?} (expected line,boundary)")),
            }
        }
        if !filter.line && !filter.boundary {
            return Err("arc type filter selects nothing".to_string());
        }
        Ok(filter)
    }
}

/// Configuration for one run. Built once from the CLI and passed by
/// reference; nothing here changes after construction.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub arc_types: ArcTypeFilter,
    pub arc_layer: u32,
    /// Layer whose node categories are indexed for direct queries.
    pub node_layer: u32,
    /// Cost column for the forward (digitized) direction; metric length
    /// when absent.
    pub forward_cost_column: Option<String>,
    /// Cost column for the backward direction; falls back to the forward
    /// column, then to metric length.
    pub backward_cost_column: Option<String>,
    pub node_cost_column: Option<String>,
    pub geodesic: bool,
    /// Snap threshold for coordinate endpoints.
    pub max_distance: f64,
    pub turntable: bool,
    /// Emit original segments instead of one merged line per path.
    pub segments: bool,
    /// Cost of turns with no turntable entry (turntable mode only).
    pub default_turn_cost: f64,
    /// Optional guard against pathological inputs; states beyond this
    /// cumulative cost are not expanded.
    pub cost_ceiling: Option<f64>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            arc_types: ArcTypeFilter::default(),
            arc_layer: 1,
            node_layer: 2,
            forward_cost_column: None,
            backward_cost_column: None,
            node_cost_column: None,
            geodesic: false,
            max_distance: 1000.0,
            turntable: false,
            segments: false,
            default_turn_cost: 0.0,
            cost_ceiling: None,
        }
    }
}

impl RouteConfig {
    pub fn metric(&self) -> DistanceMetric {
        if self.geodesic {
            DistanceMetric::Geodesic
        } else {
            DistanceMetric::Planar
        }
    }
}
