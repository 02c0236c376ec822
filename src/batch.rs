//! Query batch processor
//!
//! Reads route requests line by line, resolves their endpoints (category
//! lookup or locator snap), solves them on the rayon pool, and hands the
//! results to the emitter in input order. A failing record is reported
//! and never aborts its siblings.

use std::io::{self, BufRead};
use std::sync::OnceLock;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::RouteConfig;
use crate::emit::{route_features, EmitMode};
use crate::error::{NetworkError, QueryError};
use crate::geo::Point;
use crate::graph::{CostGraph, GraphPosition};
use crate::locate::Locator;
use crate::network::NetworkFile;
use crate::output::FeatureSink;
use crate::solver::{PathResult, PathSolver};
use crate::turns::{resolve_records, ResolvedTurn, TurnTable};

/// One endpoint of a query record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointSpec {
    /// Direct node lookup, no snapping.
    Category { layer: u32, category: i64 },
    Coordinate(Point),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub id: i64,
    pub from: EndpointSpec,
    pub to: EndpointSpec,
}

/// Result of one input record, in input order.
#[derive(Debug)]
pub struct QueryOutcome {
    pub line_no: usize,
    pub request_id: i64,
    pub result: Result<PathResult, QueryError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub solved: usize,
    pub failed: usize,
}

/// Shared, immutable per-run state. Queries only read it, so the batch
/// fan-out needs no synchronization beyond collecting results.
pub struct QueryEngine {
    graph: CostGraph,
    locator: Locator,
    resolved_turns: Vec<ResolvedTurn>,
    turns: OnceLock<TurnTable>,
    config: RouteConfig,
}

impl QueryEngine {
    /// Build the graph, the spatial index, and (in turntable mode)
    /// resolve the turn records so bad references fail the run before
    /// any query is processed.
    pub fn new(network: &NetworkFile, config: RouteConfig) -> Result<Self, NetworkError> {
        let graph = CostGraph::build(network, &config)?;
        let locator = Locator::build(&graph);
        let resolved_turns = if config.turntable {
            resolve_records(&graph, &network.turns)?
        } else {
            Vec::new()
        };
        Ok(Self { graph, locator, resolved_turns, turns: OnceLock::new(), config })
    }

    pub fn graph(&self) -> &CostGraph {
        &self.graph
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// The turntable, materialized on first use.
    fn turn_table(&self) -> Option<&TurnTable> {
        if !self.config.turntable {
            return None;
        }
        Some(self.turns.get_or_init(|| {
            debug!(entries = self.resolved_turns.len(), "materializing turntable");
            TurnTable::new(&self.resolved_turns, self.config.default_turn_cost)
        }))
    }

    pub fn resolve_endpoint(&self, spec: &EndpointSpec) -> Result<GraphPosition, QueryError> {
        match spec {
            EndpointSpec::Category { layer, category } => self
                .graph
                .node_by_category(*layer, *category)
                .map(GraphPosition::at_node)
                .ok_or(QueryError::UnknownCategory { layer: *layer, category: *category }),
            EndpointSpec::Coordinate(coord) => self
                .locator
                .locate(
                    &self.graph,
                    coord,
                    self.config.max_distance,
                    &self.config.arc_types,
                    Some(self.config.arc_layer),
                )
                .ok_or(QueryError::NotFound {
                    x: coord.x,
                    y: coord.y,
                    max_distance: self.config.max_distance,
                }),
        }
    }

    pub fn run_query(&self, record: &QueryRecord) -> Result<PathResult, QueryError> {
        let start = self.resolve_endpoint(&record.from)?;
        let end = self.resolve_endpoint(&record.to)?;
        let solver = PathSolver::new(&self.graph, self.turn_table(), self.config.cost_ceiling);
        solver.shortest_path(&start, &end)
    }
}

/// Parse one input line. `Ok(None)` for blank lines and comments.
///
/// Forms: `<layer> <cat1> <cat2> [<id>]` or `<x1> <y1> [z1] <x2> <y2>
/// [z2] [<id>]`. A 4-token line is coordinates when every token is a
/// number and one of them carries a decimal point or sign; plain
/// integers read as a category record with id.
pub fn parse_record(line: &str, line_no: usize) -> Result<Option<QueryRecord>, QueryError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let default_id = line_no as i64;

    let record = match tokens.len() {
        3 => category_record(&tokens, default_id)?,
        4 => {
            if coordinate_like(&tokens) {
                coordinate_record(&tokens, false, default_id)?
            } else {
                category_record(&tokens, default_id)?
            }
        }
        5 => coordinate_record(&tokens, false, default_id)?,
        6 | 7 => coordinate_record(&tokens, true, default_id)?,
        n => {
            return Err(QueryError::Malformed(format!(
                "expected 3 to 7 fields, found {n}"
            )))
        }
    };
    Ok(Some(record))
}

fn coordinate_like(tokens: &[&str]) -> bool {
    tokens.iter().all(|t| t.parse::<f64>().is_ok())
        && tokens
            .iter()
            .any(|t| t.contains('.') || t.starts_with('-') || t.starts_with('+'))
}

fn category_record(tokens: &[&str], default_id: i64) -> Result<QueryRecord, QueryError> {
    let layer = parse_num::<u32>(tokens[0], "layer")?;
    let from = parse_num::<i64>(tokens[1], "start category")?;
    let to = parse_num::<i64>(tokens[2], "end category")?;
    let id = match tokens.get(3) {
        Some(tok) => parse_num::<i64>(tok, "request id")?,
        None => default_id,
    };
    Ok(QueryRecord {
        id,
        from: EndpointSpec::Category { layer, category: from },
        to: EndpointSpec::Category { layer, category: to },
    })
}

fn coordinate_record(
    tokens: &[&str],
    three_d: bool,
    default_id: i64,
) -> Result<QueryRecord, QueryError> {
    let per_point = if three_d { 3 } else { 2 };
    let id = match tokens.get(per_point * 2) {
        Some(tok) => parse_num::<i64>(tok, "request id")?,
        None => default_id,
    };
    let coord = |at: usize| -> Result<Point, QueryError> {
        Ok(Point::new(
            parse_num::<f64>(tokens[at], "coordinate")?,
            parse_num::<f64>(tokens[at + 1], "coordinate")?,
            if three_d { parse_num::<f64>(tokens[at + 2], "coordinate")? } else { 0.0 },
        ))
    };
    Ok(QueryRecord {
        id,
        from: EndpointSpec::Coordinate(coord(0)?),
        to: EndpointSpec::Coordinate(coord(per_point)?),
    })
}

fn parse_num<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, QueryError> {
    token
        .parse()
        .map_err(|_| QueryError::Malformed(format!("invalid {what} {token:?}")))
}

/// Parse every record, solve them in parallel, and return the outcomes
/// in input order.
pub fn run_batch<R: BufRead>(engine: &QueryEngine, input: R) -> io::Result<Vec<QueryOutcome>> {
    let mut work: Vec<(usize, i64, Result<QueryRecord, QueryError>)> = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        match parse_record(&line, line_no) {
            Ok(None) => {}
            Ok(Some(record)) => work.push((line_no, record.id, Ok(record))),
            Err(err) => work.push((line_no, line_no as i64, Err(err))),
        }
    }
    info!(records = work.len(), "solving batch");

    let outcomes = work
        .into_par_iter()
        .map(|(line_no, request_id, parsed)| QueryOutcome {
            line_no,
            request_id,
            result: parsed.and_then(|record| engine.run_query(&record)),
        })
        .collect();
    Ok(outcomes)
}

/// Emit solved paths in input order, log per-query failures, and close
/// the sink. The returned summary drives the process exit status.
pub fn write_outcomes<S: FeatureSink>(
    engine: &QueryEngine,
    outcomes: &[QueryOutcome],
    sink: &mut S,
) -> io::Result<BatchSummary> {
    let mode = if engine.config().segments { EmitMode::Segments } else { EmitMode::Merged };
    let mut summary = BatchSummary { solved: 0, failed: 0 };

    for outcome in outcomes {
        match &outcome.result {
            Ok(path) => {
                for feature in route_features(engine.graph(), path, outcome.request_id, mode) {
                    sink.write_feature(&feature)?;
                }
                debug!(request = outcome.request_id, cost = path.cost, "query solved");
                summary.solved += 1;
            }
            Err(err) => {
                warn!(
                    request = outcome.request_id,
                    line = outcome.line_no,
                    "query failed: {err}"
                );
                summary.failed += 1;
            }
        }
    }
    sink.finish()?;
    info!(solved = summary.solved, failed = summary.failed, "batch complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::RouteFeature;
    use crate::fixtures;

    #[test]
    fn parses_category_records() {
        let rec = parse_record("2 1 3", 5).unwrap().unwrap();
        assert_eq!(rec.id, 5);
        assert_eq!(rec.from, EndpointSpec::Category { layer: 2, category: 1 });
        assert_eq!(rec.to, EndpointSpec::Category { layer: 2, category: 3 });

        // four plain integers read as a category record with id
        let rec = parse_record("2 1 3 99", 1).unwrap().unwrap();
        assert_eq!(rec.id, 99);
        assert!(matches!(rec.from, EndpointSpec::Category { .. }));
    }

    #[test]
    fn parses_coordinate_records() {
        let rec = parse_record("0.5 0.0 1.5 0.0", 2).unwrap().unwrap();
        assert_eq!(rec.id, 2);
        assert_eq!(rec.from, EndpointSpec::Coordinate(Point::xy(0.5, 0.0)));

        let rec = parse_record("0.5 0.0 1.5 0.0 77", 1).unwrap().unwrap();
        assert_eq!(rec.id, 77);

        let rec = parse_record("0.5 0.0 10.0 1.5 0.0 10.0 8", 1).unwrap().unwrap();
        assert_eq!(rec.id, 8);
        assert_eq!(rec.from, EndpointSpec::Coordinate(Point::new(0.5, 0.0, 10.0)));

        // a sign marks numbers as coordinates even without a decimal point
        let rec = parse_record("-1 0 2 0", 1).unwrap().unwrap();
        assert!(matches!(rec.from, EndpointSpec::Coordinate(_)));
    }

    #[test]
    fn skips_blanks_and_comments() {
        assert!(parse_record("", 1).unwrap().is_none());
        assert!(parse_record("   ", 1).unwrap().is_none());
        assert!(parse_record("# comment", 1).unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_records() {
        assert!(matches!(parse_record("1 2", 1), Err(QueryError::Malformed(_))));
        assert!(matches!(parse_record("a b c", 1), Err(QueryError::Malformed(_))));
        assert!(matches!(
            parse_record("1 2 3 4 5 6 7 8", 1),
            Err(QueryError::Malformed(_))
        ));
        assert!(matches!(
            parse_record("0.5 0.0 1.5 bogus", 1),
            Err(QueryError::Malformed(_))
        ));
    }

    struct VecSink {
        features: Vec<RouteFeature>,
        finished: bool,
    }

    impl FeatureSink for VecSink {
        fn write_feature(&mut self, feature: &RouteFeature) -> io::Result<()> {
            self.features.push(feature.clone());
            Ok(())
        }
        fn finish(&mut self) -> io::Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn failing_record_does_not_abort_batch() {
        let engine =
            QueryEngine::new(&fixtures::three_node_line(), fixtures::column_config()).unwrap();
        let input = "2 1 3 41\nbogus record here\n0.25 0.0 1.75 0.0\n";
        let outcomes = run_batch(&engine, input.as_bytes()).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(QueryError::Malformed(_))));
        assert!(outcomes[2].result.is_ok());
        assert_eq!(outcomes[0].request_id, 41);
        assert_eq!(outcomes[2].request_id, 3);

        let mut sink = VecSink { features: Vec::new(), finished: false };
        let summary = write_outcomes(&engine, &outcomes, &mut sink).unwrap();
        assert_eq!(summary, BatchSummary { solved: 2, failed: 1 });
        assert!(sink.finished);
        assert_eq!(sink.features.len(), 2);
        assert_eq!(sink.features[0].properties["id"], 41);
        assert_eq!(sink.features[1].properties["id"], 3);
    }

    #[test]
    fn unknown_category_is_a_query_failure() {
        let engine =
            QueryEngine::new(&fixtures::three_node_line(), fixtures::column_config()).unwrap();
        let record = parse_record("2 1 9", 1).unwrap().unwrap();
        assert!(matches!(
            engine.run_query(&record),
            Err(QueryError::UnknownCategory { layer: 2, category: 9 })
        ));
    }

    #[test]
    fn snap_failure_is_a_query_failure() {
        let net = fixtures::three_node_line();
        let config = RouteConfig { max_distance: 0.01, ..fixtures::column_config() };
        let engine = QueryEngine::new(&net, config).unwrap();
        // 0.05 off the arc with a 0.01 threshold
        let record = parse_record("0.5 0.05 1.5 0.0", 1).unwrap().unwrap();
        assert!(matches!(engine.run_query(&record), Err(QueryError::NotFound { .. })));
    }

    #[test]
    fn turntable_batch_blocks_forbidden_route() {
        let mut net = fixtures::three_node_line();
        net.turns.push(fixtures::forbidden_turn(2, 101, 102));

        let open = QueryEngine::new(&net, fixtures::column_config()).unwrap();
        let record = parse_record("2 1 3", 1).unwrap().unwrap();
        assert!(open.run_query(&record).is_ok());

        let config = RouteConfig { turntable: true, ..fixtures::column_config() };
        let restricted = QueryEngine::new(&net, config).unwrap();
        assert!(matches!(
            restricted.run_query(&record),
            Err(QueryError::Unreachable)
        ));
    }
}
