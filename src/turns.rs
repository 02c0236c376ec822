//! Turntable: permitted and forbidden turn transitions at nodes
//!
//! Turn records arrive with external identifiers (node ids and unique
//! arc categories). They are resolved against the graph when the engine
//! is constructed, so a bad reference aborts the run before any query;
//! the lookup table itself is materialized lazily on the first query
//! that needs it.

use rustc_hash::FxHashMap;

use crate::error::NetworkError;
use crate::graph::{ArcId, CostGraph, HalfArc, NodeId};
use crate::network::TurnRecord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnRestriction {
    Forbidden,
    Penalty(f64),
}

/// A turn record with graph-internal identifiers.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedTurn {
    pub node: NodeId,
    pub from_arc: ArcId,
    pub to_arc: ArcId,
    pub restriction: TurnRestriction,
}

/// Resolve external turn references. A negative penalty closes the turn,
/// as a negative cost closes an arc direction.
pub fn resolve_records(
    graph: &CostGraph,
    records: &[TurnRecord],
) -> Result<Vec<ResolvedTurn>, NetworkError> {
    let mut resolved = Vec::with_capacity(records.len());
    for rec in records {
        let node = graph
            .node_by_external_id(rec.node)
            .ok_or(NetworkError::UnknownTurnNode(rec.node))?;
        let from_arc = graph.arc_by_turn_category(rec.from_arc).ok_or(
            NetworkError::UnknownTurnArc { node: rec.node, category: rec.from_arc },
        )?;
        let to_arc = graph.arc_by_turn_category(rec.to_arc).ok_or(
            NetworkError::UnknownTurnArc { node: rec.node, category: rec.to_arc },
        )?;
        let restriction = if rec.forbidden || rec.cost < 0.0 {
            TurnRestriction::Forbidden
        } else {
            TurnRestriction::Penalty(rec.cost)
        };
        resolved.push(ResolvedTurn { node, from_arc, to_arc, restriction });
    }
    Ok(resolved)
}

/// The turntable consulted during search expansion.
#[derive(Debug)]
pub struct TurnTable {
    entries: FxHashMap<(NodeId, ArcId, ArcId), TurnRestriction>,
    default_cost: f64,
}

impl TurnTable {
    pub fn new(resolved: &[ResolvedTurn], default_cost: f64) -> Self {
        let mut entries = FxHashMap::default();
        for turn in resolved {
            entries
                .entry((turn.node, turn.from_arc, turn.to_arc))
                .or_insert(turn.restriction);
        }
        Self { entries, default_cost }
    }

    /// Extra cost of the move arriving at `node` via `incoming` and
    /// leaving via `outgoing`, or `None` when the move is forbidden.
    ///
    /// A path starting exactly at a node has no incoming context and is
    /// unrestricted on its first step. U-turns are forbidden unless an
    /// explicit entry allows them.
    pub fn transition_cost(
        &self,
        node: NodeId,
        incoming: Option<ArcId>,
        outgoing: ArcId,
    ) -> Option<f64> {
        let Some(incoming) = incoming else {
            return Some(0.0);
        };
        match self.entries.get(&(node, incoming, outgoing)) {
            Some(TurnRestriction::Forbidden) => None,
            Some(TurnRestriction::Penalty(cost)) => Some(*cost),
            None if incoming == outgoing => None,
            None => Some(self.default_cost),
        }
    }

    /// Admissible departures from `node` given the arriving arc.
    pub fn allowed_moves<'a>(
        &'a self,
        graph: &'a CostGraph,
        node: NodeId,
        incoming: Option<ArcId>,
    ) -> impl Iterator<Item = (HalfArc, f64)> + 'a {
        graph.outgoing(node).iter().filter_map(move |half| {
            self.transition_cost(node, incoming, half.arc)
                .map(|extra| (*half, extra))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::graph::CostGraph;

    fn graph() -> CostGraph {
        CostGraph::build(&fixtures::three_node_line(), &fixtures::column_config()).unwrap()
    }

    #[test]
    fn resolves_records_against_graph() {
        let graph = graph();
        let records = vec![fixtures::forbidden_turn(2, 101, 102)];
        let resolved = resolve_records(&graph, &records).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].node, graph.node_by_external_id(2).unwrap());
        assert_eq!(resolved[0].restriction, TurnRestriction::Forbidden);
    }

    #[test]
    fn unknown_references_are_fatal() {
        let graph = graph();
        assert!(matches!(
            resolve_records(&graph, &[fixtures::forbidden_turn(9, 101, 102)]),
            Err(NetworkError::UnknownTurnNode(9))
        ));
        assert!(matches!(
            resolve_records(&graph, &[fixtures::forbidden_turn(2, 777, 102)]),
            Err(NetworkError::UnknownTurnArc { category: 777, .. })
        ));
    }

    #[test]
    fn negative_penalty_forbids() {
        let graph = graph();
        let resolved =
            resolve_records(&graph, &[fixtures::turn_penalty(2, 101, 102, -4.0)]).unwrap();
        assert_eq!(resolved[0].restriction, TurnRestriction::Forbidden);
    }

    #[test]
    fn absent_entries_use_default_cost() {
        let table = TurnTable::new(&[], 1.5);
        assert_eq!(table.transition_cost(0, Some(0), 1), Some(1.5));
        assert_eq!(table.transition_cost(0, None, 1), Some(0.0));
    }

    #[test]
    fn u_turns_forbidden_by_default() {
        let table = TurnTable::new(&[], 0.0);
        assert_eq!(table.transition_cost(3, Some(7), 7), None);

        // an explicit entry overrides the default
        let allowed = [ResolvedTurn {
            node: 3,
            from_arc: 7,
            to_arc: 7,
            restriction: TurnRestriction::Penalty(2.0),
        }];
        let table = TurnTable::new(&allowed, 0.0);
        assert_eq!(table.transition_cost(3, Some(7), 7), Some(2.0));
    }

    #[test]
    fn forbidden_moves_filtered_from_adjacency() {
        let graph = graph();
        let n2 = graph.node_by_external_id(2).unwrap();
        let resolved =
            resolve_records(&graph, &[fixtures::forbidden_turn(2, 101, 102)]).unwrap();
        let table = TurnTable::new(&resolved, 0.0);

        // arriving at N2 via A101: the only departure (A102) is forbidden
        let moves: Vec<_> = table.allowed_moves(&graph, n2, Some(0)).collect();
        assert!(moves.is_empty());

        // no incoming context: unrestricted
        let moves: Vec<_> = table.allowed_moves(&graph, n2, None).collect();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].1, 0.0);
    }
}
