//! Shortest-path search over the cost graph
//!
//! Dijkstra with a binary-heap frontier. The search state is a node, or
//! a (node, arrived-via-arc) pair when turn restrictions are active so
//! the correct turntable entry is evaluated at each expansion.
//! Interpolated endpoints never touch the shared graph: the start seeds
//! the frontier with its partial-arc legs and the end is recognized at
//! settle time on either endpoint of its arc.
//!
//! Equal-cost frontier entries pop in discovery order, which keeps tie
//! resolution deterministic for a fixed adjacency order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::error::QueryError;
use crate::graph::{ArcId, CostGraph, Direction, GraphPosition, NodeId};
use crate::turns::TurnTable;

/// Sentinel for "no arriving arc" in a search state.
const NO_ARC: u32 = u32::MAX;

/// One traversed piece of an arc. `enter_t`/`exit_t` are length
/// fractions in the arc's own parameterization; a forward traversal has
/// `exit_t > enter_t`, a full traversal spans 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSegment {
    pub arc: ArcId,
    pub direction: Direction,
    pub enter_t: f64,
    pub exit_t: f64,
}

impl RouteSegment {
    fn full(arc: ArcId, direction: Direction) -> Self {
        match direction {
            Direction::Forward => Self { arc, direction, enter_t: 0.0, exit_t: 1.0 },
            Direction::Backward => Self { arc, direction, enter_t: 1.0, exit_t: 0.0 },
        }
    }
}

/// A solved query. Consumed by the emitter and discarded.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub segments: Vec<RouteSegment>,
    pub cost: f64,
    pub start: GraphPosition,
    pub end: GraphPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StateKey {
    node: NodeId,
    via: u32,
}

#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    cost: f64,
    seq: u64,
    key: StateKey,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for a min-heap; equal costs pop in discovery order
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy)]
enum ParentLink {
    /// Seeded from the start position; carries the partial start segment
    /// when the start interpolates onto an arc.
    Start(Option<RouteSegment>),
    Step { prev: StateKey, segment: RouteSegment },
}

/// The final partial leg onto an interpolated end arc.
#[derive(Debug, Clone, Copy)]
struct EndLeg {
    arc: ArcId,
    segment: RouteSegment,
    cost: f64,
}

#[derive(Debug, Clone, Copy)]
struct EndTarget {
    node: NodeId,
    leg: Option<EndLeg>,
}

#[derive(Debug, Clone)]
enum Completed {
    /// Both endpoints on one arc, traversed directly.
    Direct(RouteSegment),
    Search { state: StateKey, leg: Option<EndLeg> },
}

pub struct PathSolver<'a> {
    graph: &'a CostGraph,
    turns: Option<&'a TurnTable>,
    cost_ceiling: Option<f64>,
}

impl<'a> PathSolver<'a> {
    pub fn new(
        graph: &'a CostGraph,
        turns: Option<&'a TurnTable>,
        cost_ceiling: Option<f64>,
    ) -> Self {
        Self { graph, turns, cost_ceiling }
    }

    /// Least-cost path between two resolved positions.
    pub fn shortest_path(
        &self,
        start: &GraphPosition,
        end: &GraphPosition,
    ) -> Result<PathResult, QueryError> {
        if start.same_place(end) {
            return Ok(PathResult { segments: Vec::new(), cost: 0.0, start: *start, end: *end });
        }

        let start_node = match start {
            GraphPosition::Node { node, .. } => Some(*node),
            GraphPosition::OnArc { .. } => None,
        };
        let targets = self.end_targets(end);
        let mut best = self.direct_candidate(start, end);

        let mut dist: FxHashMap<StateKey, f64> = FxHashMap::default();
        let mut parent: FxHashMap<StateKey, ParentLink> = FxHashMap::default();
        let mut heap: BinaryHeap<FrontierEntry> = BinaryHeap::new();
        let mut seq = 0u64;

        let mut push = |key: StateKey,
                        cost: f64,
                        link: ParentLink,
                        dist: &mut FxHashMap<StateKey, f64>,
                        parent: &mut FxHashMap<StateKey, ParentLink>,
                        heap: &mut BinaryHeap<FrontierEntry>| {
            if cost < dist.get(&key).copied().unwrap_or(f64::INFINITY) {
                dist.insert(key, cost);
                parent.insert(key, link);
                heap.push(FrontierEntry { cost, seq, key });
                seq += 1;
            }
        };

        match start {
            GraphPosition::Node { node, .. } => {
                push(
                    StateKey { node: *node, via: NO_ARC },
                    0.0,
                    ParentLink::Start(None),
                    &mut dist,
                    &mut parent,
                    &mut heap,
                );
            }
            GraphPosition::OnArc { arc, t, .. } => {
                let a = self.graph.arc(*arc);
                if a.forward_cost.is_finite() {
                    push(
                        self.state(a.to, *arc),
                        a.forward_cost * (1.0 - t),
                        ParentLink::Start(Some(RouteSegment {
                            arc: *arc,
                            direction: Direction::Forward,
                            enter_t: *t,
                            exit_t: 1.0,
                        })),
                        &mut dist,
                        &mut parent,
                        &mut heap,
                    );
                }
                if a.backward_cost.is_finite() {
                    push(
                        self.state(a.from, *arc),
                        a.backward_cost * t,
                        ParentLink::Start(Some(RouteSegment {
                            arc: *arc,
                            direction: Direction::Backward,
                            enter_t: *t,
                            exit_t: 0.0,
                        })),
                        &mut dist,
                        &mut parent,
                        &mut heap,
                    );
                }
            }
        }

        let mut best_total = best.as_ref().map(|(total, _)| *total);
        let mut moves: Vec<(crate::graph::HalfArc, f64)> = Vec::new();

        while let Some(FrontierEntry { cost, key, .. }) = heap.pop() {
            if cost > dist.get(&key).copied().unwrap_or(f64::INFINITY) {
                continue; // stale entry
            }
            if let Some(total) = best_total {
                if cost >= total {
                    break; // nothing left can improve on the best route
                }
            }

            let via = if key.via == NO_ARC { None } else { Some(key.via) };
            let interior = match self.turns {
                Some(_) => via.is_some(),
                None => start_node != Some(key.node),
            };
            let node_cost = if interior { self.graph.node(key.node).cost } else { 0.0 };

            // did we settle an endpoint of the end position?
            for target in &targets {
                if target.node != key.node {
                    continue;
                }
                let total = match &target.leg {
                    None => cost,
                    Some(leg) => {
                        let extra = match self.turns {
                            Some(table) => {
                                match table.transition_cost(key.node, via, leg.arc) {
                                    Some(extra) => extra,
                                    None => continue,
                                }
                            }
                            None => 0.0,
                        };
                        cost + node_cost + extra + leg.cost
                    }
                };
                if total.is_finite() && best_total.map_or(true, |b| total < b) {
                    best_total = Some(total);
                    best = Some((total, Completed::Search { state: key, leg: target.leg }));
                }
            }

            moves.clear();
            match self.turns {
                Some(table) => moves.extend(table.allowed_moves(self.graph, key.node, via)),
                None => {
                    moves.extend(self.graph.outgoing(key.node).iter().map(|h| (*h, 0.0)))
                }
            }
            for (half, extra) in &moves {
                let next_cost = cost + node_cost + extra + half.cost;
                if !next_cost.is_finite() {
                    continue;
                }
                if let Some(ceiling) = self.cost_ceiling {
                    if next_cost > ceiling {
                        continue;
                    }
                }
                push(
                    self.state(half.head, half.arc),
                    next_cost,
                    ParentLink::Step {
                        prev: key,
                        segment: RouteSegment::full(half.arc, half.direction),
                    },
                    &mut dist,
                    &mut parent,
                    &mut heap,
                );
            }
        }

        let (total, completed) = best.ok_or(QueryError::Unreachable)?;
        let segments = self.reconstruct(&completed, &parent);
        Ok(PathResult { segments, cost: total, start: *start, end: *end })
    }

    fn state(&self, node: NodeId, via: ArcId) -> StateKey {
        if self.turns.is_some() {
            StateKey { node, via }
        } else {
            StateKey { node, via: NO_ARC }
        }
    }

    fn end_targets(&self, end: &GraphPosition) -> Vec<EndTarget> {
        match end {
            GraphPosition::Node { node, .. } => vec![EndTarget { node: *node, leg: None }],
            GraphPosition::OnArc { arc, t, .. } => {
                let a = self.graph.arc(*arc);
                let mut targets = Vec::with_capacity(2);
                if a.forward_cost.is_finite() {
                    targets.push(EndTarget {
                        node: a.from,
                        leg: Some(EndLeg {
                            arc: *arc,
                            segment: RouteSegment {
                                arc: *arc,
                                direction: Direction::Forward,
                                enter_t: 0.0,
                                exit_t: *t,
                            },
                            cost: a.forward_cost * t,
                        }),
                    });
                }
                if a.backward_cost.is_finite() {
                    targets.push(EndTarget {
                        node: a.to,
                        leg: Some(EndLeg {
                            arc: *arc,
                            segment: RouteSegment {
                                arc: *arc,
                                direction: Direction::Backward,
                                enter_t: 1.0,
                                exit_t: *t,
                            },
                            cost: a.backward_cost * (1.0 - t),
                        }),
                    });
                }
                targets
            }
        }
    }

    /// Both endpoints on the same arc: the partial traversal between the
    /// two parameters, when that direction is open.
    fn direct_candidate(
        &self,
        start: &GraphPosition,
        end: &GraphPosition,
    ) -> Option<(f64, Completed)> {
        let (GraphPosition::OnArc { arc: sa, t: t1, .. }, GraphPosition::OnArc { arc: ea, t: t2, .. }) =
            (start, end)
        else {
            return None;
        };
        if sa != ea {
            return None;
        }
        let arc = self.graph.arc(*sa);
        let (cost, direction) = if t2 > t1 {
            (arc.forward_cost * (t2 - t1), Direction::Forward)
        } else {
            (arc.backward_cost * (t1 - t2), Direction::Backward)
        };
        if !cost.is_finite() {
            return None;
        }
        let segment = RouteSegment { arc: *sa, direction, enter_t: *t1, exit_t: *t2 };
        Some((cost, Completed::Direct(segment)))
    }

    fn reconstruct(
        &self,
        completed: &Completed,
        parent: &FxHashMap<StateKey, ParentLink>,
    ) -> Vec<RouteSegment> {
        match completed {
            Completed::Direct(segment) => vec![*segment],
            Completed::Search { state, leg } => {
                let mut segments = Vec::new();
                let mut cursor = *state;
                loop {
                    match parent.get(&cursor).expect("settled state has a parent link") {
                        ParentLink::Step { prev, segment } => {
                            segments.push(*segment);
                            cursor = *prev;
                        }
                        ParentLink::Start(seed) => {
                            if let Some(seed) = seed {
                                segments.push(*seed);
                            }
                            break;
                        }
                    }
                }
                segments.reverse();
                if let Some(leg) = leg {
                    segments.push(leg.segment);
                }
                segments
            }
        }
    }
}
