//! A fixed-point engine for data flow analyses over a `ControlFlowGraph`.
//!
//! Analyses implement `FixedPointAnalysis`, giving a direction, a transfer
//! function and a join. The engine computes a state before and after every
//! node, and stops once another application of every transfer function
//! would change nothing.

use log::trace;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Debug;

use crate::cfg::{ControlFlowGraph, Node};
use crate::Error;

/// The direction facts flow through the graph.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    /// From predecessors to successors, starting at the entry.
    Forward,
    /// From successors to predecessors, starting at the exit.
    Backward,
}

/// How the engine chooses the next node to visit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum SolverStrategy {
    /// Revisit only the nodes whose inputs changed, seeded in reverse
    /// post-order.
    Worklist,
    /// Sweep every node until a full sweep changes nothing.
    RoundRobin,
}

pub trait FixedPointAnalysis<State: Clone + Debug + Default + PartialEq> {
    fn direction(&self) -> Direction;

    /// Given the state flowing into a node, create the state flowing out of
    /// it. `None` means no state has reached the node yet.
    fn trans(&self, node: &Node, state: Option<State>) -> Result<State, Error>;

    /// Given two states, join them into one state.
    fn join(&self, state0: State, state1: &State) -> Result<State, Error>;
}

/// The states computed by a fixed-point analysis, keyed by node id.
///
/// `in_state` is the state immediately before a node executes and
/// `out_state` the state immediately after, regardless of the direction of
/// the analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataFlowFacts<State> {
    in_facts: BTreeMap<String, State>,
    out_facts: BTreeMap<String, State>,
    #[serde(skip)]
    empty: State,
}

impl<State: Default> DataFlowFacts<State> {
    /// The state before the node `id`. Unknown ids have an empty state.
    pub fn in_state(&self, id: &str) -> &State {
        self.in_facts.get(id).unwrap_or(&self.empty)
    }

    /// The state after the node `id`. Unknown ids have an empty state.
    pub fn out_state(&self, id: &str) -> &State {
        self.out_facts.get(id).unwrap_or(&self.empty)
    }

    pub fn in_facts(&self) -> &BTreeMap<String, State> {
        &self.in_facts
    }

    pub fn out_facts(&self) -> &BTreeMap<String, State> {
        &self.out_facts
    }
}

/// Neighbors of every node, in the direction facts flow.
struct Flow {
    sources: Vec<Vec<usize>>,
    sinks: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl Flow {
    fn new(cfg: &ControlFlowGraph, direction: Direction) -> Result<Flow, Error> {
        let graph = cfg.graph();
        let count = graph.num_vertices();

        let mut predecessors = Vec::with_capacity(count);
        let mut successors = Vec::with_capacity(count);
        for index in 0..count {
            predecessors.push(graph.predecessor_indices(index)?);
            successors.push(graph.successor_indices(index)?);
        }

        // Reverse post-order from the entry visits a node's predecessors
        // first; post-order visits its successors first.
        let mut order = match direction {
            Direction::Forward => graph.compute_reverse_post_order(cfg.entry())?,
            Direction::Backward => graph.compute_post_order(cfg.entry())?,
        };
        let mut ordered: FxHashSet<usize> = order.iter().copied().collect();
        for index in 0..count {
            if ordered.insert(index) {
                order.push(index);
            }
        }

        Ok(match direction {
            Direction::Forward => Flow {
                sources: predecessors,
                sinks: successors,
                order,
            },
            Direction::Backward => Flow {
                sources: successors,
                sinks: predecessors,
                order,
            },
        })
    }
}

/// Join the output states of `sources`, skipping those not yet computed.
fn join_sources<State, A>(
    analysis: &A,
    sources: &[usize],
    outputs: &[Option<State>],
) -> Result<Option<State>, Error>
where
    State: Clone + Debug + Default + PartialEq,
    A: FixedPointAnalysis<State>,
{
    let mut joined: Option<State> = None;
    for source in sources {
        if let Some(ref state) = outputs[*source] {
            joined = Some(match joined {
                Some(joined) => analysis.join(joined, state)?,
                None => state.clone(),
            });
        }
    }
    Ok(joined)
}

/// Run `analysis` over `cfg` until it reaches a fixed point.
pub fn fixed_point<State, A>(
    analysis: &A,
    cfg: &ControlFlowGraph,
    strategy: SolverStrategy,
) -> Result<DataFlowFacts<State>, Error>
where
    State: Clone + Debug + Default + PartialEq,
    A: FixedPointAnalysis<State>,
{
    let direction = analysis.direction();
    let flow = Flow::new(cfg, direction)?;
    let nodes = cfg.nodes();

    let mut inputs: Vec<Option<State>> = vec![None; nodes.len()];
    let mut outputs: Vec<Option<State>> = vec![None; nodes.len()];

    // Returns true if the output of the node changed.
    let visit = |index: usize,
                     inputs: &mut Vec<Option<State>>,
                     outputs: &mut Vec<Option<State>>|
     -> Result<bool, Error> {
        let input = join_sources(analysis, &flow.sources[index], outputs)?;
        let output = analysis.trans(nodes[index], input.clone())?;
        trace!("{} -> {:?}", nodes[index].id(), output);
        inputs[index] = input;
        if outputs[index].as_ref() == Some(&output) {
            return Ok(false);
        }
        outputs[index] = Some(output);
        Ok(true)
    };

    let mut steps = 0;
    match strategy {
        SolverStrategy::Worklist => {
            let mut queue: VecDeque<usize> = flow.order.iter().copied().collect();
            let mut queued: FxHashSet<usize> = queue.iter().copied().collect();
            while let Some(index) = queue.pop_front() {
                queued.remove(&index);
                steps += 1;
                if visit(index, &mut inputs, &mut outputs)? {
                    for sink in &flow.sinks[index] {
                        if queued.insert(*sink) {
                            queue.push_back(*sink);
                        }
                    }
                }
            }
        }
        SolverStrategy::RoundRobin => loop {
            let mut changed = false;
            for index in &flow.order {
                steps += 1;
                changed |= visit(*index, &mut inputs, &mut outputs)?;
            }
            if !changed {
                break;
            }
        },
    }
    trace!(
        "Fixed point for {} reached after {} steps",
        cfg.function_name(),
        steps
    );

    let mut before = BTreeMap::new();
    let mut after = BTreeMap::new();
    for node in &nodes {
        let index = node.index();
        let input = inputs[index].take().unwrap_or_default();
        let output = outputs[index].take().unwrap_or_default();
        let (in_state, out_state) = match direction {
            Direction::Forward => (input, output),
            Direction::Backward => (output, input),
        };
        before.insert(node.id().to_string(), in_state);
        after.insert(node.id().to_string(), out_state);
    }

    Ok(DataFlowFacts {
        in_facts: before,
        out_facts: after,
        empty: State::default(),
    })
}

/// Returns true if one more application of every transfer function to
/// `facts` changes nothing.
pub fn is_fixed_point<State, A>(
    analysis: &A,
    cfg: &ControlFlowGraph,
    facts: &DataFlowFacts<State>,
) -> Result<bool, Error>
where
    State: Clone + Debug + Default + PartialEq,
    A: FixedPointAnalysis<State>,
{
    let direction = analysis.direction();
    let flow = Flow::new(cfg, direction)?;
    let nodes = cfg.nodes();

    // The stored state on the output side of every node, in flow order.
    let outputs: Vec<Option<State>> = nodes
        .iter()
        .map(|node| {
            Some(match direction {
                Direction::Forward => facts.out_state(node.id()).clone(),
                Direction::Backward => facts.in_state(node.id()).clone(),
            })
        })
        .collect();

    for node in &nodes {
        let index = node.index();
        let input = join_sources(analysis, &flow.sources[index], &outputs)?;
        let (stored_input, stored_output) = match direction {
            Direction::Forward => (facts.in_state(node.id()), facts.out_state(node.id())),
            Direction::Backward => (facts.out_state(node.id()), facts.in_state(node.id())),
        };
        if input.clone().unwrap_or_default() != *stored_input {
            return Ok(false);
        }
        if analysis.trans(node, input)? != *stored_output {
            return Ok(false);
        }
    }

    Ok(true)
}
