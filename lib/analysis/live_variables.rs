use std::collections::BTreeSet;

use crate::analysis::fixed_point::{self, DataFlowFacts, Direction, SolverStrategy};
use crate::cfg::{ControlFlowGraph, Node};
use crate::Error;

/// Compute the variables live before and after every node of the given
/// control flow graph.
pub fn live_variables(cfg: &ControlFlowGraph) -> Result<DataFlowFacts<BTreeSet<String>>, Error> {
    fixed_point::fixed_point(&LiveVariables, cfg, SolverStrategy::Worklist)
}

/// Backward, may analysis of the variables which may be read later.
pub struct LiveVariables;

impl fixed_point::FixedPointAnalysis<BTreeSet<String>> for LiveVariables {
    fn direction(&self) -> Direction {
        Direction::Backward
    }

    // IN = uses ∪ (OUT − defs)
    fn trans(
        &self,
        node: &Node,
        state: Option<BTreeSet<String>>,
    ) -> Result<BTreeSet<String>, Error> {
        let mut state = state.unwrap_or_default();
        state.retain(|variable| !node.defs().contains(variable));
        state.extend(node.uses().iter().cloned());
        Ok(state)
    }

    fn join(
        &self,
        mut state0: BTreeSet<String>,
        state1: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, Error> {
        state0.extend(state1.iter().cloned());
        Ok(state0)
    }
}
