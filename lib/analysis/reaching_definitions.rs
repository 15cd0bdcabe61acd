use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::analysis::fixed_point::{self, DataFlowFacts, Direction, SolverStrategy};
use crate::cfg::{ControlFlowGraph, Node};
use crate::Error;

/// An assignment to `variable` made in the node `node`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Definition {
    variable: String,
    node: String,
}

impl Definition {
    pub fn new<V: Into<String>, N: Into<String>>(variable: V, node: N) -> Definition {
        Definition {
            variable: variable.into(),
            node: node.into(),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// The id of the node making this definition.
    pub fn node(&self) -> &str {
        &self.node
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.variable, self.node)
    }
}

/// Compute reaching definitions for the given control flow graph.
pub fn reaching_definitions(
    cfg: &ControlFlowGraph,
) -> Result<DataFlowFacts<BTreeSet<Definition>>, Error> {
    fixed_point::fixed_point(&ReachingDefinitions, cfg, SolverStrategy::Worklist)
}

/// Forward, may analysis of the definitions which reach every node.
pub struct ReachingDefinitions;

impl fixed_point::FixedPointAnalysis<BTreeSet<Definition>> for ReachingDefinitions {
    fn direction(&self) -> Direction {
        Direction::Forward
    }

    // OUT = GEN ∪ (IN − KILL), where KILL is every definition in IN of a
    // variable this node defines.
    fn trans(
        &self,
        node: &Node,
        state: Option<BTreeSet<Definition>>,
    ) -> Result<BTreeSet<Definition>, Error> {
        let mut state = state.unwrap_or_default();
        state.retain(|definition| !node.defs().contains(definition.variable()));
        for variable in node.defs() {
            state.insert(Definition::new(variable.as_str(), node.id()));
        }
        Ok(state)
    }

    fn join(
        &self,
        mut state0: BTreeSet<Definition>,
        state1: &BTreeSet<Definition>,
    ) -> Result<BTreeSet<Definition>, Error> {
        state0.extend(state1.iter().cloned());
        Ok(state0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixed_point::{is_fixed_point, FixedPointAnalysis};
    use crate::ast::SourceUnit;
    use crate::tests::fixtures::AstBuilder;

    #[test]
    fn reaching_definitions_test() {
        /*
        x = 0;
        if (c) {
            x = 1;
        } else {
            y = x;
        }
        z = x;
        */
        let ast = AstBuilder::new();
        let if_statement = ast.if_(
            ast.identifier("c"),
            ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(1)))]),
            Some(ast.block(vec![ast.expr(
                ast.assign(ast.identifier("y"), ast.identifier("x")),
            )])),
        );
        let if_id = if_statement["id"].as_u64().unwrap();
        let body = ast.block(vec![
            ast.expr(ast.assign(ast.identifier("x"), ast.number(0))),
            if_statement,
            ast.expr(ast.assign(ast.identifier("z"), ast.identifier("x"))),
        ]);
        let block = format!("{}_block", body["id"].as_u64().unwrap());
        let function = ast.function("f", Some(body));
        let unit = ast.source_unit(vec![ast.contract("C", &[], vec![function])]);
        let source_unit = SourceUnit::from_json(&unit).unwrap();
        let cfg = ControlFlowGraph::from_function(source_unit.functions()[0].node(), "").unwrap();

        let rd = reaching_definitions(&cfg).unwrap();

        let true_branch = format!("{}_true", if_id);
        let false_branch = format!("{}_false", if_id);
        let convergence = format!("{}_convergent", if_id);

        let expected: BTreeSet<Definition> = vec![
            Definition::new("x", true_branch.as_str()),
            Definition::new("x", block.as_str()),
            Definition::new("y", false_branch.as_str()),
        ]
        .into_iter()
        .collect();
        assert_eq!(*rd.in_state(&convergence), expected);

        // z = x is appended to the convergence node.
        let out = rd.out_state(&convergence);
        assert!(out.contains(&Definition::new("z", convergence.as_str())));
        assert_eq!(out.len(), 4);

        // x = 1 kills x = 0 along the true branch.
        assert_eq!(
            *rd.out_state(&true_branch),
            vec![Definition::new("x", true_branch.as_str())]
                .into_iter()
                .collect::<BTreeSet<Definition>>()
        );

        // Nothing reaches the entry.
        assert!(rd.in_state(cfg.entry_node().unwrap().id()).is_empty());

        assert!(is_fixed_point(&ReachingDefinitions, &cfg, &rd).unwrap());
    }

    #[test]
    fn transfer_equation_holds() {
        let ast = AstBuilder::new();
        let body = ast.block(vec![
            ast.declare("i", Some(ast.number(0))),
            ast.while_(
                ast.binary("<", ast.identifier("i"), ast.identifier("n")),
                ast.block(vec![ast.expr(ast.assign_op(
                    "+=",
                    ast.identifier("i"),
                    ast.number(1),
                ))]),
            ),
        ]);
        let function = ast.function("f", Some(body));
        let unit = ast.source_unit(vec![ast.contract("C", &[], vec![function])]);
        let source_unit = SourceUnit::from_json(&unit).unwrap();
        let cfg = ControlFlowGraph::from_function(source_unit.functions()[0].node(), "").unwrap();

        let rd = reaching_definitions(&cfg).unwrap();
        for node in cfg.nodes() {
            let gen: BTreeSet<Definition> = node
                .defs()
                .iter()
                .map(|variable| Definition::new(variable.as_str(), node.id()))
                .collect();
            let mut expected: BTreeSet<Definition> = rd
                .in_state(node.id())
                .iter()
                .filter(|definition| !node.defs().contains(definition.variable()))
                .cloned()
                .collect();
            expected.extend(gen);
            assert_eq!(*rd.out_state(node.id()), expected);

            let out = ReachingDefinitions
                .trans(node, Some(rd.in_state(node.id()).clone()))
                .unwrap();
            assert_eq!(out, *rd.out_state(node.id()));
        }
    }
}
