//! Call graphs under class hierarchy analysis and rapid type analysis.
//!
//! Both algorithms resolve a call by name alone. Under CHA, a call to `m`
//! may reach `C.m` for every contract `C` in the hierarchy which declares
//! `m`, directly or as a base of another contract. RTA keeps only the
//! targets whose contract is instantiated somewhere in the program with a
//! `new` expression. RTA therefore never contains an edge CHA does not, and
//! a call whose targets are all never instantiated has no RTA edges at all.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::analysis::class_hierarchy::ClassHierarchy;
use crate::ast::{self, NodeKind, SourceUnit};
use crate::export::GraphExport;
use crate::Error;

/// The precision of call graph resolution.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Algorithm {
    /// Class hierarchy analysis.
    ClassHierarchy,
    /// Rapid type analysis.
    RapidType,
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Algorithm, Error> {
        match s {
            "CHA" => Ok(Algorithm::ClassHierarchy),
            "RTA" => Ok(Algorithm::RapidType),
            _ => Err(Error::InvalidAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Algorithm::ClassHierarchy => write!(f, "CHA"),
            Algorithm::RapidType => write!(f, "RTA"),
        }
    }
}

/// Which bases of a contract are searched for call targets.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum BaseResolution {
    /// Every base, direct or inherited.
    Transitive,
    /// Only the bases a contract lists.
    Direct,
}

/// The name called at a call site, if the callee is named.
fn call_target(mut callee: &ast::Node) -> Option<&str> {
    loop {
        match *callee.kind() {
            NodeKind::Identifier { ref name, .. } => return Some(name.as_str()),
            NodeKind::MemberAccess {
                ref member_name, ..
            } => return Some(member_name.as_str()),
            // f{value: 1}(...)
            NodeKind::FunctionCallOptions { ref expression, .. } => callee = &**expression,
            _ => return None,
        }
    }
}

/// The names called anywhere within `node`, in pre-order.
pub fn call_sites(node: &ast::Node) -> Vec<String> {
    let mut names = Vec::new();
    for node in node.descendants() {
        if let NodeKind::FunctionCall { ref expression, .. } = *node.kind() {
            if let Some(name) = call_target(expression) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// The contracts instantiated with `new` anywhere within `node`.
pub fn instantiated_contracts(node: &ast::Node) -> BTreeSet<String> {
    let mut contracts = BTreeSet::new();
    for node in node.descendants() {
        if let NodeKind::NewExpression { ref type_name } = *node.kind() {
            if let NodeKind::UserDefinedTypeName { ref name } = *type_name.kind() {
                contracts.insert(name.to_string());
            }
        }
    }
    contracts
}

/// A mapping from `Contract.function` to the `Contract.function`s it may
/// call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CallGraph {
    algorithm: Algorithm,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl CallGraph {
    /// Resolve the call graph of every contract function in `source_unit`.
    ///
    /// Every non-constructor contract function is a caller, even when it
    /// calls nothing. Overloaded functions share one caller.
    pub fn new(
        source_unit: &SourceUnit,
        hierarchy: &ClassHierarchy,
        algorithm: Algorithm,
        base_resolution: BaseResolution,
    ) -> CallGraph {
        let instantiated = match algorithm {
            Algorithm::ClassHierarchy => None,
            Algorithm::RapidType => {
                let instantiated = instantiated_contracts(source_unit.node());
                debug!("Instantiated contracts: {:?}", instantiated);
                Some(instantiated)
            }
        };

        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for function in source_unit.functions() {
            let contract = match function.contract() {
                Some(contract) => contract,
                None => continue,
            };
            if function.definition().is_constructor() {
                continue;
            }

            let callees = edges.entry(function.qualified_name()).or_default();
            let body = match function.definition().body {
                Some(ref body) => body,
                None => continue,
            };
            for name in call_sites(body) {
                for target in resolve(hierarchy, &name, base_resolution) {
                    let keep = match instantiated {
                        Some(ref instantiated) => target
                            .split('.')
                            .next()
                            .map(|contract| instantiated.contains(contract))
                            .unwrap_or(false),
                        None => true,
                    };
                    if keep {
                        callees.insert(target);
                    } else {
                        debug!(
                            "{}: dropped {} from {}.{}, never instantiated",
                            algorithm,
                            target,
                            contract.name,
                            function.name()
                        );
                    }
                }
            }
        }

        CallGraph { algorithm, edges }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.edges
    }

    /// The possible callees of `caller`, or `None` if `caller` is not a
    /// contract function.
    pub fn callees(&self, caller: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(caller)
    }

    pub fn contains_edge(&self, caller: &str, callee: &str) -> bool {
        self.edges
            .get(caller)
            .map(|callees| callees.contains(callee))
            .unwrap_or(false)
    }

    pub fn num_edges(&self) -> usize {
        self.edges.values().map(|callees| callees.len()).sum()
    }

    /// Returns true if every edge of this graph is also an edge of `other`.
    pub fn is_subgraph_of(&self, other: &CallGraph) -> bool {
        self.edges.iter().all(|(caller, callees)| {
            callees
                .iter()
                .all(|callee| other.contains_edge(caller, callee))
        })
    }

    /// One node per function, callers and callees alike.
    pub fn export(&self) -> GraphExport {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for (caller, callees) in &self.edges {
            names.insert(caller);
            names.extend(callees.iter().map(|callee| callee.as_str()));
        }

        let mut export = GraphExport::new();
        for name in names {
            export.add_node(name, name, None);
        }
        for (caller, callees) in &self.edges {
            for callee in callees {
                export.add_edge(caller.as_str(), callee.as_str(), None);
            }
        }
        export
    }
}

/// Every `Contract.name` a call to `name` may reach under class hierarchy
/// analysis.
fn resolve(
    hierarchy: &ClassHierarchy,
    name: &str,
    base_resolution: BaseResolution,
) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    for (contract, info) in hierarchy.contracts() {
        if info.declares(name) {
            targets.insert(format!("{}.{}", contract, name));
        }
        let bases = match base_resolution {
            BaseResolution::Transitive => hierarchy.transitive_bases(contract),
            BaseResolution::Direct => hierarchy.direct_bases(contract),
        };
        for base in bases {
            if hierarchy.declares(&base, name) {
                targets.insert(format!("{}.{}", base, name));
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::AstBuilder;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn parse_algorithm() {
        assert_eq!("CHA".parse::<Algorithm>().unwrap(), Algorithm::ClassHierarchy);
        assert_eq!("RTA".parse::<Algorithm>().unwrap(), Algorithm::RapidType);
        match "cha".parse::<Algorithm>() {
            Err(Error::InvalidAlgorithm(name)) => assert_eq!(name, "cha"),
            result => panic!("unexpected {:?}", result),
        }
    }

    #[test]
    fn nested_call_sites() {
        // token.transfer(to, balanceOf(owner())) with an options call g{value: 1}()
        let ast = AstBuilder::new();
        let inner = ast.call("balanceOf", vec![ast.call("owner", vec![])]);
        let transfer = ast.member_call(
            ast.identifier("token"),
            "transfer",
            vec![ast.identifier("to"), inner],
        );
        let options = ast.call_options(ast.identifier("g"));
        let body = ast.block(vec![ast.expr(transfer), ast.expr(ast.call_value(options))]);
        let function = ast.function("f", Some(body));
        let unit = ast.source_unit(vec![ast.contract("C", &[], vec![function])]);
        let source_unit = SourceUnit::from_json(&unit).unwrap();

        let names = call_sites(source_unit.functions()[0].node());
        assert_eq!(names, vec!["transfer", "balanceOf", "owner", "g"]);
    }

    #[test]
    fn rapid_type_filters_targets() {
        // contract A { function run() {} }
        // contract B { function run() {} }
        // contract Main { function go() { new A(); x.run(); } }
        let ast = AstBuilder::new();
        let go = ast.function(
            "go",
            Some(ast.block(vec![
                ast.expr(ast.call_value(ast.new_("A"))),
                ast.expr(ast.member_call(ast.identifier("x"), "run", vec![])),
            ])),
        );
        let unit = ast.source_unit(vec![
            ast.contract("A", &[], vec![ast.function("run", Some(ast.block(vec![])))]),
            ast.contract("B", &[], vec![ast.function("run", Some(ast.block(vec![])))]),
            ast.contract("Main", &[], vec![go]),
        ]);
        let source_unit = SourceUnit::from_json(&unit).unwrap();
        let hierarchy = ClassHierarchy::new(&source_unit);

        assert_eq!(instantiated_contracts(source_unit.node()), set(&["A"]));

        let cha = CallGraph::new(
            &source_unit,
            &hierarchy,
            Algorithm::ClassHierarchy,
            BaseResolution::Transitive,
        );
        let rta = CallGraph::new(
            &source_unit,
            &hierarchy,
            Algorithm::RapidType,
            BaseResolution::Transitive,
        );

        assert_eq!(cha.callees("Main.go"), Some(&set(&["A.run", "B.run"])));
        assert_eq!(rta.callees("Main.go"), Some(&set(&["A.run"])));
        assert_eq!(rta.callees("A.run"), Some(&BTreeSet::new()));
        assert!(rta.is_subgraph_of(&cha));
        assert!(!cha.is_subgraph_of(&rta));
        assert_eq!(cha.num_edges(), 2);

        let export = cha.export();
        assert_eq!(export.nodes().len(), 3);
        assert_eq!(export.edges().len(), 2);
    }

    #[test]
    fn direct_bases_only() {
        // contract A { function f() {} }
        // contract B is A {}
        // contract C is B { function g() { f(); } }
        // Every contract declaring f is found either way; the two modes
        // differ only in how far each contract's bases are walked.
        let ast = AstBuilder::new();
        let g = ast.function(
            "g",
            Some(ast.block(vec![ast.expr(ast.call("f", vec![]))])),
        );
        let unit = ast.source_unit(vec![
            ast.contract("A", &[], vec![ast.function("f", Some(ast.block(vec![])))]),
            ast.contract("B", &["A"], vec![]),
            ast.contract("C", &["B"], vec![g]),
        ]);
        let source_unit = SourceUnit::from_json(&unit).unwrap();
        let hierarchy = ClassHierarchy::new(&source_unit);

        for resolution in [BaseResolution::Transitive, BaseResolution::Direct] {
            let cha = CallGraph::new(
                &source_unit,
                &hierarchy,
                Algorithm::ClassHierarchy,
                resolution,
            );
            assert_eq!(cha.callees("C.g"), Some(&set(&["A.f"])));
        }
    }
}
