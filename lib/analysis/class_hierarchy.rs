//! Per-contract inheritance and method tables.

use log::debug;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ast::SourceUnit;
use crate::export::GraphExport;

/// What a single contract declares.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ContractInfo {
    base_contracts: Vec<String>,
    functions: Vec<String>,
}

impl ContractInfo {
    /// Base contracts as written, in declaration order. Duplicates are kept.
    pub fn base_contracts(&self) -> &[String] {
        &self.base_contracts
    }

    /// Names of the non-constructor functions declared directly in this
    /// contract, in declaration order. Overloads appear once.
    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn declares(&self, function: &str) -> bool {
        self.functions.iter().any(|f| f == function)
    }
}

/// Contract name to the bases and functions that contract declares.
///
/// Bases are recorded as written. Nothing is flattened here; see
/// `transitive_bases`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ClassHierarchy {
    contracts: BTreeMap<String, ContractInfo>,
}

impl ClassHierarchy {
    pub fn new(source_unit: &SourceUnit) -> ClassHierarchy {
        let mut contracts = BTreeMap::new();

        for contract in source_unit.contracts() {
            let mut functions: Vec<String> = Vec::new();
            for (_, function) in contract.functions() {
                if function.is_constructor() {
                    continue;
                }
                let name = function.display_name();
                if !functions.iter().any(|f| f == name) {
                    functions.push(name.to_string());
                }
            }

            let info = ContractInfo {
                base_contracts: contract.base_contracts.clone(),
                functions,
            };
            if contracts.insert(contract.name.clone(), info).is_some() {
                debug!("Contract {} is declared more than once", contract.name);
            }
        }

        ClassHierarchy { contracts }
    }

    pub fn contract(&self, name: &str) -> Option<&ContractInfo> {
        self.contracts.get(name)
    }

    pub fn contracts(&self) -> &BTreeMap<String, ContractInfo> {
        &self.contracts
    }

    /// Returns true if `contract` directly declares `function`.
    pub fn declares(&self, contract: &str, function: &str) -> bool {
        self.contracts
            .get(contract)
            .map(|info| info.declares(function))
            .unwrap_or(false)
    }

    /// Every base of `contract`, direct or inherited, each listed once in
    /// depth-first declaration order. Bases which are not in the hierarchy
    /// are skipped.
    pub fn transitive_bases(&self, contract: &str) -> Vec<String> {
        let mut bases = Vec::new();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        visited.insert(contract);

        let mut stack: Vec<&str> = match self.contracts.get(contract) {
            Some(info) => info.base_contracts.iter().rev().map(|b| b.as_str()).collect(),
            None => return bases,
        };

        while let Some(base) = stack.pop() {
            if !visited.insert(base) {
                continue;
            }
            match self.contracts.get(base) {
                Some(info) => {
                    bases.push(base.to_string());
                    stack.extend(info.base_contracts.iter().rev().map(|b| b.as_str()));
                }
                None => debug!("Base {} of {} is not in the hierarchy", base, contract),
            }
        }

        bases
    }

    /// The listed bases of `contract` which are in the hierarchy, each once.
    pub fn direct_bases(&self, contract: &str) -> Vec<String> {
        let mut bases: Vec<String> = Vec::new();
        if let Some(info) = self.contracts.get(contract) {
            for base in &info.base_contracts {
                if !self.contracts.contains_key(base) {
                    debug!("Base {} of {} is not in the hierarchy", base, contract);
                } else if base != contract && !bases.contains(base) {
                    bases.push(base.to_string());
                }
            }
        }
        bases
    }

    /// One node per contract, with edges from each base to the contracts
    /// deriving from it.
    pub fn export(&self) -> GraphExport {
        let mut export = GraphExport::new();
        for (name, info) in &self.contracts {
            let mut label = name.to_string();
            for function in &info.functions {
                label.push('\n');
                label.push_str(function);
            }
            export.add_node(name.as_str(), label, None);
        }
        for (name, info) in &self.contracts {
            for base in &info.base_contracts {
                if self.contracts.contains_key(base) {
                    export.add_edge(base.as_str(), name.as_str(), None);
                }
            }
        }
        export
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::AstBuilder;

    fn hierarchy() -> ClassHierarchy {
        // contract A { function a() {} }
        // contract B is A { constructor() {} function b() {} function b(uint) {} }
        // contract C is B, A, Missing { function c() {} }
        let ast = AstBuilder::new();
        let unit = ast.source_unit(vec![
            ast.contract("A", &[], vec![ast.function("a", Some(ast.block(vec![])))]),
            ast.contract(
                "B",
                &["A"],
                vec![
                    ast.constructor(Some(ast.block(vec![]))),
                    ast.function("b", Some(ast.block(vec![]))),
                    ast.function("b", Some(ast.block(vec![]))),
                ],
            ),
            ast.contract(
                "C",
                &["B", "A", "Missing"],
                vec![ast.function("c", Some(ast.block(vec![])))],
            ),
        ]);
        ClassHierarchy::new(&SourceUnit::from_json(&unit).unwrap())
    }

    #[test]
    fn method_tables() {
        let hierarchy = hierarchy();
        let b = hierarchy.contract("B").unwrap();
        assert_eq!(b.base_contracts(), ["A".to_string()]);
        assert_eq!(b.functions(), ["b".to_string()]);
        assert!(hierarchy.declares("A", "a"));
        assert!(!hierarchy.declares("C", "a"));
        assert!(!hierarchy.declares("Missing", "a"));
    }

    #[test]
    fn bases() {
        let hierarchy = hierarchy();
        assert_eq!(hierarchy.transitive_bases("C"), vec!["B", "A"]);
        assert_eq!(hierarchy.direct_bases("C"), vec!["B", "A"]);
        assert_eq!(hierarchy.transitive_bases("B"), vec!["A"]);
        assert!(hierarchy.transitive_bases("A").is_empty());
        assert!(hierarchy.transitive_bases("Missing").is_empty());
    }

    #[test]
    fn export_edges_point_to_derived() {
        let export = hierarchy().export();
        assert_eq!(export.nodes().len(), 3);
        let edges = export
            .edges()
            .iter()
            .map(|edge| (edge.from.as_str(), edge.to.as_str()))
            .collect::<Vec<(&str, &str)>>();
        assert_eq!(edges, vec![("A", "B"), ("B", "C"), ("A", "C")]);
    }
}
