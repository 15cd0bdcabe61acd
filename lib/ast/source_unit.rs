use serde_json::Value;

use crate::ast::json::Converter;
use crate::ast::{ContractDefinition, FunctionDefinition, Node, NodeKind};
use crate::{Error, Failure};

/// The root of a converted AST, along with the functions which could not be
/// converted.
#[derive(Debug)]
pub struct SourceUnit {
    node: Node,
    failures: Vec<Failure>,
}

/// A function definition, and the contract which declares it.
#[derive(Clone, Copy, Debug)]
pub struct RefFunction<'a> {
    contract: Option<&'a ContractDefinition>,
    node: &'a Node,
    definition: &'a FunctionDefinition,
}

impl<'a> RefFunction<'a> {
    /// The declaring contract, or `None` for file-level functions.
    pub fn contract(&self) -> Option<&'a ContractDefinition> {
        self.contract
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn definition(&self) -> &'a FunctionDefinition {
        self.definition
    }

    pub fn id(&self) -> u64 {
        self.node.id()
    }

    pub fn name(&self) -> &'a str {
        self.definition.display_name()
    }

    /// `Contract.function`, or the bare name of a file-level function.
    pub fn qualified_name(&self) -> String {
        match self.contract {
            Some(contract) => format!("{}.{}", contract.name, self.name()),
            None => self.name().to_string(),
        }
    }
}

impl SourceUnit {
    /// Convert a solc compact JSON AST. Function definitions which fail to
    /// convert are recorded in `failures`; any other failure is an error.
    pub fn from_json(value: &Value) -> Result<SourceUnit, Error> {
        SourceUnit::convert(value, false)
    }

    /// Convert a solc compact JSON AST, failing on the first error.
    pub fn from_json_strict(value: &Value) -> Result<SourceUnit, Error> {
        SourceUnit::convert(value, true)
    }

    fn convert(value: &Value, strict: bool) -> Result<SourceUnit, Error> {
        let mut converter = Converter::new(strict);
        let node = converter.node(value)?;
        if !matches!(node.kind(), NodeKind::SourceUnit { .. }) {
            return Err(Error::InvalidField {
                kind: node.node_type().to_string(),
                id: node.id(),
                field: "nodeType",
            });
        }

        Ok(SourceUnit {
            node,
            failures: converter.into_failures(),
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Function definitions which failed to convert.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Every contract, interface and library, in source order.
    pub fn contracts(&self) -> impl Iterator<Item = &ContractDefinition> {
        self.node.children().into_iter().filter_map(Node::as_contract)
    }

    /// Look up a contract by name.
    pub fn contract(&self, name: &str) -> Option<&ContractDefinition> {
        self.contracts().find(|contract| contract.name == name)
    }

    /// Every function definition, file-level functions first and then each
    /// contract's functions, in source order.
    pub fn functions(&self) -> Vec<RefFunction<'_>> {
        let mut functions = Vec::new();
        for node in self.node.children() {
            if let Some(definition) = node.as_function() {
                functions.push(RefFunction {
                    contract: None,
                    node,
                    definition,
                });
            }
        }
        for contract in self.contracts() {
            for (node, definition) in contract.functions() {
                functions.push(RefFunction {
                    contract: Some(contract),
                    node,
                    definition,
                });
            }
        }
        functions
    }
}
