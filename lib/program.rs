use log::warn;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::analysis::{Algorithm, BaseResolution, CallGraph, ClassHierarchy};
use crate::ast::{RefFunction, SourceUnit};
use crate::cfg::ControlFlowGraph;
use crate::Error;

/// A function which could not be modeled or analyzed.
#[derive(Clone, Debug)]
pub struct Failure {
    contract: Option<String>,
    function: String,
    function_id: u64,
    error: Arc<Error>,
}

impl Failure {
    pub fn new(
        contract: Option<String>,
        function: String,
        function_id: u64,
        error: Error,
    ) -> Failure {
        Failure {
            contract,
            function,
            function_id,
            error: Arc::new(error),
        }
    }

    /// The contract declaring the function, or `None` at file level.
    pub fn contract(&self) -> Option<&str> {
        self.contract.as_deref()
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn function_id(&self) -> u64 {
        self.function_id
    }

    pub fn error(&self) -> &Error {
        &self.error
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.contract {
            Some(ref contract) => write!(f, "{}.{}", contract, self.function)?,
            None => write!(f, "{}", self.function)?,
        }
        write!(f, " (node id {}): {}", self.function_id, self.error)
    }
}

impl Serialize for Failure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Failure", 4)?;
        state.serialize_field("contract", &self.contract)?;
        state.serialize_field("function", &self.function)?;
        state.serialize_field("function_id", &self.function_id)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

/// A compiled program: its AST and the source text the AST was compiled
/// from.
///
/// Every analysis is a pure function of these two.
#[derive(Debug)]
pub struct Program {
    source_unit: SourceUnit,
    source: String,
}

impl Program {
    pub fn new<S: Into<String>>(source_unit: SourceUnit, source: S) -> Program {
        Program {
            source_unit,
            source: source.into(),
        }
    }

    /// Load a program from solc's compact JSON AST. Functions which fail to
    /// convert are recorded in `failures`.
    pub fn from_json<S: Into<String>>(ast: &Value, source: S) -> Result<Program, Error> {
        Ok(Program::new(SourceUnit::from_json(ast)?, source))
    }

    /// Load a program from solc's compact JSON AST, failing on the first
    /// function which cannot be converted.
    pub fn from_json_strict<S: Into<String>>(ast: &Value, source: S) -> Result<Program, Error> {
        Ok(Program::new(SourceUnit::from_json_strict(ast)?, source))
    }

    /// Parse and load a compact JSON AST.
    pub fn from_json_str<S: Into<String>>(ast: &str, source: S) -> Result<Program, Error> {
        let ast: Value = serde_json::from_str(ast)?;
        Program::from_json(&ast, source)
    }

    pub fn source_unit(&self) -> &SourceUnit {
        &self.source_unit
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Functions which could not be converted from JSON.
    pub fn failures(&self) -> &[Failure] {
        self.source_unit.failures()
    }

    pub fn class_hierarchy(&self) -> ClassHierarchy {
        ClassHierarchy::new(&self.source_unit)
    }

    /// Resolve the call graph, following base contracts transitively.
    pub fn call_graph(&self, algorithm: Algorithm) -> CallGraph {
        CallGraph::new(
            &self.source_unit,
            &self.class_hierarchy(),
            algorithm,
            BaseResolution::Transitive,
        )
    }

    pub fn control_flow_graph(&self, function: RefFunction) -> Result<ControlFlowGraph, Error> {
        ControlFlowGraph::from_function(function.node(), &self.source)
    }

    /// Build the control flow graph of every function. Functions whose graph
    /// cannot be built are returned as failures. Functions whose body failed
    /// to convert are already in `failures` and are skipped.
    pub fn control_flow_graphs(&self) -> (Vec<ControlFlowGraph>, Vec<Failure>) {
        let mut graphs = Vec::new();
        let mut failures = Vec::new();
        for function in self.source_unit.functions() {
            if function.definition().malformed_body {
                continue;
            }
            match self.control_flow_graph(function) {
                Ok(cfg) => graphs.push(cfg),
                Err(error) => {
                    let failure = Failure::new(
                        function.contract().map(|contract| contract.name.clone()),
                        function.name().to_string(),
                        function.id(),
                        error,
                    );
                    warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }
        (graphs, failures)
    }
}
