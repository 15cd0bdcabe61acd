//! Whole-program and per-function analyses.
//!
//! The class hierarchy and call graph are computed once per program. Every
//! function then gets its own control flow graph, over which reaching
//! definitions and live variables are solved. `analyze` runs all of these.

pub mod call_graph;
pub mod class_hierarchy;
pub mod fixed_point;
mod live_variables;
mod reaching_definitions;

pub use self::call_graph::{
    call_sites, instantiated_contracts, Algorithm, BaseResolution, CallGraph,
};
pub use self::class_hierarchy::{ClassHierarchy, ContractInfo};
pub use self::fixed_point::{DataFlowFacts, Direction, FixedPointAnalysis, SolverStrategy};
pub use self::live_variables::{live_variables, LiveVariables};
pub use self::reaching_definitions::{reaching_definitions, Definition, ReachingDefinitions};

use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::ast::RefFunction;
use crate::cfg::ControlFlowGraph;
use crate::{Error, Failure, Options, Program};

/// The analyses of one function.
#[derive(Clone, Debug, Serialize)]
pub struct FunctionReport {
    contract: Option<String>,
    function: String,
    function_id: u64,
    control_flow_graph: ControlFlowGraph,
    reaching_definitions: DataFlowFacts<BTreeSet<Definition>>,
    live_variables: DataFlowFacts<BTreeSet<String>>,
}

impl FunctionReport {
    pub fn contract(&self) -> Option<&str> {
        self.contract.as_deref()
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn function_id(&self) -> u64 {
        self.function_id
    }

    /// `Contract.function`, or the bare name of a file-level function.
    pub fn qualified_name(&self) -> String {
        match self.contract {
            Some(ref contract) => format!("{}.{}", contract, self.function),
            None => self.function.clone(),
        }
    }

    pub fn control_flow_graph(&self) -> &ControlFlowGraph {
        &self.control_flow_graph
    }

    pub fn reaching_definitions(&self) -> &DataFlowFacts<BTreeSet<Definition>> {
        &self.reaching_definitions
    }

    pub fn live_variables(&self) -> &DataFlowFacts<BTreeSet<String>> {
        &self.live_variables
    }
}

/// The results of analyzing a whole program.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    class_hierarchy: ClassHierarchy,
    call_graph: CallGraph,
    functions: Vec<FunctionReport>,
    failures: Vec<Failure>,
}

impl Report {
    pub fn class_hierarchy(&self) -> &ClassHierarchy {
        &self.class_hierarchy
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    /// Reports for every function which was analyzed, in source order.
    pub fn functions(&self) -> &[FunctionReport] {
        &self.functions
    }

    /// Look up a function report by qualified name. Overloads return the
    /// first declared.
    pub fn function(&self, qualified_name: &str) -> Option<&FunctionReport> {
        self.functions
            .iter()
            .find(|function| function.qualified_name() == qualified_name)
    }

    /// Functions which could not be modeled or analyzed.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }
}

fn analyze_function(
    program: &Program,
    function: RefFunction,
    options: &Options,
) -> Result<FunctionReport, Error> {
    let cfg = program.control_flow_graph(function)?;
    let reaching_definitions =
        fixed_point::fixed_point(&ReachingDefinitions, &cfg, options.solver_strategy())?;
    let live_variables = fixed_point::fixed_point(&LiveVariables, &cfg, options.solver_strategy())?;

    Ok(FunctionReport {
        contract: function.contract().map(|contract| contract.name.clone()),
        function: function.name().to_string(),
        function_id: function.id(),
        control_flow_graph: cfg,
        reaching_definitions,
        live_variables,
    })
}

/// Run every analysis over `program`.
///
/// A function whose control flow graph cannot be built is recorded as a
/// `Failure`, along with the functions which failed to convert from JSON,
/// and the remaining functions are analyzed. With `Options::fail_fast`, the
/// first failure is returned as an error instead.
pub fn analyze(program: &Program, options: &Options) -> Result<Report, Error> {
    if options.fail_fast() {
        if let Some(failure) = program.failures().first() {
            return Err(Error::Custom(failure.to_string()));
        }
    }

    let class_hierarchy = program.class_hierarchy();
    let call_graph = CallGraph::new(
        program.source_unit(),
        &class_hierarchy,
        options.call_graph_algorithm(),
        options.base_resolution(),
    );

    let mut functions = Vec::new();
    let mut failures = program.failures().to_vec();
    for function in program.source_unit().functions() {
        // Already recorded when the body failed to convert.
        if function.definition().malformed_body {
            continue;
        }
        match analyze_function(program, function, options) {
            Ok(report) => functions.push(report),
            Err(error) => {
                if options.fail_fast() {
                    return Err(error);
                }
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

    debug!(
        "Analyzed {} functions, {} failures, {} {} call edges",
        functions.len(),
        failures.len(),
        call_graph.num_edges(),
        call_graph.algorithm()
    );

    Ok(Report {
        class_hierarchy,
        call_graph,
        functions,
        failures,
    })
}
