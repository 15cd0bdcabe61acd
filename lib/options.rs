use crate::analysis::call_graph::{Algorithm, BaseResolution};
use crate::analysis::fixed_point::SolverStrategy;
use crate::Error;
use std::default;
use std::path::{Path, PathBuf};

/// Options which change the behavior of analysis and of the compiler front
/// end.
#[derive(Clone, Debug)]
pub struct Options {
    call_graph_algorithm: Algorithm,
    base_resolution: BaseResolution,
    solver_strategy: SolverStrategy,
    fail_fast: bool,
    solc_path: PathBuf,
    output_dir: PathBuf,
}

impl Options {
    /// Create a new set of Options with the default settings.
    pub fn new() -> Options {
        Options::default()
    }

    /// The algorithm used to resolve call graphs. Defaults to CHA.
    pub fn call_graph_algorithm(&self) -> Algorithm {
        self.call_graph_algorithm
    }

    pub fn set_call_graph_algorithm(&mut self, call_graph_algorithm: Algorithm) {
        self.call_graph_algorithm = call_graph_algorithm;
    }

    /// How far base contracts are followed during call graph resolution.
    /// Defaults to the full transitive closure.
    pub fn base_resolution(&self) -> BaseResolution {
        self.base_resolution
    }

    pub fn set_base_resolution(&mut self, base_resolution: BaseResolution) {
        self.base_resolution = base_resolution;
    }

    /// How the data flow solver visits nodes. Defaults to a worklist.
    pub fn solver_strategy(&self) -> SolverStrategy {
        self.solver_strategy
    }

    pub fn set_solver_strategy(&mut self, solver_strategy: SolverStrategy) {
        self.solver_strategy = solver_strategy;
    }

    /// Whether the first failure to analyze a function aborts the whole run.
    ///
    /// By default a function which cannot be modeled, or whose control flow
    /// graph cannot be built, is recorded as a `Failure` and analysis
    /// continues with the remaining functions.
    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    pub fn set_fail_fast(&mut self, fail_fast: bool) {
        self.fail_fast = fail_fast;
    }

    /// The solc binary invoked by the loader.
    pub fn solc_path(&self) -> &Path {
        &self.solc_path
    }

    /// The directory solc writes its output into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl default::Default for Options {
    fn default() -> Options {
        Options {
            call_graph_algorithm: Algorithm::ClassHierarchy,
            base_resolution: BaseResolution::Transitive,
            solver_strategy: SolverStrategy::Worklist,
            fail_fast: false,
            solc_path: PathBuf::from("solc"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Create your options with the builder pattern.
///
/// For more details on the options, see `Options`.
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn new() -> OptionsBuilder {
        OptionsBuilder {
            options: Options::default(),
        }
    }

    pub fn call_graph_algorithm(mut self, call_graph_algorithm: Algorithm) -> OptionsBuilder {
        self.options.call_graph_algorithm = call_graph_algorithm;
        self
    }

    /// Select the call graph algorithm by name, `CHA` or `RTA`.
    pub fn algorithm_name(mut self, name: &str) -> Result<OptionsBuilder, Error> {
        self.options.call_graph_algorithm = name.parse()?;
        Ok(self)
    }

    pub fn base_resolution(mut self, base_resolution: BaseResolution) -> OptionsBuilder {
        self.options.base_resolution = base_resolution;
        self
    }

    pub fn solver_strategy(mut self, solver_strategy: SolverStrategy) -> OptionsBuilder {
        self.options.solver_strategy = solver_strategy;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> OptionsBuilder {
        self.options.fail_fast = fail_fast;
        self
    }

    pub fn solc_path<P: Into<PathBuf>>(mut self, solc_path: P) -> OptionsBuilder {
        self.options.solc_path = solc_path.into();
        self
    }

    pub fn output_dir<P: Into<PathBuf>>(mut self, output_dir: P) -> OptionsBuilder {
        self.options.output_dir = output_dir.into();
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

impl default::Default for OptionsBuilder {
    fn default() -> OptionsBuilder {
        OptionsBuilder::new()
    }
}
