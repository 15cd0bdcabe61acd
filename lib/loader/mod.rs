//! Loading Solidity programs for analysis.
//!
//! `Solc` runs the compiler front end and loads the AST it writes.
//! `AstFile` loads an AST solc produced earlier.

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{Error, Options, Program};

/// Generic trait for all loaders.
pub trait Loader {
    /// Load the program.
    fn program(&self) -> Result<Program, Error>;
}

/// Compiles a source file with solc, then loads the compact JSON AST solc
/// writes to its output directory.
#[derive(Clone, Debug)]
pub struct Solc {
    solc_path: PathBuf,
    output_dir: PathBuf,
    source_path: PathBuf,
}

impl Solc {
    /// Compile `source_path` with the compiler settings in `options`.
    pub fn new<P: Into<PathBuf>>(source_path: P, options: &Options) -> Solc {
        Solc {
            solc_path: options.solc_path().to_path_buf(),
            output_dir: options.output_dir().to_path_buf(),
            source_path: source_path.into(),
        }
    }

    /// Run solc. A non-zero exit status is an error, and no AST is read.
    pub fn compile(&self) -> Result<PathBuf, Error> {
        debug!(
            "Running {} on {}",
            self.solc_path.display(),
            self.source_path.display()
        );
        let output = Command::new(&self.solc_path)
            .arg("-o")
            .arg(&self.output_dir)
            .arg("--ast-compact-json")
            .arg("--overwrite")
            .arg(&self.source_path)
            .output()?;

        if !output.status.success() {
            return Err(Error::Compiler {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        find_ast(&self.output_dir, &self.source_path)
    }
}

impl Loader for Solc {
    fn program(&self) -> Result<Program, Error> {
        let ast_path = self.compile()?;
        AstFile::new(ast_path, &self.source_path).program()
    }
}

/// A compact JSON AST on disk, and the source file it was compiled from.
#[derive(Clone, Debug)]
pub struct AstFile {
    ast_path: PathBuf,
    source_path: PathBuf,
}

impl AstFile {
    pub fn new<A: Into<PathBuf>, S: Into<PathBuf>>(ast_path: A, source_path: S) -> AstFile {
        AstFile {
            ast_path: ast_path.into(),
            source_path: source_path.into(),
        }
    }
}

impl Loader for AstFile {
    fn program(&self) -> Result<Program, Error> {
        debug!("Loading {}", self.ast_path.display());
        let ast = fs::read_to_string(&self.ast_path)?;
        let source = fs::read_to_string(&self.source_path)?;
        Program::from_json_str(&ast, source)
    }
}

/// The AST solc wrote to `output_dir` for `source_path`, named after the
/// source file as `<file name>_json.ast`. ASTs of other files, such as
/// imports or earlier runs, are never picked.
pub fn find_ast(output_dir: &Path, source_path: &Path) -> Result<PathBuf, Error> {
    let file_name = source_path
        .file_name()
        .ok_or_else(|| Error::MissingAst(output_dir.to_path_buf()))?;
    let mut ast_name = file_name.to_os_string();
    ast_name.push("_json.ast");

    let ast_path = output_dir.join(ast_name);
    if ast_path.is_file() {
        Ok(ast_path)
    } else {
        Err(Error::MissingAst(ast_path))
    }
}
