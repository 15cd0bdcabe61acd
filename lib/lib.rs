//! Solscope: static analysis over the AST of Solidity programs.
//!
//! Solscope consumes the compact JSON AST emitted by `solc` and provides:
//!
//! * A typed model of the AST, `ast`.
//! * Per-function control flow graphs, `cfg`.
//! * Class hierarchy analysis and call graphs under CHA and RTA, `analysis`.
//! * Reaching definitions and live variables over the control flow graphs,
//! solved with a generic fixed-point engine, `analysis::fixed_point`.
//!
//! Everything downstream of loading is a pure function of the
//! `(AST, source text)` pair held by a `Program`.

pub mod analysis;
pub mod ast;
pub mod cfg;
pub mod export;
pub mod graph;
pub mod loader;
mod options;
mod program;
#[cfg(test)]
mod tests;

pub use options::{Options, OptionsBuilder};
pub use program::{Failure, Program};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown node type {kind} (node id {id})")]
    UnknownNodeType { kind: String, id: u64 },
    #[error("{kind} (node id {id}) is missing required field `{field}`")]
    MissingField {
        kind: String,
        id: u64,
        field: &'static str,
    },
    #[error("{kind} (node id {id}) has an invalid `{field}` field")]
    InvalidField {
        kind: String,
        id: u64,
        field: &'static str,
    },
    #[error("Invalid source location `{0}`")]
    InvalidSourceLocation(String),
    #[error("Unsupported construct {kind} (node id {id})")]
    UnsupportedConstruct { kind: String, id: u64 },
    #[error("The body of {function} (node id {id}) failed to convert")]
    MalformedBody { function: String, id: u64 },
    #[error("Invalid call graph algorithm `{0}`, expected CHA or RTA")]
    InvalidAlgorithm(String),
    #[error("The compiler exited with status {status}: {stderr}")]
    Compiler { status: i32, stderr: String },
    #[error("The compiler produced no AST in {0}")]
    MissingAst(PathBuf),
    #[error("Node {0} does not exist in the control flow graph")]
    NodeNotFound(String),
    #[error("Node {0} already exists in the control flow graph")]
    DuplicateNode(String),
    #[error("The vertex id {0} does not exist in the graph")]
    GraphVertexNotFound(usize),
    #[error("{0}")]
    Custom(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}
