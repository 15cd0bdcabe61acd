//! Per-function control flow graphs over the AST.
//!
//! A `ControlFlowGraph` is built from one `FunctionDefinition` with
//! `ControlFlowGraph::from_function`. Nodes are held in a `graph::Graph`
//! arena and are also addressable by their string id, which is derived from
//! the id of the AST node they were built for and a role suffix, such as
//! `"42_true"`. Every graph has exactly one `FunctionEntry` and one
//! `FunctionExit` node.
//!
//! Each node owns an ordered list of `Statement`s, and carries `defs`, the
//! variables assigned by those statements, and `uses`, the variables they
//! read before any assignment within the node.

mod builder;
mod def_use;

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::ast;
use crate::export::GraphExport;
use crate::graph::{self, Graph};
use crate::Error;

/// The role a node plays in the control flow graph.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum NodeKind {
    FunctionEntry,
    FunctionExit,
    BasicBlock,
    BranchCondition,
    BranchTrue,
    BranchFalse,
    Convergence,
    LoopInit,
    LoopCondition,
    LoopBody,
    LoopIncrement,
    AfterLoop,
    ShortCircuitLeft,
    ShortCircuitRight,
    ShortCircuitBypass,
    Return,
}

impl NodeKind {
    /// The suffix appended to an AST id to form the id of a node of this
    /// kind.
    pub fn suffix(&self) -> &'static str {
        match *self {
            NodeKind::FunctionEntry => "entry",
            NodeKind::FunctionExit => "exit",
            NodeKind::BasicBlock => "block",
            NodeKind::BranchCondition => "if",
            NodeKind::BranchTrue => "true",
            NodeKind::BranchFalse => "false",
            NodeKind::Convergence => "convergent",
            NodeKind::LoopInit => "init",
            NodeKind::LoopCondition => "condition",
            NodeKind::LoopBody => "body",
            NodeKind::LoopIncrement => "increment",
            NodeKind::AfterLoop => "after",
            NodeKind::ShortCircuitLeft => "left",
            NodeKind::ShortCircuitRight => "right",
            NodeKind::ShortCircuitBypass => "bypass",
            NodeKind::Return => "return",
        }
    }

    /// Fill color hint for exported graphs.
    pub fn fill_color(&self) -> Option<&'static str> {
        match *self {
            NodeKind::FunctionEntry | NodeKind::FunctionExit => Some("lightblue"),
            NodeKind::BranchCondition
            | NodeKind::BranchTrue
            | NodeKind::BranchFalse
            | NodeKind::Convergence => Some("yellow"),
            NodeKind::LoopCondition | NodeKind::LoopBody | NodeKind::AfterLoop => Some("orange"),
            NodeKind::LoopInit | NodeKind::LoopIncrement => Some("green"),
            NodeKind::BasicBlock
            | NodeKind::ShortCircuitLeft
            | NodeKind::ShortCircuitRight
            | NodeKind::ShortCircuitBypass
            | NodeKind::Return => None,
        }
    }

    /// Whether statements following this node may be appended to it.
    fn accepts_statements(&self) -> bool {
        matches!(
            *self,
            NodeKind::BasicBlock
                | NodeKind::BranchTrue
                | NodeKind::BranchFalse
                | NodeKind::Convergence
                | NodeKind::LoopBody
                | NodeKind::AfterLoop
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum StatementKind {
    Declaration,
    Expression,
    Condition,
    /// One operand of a short-circuiting `&&` or `||`.
    Operand,
    /// The combined value of a short-circuiting expression. Its operands are
    /// evaluated in their own nodes, so it reads nothing itself.
    ShortCircuitResult,
    Return,
    Break,
    Continue,
    Emit,
    Revert,
    Placeholder,
}

impl StatementKind {
    fn prefix(&self) -> &'static str {
        match *self {
            StatementKind::Declaration => "Declare",
            StatementKind::Expression => "Expr",
            StatementKind::Condition => "If",
            StatementKind::Operand => "Operand",
            StatementKind::ShortCircuitResult => "Result",
            StatementKind::Return => "Return",
            StatementKind::Break => "Break",
            StatementKind::Continue => "Continue",
            StatementKind::Emit => "Emit",
            StatementKind::Revert => "Revert",
            StatementKind::Placeholder => "Placeholder",
        }
    }
}

/// An AST statement or expression owned by a control flow graph node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Statement {
    kind: StatementKind,
    node: ast::Node,
    text: String,
    defs: BTreeSet<String>,
    uses: BTreeSet<String>,
}

impl Statement {
    pub(crate) fn new(kind: StatementKind, node: &ast::Node, source: &str) -> Statement {
        let (defs, uses) = match kind {
            StatementKind::ShortCircuitResult
            | StatementKind::Break
            | StatementKind::Continue
            | StatementKind::Placeholder => (BTreeSet::new(), BTreeSet::new()),
            _ => def_use::def_use(node),
        };

        Statement {
            kind,
            node: node.clone(),
            text: node.text(source),
            defs,
            uses,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn node(&self) -> &ast::Node {
        &self.node
    }

    /// The verbatim source text of this statement.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn defs(&self) -> &BTreeSet<String> {
        &self.defs
    }

    pub fn uses(&self) -> &BTreeSet<String> {
        &self.uses
    }

    pub fn label(&self) -> String {
        format!("{}: {}", self.kind.prefix(), self.text)
    }
}

/// A node in a `ControlFlowGraph`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    index: usize,
    id: String,
    kind: NodeKind,
    statements: Vec<Statement>,
    defs: BTreeSet<String>,
    uses: BTreeSet<String>,
}

impl Node {
    fn new(index: usize, id: String, kind: NodeKind) -> Node {
        Node {
            index,
            id,
            kind,
            statements: Vec::new(),
            defs: BTreeSet::new(),
            uses: BTreeSet::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Variables assigned in this node.
    pub fn defs(&self) -> &BTreeSet<String> {
        &self.defs
    }

    /// Variables read in this node before any assignment in this node.
    pub fn uses(&self) -> &BTreeSet<String> {
        &self.uses
    }

    /// Append a statement, folding its defs and uses into this node's.
    pub(crate) fn push(&mut self, statement: Statement) {
        for variable in statement.uses() {
            if !self.defs.contains(variable) {
                self.uses.insert(variable.clone());
            }
        }
        self.defs.extend(statement.defs().iter().cloned());
        self.statements.push(statement);
    }
}

impl graph::Vertex for Node {
    fn index(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        self.id.clone()
    }

    fn dot_label(&self) -> String {
        let mut label = self.kind.to_string();
        for statement in &self.statements {
            label.push('\n');
            label.push_str(&statement.label());
        }
        label
    }

    fn dot_fill_color(&self) -> Option<String> {
        self.kind.fill_color().map(|color| color.to_string())
    }
}

/// The outcome of a condition which guards an edge.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Branch {
    True,
    False,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Branch::True => write!(f, "True"),
            Branch::False => write!(f, "False"),
        }
    }
}

/// A directed edge between two nodes, optionally annotated with the branch
/// outcome which takes it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Edge {
    head: usize,
    tail: usize,
    annotation: Option<Branch>,
}

impl Edge {
    /// Index of the node this edge leaves.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Index of the node this edge enters.
    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn annotation(&self) -> Option<Branch> {
        self.annotation
    }
}

impl graph::Edge for Edge {
    fn head(&self) -> usize {
        self.head
    }

    fn tail(&self) -> usize {
        self.tail
    }

    fn dot_label(&self) -> String {
        self.annotation
            .map(|annotation| annotation.to_string())
            .unwrap_or_default()
    }
}

/// The control flow graph of one function.
#[derive(Clone, Debug, Serialize)]
pub struct ControlFlowGraph {
    graph: Graph<Node, Edge>,
    #[serde(skip)]
    ids: FxHashMap<String, usize>,
    function_id: u64,
    function_name: String,
    entry: usize,
    exit: usize,
}

impl ControlFlowGraph {
    /// Create a graph holding only the entry and exit nodes of a function.
    pub(crate) fn new(function_id: u64, function_name: &str) -> Result<ControlFlowGraph, Error> {
        let mut cfg = ControlFlowGraph {
            graph: Graph::new(),
            ids: FxHashMap::default(),
            function_id,
            function_name: function_name.to_string(),
            entry: 0,
            exit: 0,
        };
        cfg.entry = cfg.insert_node(
            format!("entry_{}_{}", function_id, function_name),
            NodeKind::FunctionEntry,
        )?;
        cfg.exit = cfg.insert_node(
            format!("exit_{}_{}", function_id, function_name),
            NodeKind::FunctionExit,
        )?;
        Ok(cfg)
    }

    /// Build the control flow graph of a `FunctionDefinition`. `source` is
    /// the text the AST was compiled from, used to label statements.
    pub fn from_function(function: &ast::Node, source: &str) -> Result<ControlFlowGraph, Error> {
        builder::build(function, source)
    }

    fn insert_node(&mut self, id: String, kind: NodeKind) -> Result<usize, Error> {
        if self.ids.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        let index = self.graph.num_vertices();
        self.graph.insert_vertex(Node::new(index, id.clone(), kind))?;
        self.ids.insert(id, index);
        Ok(index)
    }

    /// Add a node for the AST node `ast_id`, returning its index.
    pub(crate) fn add_node(&mut self, ast_id: u64, kind: NodeKind) -> Result<usize, Error> {
        self.insert_node(format!("{}_{}", ast_id, kind.suffix()), kind)
    }

    pub(crate) fn node_mut(&mut self, index: usize) -> Result<&mut Node, Error> {
        self.graph.vertex_mut(index)
    }

    /// Connect `head` to `tail`. The edge is registered with both nodes.
    pub(crate) fn connect(
        &mut self,
        head: usize,
        tail: usize,
        annotation: Option<Branch>,
    ) -> Result<(), Error> {
        self.graph.insert_edge(Edge {
            head,
            tail,
            annotation,
        })?;
        Ok(())
    }

    pub fn graph(&self) -> &Graph<Node, Edge> {
        &self.graph
    }

    /// The id of the function this graph was built from.
    pub fn function_id(&self) -> u64 {
        self.function_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Index of the `FunctionEntry` node.
    pub fn entry(&self) -> usize {
        self.entry
    }

    /// Index of the `FunctionExit` node.
    pub fn exit(&self) -> usize {
        self.exit
    }

    pub fn entry_node(&self) -> Result<&Node, Error> {
        self.graph.vertex(self.entry)
    }

    pub fn exit_node(&self) -> Result<&Node, Error> {
        self.graph.vertex(self.exit)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// The arena index of the node with the given id.
    pub fn index_of(&self, id: &str) -> Result<usize, Error> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    pub fn node(&self, id: &str) -> Result<&Node, Error> {
        self.graph.vertex(self.index_of(id)?)
    }

    pub fn node_at(&self, index: usize) -> Result<&Node, Error> {
        self.graph.vertex(index)
    }

    /// Every node, in the order it was created.
    pub fn nodes(&self) -> Vec<&Node> {
        self.graph.vertices()
    }

    pub fn edges(&self) -> Vec<&Edge> {
        self.graph.edges()
    }

    pub fn edges_in(&self, id: &str) -> Result<Vec<&Edge>, Error> {
        self.graph.edges_in(self.index_of(id)?)
    }

    pub fn edges_out(&self, id: &str) -> Result<Vec<&Edge>, Error> {
        self.graph.edges_out(self.index_of(id)?)
    }

    pub fn successors(&self, id: &str) -> Result<Vec<&Node>, Error> {
        self.graph.successors(self.index_of(id)?)
    }

    pub fn predecessors(&self, id: &str) -> Result<Vec<&Node>, Error> {
        self.graph.predecessors(self.index_of(id)?)
    }

    /// Nodes no path from the entry reaches, such as statements after a
    /// `return`, in the order they were created.
    pub fn unreachable_nodes(&self) -> Result<Vec<&Node>, Error> {
        let unreachable = self.graph.unreachable_vertices(self.entry)?;
        Ok(self
            .nodes()
            .into_iter()
            .filter(|node| unreachable.contains(&node.index()))
            .collect())
    }

    /// True if some cycle is reachable from the entry.
    pub fn has_loops(&self) -> bool {
        !self.graph.is_acyclic(self.entry)
    }

    /// Returns the node and edge lists for an external sink.
    pub fn export(&self) -> GraphExport {
        self.graph.export()
    }

    /// Returns a string in the graphviz format.
    pub fn to_dot(&self) -> String {
        self.graph.dot_graph()
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for node in self.nodes() {
            writeln!(f, "[ {} ] {}", node.id(), node.kind())?;
            for statement in node.statements() {
                writeln!(f, "    {}", statement.label())?;
            }
        }
        for edge in self.edges() {
            let head = self.node_at(edge.head()).map_err(|_| fmt::Error)?;
            let tail = self.node_at(edge.tail()).map_err(|_| fmt::Error)?;
            match edge.annotation() {
                Some(annotation) => writeln!(f, "{} -> {} ({})", head.id(), tail.id(), annotation)?,
                None => writeln!(f, "{} -> {}", head.id(), tail.id())?,
            }
        }
        Ok(())
    }
}
