//! A typed model of the solc compact JSON AST.
//!
//! Every node carries its solc `id` and a `Span`. Composite nodes own their
//! children, so the model is a tree. The set of node kinds is closed:
//! converting JSON with a `nodeType` outside `NodeKind` is an error, not a
//! placeholder.
//!
//! Use `SourceUnit::from_json` to convert a whole compilation unit. Function
//! definitions which fail to convert are recorded as `Failure`s on the
//! `SourceUnit` and left out of the tree, so one malformed function does not
//! stop analysis of the rest of the program.

mod json;
mod source_unit;
mod span;
mod visit;

pub use self::source_unit::{RefFunction, SourceUnit};
pub use self::span::Span;
pub use self::visit::Descendants;

use serde::Serialize;
use std::fmt;

/// A node in the AST.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    id: u64,
    src: Span,
    kind: NodeKind,
}

impl Node {
    pub fn new(id: u64, src: Span, kind: NodeKind) -> Node {
        Node { id, src, kind }
    }

    /// The solc id of this node.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The source location of this node.
    pub fn src(&self) -> Span {
        self.src
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The solc `nodeType` of this node.
    pub fn node_type(&self) -> &'static str {
        self.kind.node_type()
    }

    /// The verbatim source text of this node.
    ///
    /// When the span does not lie within `source`, a `nodeType#id`
    /// placeholder is returned instead.
    pub fn text(&self, source: &str) -> String {
        match self.src.text(source) {
            Some(text) => text.to_string(),
            None => format!("{}#{}", self.node_type(), self.id),
        }
    }

    pub fn as_contract(&self) -> Option<&ContractDefinition> {
        match self.kind {
            NodeKind::ContractDefinition(ref contract) => Some(contract),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDefinition> {
        match self.kind {
            NodeKind::FunctionDefinition(ref function) => Some(function),
            _ => None,
        }
    }

    /// This node with any enclosing parentheses removed. solc represents
    /// `(e)` as a `TupleExpression` holding the single component `e`.
    pub fn unparenthesized(&self) -> &Node {
        let mut node = self;
        while let NodeKind::TupleExpression {
            ref components,
            is_inline_array: false,
        } = node.kind
        {
            match components.as_slice() {
                [Some(inner)] => node = inner,
                _ => break,
            }
        }
        node
    }

    /// If this node is a short-circuiting `&&` or `||`, possibly in
    /// parentheses, returns the operator and both operands.
    pub fn as_logical(&self) -> Option<(LogicalOperator, &Node, &Node)> {
        match self.unparenthesized().kind {
            NodeKind::BinaryOperation {
                ref operator,
                ref left_expression,
                ref right_expression,
            } => {
                let operator = match operator.as_str() {
                    "&&" => LogicalOperator::And,
                    "||" => LogicalOperator::Or,
                    _ => return None,
                };
                Some((operator, left_expression, right_expression))
            }
            _ => None,
        }
    }

    /// The immediate children of this node, in source order.
    pub fn children(&self) -> Vec<&Node> {
        let mut children: Vec<&Node> = Vec::new();

        fn opt<'n>(children: &mut Vec<&'n Node>, node: &'n Option<Box<Node>>) {
            if let Some(node) = node {
                children.push(node);
            }
        }

        match self.kind {
            NodeKind::SourceUnit { ref nodes }
            | NodeKind::Block { statements: ref nodes }
            | NodeKind::UncheckedBlock { statements: ref nodes }
            | NodeKind::StructDefinition { members: ref nodes, .. } => children.extend(nodes),
            NodeKind::ContractDefinition(ref contract) => children.extend(&contract.nodes),
            NodeKind::FunctionDefinition(ref function) => {
                children.extend(&function.parameters);
                children.extend(&function.return_parameters);
                opt(&mut children, &function.body);
            }
            NodeKind::ModifierDefinition {
                ref parameters,
                ref body,
                ..
            } => {
                children.extend(parameters);
                opt(&mut children, body);
            }
            NodeKind::EventDefinition { ref parameters, .. }
            | NodeKind::ErrorDefinition { ref parameters, .. } => children.extend(parameters),
            NodeKind::VariableDeclaration {
                ref type_name,
                ref value,
                ..
            } => {
                opt(&mut children, type_name);
                opt(&mut children, value);
            }
            NodeKind::VariableDeclarationStatement {
                ref declarations,
                ref initial_value,
            } => {
                children.extend(declarations.iter().flatten());
                opt(&mut children, initial_value);
            }
            NodeKind::ExpressionStatement { ref expression } => children.push(expression),
            NodeKind::IfStatement {
                ref condition,
                ref true_body,
                ref false_body,
            } => {
                children.push(condition);
                opt(&mut children, true_body);
                opt(&mut children, false_body);
            }
            NodeKind::WhileStatement {
                ref condition,
                ref body,
            } => {
                children.push(condition);
                children.push(body);
            }
            NodeKind::DoWhileStatement {
                ref condition,
                ref body,
            } => {
                children.push(body);
                children.push(condition);
            }
            NodeKind::ForStatement {
                ref initialization_expression,
                ref condition,
                ref loop_expression,
                ref body,
            } => {
                opt(&mut children, initialization_expression);
                opt(&mut children, condition);
                opt(&mut children, loop_expression);
                children.push(body);
            }
            NodeKind::Return { ref expression } => opt(&mut children, expression),
            NodeKind::EmitStatement { ref event_call } => children.push(event_call),
            NodeKind::RevertStatement { ref error_call } => children.push(error_call),
            NodeKind::TryStatement {
                ref external_call,
                ref clauses,
            } => {
                children.push(external_call);
                children.extend(clauses);
            }
            NodeKind::TryCatchClause {
                ref parameters,
                ref block,
                ..
            } => {
                children.extend(parameters);
                children.push(block);
            }
            NodeKind::BinaryOperation {
                ref left_expression,
                ref right_expression,
                ..
            } => {
                children.push(left_expression);
                children.push(right_expression);
            }
            NodeKind::UnaryOperation {
                ref sub_expression,
                ..
            } => children.push(sub_expression),
            NodeKind::Assignment {
                ref left_hand_side,
                ref right_hand_side,
                ..
            } => {
                children.push(left_hand_side);
                children.push(right_hand_side);
            }
            NodeKind::FunctionCall {
                ref expression,
                ref arguments,
            } => {
                children.push(expression);
                children.extend(arguments);
            }
            NodeKind::FunctionCallOptions {
                ref expression,
                ref options,
            } => {
                children.push(expression);
                children.extend(options);
            }
            NodeKind::NewExpression { ref type_name } => children.push(type_name),
            NodeKind::MemberAccess { ref expression, .. } => children.push(expression),
            NodeKind::IndexAccess {
                ref base_expression,
                ref index_expression,
            } => {
                children.push(base_expression);
                opt(&mut children, index_expression);
            }
            NodeKind::IndexRangeAccess {
                ref base_expression,
                ref start_expression,
                ref end_expression,
            } => {
                children.push(base_expression);
                opt(&mut children, start_expression);
                opt(&mut children, end_expression);
            }
            NodeKind::TupleExpression { ref components, .. } => {
                children.extend(components.iter().flatten())
            }
            NodeKind::Conditional {
                ref condition,
                ref true_expression,
                ref false_expression,
            } => {
                children.push(condition);
                children.push(true_expression);
                children.push(false_expression);
            }
            NodeKind::Mapping {
                ref key_type,
                ref value_type,
            } => {
                children.push(key_type);
                children.push(value_type);
            }
            NodeKind::ArrayTypeName {
                ref base_type,
                ref length,
            } => {
                children.push(base_type);
                opt(&mut children, length);
            }
            NodeKind::PragmaDirective { .. }
            | NodeKind::ImportDirective { .. }
            | NodeKind::EnumDefinition { .. }
            | NodeKind::UserDefinedValueTypeDefinition { .. }
            | NodeKind::UsingForDirective
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::PlaceholderStatement
            | NodeKind::InlineAssembly
            | NodeKind::Identifier { .. }
            | NodeKind::Literal { .. }
            | NodeKind::ElementaryTypeNameExpression { .. }
            | NodeKind::ElementaryTypeName { .. }
            | NodeKind::UserDefinedTypeName { .. }
            | NodeKind::FunctionTypeName => {}
        }

        children
    }

    /// Every node in the subtree rooted at this node, in pre-order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants::new(self)
    }
}

/// The short-circuiting boolean operators.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LogicalOperator::And => write!(f, "&&"),
            LogicalOperator::Or => write!(f, "||"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContractDefinition {
    pub name: String,
    /// `contract`, `interface` or `library`.
    pub contract_kind: String,
    /// Names of the listed base contracts, in declaration order.
    pub base_contracts: Vec<String>,
    pub nodes: Vec<Node>,
}

impl ContractDefinition {
    /// The function definitions declared directly in this contract.
    pub fn functions(&self) -> impl Iterator<Item = (&Node, &FunctionDefinition)> {
        self.nodes
            .iter()
            .filter_map(|node| node.as_function().map(|function| (node, function)))
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum FunctionKind {
    Function,
    Constructor,
    Fallback,
    Receive,
    FreeFunction,
}

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            FunctionKind::Function => "function",
            FunctionKind::Constructor => "constructor",
            FunctionKind::Fallback => "fallback",
            FunctionKind::Receive => "receive",
            FunctionKind::FreeFunction => "freeFunction",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub kind: FunctionKind,
    pub visibility: Option<String>,
    pub state_mutability: Option<String>,
    pub parameters: Vec<Node>,
    pub return_parameters: Vec<Node>,
    pub body: Option<Box<Node>>,
    /// Set when the body failed to convert. `body` is then `None`, and no
    /// control flow graph can be built for this function.
    pub malformed_body: bool,
}

impl FunctionDefinition {
    /// The name of this function. Constructors, fallback and receive
    /// functions have no name in solc's AST, and are named by their kind.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.kind.as_str()
        } else {
            &self.name
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
    }
}

/// The kinds of AST node this crate understands.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum NodeKind {
    SourceUnit {
        nodes: Vec<Node>,
    },
    PragmaDirective {
        literals: Vec<String>,
    },
    ImportDirective {
        file: String,
    },
    ContractDefinition(ContractDefinition),
    FunctionDefinition(FunctionDefinition),
    ModifierDefinition {
        name: String,
        parameters: Vec<Node>,
        body: Option<Box<Node>>,
    },
    EventDefinition {
        name: String,
        parameters: Vec<Node>,
    },
    ErrorDefinition {
        name: String,
        parameters: Vec<Node>,
    },
    StructDefinition {
        name: String,
        members: Vec<Node>,
    },
    EnumDefinition {
        name: String,
        members: Vec<String>,
    },
    UserDefinedValueTypeDefinition {
        name: String,
    },
    UsingForDirective,
    VariableDeclaration {
        name: String,
        type_name: Option<Box<Node>>,
        value: Option<Box<Node>>,
        state_variable: bool,
    },

    // Statements
    Block {
        statements: Vec<Node>,
    },
    UncheckedBlock {
        statements: Vec<Node>,
    },
    VariableDeclarationStatement {
        /// Tuple declarations leave gaps, `(, uint b) = f()`.
        declarations: Vec<Option<Node>>,
        initial_value: Option<Box<Node>>,
    },
    ExpressionStatement {
        expression: Box<Node>,
    },
    IfStatement {
        condition: Box<Node>,
        true_body: Option<Box<Node>>,
        false_body: Option<Box<Node>>,
    },
    WhileStatement {
        condition: Box<Node>,
        body: Box<Node>,
    },
    DoWhileStatement {
        condition: Box<Node>,
        body: Box<Node>,
    },
    ForStatement {
        initialization_expression: Option<Box<Node>>,
        condition: Option<Box<Node>>,
        loop_expression: Option<Box<Node>>,
        body: Box<Node>,
    },
    Return {
        expression: Option<Box<Node>>,
    },
    Break,
    Continue,
    PlaceholderStatement,
    EmitStatement {
        event_call: Box<Node>,
    },
    RevertStatement {
        error_call: Box<Node>,
    },
    InlineAssembly,
    TryStatement {
        external_call: Box<Node>,
        clauses: Vec<Node>,
    },
    TryCatchClause {
        error_name: String,
        parameters: Vec<Node>,
        block: Box<Node>,
    },

    // Expressions
    BinaryOperation {
        operator: String,
        left_expression: Box<Node>,
        right_expression: Box<Node>,
    },
    UnaryOperation {
        operator: String,
        prefix: bool,
        sub_expression: Box<Node>,
    },
    Assignment {
        operator: String,
        left_hand_side: Box<Node>,
        right_hand_side: Box<Node>,
    },
    Identifier {
        name: String,
        /// Negative for solc's global built-ins, `msg`, `require`, ...
        referenced_declaration: Option<i64>,
    },
    Literal {
        kind: String,
        value: Option<String>,
    },
    FunctionCall {
        expression: Box<Node>,
        arguments: Vec<Node>,
    },
    FunctionCallOptions {
        expression: Box<Node>,
        options: Vec<Node>,
    },
    NewExpression {
        type_name: Box<Node>,
    },
    MemberAccess {
        expression: Box<Node>,
        member_name: String,
    },
    IndexAccess {
        base_expression: Box<Node>,
        index_expression: Option<Box<Node>>,
    },
    IndexRangeAccess {
        base_expression: Box<Node>,
        start_expression: Option<Box<Node>>,
        end_expression: Option<Box<Node>>,
    },
    TupleExpression {
        components: Vec<Option<Node>>,
        is_inline_array: bool,
    },
    Conditional {
        condition: Box<Node>,
        true_expression: Box<Node>,
        false_expression: Box<Node>,
    },
    ElementaryTypeNameExpression {
        type_name: String,
    },

    // Type names
    ElementaryTypeName {
        name: String,
    },
    UserDefinedTypeName {
        name: String,
    },
    Mapping {
        key_type: Box<Node>,
        value_type: Box<Node>,
    },
    ArrayTypeName {
        base_type: Box<Node>,
        length: Option<Box<Node>>,
    },
    FunctionTypeName,
}

impl NodeKind {
    /// The solc `nodeType` tag for this kind.
    pub fn node_type(&self) -> &'static str {
        match *self {
            NodeKind::SourceUnit { .. } => "SourceUnit",
            NodeKind::PragmaDirective { .. } => "PragmaDirective",
            NodeKind::ImportDirective { .. } => "ImportDirective",
            NodeKind::ContractDefinition(_) => "ContractDefinition",
            NodeKind::FunctionDefinition(_) => "FunctionDefinition",
            NodeKind::ModifierDefinition { .. } => "ModifierDefinition",
            NodeKind::EventDefinition { .. } => "EventDefinition",
            NodeKind::ErrorDefinition { .. } => "ErrorDefinition",
            NodeKind::StructDefinition { .. } => "StructDefinition",
            NodeKind::EnumDefinition { .. } => "EnumDefinition",
            NodeKind::UserDefinedValueTypeDefinition { .. } => "UserDefinedValueTypeDefinition",
            NodeKind::UsingForDirective => "UsingForDirective",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::Block { .. } => "Block",
            NodeKind::UncheckedBlock { .. } => "UncheckedBlock",
            NodeKind::VariableDeclarationStatement { .. } => "VariableDeclarationStatement",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::DoWhileStatement { .. } => "DoWhileStatement",
            NodeKind::ForStatement { .. } => "ForStatement",
            NodeKind::Return { .. } => "Return",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::PlaceholderStatement => "PlaceholderStatement",
            NodeKind::EmitStatement { .. } => "EmitStatement",
            NodeKind::RevertStatement { .. } => "RevertStatement",
            NodeKind::InlineAssembly => "InlineAssembly",
            NodeKind::TryStatement { .. } => "TryStatement",
            NodeKind::TryCatchClause { .. } => "TryCatchClause",
            NodeKind::BinaryOperation { .. } => "BinaryOperation",
            NodeKind::UnaryOperation { .. } => "UnaryOperation",
            NodeKind::Assignment { .. } => "Assignment",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::FunctionCall { .. } => "FunctionCall",
            NodeKind::FunctionCallOptions { .. } => "FunctionCallOptions",
            NodeKind::NewExpression { .. } => "NewExpression",
            NodeKind::MemberAccess { .. } => "MemberAccess",
            NodeKind::IndexAccess { .. } => "IndexAccess",
            NodeKind::IndexRangeAccess { .. } => "IndexRangeAccess",
            NodeKind::TupleExpression { .. } => "TupleExpression",
            NodeKind::Conditional { .. } => "Conditional",
            NodeKind::ElementaryTypeNameExpression { .. } => "ElementaryTypeNameExpression",
            NodeKind::ElementaryTypeName { .. } => "ElementaryTypeName",
            NodeKind::UserDefinedTypeName { .. } => "UserDefinedTypeName",
            NodeKind::Mapping { .. } => "Mapping",
            NodeKind::ArrayTypeName { .. } => "ArrayTypeName",
            NodeKind::FunctionTypeName => "FunctionTypeName",
        }
    }
}
