//! Variables defined and used by a single statement.

use std::collections::BTreeSet;

use crate::ast::{Node, NodeKind};

/// How an expression is accessed by its parent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    /// The access of the root variable of an indexed or member expression.
    /// Writing `a[i]` or `s.f` reads and writes `a` or `s`.
    fn through_element(self) -> Access {
        match self {
            Access::Read => Access::Read,
            Access::Write | Access::ReadWrite => Access::ReadWrite,
        }
    }
}

/// Returns the `(defs, uses)` of one statement or expression.
///
/// Callee names, member names, type names and solc's built-in globals are
/// never uses.
pub(crate) fn def_use(node: &Node) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut defs = BTreeSet::new();
    let mut uses = BTreeSet::new();

    let mut stack = vec![(node, Access::Read)];
    while let Some((node, access)) = stack.pop() {
        match *node.kind() {
            NodeKind::Identifier {
                ref name,
                referenced_declaration,
            } => {
                if referenced_declaration.map(|id| id < 0).unwrap_or(false) {
                    continue;
                }
                if access != Access::Write {
                    uses.insert(name.to_string());
                }
                if access != Access::Read {
                    defs.insert(name.to_string());
                }
            }
            NodeKind::VariableDeclaration {
                ref name,
                ref value,
                ..
            } => {
                if !name.is_empty() {
                    defs.insert(name.to_string());
                }
                if let Some(value) = value {
                    stack.push((value, Access::Read));
                }
            }
            NodeKind::VariableDeclarationStatement {
                ref declarations,
                ref initial_value,
            } => {
                for declaration in declarations.iter().flatten() {
                    stack.push((declaration, Access::Write));
                }
                if let Some(initial_value) = initial_value {
                    stack.push((initial_value, Access::Read));
                }
            }
            NodeKind::Assignment {
                ref operator,
                ref left_hand_side,
                ref right_hand_side,
            } => {
                let target = if operator == "=" {
                    Access::Write
                } else {
                    Access::ReadWrite
                };
                stack.push((left_hand_side, target));
                stack.push((right_hand_side, Access::Read));
            }
            NodeKind::UnaryOperation {
                ref operator,
                ref sub_expression,
                ..
            } => {
                let access = match operator.as_str() {
                    "++" | "--" => Access::ReadWrite,
                    "delete" => Access::Write,
                    _ => Access::Read,
                };
                stack.push((sub_expression, access));
            }
            NodeKind::IndexAccess {
                ref base_expression,
                ref index_expression,
            } => {
                stack.push((base_expression, access.through_element()));
                if let Some(index_expression) = index_expression {
                    stack.push((index_expression, Access::Read));
                }
            }
            NodeKind::IndexRangeAccess {
                ref base_expression,
                ref start_expression,
                ref end_expression,
            } => {
                stack.push((base_expression, access.through_element()));
                for bound in start_expression.iter().chain(end_expression.iter()) {
                    stack.push((bound, Access::Read));
                }
            }
            NodeKind::MemberAccess { ref expression, .. } => {
                stack.push((expression, access.through_element()));
            }
            NodeKind::TupleExpression { ref components, .. } => {
                for component in components.iter().flatten() {
                    stack.push((component, access));
                }
            }
            NodeKind::FunctionCall {
                ref expression,
                ref arguments,
            }
            | NodeKind::FunctionCallOptions {
                ref expression,
                options: ref arguments,
            } => {
                if !matches!(expression.kind(), NodeKind::Identifier { .. }) {
                    stack.push((expression, Access::Read));
                }
                for argument in arguments {
                    stack.push((argument, Access::Read));
                }
            }
            NodeKind::NewExpression { .. }
            | NodeKind::ElementaryTypeNameExpression { .. }
            | NodeKind::ElementaryTypeName { .. }
            | NodeKind::UserDefinedTypeName { .. }
            | NodeKind::Mapping { .. }
            | NodeKind::ArrayTypeName { .. }
            | NodeKind::FunctionTypeName => {}
            _ => {
                for child in node.children() {
                    stack.push((child, Access::Read));
                }
            }
        }
    }

    (defs, uses)
}
