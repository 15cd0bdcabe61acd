use crate::ast::Node;

/// A pre-order traversal over a subtree of the AST, visiting children in
/// source order.
///
/// The traversal keeps an explicit stack, so its depth is bounded by the
/// heap rather than the call stack.
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Descendants<'a> {
    pub(crate) fn new(root: &'a Node) -> Descendants<'a> {
        Descendants { stack: vec![root] }
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().into_iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Node, NodeKind, Span};

    fn identifier(id: u64, name: &str) -> Node {
        Node::new(
            id,
            Span::default(),
            NodeKind::Identifier {
                name: name.to_string(),
                referenced_declaration: None,
            },
        )
    }

    #[test]
    fn pre_order() {
        // f(a + b, c)
        let sum = Node::new(
            4,
            Span::default(),
            NodeKind::BinaryOperation {
                operator: "+".to_string(),
                left_expression: Box::new(identifier(2, "a")),
                right_expression: Box::new(identifier(3, "b")),
            },
        );
        let call = Node::new(
            6,
            Span::default(),
            NodeKind::FunctionCall {
                expression: Box::new(identifier(1, "f")),
                arguments: vec![sum, identifier(5, "c")],
            },
        );

        let ids = call.descendants().map(|node| node.id()).collect::<Vec<u64>>();
        assert_eq!(ids, vec![6, 1, 4, 2, 3, 5]);
    }

    #[test]
    fn leaf() {
        let leaf = identifier(1, "x");
        assert_eq!(leaf.descendants().count(), 1);
    }
}
