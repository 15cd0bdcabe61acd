//! Translation of a function body into a `ControlFlowGraph`.

use log::{debug, trace};

use crate::ast::{self, LogicalOperator};
use crate::cfg::{Branch, ControlFlowGraph, NodeKind, Statement, StatementKind};
use crate::Error;

/// Where `break` and `continue` go inside the innermost enclosing loop.
struct LoopTargets {
    continue_to: usize,
    break_to: usize,
}

struct Builder<'s> {
    cfg: ControlFlowGraph,
    source: &'s str,
    loops: Vec<LoopTargets>,
}

fn unsupported(node: &ast::Node) -> Error {
    Error::UnsupportedConstruct {
        kind: node.node_type().to_string(),
        id: node.id(),
    }
}

pub(crate) fn build(function: &ast::Node, source: &str) -> Result<ControlFlowGraph, Error> {
    let definition = function.as_function().ok_or_else(|| unsupported(function))?;
    if definition.malformed_body {
        return Err(Error::MalformedBody {
            function: definition.display_name().to_string(),
            id: function.id(),
        });
    }

    let mut builder = Builder {
        cfg: ControlFlowGraph::new(function.id(), definition.display_name())?,
        source,
        loops: Vec::new(),
    };
    let entry = builder.cfg.entry();
    let exit = builder.cfg.exit();

    match definition.body {
        None => builder.cfg.connect(entry, exit, None)?,
        Some(ref body) => {
            let block = builder.cfg.add_node(body.id(), NodeKind::BasicBlock)?;
            builder.cfg.connect(entry, block, None)?;
            if let Some(last) = builder.statement(body, Some(block))? {
                builder.cfg.connect(last, exit, None)?;
            }
        }
    }

    debug!(
        "Built control flow graph for {} with {} nodes and {} edges",
        definition.display_name(),
        builder.cfg.graph().num_vertices(),
        builder.cfg.graph().num_edges()
    );

    Ok(builder.cfg)
}

impl<'s> Builder<'s> {
    /// Connect `current` to `index`, if there is a current node.
    fn link(
        &mut self,
        current: Option<usize>,
        index: usize,
        annotation: Option<Branch>,
    ) -> Result<(), Error> {
        match current {
            Some(current) => self.cfg.connect(current, index, annotation),
            None => Ok(()),
        }
    }

    fn push(&mut self, index: usize, kind: StatementKind, node: &ast::Node) -> Result<(), Error> {
        let statement = Statement::new(kind, node, self.source);
        trace!("{} <- {}", index, statement.label());
        self.cfg.node_mut(index)?.push(statement);
        Ok(())
    }

    /// Push a simple statement, as found in `for` headers.
    fn push_simple(&mut self, index: usize, node: &ast::Node) -> Result<(), Error> {
        match *node.kind() {
            ast::NodeKind::VariableDeclarationStatement { .. } => {
                self.push(index, StatementKind::Declaration, node)
            }
            ast::NodeKind::ExpressionStatement { ref expression } => {
                self.push(index, StatementKind::Expression, expression)
            }
            _ => Err(unsupported(node)),
        }
    }

    /// The node the statement `anchor` should be appended to. Statements
    /// which follow a node that cannot hold them, or which follow a `return`,
    /// `break` or `continue`, begin a new basic block.
    fn block_for(&mut self, current: Option<usize>, anchor: &ast::Node) -> Result<usize, Error> {
        if let Some(current) = current {
            if self.cfg.node_mut(current)?.kind().accepts_statements() {
                return Ok(current);
            }
        }
        let block = self.cfg.add_node(anchor.id(), NodeKind::BasicBlock)?;
        self.link(current, block, None)?;
        Ok(block)
    }

    fn simple(
        &mut self,
        kind: StatementKind,
        anchor: &ast::Node,
        node: &ast::Node,
        current: Option<usize>,
    ) -> Result<Option<usize>, Error> {
        let index = self.block_for(current, anchor)?;
        self.push(index, kind, node)?;
        Ok(Some(index))
    }

    /// Translate `node` following `current`. Returns the node control falls
    /// through to afterwards, or `None` when control cannot fall through.
    fn statement(
        &mut self,
        node: &ast::Node,
        current: Option<usize>,
    ) -> Result<Option<usize>, Error> {
        match *node.kind() {
            ast::NodeKind::Block { ref statements }
            | ast::NodeKind::UncheckedBlock { ref statements } => {
                let mut current = current;
                for statement in statements {
                    current = self.statement(statement, current)?;
                }
                Ok(current)
            }
            ast::NodeKind::VariableDeclarationStatement { .. } => {
                self.simple(StatementKind::Declaration, node, node, current)
            }
            ast::NodeKind::ExpressionStatement { ref expression } => {
                self.simple(StatementKind::Expression, node, expression, current)
            }
            ast::NodeKind::EmitStatement { .. } => {
                self.simple(StatementKind::Emit, node, node, current)
            }
            ast::NodeKind::RevertStatement { .. } => {
                self.simple(StatementKind::Revert, node, node, current)
            }
            ast::NodeKind::PlaceholderStatement => {
                self.simple(StatementKind::Placeholder, node, node, current)
            }
            ast::NodeKind::IfStatement {
                ref condition,
                ref true_body,
                ref false_body,
            } => self.if_statement(
                node,
                condition,
                true_body.as_deref(),
                false_body.as_deref(),
                current,
            ),
            ast::NodeKind::WhileStatement {
                ref condition,
                ref body,
            } => self.while_statement(node, condition, body, current),
            ast::NodeKind::DoWhileStatement {
                ref condition,
                ref body,
            } => self.do_while_statement(node, condition, body, current),
            ast::NodeKind::ForStatement {
                ref initialization_expression,
                ref condition,
                ref loop_expression,
                ref body,
            } => self.for_statement(
                node,
                initialization_expression.as_deref(),
                condition.as_deref(),
                loop_expression.as_deref(),
                body,
                current,
            ),
            ast::NodeKind::Return { .. } => {
                let index = self.cfg.add_node(node.id(), NodeKind::Return)?;
                self.link(current, index, None)?;
                self.push(index, StatementKind::Return, node)?;
                let exit = self.cfg.exit();
                self.cfg.connect(index, exit, None)?;
                Ok(None)
            }
            ast::NodeKind::Break | ast::NodeKind::Continue => {
                let (kind, target) = {
                    let targets = self.loops.last().ok_or_else(|| unsupported(node))?;
                    match *node.kind() {
                        ast::NodeKind::Break => (StatementKind::Break, targets.break_to),
                        _ => (StatementKind::Continue, targets.continue_to),
                    }
                };
                let index = self.block_for(current, node)?;
                self.push(index, kind, node)?;
                self.cfg.connect(index, target, None)?;
                Ok(None)
            }
            _ => Err(unsupported(node)),
        }
    }

    fn if_statement(
        &mut self,
        node: &ast::Node,
        condition: &ast::Node,
        true_body: Option<&ast::Node>,
        false_body: Option<&ast::Node>,
        current: Option<usize>,
    ) -> Result<Option<usize>, Error> {
        let branch = self.cfg.add_node(node.id(), NodeKind::BranchCondition)?;
        let condition = condition.unparenthesized();
        match condition.as_logical() {
            Some((operator, left, right)) => {
                self.logical_expression(condition, operator, left, right, current, None, branch)?;
                self.push(branch, StatementKind::ShortCircuitResult, condition)?;
            }
            None => {
                self.link(current, branch, None)?;
                self.push(branch, StatementKind::Condition, condition)?;
            }
        }

        // Edges into the convergence node, which is only created when
        // control can reach it.
        let mut ends: Vec<(usize, Option<Branch>)> = Vec::new();
        let arms = [
            (Branch::True, NodeKind::BranchTrue, true_body),
            (Branch::False, NodeKind::BranchFalse, false_body),
        ];
        for (annotation, kind, body) in arms {
            match body {
                Some(body) => {
                    let arm = self.cfg.add_node(node.id(), kind)?;
                    self.cfg.connect(branch, arm, Some(annotation))?;
                    if let Some(end) = self.statement(body, Some(arm))? {
                        ends.push((end, None));
                    }
                }
                None => ends.push((branch, Some(annotation))),
            }
        }

        if ends.is_empty() {
            return Ok(None);
        }
        let convergence = self.cfg.add_node(node.id(), NodeKind::Convergence)?;
        for (end, annotation) in ends {
            self.cfg.connect(end, convergence, annotation)?;
        }
        Ok(Some(convergence))
    }

    /// Wire the short-circuit evaluation of `left operator right` from
    /// `current` into `join`.
    ///
    /// The left operand is evaluated first. For `||` a true left operand
    /// bypasses the right operand, for `&&` a false one does. The bypass and
    /// the right operand both flow into `join`.
    #[allow(clippy::too_many_arguments)]
    fn logical_expression(
        &mut self,
        expression: &ast::Node,
        operator: LogicalOperator,
        left: &ast::Node,
        right: &ast::Node,
        current: Option<usize>,
        annotation: Option<Branch>,
        join: usize,
    ) -> Result<(), Error> {
        let (evaluate, bypass) = match operator {
            LogicalOperator::Or => (Branch::False, Branch::True),
            LogicalOperator::And => (Branch::True, Branch::False),
        };

        let left = self.operand(
            expression,
            left,
            NodeKind::ShortCircuitLeft,
            current,
            annotation,
        )?;
        let bypass_node = self.cfg.add_node(expression.id(), NodeKind::ShortCircuitBypass)?;
        self.cfg.connect(left, bypass_node, Some(bypass))?;
        let right = self.operand(
            expression,
            right,
            NodeKind::ShortCircuitRight,
            Some(left),
            Some(evaluate),
        )?;

        self.cfg.connect(bypass_node, join, None)?;
        self.cfg.connect(right, join, None)?;
        Ok(())
    }

    /// Evaluate one operand of `expression`, returning the node which holds
    /// its value. An operand which is itself short-circuiting is expanded,
    /// and its own convergence node holds its value.
    fn operand(
        &mut self,
        expression: &ast::Node,
        operand: &ast::Node,
        kind: NodeKind,
        current: Option<usize>,
        annotation: Option<Branch>,
    ) -> Result<usize, Error> {
        let operand = operand.unparenthesized();
        match operand.as_logical() {
            Some((operator, left, right)) => {
                let join = self.cfg.add_node(operand.id(), NodeKind::Convergence)?;
                self.logical_expression(operand, operator, left, right, current, annotation, join)?;
                self.push(join, StatementKind::ShortCircuitResult, operand)?;
                Ok(join)
            }
            None => {
                let index = self.cfg.add_node(expression.id(), kind)?;
                self.link(current, index, annotation)?;
                self.push(index, StatementKind::Operand, operand)?;
                Ok(index)
            }
        }
    }

    fn while_statement(
        &mut self,
        node: &ast::Node,
        condition: &ast::Node,
        body: &ast::Node,
        current: Option<usize>,
    ) -> Result<Option<usize>, Error> {
        let head = self.cfg.add_node(node.id(), NodeKind::LoopCondition)?;
        self.link(current, head, None)?;
        self.push(head, StatementKind::Condition, condition)?;

        let body_node = self.cfg.add_node(node.id(), NodeKind::LoopBody)?;
        self.cfg.connect(head, body_node, Some(Branch::True))?;
        let after = self.cfg.add_node(node.id(), NodeKind::AfterLoop)?;

        if let Some(end) = self.loop_body(body, body_node, head, after)? {
            self.cfg.connect(end, head, None)?;
        }
        self.cfg.connect(head, after, Some(Branch::False))?;

        Ok(Some(after))
    }

    fn do_while_statement(
        &mut self,
        node: &ast::Node,
        condition: &ast::Node,
        body: &ast::Node,
        current: Option<usize>,
    ) -> Result<Option<usize>, Error> {
        let body_node = self.cfg.add_node(node.id(), NodeKind::LoopBody)?;
        self.link(current, body_node, None)?;
        let head = self.cfg.add_node(node.id(), NodeKind::LoopCondition)?;
        let after = self.cfg.add_node(node.id(), NodeKind::AfterLoop)?;

        if let Some(end) = self.loop_body(body, body_node, head, after)? {
            self.cfg.connect(end, head, None)?;
        }
        self.push(head, StatementKind::Condition, condition)?;
        self.cfg.connect(head, body_node, Some(Branch::True))?;
        self.cfg.connect(head, after, Some(Branch::False))?;

        Ok(Some(after))
    }

    fn for_statement(
        &mut self,
        node: &ast::Node,
        initialization_expression: Option<&ast::Node>,
        condition: Option<&ast::Node>,
        loop_expression: Option<&ast::Node>,
        body: &ast::Node,
        current: Option<usize>,
    ) -> Result<Option<usize>, Error> {
        let init = self.cfg.add_node(node.id(), NodeKind::LoopInit)?;
        self.link(current, init, None)?;
        if let Some(initialization_expression) = initialization_expression {
            self.push_simple(init, initialization_expression)?;
        }

        let head = self.cfg.add_node(node.id(), NodeKind::LoopCondition)?;
        self.cfg.connect(init, head, None)?;
        if let Some(condition) = condition {
            self.push(head, StatementKind::Condition, condition)?;
        }

        // Without a condition the loop is only left through `break`.
        let body_node = self.cfg.add_node(node.id(), NodeKind::LoopBody)?;
        self.cfg
            .connect(head, body_node, condition.map(|_| Branch::True))?;
        let increment = self.cfg.add_node(node.id(), NodeKind::LoopIncrement)?;
        if let Some(loop_expression) = loop_expression {
            self.push_simple(increment, loop_expression)?;
        }
        let after = self.cfg.add_node(node.id(), NodeKind::AfterLoop)?;

        if let Some(end) = self.loop_body(body, body_node, increment, after)? {
            self.cfg.connect(end, increment, None)?;
        }
        self.cfg.connect(increment, head, None)?;
        if condition.is_some() {
            self.cfg.connect(head, after, Some(Branch::False))?;
        }

        Ok(Some(after))
    }

    fn loop_body(
        &mut self,
        body: &ast::Node,
        body_node: usize,
        continue_to: usize,
        break_to: usize,
    ) -> Result<Option<usize>, Error> {
        self.loops.push(LoopTargets {
            continue_to,
            break_to,
        });
        let end = self.statement(body, Some(body_node));
        self.loops.pop();
        end
    }
}
