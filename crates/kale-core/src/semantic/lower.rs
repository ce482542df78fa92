//! Lowering of one function body into basic blocks
//!
//! The tree is walked with an explicit stack of work items instead of native
//! recursion. A handler that needs its children lowered first pushes itself
//! back with its next stage and then pushes the children above it, so the
//! children run first and the handler resumes afterwards. Control-flow nodes
//! use the gap between stages to open, close and patch blocks.
//!
//! Expression results travel on a separate value stack: every expression
//! leaves exactly one value there, and operators pop their operands right
//! before emitting their instruction.

use tracing::{Span, debug, instrument, trace};

use crate::config::{CheckConfig, UnusedValues};
use crate::diagnostic::{CheckErrorKind, Diagnostic};
use crate::ir::{BlockId, FunctionIr, Opcode, Value};
use crate::semantic::builder::BlockBuilder;
use crate::semantic::scope::ScopeTable;
use crate::syntax::{NodeKind, SourceLocation, SyntaxNode};

/// Where a work item resumes, with the state it carries between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Enter,
    /// Operands are on the value stack.
    Exit,
    LeaveBlock {
        depth: usize,
    },
    LoopTest {
        head: BlockId,
    },
    LoopBody {
        head: BlockId,
        test_tail: BlockId,
        test: Value,
        body_head: BlockId,
    },
    IfTest,
    IfThen {
        test_tail: BlockId,
        test: Value,
        then_head: BlockId,
    },
    IfElse {
        test_tail: BlockId,
        test: Value,
        then_head: BlockId,
        then_tail: BlockId,
        else_head: BlockId,
    },
}

impl Stage {
    fn index(self) -> u8 {
        match self {
            Stage::Enter => 0,
            Stage::Exit | Stage::LeaveBlock { .. } | Stage::LoopTest { .. } | Stage::IfTest => 1,
            Stage::LoopBody { .. } | Stage::IfThen { .. } => 2,
            Stage::IfElse { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WorkItem<'a> {
    node: &'a SyntaxNode,
    stage: Stage,
}

#[derive(Debug, Clone, Copy)]
struct StackValue<'a> {
    value: Value,
    node: &'a SyntaxNode,
}

/// A structural error was recorded; the function cannot be lowered further.
#[derive(Debug)]
struct Abort;

type Step = Result<(), Abort>;

/// Lowers a `fn` node into its control-flow graph.
///
/// Semantic errors are collected and lowering continues so that independent
/// mistakes surface together; structural errors stop at once. Any error
/// discards the function.
#[instrument(skip_all, fields(function = tracing::field::Empty))]
pub fn lower_function(
    node: &SyntaxNode,
    config: &CheckConfig,
) -> Result<FunctionIr, Vec<Diagnostic>> {
    let (name, body) = split_function(node)?;
    Span::current().record("function", name);

    let mut lowerer = Lowerer::new(name, config);
    lowerer.push(body, Stage::Enter);
    let completed = lowerer.run().is_ok();

    if !completed || !lowerer.diagnostics.is_empty() {
        debug!(
            errors = lowerer.diagnostics.len(),
            completed, "function discarded"
        );
        return Err(lowerer.diagnostics);
    }

    let function = lowerer.builder.finish(name, body.location());
    debug!(
        blocks = function.block_count(),
        values = function.value_count(),
        "function lowered"
    );
    Ok(function)
}

fn split_function(node: &SyntaxNode) -> Result<(&str, &SyntaxNode), Vec<Diagnostic>> {
    let unexpected = |node: &SyntaxNode| {
        vec![Diagnostic::error(
            CheckErrorKind::UnexpectedNode { kind: node.kind },
            node.location(),
        )]
    };

    if node.kind != NodeKind::Function {
        return Err(unexpected(node));
    }
    if !node.has_valid_arity() {
        return Err(vec![Diagnostic::error(malformed(node), node.location())]);
    }

    let (name, body) = (&node.children[0], &node.children[1]);
    if name.kind != NodeKind::Identifier {
        return Err(unexpected(name));
    }
    if body.kind != NodeKind::Block {
        return Err(unexpected(body).into_iter().map(|d| d.with_function(name.text())).collect());
    }
    Ok((name.text(), body))
}

fn malformed(node: &SyntaxNode) -> CheckErrorKind {
    CheckErrorKind::MalformedNode {
        kind: node.kind,
        expected: node.kind.arity(),
        found: node.children.len(),
    }
}

fn binary_opcode(kind: NodeKind) -> Option<Opcode> {
    match kind {
        NodeKind::Add => Some(Opcode::Add),
        NodeKind::Sub => Some(Opcode::Sub),
        NodeKind::Mul => Some(Opcode::Mul),
        NodeKind::Div => Some(Opcode::Div),
        _ => None,
    }
}

/// Node kinds that may stand where a value is required. Identifiers and
/// assignments are accepted here and rejected when visited.
fn is_expression(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::IntLiteral | NodeKind::Identifier | NodeKind::Assign
    ) || kind.is_binary()
}

/// Base-10 digit accumulation. Overflow wraps.
pub fn parse_int_literal(text: &str) -> u64 {
    text.bytes().fold(0u64, |acc, digit| {
        acc.wrapping_mul(10)
            .wrapping_add(u64::from(digit.wrapping_sub(b'0')))
    })
}

struct Lowerer<'a, 'c> {
    function: &'a str,
    config: &'c CheckConfig,
    items: Vec<WorkItem<'a>>,
    values: Vec<StackValue<'a>>,
    scopes: ScopeTable,
    builder: BlockBuilder,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 'c> Lowerer<'a, 'c> {
    fn new(function: &'a str, config: &'c CheckConfig) -> Self {
        Self {
            function,
            config,
            items: Vec::new(),
            values: Vec::new(),
            scopes: ScopeTable::new(),
            builder: BlockBuilder::new(),
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, node: &'a SyntaxNode, stage: Stage) {
        self.items.push(WorkItem { node, stage });
    }

    /// Schedules a child whose result the parent will pop.
    fn push_operand(&mut self, node: &'a SyntaxNode) -> Step {
        if !is_expression(node.kind) {
            return self.fatal(node, CheckErrorKind::UnexpectedNode { kind: node.kind });
        }
        self.push(node, Stage::Enter);
        Ok(())
    }

    fn report(&mut self, kind: CheckErrorKind, location: SourceLocation) {
        self.diagnostics
            .push(Diagnostic::error(kind, location).with_function(self.function));
    }

    fn fatal<T>(&mut self, node: &SyntaxNode, kind: CheckErrorKind) -> Result<T, Abort> {
        debug_assert!(kind.is_fatal(), "{kind:?} is a recoverable error");
        self.report(kind, node.location());
        Err(Abort)
    }

    fn push_value(&mut self, value: Value, node: &'a SyntaxNode) {
        self.values.push(StackValue { value, node });
    }

    fn pop_value(&mut self, node: &SyntaxNode) -> Result<Value, Abort> {
        match self.values.pop() {
            Some(entry) => Ok(entry.value),
            None => self.fatal(node, CheckErrorKind::ValueStackUnderflow { kind: node.kind }),
        }
    }

    fn run(&mut self) -> Step {
        while let Some(item) = self.items.pop() {
            trace!(kind = %item.node.kind, stage = item.stage.index(), "visit");
            self.visit(item)?;
        }
        Ok(())
    }

    fn visit(&mut self, item: WorkItem<'a>) -> Step {
        let WorkItem { node, stage } = item;

        if stage == Stage::Enter && !node.has_valid_arity() {
            return self.fatal(node, malformed(node));
        }

        match (node.kind, stage) {
            (NodeKind::IntLiteral, Stage::Enter) => {
                let value = self
                    .builder
                    .int_const(parse_int_literal(node.text()), node.location());
                self.push_value(value, node);
                Ok(())
            }

            (kind, Stage::Enter) if kind.is_binary() => {
                self.push(node, Stage::Exit);
                self.push_operand(&node.children[1])?;
                self.push_operand(&node.children[0])
            }
            (kind, Stage::Exit) if kind.is_binary() => self.binary(node),

            (NodeKind::Block, Stage::Enter) => {
                self.scopes.enter_scope();
                let depth = self.values.len();
                self.push(node, Stage::LeaveBlock { depth });
                for child in node.children.iter().rev() {
                    self.push(child, Stage::Enter);
                }
                Ok(())
            }
            (NodeKind::Block, Stage::LeaveBlock { depth }) => {
                self.leave_block(depth);
                Ok(())
            }

            (NodeKind::Local, Stage::Enter) => self.local(node),

            (NodeKind::Return, Stage::Enter) => {
                self.push(node, Stage::Exit);
                self.push_operand(&node.children[0])
            }
            (NodeKind::Return, Stage::Exit) => {
                let value = self.pop_value(node)?;
                self.builder.ret(value, node.location());
                self.builder.start_block();
                Ok(())
            }

            (NodeKind::While, Stage::Enter) => {
                let before = self.builder.current();
                let head = self.builder.start_block();
                self.builder.goto(before, head, node.location());
                self.push(node, Stage::LoopTest { head });
                self.push_operand(&node.children[0])
            }
            (NodeKind::While, Stage::LoopTest { head }) => {
                let test = self.pop_value(node)?;
                let test_tail = self.builder.current();
                let body_head = self.builder.start_block();
                self.push(
                    node,
                    Stage::LoopBody {
                        head,
                        test_tail,
                        test,
                        body_head,
                    },
                );
                let body = self.expect_block(&node.children[1])?;
                self.push(body, Stage::Enter);
                Ok(())
            }
            (
                NodeKind::While,
                Stage::LoopBody {
                    head,
                    test_tail,
                    test,
                    body_head,
                },
            ) => {
                let location = node.location();
                let body_tail = self.builder.current();
                self.builder.goto(body_tail, head, location);
                let after = self.builder.start_block();
                self.builder
                    .branch(test_tail, test, body_head, after, location);
                Ok(())
            }

            (NodeKind::If, Stage::Enter) => {
                self.push(node, Stage::IfTest);
                self.push_operand(&node.children[0])
            }
            (NodeKind::If, Stage::IfTest) => {
                let test = self.pop_value(node)?;
                let test_tail = self.builder.current();
                let then_head = self.builder.start_block();
                self.push(
                    node,
                    Stage::IfThen {
                        test_tail,
                        test,
                        then_head,
                    },
                );
                let then = self.expect_block(&node.children[1])?;
                self.push(then, Stage::Enter);
                Ok(())
            }
            (
                NodeKind::If,
                Stage::IfThen {
                    test_tail,
                    test,
                    then_head,
                },
            ) => self.after_then(node, test_tail, test, then_head),
            (
                NodeKind::If,
                Stage::IfElse {
                    test_tail,
                    test,
                    then_head,
                    then_tail,
                    else_head,
                },
            ) => {
                let location = node.location();
                let else_tail = self.builder.current();
                let end = self.builder.start_block();
                self.builder
                    .branch(test_tail, test, then_head, else_head, location);
                self.builder.goto(then_tail, end, location);
                self.builder.goto(else_tail, end, location);
                Ok(())
            }

            (kind, _) => self.fatal(node, CheckErrorKind::UnexpectedNode { kind }),
        }
    }

    fn binary(&mut self, node: &'a SyntaxNode) -> Step {
        let rhs = self.pop_value(node)?;
        let lhs = self.pop_value(node)?;
        let Some(op) = binary_opcode(node.kind) else {
            return self.fatal(node, CheckErrorKind::UnexpectedNode { kind: node.kind });
        };
        let value = self.builder.binary(op, lhs, rhs, node.location());
        self.push_value(value, node);
        Ok(())
    }

    fn leave_block(&mut self, depth: usize) {
        let depth = depth.min(self.values.len());
        let discarded = self.values.split_off(depth);

        if self.config.unused_values == UnusedValues::Error {
            for entry in discarded {
                self.report(CheckErrorKind::UnusedValue, entry.node.location());
            }
        }

        self.scopes.exit_scope();
    }

    fn local(&mut self, node: &'a SyntaxNode) -> Step {
        let (name, type_name) = (&node.children[0], &node.children[1]);
        for part in [name, type_name] {
            if part.kind != NodeKind::Identifier {
                return self.fatal(part, CheckErrorKind::UnexpectedNode { kind: part.kind });
            }
        }

        if type_name.text() != "int" {
            self.report(
                CheckErrorKind::UnsupportedType {
                    found: type_name.text().to_string(),
                },
                type_name.location(),
            );
        }

        let slot = self.builder.local(node.location());
        if let Err(duplicate) = self.scopes.declare(name.text(), slot) {
            trace!(name = %duplicate.name, existing = %duplicate.existing, "duplicate local");
            self.report(
                CheckErrorKind::DuplicateSymbol {
                    name: duplicate.name,
                },
                name.location(),
            );
        }
        Ok(())
    }

    fn after_then(
        &mut self,
        node: &'a SyntaxNode,
        test_tail: BlockId,
        test: Value,
        then_head: BlockId,
    ) -> Step {
        let location = node.location();
        let then_tail = self.builder.current();

        let Some(otherwise) = node.child(2) else {
            let end = self.builder.start_block();
            self.builder.goto(then_tail, end, location);
            self.builder
                .branch(test_tail, test, then_head, end, location);
            return Ok(());
        };

        let otherwise = self.else_body(otherwise)?;
        let else_head = self.builder.start_block();
        self.push(
            node,
            Stage::IfElse {
                test_tail,
                test,
                then_head,
                then_tail,
                else_head,
            },
        );
        self.push(otherwise, Stage::Enter);
        Ok(())
    }

    fn expect_block(&mut self, node: &'a SyntaxNode) -> Result<&'a SyntaxNode, Abort> {
        if node.kind != NodeKind::Block {
            return self.fatal(node, CheckErrorKind::UnexpectedNode { kind: node.kind });
        }
        Ok(node)
    }

    /// The else arm is a block or a nested `if`, optionally wrapped in an
    /// `else` node.
    fn else_body(&mut self, node: &'a SyntaxNode) -> Result<&'a SyntaxNode, Abort> {
        let body = if node.kind == NodeKind::Else {
            if !node.has_valid_arity() {
                return self.fatal(node, malformed(node));
            }
            &node.children[0]
        } else {
            node
        };

        match body.kind {
            NodeKind::Block | NodeKind::If => Ok(body),
            kind => self.fatal(body, CheckErrorKind::UnexpectedNode { kind }),
        }
    }
}
