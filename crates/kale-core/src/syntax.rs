//! Syntax tree consumed by the checker
//!
//! The parser owns tree construction; this module only fixes the shape the
//! checker relies on: a kind tag, the token that anchors diagnostics, and an
//! ordered list of owned children.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    File,
    Function,
    Block,
    If,
    Else,
    While,
    Return,
    Local,
    Assign,
    Initialize,
    Add,
    Sub,
    Mul,
    Div,
    Identifier,
    IntLiteral,
}

/// Number of children a node kind must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::Range(lo, hi) => write!(f, "{lo} to {hi}"),
            Arity::Any => f.write_str("any number of"),
        }
    }
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Function => "fn",
            NodeKind::Block => "block",
            NodeKind::If => "if",
            NodeKind::Else => "else",
            NodeKind::While => "while",
            NodeKind::Return => "return",
            NodeKind::Local => "local",
            NodeKind::Assign => "assign",
            NodeKind::Initialize => "initialize",
            NodeKind::Add => "add",
            NodeKind::Sub => "sub",
            NodeKind::Mul => "mul",
            NodeKind::Div => "div",
            NodeKind::Identifier => "identifier",
            NodeKind::IntLiteral => "int literal",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            NodeKind::File | NodeKind::Block => Arity::Any,
            NodeKind::Function
            | NodeKind::While
            | NodeKind::Local
            | NodeKind::Assign
            | NodeKind::Initialize
            | NodeKind::Add
            | NodeKind::Sub
            | NodeKind::Mul
            | NodeKind::Div => Arity::Exactly(2),
            NodeKind::If => Arity::Range(2, 3),
            NodeKind::Else | NodeKind::Return => Arity::Exactly(1),
            NodeKind::Identifier | NodeKind::IntLiteral => Arity::Exactly(0),
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Div
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One-based line and column of a token's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            text: text.into(),
            location: SourceLocation::new(line, column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub token: Token,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, token: Token, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            token,
            children,
        }
    }

    pub fn leaf(kind: NodeKind, token: Token) -> Self {
        Self::new(kind, token, Vec::new())
    }

    pub fn child(&self, index: usize) -> Option<&SyntaxNode> {
        self.children.get(index)
    }

    pub fn location(&self) -> SourceLocation {
        self.token.location
    }

    pub fn text(&self) -> &str {
        &self.token.text
    }

    pub fn has_valid_arity(&self) -> bool {
        self.kind.arity().accepts(self.children.len())
    }

    /// Moves this node's token to `line:column`, keeping its text.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.token.location = SourceLocation::new(line, column);
        self
    }
}

/// Tree constructors mirroring what the parser emits for each construct.
///
/// Tokens carry the text the parser would have seen (`fn`, `{`, `:`, the
/// operator, the literal) at location `1:1`; use [`SyntaxNode::at`] to
/// position a node when a diagnostic location matters.
pub mod build {
    use super::{NodeKind, SyntaxNode, Token};

    fn token(text: &str) -> Token {
        Token::new(text, 1, 1)
    }

    pub fn file(functions: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::new(NodeKind::File, token(""), functions)
    }

    pub fn function(name: &str, body: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(NodeKind::Function, token("fn"), vec![ident(name), body])
    }

    pub fn block(statements: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::new(NodeKind::Block, token("{"), statements)
    }

    pub fn ident(name: &str) -> SyntaxNode {
        SyntaxNode::leaf(NodeKind::Identifier, token(name))
    }

    pub fn int(value: u64) -> SyntaxNode {
        SyntaxNode::leaf(NodeKind::IntLiteral, token(&value.to_string()))
    }

    pub fn binary(kind: NodeKind, lhs: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
        let op = match kind {
            NodeKind::Add => "+",
            NodeKind::Sub => "-",
            NodeKind::Mul => "*",
            NodeKind::Div => "/",
            NodeKind::Assign => "=",
            other => other.name(),
        };
        SyntaxNode::new(kind, token(op), vec![lhs, rhs])
    }

    pub fn add(lhs: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
        binary(NodeKind::Add, lhs, rhs)
    }

    pub fn sub(lhs: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
        binary(NodeKind::Sub, lhs, rhs)
    }

    pub fn mul(lhs: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
        binary(NodeKind::Mul, lhs, rhs)
    }

    pub fn div(lhs: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
        binary(NodeKind::Div, lhs, rhs)
    }

    pub fn assign(target: SyntaxNode, value: SyntaxNode) -> SyntaxNode {
        binary(NodeKind::Assign, target, value)
    }

    pub fn local(name: &str, type_name: &str) -> SyntaxNode {
        SyntaxNode::new(
            NodeKind::Local,
            token(":"),
            vec![ident(name), ident(type_name)],
        )
    }

    pub fn initialize(local: SyntaxNode, value: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(NodeKind::Initialize, token("="), vec![local, value])
    }

    pub fn ret(value: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(NodeKind::Return, token("return"), vec![value])
    }

    pub fn while_loop(predicate: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(NodeKind::While, token("while"), vec![predicate, body])
    }

    pub fn if_then(predicate: SyntaxNode, then: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(NodeKind::If, token("if"), vec![predicate, then])
    }

    pub fn if_else(predicate: SyntaxNode, then: SyntaxNode, otherwise: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(NodeKind::If, token("if"), vec![predicate, then, otherwise])
    }

    /// An explicit `else` wrapper around a block or a nested `if`.
    pub fn else_branch(body: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(NodeKind::Else, token("else"), vec![body])
    }
}
