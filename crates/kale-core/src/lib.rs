//! Semantic checker for the kale language
//!
//! Takes the syntax tree produced by the parser and lowers each function into
//! a control-flow graph of basic blocks, reporting scoping, typing and
//! reachability problems along the way.

pub mod check;
pub mod config;
pub mod diagnostic;
pub mod ir;
pub mod semantic;
pub mod syntax;

pub use check::{CheckOutput, check_file};
pub use config::{CheckConfig, Config, UnreachableLevel, UnusedValues};
pub use diagnostic::{CheckErrorKind, Diagnostic, Severity};
pub use ir::{BasicBlock, BlockId, FunctionIr, Instruction, ModuleIr, Opcode, Payload, Value};
pub use syntax::{NodeKind, SourceLocation, SyntaxNode, Token};
