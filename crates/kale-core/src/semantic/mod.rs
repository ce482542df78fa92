//! Semantic analysis module
//!
//! Provides lexical scopes, basic block construction, lowering of function
//! bodies into control-flow graphs, and reachability analysis.

pub mod builder;
pub mod lower;
pub mod reachability;
pub mod scope;

pub use builder::BlockBuilder;
pub use lower::{lower_function, parse_int_literal};
pub use reachability::{BitSet, check_unreachable, reachable_blocks, unreachable_blocks};
pub use scope::{DuplicateSymbol, ScopeFrame, ScopeTable};
