//! Diagnostics reported by the checker
//!
//! Every problem the checker finds becomes a [`Diagnostic`] anchored at the
//! token that caused it. The checker returns diagnostics to its caller and
//! never prints or aborts on its own.

use std::fmt;

use serde::Serialize;

use crate::syntax::{Arity, NodeKind, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "error", rename_all = "kebab-case")]
pub enum CheckErrorKind {
    #[error("only 'int' type supported")]
    UnsupportedType { found: String },

    #[error("this symbol name overwrites an existing symbol")]
    DuplicateSymbol { name: String },

    #[error("result of this expression is unused")]
    UnusedValue,

    #[error("this code is unreachable")]
    Unreachable,

    #[error("compiler bug(check): was not expecting this '{kind}' here")]
    UnexpectedNode { kind: NodeKind },

    #[error("malformed '{kind}' node: expected {expected} children, found {found}")]
    MalformedNode {
        kind: NodeKind,
        #[serde(skip)]
        expected: Arity,
        found: usize,
    },

    #[error("top-level statement not handled")]
    UnhandledTopLevel { kind: NodeKind },

    #[error("compiler bug(check): '{kind}' has no operand to consume")]
    ValueStackUnderflow { kind: NodeKind },
}

impl CheckErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            CheckErrorKind::UnsupportedType { .. } => "K001",
            CheckErrorKind::DuplicateSymbol { .. } => "K002",
            CheckErrorKind::UnusedValue => "K003",
            CheckErrorKind::Unreachable => "K004",
            CheckErrorKind::UnexpectedNode { .. } => "K100",
            CheckErrorKind::MalformedNode { .. } => "K101",
            CheckErrorKind::UnhandledTopLevel { .. } => "K102",
            CheckErrorKind::ValueStackUnderflow { .. } => "K103",
        }
    }

    /// Structural errors stop lowering of the current function at once;
    /// semantic ones are recorded and lowering carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CheckErrorKind::UnexpectedNode { .. }
                | CheckErrorKind::MalformedNode { .. }
                | CheckErrorKind::UnhandledTopLevel { .. }
                | CheckErrorKind::ValueStackUnderflow { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub kind: CheckErrorKind,
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    pub function: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: CheckErrorKind, severity: Severity, location: SourceLocation) -> Self {
        Self {
            code: kind.code(),
            message: kind.to_string(),
            kind,
            severity,
            location,
            function: None,
        }
    }

    pub fn error(kind: CheckErrorKind, location: SourceLocation) -> Self {
        Self::new(kind, Severity::Error, location)
    }

    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}]: {}",
            self.location, self.severity, self.code, self.message
        )
    }
}
