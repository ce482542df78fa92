//! Module-level checking
//!
//! Lowers every function of a file in source order, runs the reachability
//! pass over each one that lowered cleanly and gathers all diagnostics.

use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::diagnostic::{CheckErrorKind, Diagnostic};
use crate::ir::{FunctionIr, ModuleIr};
use crate::semantic::{check_unreachable, lower_function};
use crate::syntax::{NodeKind, SyntaxNode};

#[derive(Debug, PartialEq)]
pub struct CheckOutput {
    /// Present only when every function lowered without error.
    pub module: Option<ModuleIr>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Checks a `file` node. Failures in one function never stop the others.
#[instrument(skip_all, name = "check_file")]
pub fn check_file(root: &SyntaxNode, config: &Config) -> CheckOutput {
    if root.kind != NodeKind::File {
        return CheckOutput {
            module: None,
            diagnostics: vec![Diagnostic::error(
                CheckErrorKind::UnexpectedNode { kind: root.kind },
                root.location(),
            )],
        };
    }

    let mut functions: Vec<FunctionIr> = Vec::with_capacity(root.children.len());
    let mut diagnostics = Vec::new();
    let mut failed = 0usize;

    for child in &root.children {
        if child.kind != NodeKind::Function {
            diagnostics.push(Diagnostic::error(
                CheckErrorKind::UnhandledTopLevel { kind: child.kind },
                child.location(),
            ));
            failed += 1;
            continue;
        }

        match lower_function(child, &config.check) {
            Ok(function) => {
                if let Some(severity) = config.check.unreachable.severity() {
                    if let Err(unreachable) = check_unreachable(&function, severity) {
                        diagnostics.extend(unreachable);
                    }
                }
                functions.push(function);
            }
            Err(errors) => {
                diagnostics.extend(errors);
                failed += 1;
            }
        }
    }

    info!(
        functions = functions.len(),
        failed,
        diagnostics = diagnostics.len(),
        "check complete"
    );

    let module = if failed == 0 {
        Some(ModuleIr { functions })
    } else {
        debug!(failed, "module discarded");
        None
    };

    CheckOutput {
        module,
        diagnostics,
    }
}
