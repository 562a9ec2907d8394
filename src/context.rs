//! Shared per-compilation state.
//!
//! One [`SourceContext`] lives for the duration of one compilation. It
//! issues the monotonic ids carried by every token and AST node and owns
//! the [`ErrorReporter`] all stages record into. Distinct compilations on
//! different threads must use distinct contexts.

use crate::error::{Diagnostic, ErrorKind, ErrorReporter, Position};

/// Mutable state threaded through scanner, parser and analyzer.
#[derive(Debug)]
pub struct SourceContext {
    next_id: u32,
    pub reporter: ErrorReporter,
    /// Display name used by the CLI when rendering diagnostics.
    pub source_name: Option<String>,
}

impl SourceContext {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            reporter: ErrorReporter::new(),
            source_name: None,
        }
    }

    pub fn with_source_name(name: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.source_name = Some(name.into());
        ctx
    }

    /// Issue the next id. Ids start at 1 and are unique and densely packed
    /// within one compilation.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn report(&mut self, kind: ErrorKind, message: impl Into<String>, position: Position) {
        self.reporter.report(Diagnostic::new(kind, message, position));
    }

    pub fn report_on_node(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
        position: Position,
        node_id: u32,
    ) {
        self.reporter
            .report(Diagnostic::new(kind, message, position).with_node(node_id));
    }

    pub fn has_errors(&self) -> bool {
        self.reporter.has_errors()
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::new()
    }
}
