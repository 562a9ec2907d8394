//! Diagnostic types for the ABC compiler front-end.
//!
//! Errors are data, never control flow: every stage records what it saw
//! through the [`ErrorReporter`] on the compilation's `SourceContext` and
//! keeps going. The reporter itself never panics and never throws; callers
//! ask it `has_errors()` / `errors()` after a stage completes.
//!
//! All positions are 0-based. Analyzer diagnostics take the position of the
//! offending node's key token.

use serde::Serialize;
use thiserror::Error;

/// Which stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Scanner,
    Parser,
    Analyzer,
    /// Contextual errors reported on behalf of a consumer of the analyzed
    /// tree, e.g. "K: not allowed in file header".
    Interpreter,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Scanner => "Scan",
            ErrorKind::Parser => "Parse",
            ErrorKind::Analyzer => "Analyze",
            ErrorKind::Interpreter => "Interpret",
        };
        f.write_str(name)
    }
}

/// A 0-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

/// A single diagnostic record with location information.
///
/// # Example
/// ```
/// use abc::{Diagnostic, ErrorKind, Position};
///
/// let err = Diagnostic::new(
///     ErrorKind::Parser,
///     "Unexpected token ']'",
///     Position::new(4, 9, 87),
/// );
/// assert_eq!(
///     err.to_string(),
///     "Parse error at line 4, column 9: Unexpected token ']'"
/// );
/// ```
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{kind} error at line {}, column {}: {message}", .position.line, .position.column)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub position: Position,
    /// Id of the AST node the diagnostic is attached to, when one exists.
    pub node_id: Option<u32>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
            node_id: None,
        }
    }

    pub fn with_node(mut self, node_id: u32) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

/// Buffers diagnostics for one compilation.
#[derive(Debug, Default, Clone)]
pub struct ErrorReporter {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of diagnostics recorded by a given stage.
    pub fn count_of(&self, kind: ErrorKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    /// Drain the buffered diagnostics, leaving the reporter empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
