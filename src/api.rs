//! # Public API
//!
//! Entry points for the compilation pipeline. All stage functions are
//! total: they always return a value and record problems on the
//! [`SourceContext`] instead of failing.
//!
//! ## Typical Usage
//!
//! ```rust
//! use abc::compile;
//!
//! let source = "X:1\nT:Test\nK:C\nCDEF|\n";
//! let result = compile(source);
//! assert!(result.diagnostics.is_empty());
//! assert!(!result.semantics.is_empty());
//! ```
//!
//! ## Staged Usage
//!
//! Drive the stages yourself to inspect intermediate results or to share
//! a context across them:
//!
//! ```rust
//! use abc::{analyze, parse, scan, SourceContext};
//!
//! let mut ctx = SourceContext::new();
//! let tokens = scan("X:1\nK:C\nC|\n", &mut ctx);
//! let ast = parse(tokens, &mut ctx);
//! let semantics = analyze(&ast, &mut ctx);
//! assert!(!ctx.has_errors());
//! # let _ = semantics;
//! ```

use crate::analyzer;
use crate::context::SourceContext;
use crate::error::Diagnostic;
use crate::expr::FileStructure;
use crate::parser;
use crate::scanner;
use crate::semantics::SemanticMap;
use crate::token::Token;

/// Scan ABC source into tokens. Total; lexical errors land on the context.
pub fn scan(source: &str, ctx: &mut SourceContext) -> Vec<Token> {
    scanner::scan(source, ctx)
}

/// Scan ABCT source into tokens. Total; lexical errors land on the
/// context.
pub fn scan_abct(source: &str, ctx: &mut SourceContext) -> Vec<Token> {
    crate::abct::scan_abct(source, ctx)
}

/// Parse scanned tokens into a tree. Total; the tree may contain error
/// nodes.
pub fn parse(tokens: Vec<Token>, ctx: &mut SourceContext) -> FileStructure {
    parser::parse(tokens, ctx)
}

/// Walk a parsed tree and materialize the id-keyed semantic data map.
/// Total; nodes with invalid parameters get no entry.
pub fn analyze(ast: &FileStructure, ctx: &mut SourceContext) -> SemanticMap {
    analyzer::analyze(ast, ctx)
}

/// Diagnostics buffered on a context so far, in report order.
pub fn errors(ctx: &SourceContext) -> &[Diagnostic] {
    ctx.reporter.errors()
}

/// Everything one compilation produces. The tree and the map reference
/// each other only through node ids.
#[derive(Debug)]
pub struct Compilation {
    pub ast: FileStructure,
    pub semantics: SemanticMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the whole pipeline on one source string with a fresh context.
///
/// # Pipeline
/// 1. Scan source into tokens
/// 2. Parse tokens into a tree (beam grouping included)
/// 3. Analyze the tree into semantic data
///
/// The result always carries a usable tree; check `diagnostics` to see
/// what recovery happened along the way.
pub fn compile(source: &str) -> Compilation {
    let mut ctx = SourceContext::new();
    let tokens = scan(source, &mut ctx);
    let ast = parse(tokens, &mut ctx);
    let semantics = analyze(&ast, &mut ctx);
    Compilation {
        ast,
        semantics,
        diagnostics: ctx.reporter.take(),
    }
}
