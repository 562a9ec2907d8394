//! # ABC Compiler Front-End
//!
//! A compiler front-end for ABC music notation, plus a scanner for ABCT,
//! the sibling pipe-based transformation language that embeds ABC through
//! fenced literals.
//!
//! ## Compilation Pipeline
//!
//! ```text
//! .abc source → Scanner → Parser (+ beam grouping) → Analyzer
//!                tokens      FileStructure AST         semantic data map
//! ```
//!
//! 1. **Scanner** ([`scanner`], [`abct`]) - Character-level tokenizers with
//!    stateful sub-languages (per-field info-line grammars, tune-body
//!    music code, fenced ABC literals) and error-recovery tokens
//! 2. **Parser** ([`parser`]) - Recursive descent into a sum-typed tree
//!    with stable node ids, voice collection and `ErrorExpr` recovery
//! 3. **Beam Grouper** ([`beam`]) - Contracts runs of beamable elements
//!    into `Beam` nodes per system
//! 4. **Analyzer** ([`analyzer`]) - Visitor that materializes typed
//!    semantic data keyed by node id and validates directive parameters
//!
//! Every stage is total: problems become diagnostics on the shared
//! [`SourceContext`], never exceptions, and partial results stay usable.
//! Concatenating all token lexemes (minus EOF) reproduces the source.
//!
//! ## Quick Start
//!
//! ```rust
//! use abc::compile;
//!
//! let result = compile("X:1\nT:My Tune\nQ:1/4=120\nK:G\nGABd|\n");
//! assert!(result.diagnostics.is_empty());
//! ```
//!
//! ## Public API Entry Points
//!
//! - [`compile()`] - Full pipeline with a fresh context
//! - [`scan()`] / [`scan_abct()`] - Tokenize ABC / ABCT
//! - [`parse()`] - Tokens to tree
//! - [`analyze()`] - Tree to semantic data
//! - [`errors()`] - Buffered diagnostics on a context
//!
//! ## Module Structure
//!
//! - [`token`] - Token kinds and the token value object
//! - [`context`] - Per-compilation id generator and error reporter
//! - [`error`] - Diagnostic records and the reporter
//! - [`scanner`] - ABC tokenizer with info-line sub-scanners
//! - [`abct`] - ABCT tokenizer and fence sanitization
//! - [`expr`] - AST node taxonomy and visitor contract
//! - [`parser`] - Recursive descent with error recovery
//! - [`beam`] - Beam-grouping post-pass
//! - [`semantics`] - Typed semantic data model
//! - [`analyzer`] - Semantic analysis and directive dispatch
//! - [`api`] - Pipeline entry points

// Core modules
pub mod abct;
pub mod analyzer;
pub mod beam;
pub mod context;
pub mod error;
pub mod expr;
pub mod parser;
pub mod scanner;
pub mod semantics;
pub mod token;

// Public API
pub mod api;

// Re-export core types
pub use context::SourceContext;
pub use error::{Diagnostic, ErrorKind, ErrorReporter, Position};
pub use expr::*;
pub use semantics::*;
pub use token::{Token, TokenKind};

// Re-export pipeline functions
pub use abct::{desanitize, sanitize};
pub use api::{analyze, compile, errors, parse, scan, scan_abct, Compilation};
