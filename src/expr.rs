//! # Abstract Syntax Tree (AST) Types
//!
//! This module defines the node taxonomy for parsed ABC source and the
//! visitor contract used by every pass over the tree.
//!
//! ## Type Hierarchy
//! ```text
//! FileStructure
//!   ├── FileHeader? (info lines, comments, directives before the first X:)
//!   └── contents: Vec<Expr>    (Tune | free tokens)
//!
//! Tune
//!   ├── TuneHeader (info lines + collected voice ids)
//!   └── TuneBody?
//!         └── systems: Vec<Vec<Expr>>   (one system per source line)
//!
//! Music elements: Note, Rest, MultiMeasureRest, Chord, GraceGroup,
//! Tuplet, BarLine, Decoration, Annotation, Symbol, YSpacer,
//! InlineField, VoiceOverlay, Beam
//!
//! Info-line sub-expressions: KeyValue, Binary, Grouping, Rational,
//! Measurement, AbsolutePitch
//!
//! Recovery: ErrorExpr (the tokens the parser could not place)
//! ```
//!
//! ## Key Concepts
//!
//! Every node carries the monotonic `id` issued by the compilation's
//! [`SourceContext`](crate::context::SourceContext); the semantic analyzer
//! keys its data map by these ids, so passes can rebuild derived data
//! without touching the tree. Parents own children exclusively; tokens the
//! parser cannot attach to a node appear as [`Expr::Token`] siblings, so no
//! token from the source is ever dropped.
//!
//! Dispatch goes through [`Expr::accept`], a pattern match over the sum
//! type that calls exactly one [`Visitor`] method per node kind (plus
//! `visit_token` for token leaves).
//!
//! ## Related Modules
//! - `parser` - Creates these types from scanned tokens
//! - `beam` - Contracts sibling runs into [`Beam`] nodes
//! - `analyzer` - Walks the tree and materializes semantic data

use crate::token::Token;

/// The node sum type. Heterogeneous child lists hold `Expr` values; token
/// leaves use [`Expr::Token`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    FileStructure(FileStructure),
    FileHeader(FileHeader),
    Tune(Tune),
    TuneHeader(TuneHeader),
    TuneBody(TuneBody),
    InfoLine(InfoLine),
    Directive(Directive),
    Comment(Comment),
    LyricLine(LyricLine),
    LyricSection(LyricSection),
    Pitch(Pitch),
    Note(Note),
    Rest(Rest),
    MultiMeasureRest(MultiMeasureRest),
    Rhythm(Rhythm),
    Chord(Chord),
    BarLine(BarLine),
    GraceGroup(GraceGroup),
    Tuplet(Tuplet),
    Decoration(Decoration),
    Annotation(Annotation),
    Symbol(Symbol),
    YSpacer(YSpacer),
    InlineField(InlineField),
    VoiceOverlay(VoiceOverlay),
    Beam(Beam),
    KeyValue(KeyValue),
    Binary(Binary),
    Grouping(Grouping),
    Rational(Rational),
    Measurement(Measurement),
    AbsolutePitch(AbsolutePitch),
    Error(ErrorExpr),
    Token(Token),
}

/// Root of a parse: optional file header followed by tunes and any free
/// tokens between them.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStructure {
    pub id: u32,
    pub header: Option<FileHeader>,
    pub contents: Vec<Expr>,
}

/// Everything before the first `X:` line: info lines, comments, directives
/// and the tokens between them.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub id: u32,
    pub contents: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tune {
    pub id: u32,
    pub header: TuneHeader,
    pub body: Option<TuneBody>,
}

/// Info lines from `X:` up to the line after `K:`. `voices` collects the
/// ids of every `V:` line in encounter order, duplicates preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct TuneHeader {
    pub id: u32,
    pub info_lines: Vec<Expr>,
    pub voices: Vec<String>,
}

/// The musical content of a tune: one system per source line.
#[derive(Debug, Clone, PartialEq)]
pub struct TuneBody {
    pub id: u32,
    pub systems: Vec<Vec<Expr>>,
}

/// An info line: header token (`K:`, `M:`, ...) plus its value. For the
/// structured fields the value list holds sub-expressions
/// ([`Rational`], [`Binary`], [`KeyValue`], ...); for free-text fields it
/// holds the raw value tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoLine {
    pub id: u32,
    pub key: Token,
    pub value: Vec<Expr>,
}

/// A `%%` stylesheet directive: marker token, key token, value tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub id: u32,
    pub marker: Token,
    pub key: Option<Token>,
    pub value: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: u32,
    pub token: Token,
}

/// A `w:` or `W:` line.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    pub id: u32,
    pub key: Token,
    pub text: Vec<Token>,
}

/// Consecutive lyric lines grouped under one system.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricSection {
    pub id: u32,
    pub lines: Vec<Expr>,
}

/// Accidental, note letter, octave markers. The letter is required.
#[derive(Debug, Clone, PartialEq)]
pub struct Pitch {
    pub id: u32,
    pub accidental: Option<Token>,
    pub note_letter: Token,
    pub octaves: Vec<Token>,
}

/// What a note sounds: a pitch or a rest.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteHead {
    Pitch(Pitch),
    Rest(Rest),
}

/// A sounded element: pitch-or-rest, optional rhythm, optional tie. The
/// tie may have been written before or after the note in source.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: u32,
    pub head: NoteHead,
    pub rhythm: Option<Rhythm>,
    pub tie: Option<Token>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rest {
    pub id: u32,
    pub token: Token,
}

/// `Z` or `X`, optionally followed by a measure count.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMeasureRest {
    pub id: u32,
    pub token: Token,
    pub length: Option<Token>,
}

/// Rhythm suffix: `3`, `/2`, `3/2`, `/`, `//`, plus broken markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Rhythm {
    pub id: u32,
    pub numerator: Option<Token>,
    pub separator: Option<Token>,
    pub denominator: Option<Token>,
    pub broken: Option<Token>,
}

/// `[CEG]` with optional rhythm and tie. Contents are notes and
/// annotations; comments inside are kept as token children.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    pub id: u32,
    pub left_bracket: Token,
    pub contents: Vec<Expr>,
    pub right_bracket: Option<Token>,
    pub rhythm: Option<Rhythm>,
    pub tie: Option<Token>,
}

/// One or more bar tokens plus optional repeat-number tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct BarLine {
    pub id: u32,
    pub bars: Vec<Token>,
    pub repeat_numbers: Vec<Token>,
}

/// `{...}` grace notes; a leading slash marks an acciaccatura.
#[derive(Debug, Clone, PartialEq)]
pub struct GraceGroup {
    pub id: u32,
    pub left_brace: Token,
    pub acciaccatura: Option<Token>,
    pub notes: Vec<Expr>,
    pub right_brace: Option<Token>,
}

/// `(p`, `(p:q` or `(p:q:r`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuplet {
    pub id: u32,
    pub token: Token,
    pub p: u8,
    pub q: Option<u8>,
    pub r: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    pub id: u32,
    pub token: Token,
}

/// A quoted string in a tune body: chord symbol or free annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: u32,
    pub token: Token,
}

/// `!...!` decoration symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: u32,
    pub token: Token,
}

/// `y` spacer with optional rhythm.
#[derive(Debug, Clone, PartialEq)]
pub struct YSpacer {
    pub id: u32,
    pub token: Token,
    pub rhythm: Option<Rhythm>,
}

/// `[K:G]` style field change inside a tune body.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineField {
    pub id: u32,
    pub left_bracket: Token,
    pub field: Box<InfoLine>,
    pub right_bracket: Option<Token>,
}

/// `&` voice overlay marker.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOverlay {
    pub id: u32,
    pub token: Token,
}

/// A contracted run of beamable siblings. The grouper only ever wraps
/// existing elements; it never splits a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub id: u32,
    pub contents: Vec<Expr>,
}

/// `key=value` with its operator token (clef=treble, middle=B, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub id: u32,
    pub key: Token,
    pub op: Token,
    pub value: Box<Expr>,
}

/// Infix pair, e.g. the `/` of a meter or the `=` of `1/4=120`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub id: u32,
    pub lhs: Box<Expr>,
    pub op: Token,
    pub rhs: Box<Expr>,
}

/// Parenthesized sub-expression in an info value, e.g. `(2+3)/8`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub id: u32,
    pub left_paren: Token,
    pub inner: Box<Expr>,
    pub right_paren: Option<Token>,
}

/// `numerator / denominator` written as one fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Rational {
    pub id: u32,
    pub numerator: Token,
    pub separator: Token,
    pub denominator: Token,
}

/// A number with an optional unit token (`1.5cm`, `40pt`).
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub id: u32,
    pub number: Token,
    pub unit: Option<Token>,
}

/// A pitch named outside a tune body, e.g. the `B` of `middle=B`.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsolutePitch {
    pub id: u32,
    pub note: Token,
    pub accidental: Option<Token>,
    pub octaves: Vec<Token>,
}

/// Tokens the parser consumed but could not place, with the category it
/// was expecting when they arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorExpr {
    pub id: u32,
    pub tokens: Vec<Token>,
    pub expected: Option<String>,
    pub message: Option<String>,
}

/// One method per node kind plus `visit_token` for token leaves.
pub trait Visitor<T> {
    fn visit_file_structure(&mut self, expr: &FileStructure) -> T;
    fn visit_file_header(&mut self, expr: &FileHeader) -> T;
    fn visit_tune(&mut self, expr: &Tune) -> T;
    fn visit_tune_header(&mut self, expr: &TuneHeader) -> T;
    fn visit_tune_body(&mut self, expr: &TuneBody) -> T;
    fn visit_info_line(&mut self, expr: &InfoLine) -> T;
    fn visit_directive(&mut self, expr: &Directive) -> T;
    fn visit_comment(&mut self, expr: &Comment) -> T;
    fn visit_lyric_line(&mut self, expr: &LyricLine) -> T;
    fn visit_lyric_section(&mut self, expr: &LyricSection) -> T;
    fn visit_pitch(&mut self, expr: &Pitch) -> T;
    fn visit_note(&mut self, expr: &Note) -> T;
    fn visit_rest(&mut self, expr: &Rest) -> T;
    fn visit_multi_measure_rest(&mut self, expr: &MultiMeasureRest) -> T;
    fn visit_rhythm(&mut self, expr: &Rhythm) -> T;
    fn visit_chord(&mut self, expr: &Chord) -> T;
    fn visit_bar_line(&mut self, expr: &BarLine) -> T;
    fn visit_grace_group(&mut self, expr: &GraceGroup) -> T;
    fn visit_tuplet(&mut self, expr: &Tuplet) -> T;
    fn visit_decoration(&mut self, expr: &Decoration) -> T;
    fn visit_annotation(&mut self, expr: &Annotation) -> T;
    fn visit_symbol(&mut self, expr: &Symbol) -> T;
    fn visit_y_spacer(&mut self, expr: &YSpacer) -> T;
    fn visit_inline_field(&mut self, expr: &InlineField) -> T;
    fn visit_voice_overlay(&mut self, expr: &VoiceOverlay) -> T;
    fn visit_beam(&mut self, expr: &Beam) -> T;
    fn visit_key_value(&mut self, expr: &KeyValue) -> T;
    fn visit_binary(&mut self, expr: &Binary) -> T;
    fn visit_grouping(&mut self, expr: &Grouping) -> T;
    fn visit_rational(&mut self, expr: &Rational) -> T;
    fn visit_measurement(&mut self, expr: &Measurement) -> T;
    fn visit_absolute_pitch(&mut self, expr: &AbsolutePitch) -> T;
    fn visit_error(&mut self, expr: &ErrorExpr) -> T;
    fn visit_token(&mut self, token: &Token) -> T;
}

impl Expr {
    /// Double dispatch as a pattern match over the sum type.
    pub fn accept<T, V: Visitor<T>>(&self, visitor: &mut V) -> T {
        match self {
            Expr::FileStructure(e) => visitor.visit_file_structure(e),
            Expr::FileHeader(e) => visitor.visit_file_header(e),
            Expr::Tune(e) => visitor.visit_tune(e),
            Expr::TuneHeader(e) => visitor.visit_tune_header(e),
            Expr::TuneBody(e) => visitor.visit_tune_body(e),
            Expr::InfoLine(e) => visitor.visit_info_line(e),
            Expr::Directive(e) => visitor.visit_directive(e),
            Expr::Comment(e) => visitor.visit_comment(e),
            Expr::LyricLine(e) => visitor.visit_lyric_line(e),
            Expr::LyricSection(e) => visitor.visit_lyric_section(e),
            Expr::Pitch(e) => visitor.visit_pitch(e),
            Expr::Note(e) => visitor.visit_note(e),
            Expr::Rest(e) => visitor.visit_rest(e),
            Expr::MultiMeasureRest(e) => visitor.visit_multi_measure_rest(e),
            Expr::Rhythm(e) => visitor.visit_rhythm(e),
            Expr::Chord(e) => visitor.visit_chord(e),
            Expr::BarLine(e) => visitor.visit_bar_line(e),
            Expr::GraceGroup(e) => visitor.visit_grace_group(e),
            Expr::Tuplet(e) => visitor.visit_tuplet(e),
            Expr::Decoration(e) => visitor.visit_decoration(e),
            Expr::Annotation(e) => visitor.visit_annotation(e),
            Expr::Symbol(e) => visitor.visit_symbol(e),
            Expr::YSpacer(e) => visitor.visit_y_spacer(e),
            Expr::InlineField(e) => visitor.visit_inline_field(e),
            Expr::VoiceOverlay(e) => visitor.visit_voice_overlay(e),
            Expr::Beam(e) => visitor.visit_beam(e),
            Expr::KeyValue(e) => visitor.visit_key_value(e),
            Expr::Binary(e) => visitor.visit_binary(e),
            Expr::Grouping(e) => visitor.visit_grouping(e),
            Expr::Rational(e) => visitor.visit_rational(e),
            Expr::Measurement(e) => visitor.visit_measurement(e),
            Expr::AbsolutePitch(e) => visitor.visit_absolute_pitch(e),
            Expr::Error(e) => visitor.visit_error(e),
            Expr::Token(t) => visitor.visit_token(t),
        }
    }

    /// The node's id; token leaves answer with the token's id.
    pub fn id(&self) -> u32 {
        match self {
            Expr::FileStructure(e) => e.id,
            Expr::FileHeader(e) => e.id,
            Expr::Tune(e) => e.id,
            Expr::TuneHeader(e) => e.id,
            Expr::TuneBody(e) => e.id,
            Expr::InfoLine(e) => e.id,
            Expr::Directive(e) => e.id,
            Expr::Comment(e) => e.id,
            Expr::LyricLine(e) => e.id,
            Expr::LyricSection(e) => e.id,
            Expr::Pitch(e) => e.id,
            Expr::Note(e) => e.id,
            Expr::Rest(e) => e.id,
            Expr::MultiMeasureRest(e) => e.id,
            Expr::Rhythm(e) => e.id,
            Expr::Chord(e) => e.id,
            Expr::BarLine(e) => e.id,
            Expr::GraceGroup(e) => e.id,
            Expr::Tuplet(e) => e.id,
            Expr::Decoration(e) => e.id,
            Expr::Annotation(e) => e.id,
            Expr::Symbol(e) => e.id,
            Expr::YSpacer(e) => e.id,
            Expr::InlineField(e) => e.id,
            Expr::VoiceOverlay(e) => e.id,
            Expr::Beam(e) => e.id,
            Expr::KeyValue(e) => e.id,
            Expr::Binary(e) => e.id,
            Expr::Grouping(e) => e.id,
            Expr::Rational(e) => e.id,
            Expr::Measurement(e) => e.id,
            Expr::AbsolutePitch(e) => e.id,
            Expr::Error(e) => e.id,
            Expr::Token(t) => t.id,
        }
    }
}
