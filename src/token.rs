//! Token types shared by the ABC and ABCT scanners.
//!
//! A [`Token`] is an immutable value object carrying its exact source
//! substring. Concatenating the lexemes of every token except [`TokenKind::Eof`]
//! reproduces the scanned source byte for byte; whitespace, newlines and
//! comments are preserved tokens, never discarded.

use serde::Serialize;

/// Token kinds for both languages.
///
/// One enum spans the ABC tune-body tokens, the per-field info-line
/// sub-tokens, and the ABCT tokens, so the two scanners can share the
/// cursor, the token type and the error machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // Trivia and structure (shared)
    Ws,
    Eol,            // \n, \r or \r\n (one token)
    SectionBreak,   // run of two or more newlines
    Eof,
    Invalid,        // unrecognized input, collected for recovery

    // Comments and directives
    Comment,             // %... (ABC) or #... (ABCT), to end of line
    StylesheetDirective, // %%

    // File-level
    FreeText, // a line outside any tune that is not an info line

    // Info lines
    InfoHeader,      // "X:", "T:", "K:", ... (letter + colon)
    InfoText,        // free-text field value
    InvalidInfo,     // invalid info content, collected for recovery
    InlineFieldLeft, // '[' opening an inline field in a tune body
    InlineFieldRight,

    // Tune body: pitch
    NoteLetter, // A-G a-g
    Sharp,      // ^
    SharpDouble, // ^^
    Flat,       // _
    FlatDouble, // __
    Natural,    // =
    OctaveUp,   // '
    OctaveDown, // ,

    // Tune body: rests
    Rest,             // z or x
    MultiMeasureRest, // Z or X

    // Tune body: rhythm
    RhyNumer,  // digits following a note, rest or chord
    RhyDenom,  // digits following a rhythm separator
    RhySep,    // /
    RhyBroken, // > < >> <<

    // Tune body: bar lines (maximal munch: two-char forms win)
    Barline,        // |
    BarDouble,      // ||
    BarThinThick,   // |]
    BarThickThin,   // [|
    BarRepeatStart, // |:
    BarRepeatEnd,   // :|
    BarColonPair,   // ::

    // Repeat numbers following a bar line: |1  |1,2  |1-3  |1x2
    BarDigit,
    RepeatComma,
    RepeatDash,
    RepeatX,

    // Tune body: grouping
    Tie,        // -
    SlurLeft,   // (
    SlurRight,  // )
    Tuplet,     // (p, (p:q, (p:q:r
    ChordLeft,  // [
    ChordRight, // ]
    GraceLeft,  // {
    GraceRight, // }
    GraceSlash, // / directly after { (acciaccatura)

    // Tune body: ornaments and text
    Decoration, // shorthand: . ~ H L M O P S T u v
    Symbol,     // !trill!
    Annotation, // "..."
    YSpacer,    // y
    VoiceOverlay, // &

    // K: sub-scanner
    KeyRoot,        // A-G
    KeyAccidental,  // # or b after the root
    KeyMode,        // maj, min, m, mix, dor, phr, lyd, loc, ...
    KeyExplicitAcc, // ^f _b =c
    KeyNone,        // the word "none"
    KeyHp,          // HP or Hp (bagpipe keys)

    // Clef tokens (K: and V:)
    ClefName,   // treble, bass, alto, tenor, perc, none
    ClefNum,    // staff line 1-5
    ClefOctave, // +8 or -8

    // M: sub-scanner
    MeterC,         // C
    MeterCBar,      // C|
    MeterNumber,
    MeterSeparator, // /
    MeterLparen,
    MeterRparen,
    MeterPlus,

    // Generic info-field tokens (L:, Q:, V:, X:, modifiers)
    InfoNumber,
    InfoSlash,
    InfoEquals,
    InfoString, // quoted value, e.g. Q:"Allegro" or V:1 name="Soprano"
    InfoIdent,  // bare word, e.g. clef, middle, transpose
    VoiceId,    // first word of a V: field

    // ABCT
    Identifier,
    Number, // integer, decimal or fraction; "1/2" is one token
    StringLiteral,

    // ABCT keywords (reclassified identifiers, exact match only)
    And,
    Or,
    Not,
    Fn,
    Match,
    Over,
    Let,
    If,
    Then,
    Else,
    Topdown,
    Bottomup,
    Oncetd,
    Alltd,
    Load,

    // ABCT fenced and inline ABC literals
    AbcFenceOpen,  // ```abc[:loc] plus its newline
    AbcContent,    // raw fence body
    AbcFenceClose, // ``` alone on a line
    AbcLiteral,    // `...` single-line

    // ABCT operators
    Pipe,         // |
    PipeEq,       // |=
    Plus,         // +
    Equal,        // =
    EqualEqual,   // ==
    NotEqual,     // !=
    Arrow,        // =>
    At,           // @
    Colon,        // :
    Minus,        // -
    Dot,          // .
    Comma,        // ,
    Lparen,       // (
    Rparen,       // )
    Lbracket,     // [
    Rbracket,     // ]
    Lbrace,       // {
    Rbrace,       // }
    Less,         // <
    Greater,      // >
    LessEqual,    // <=
    GreaterEqual, // >=
}

impl TokenKind {
    /// True for tokens the parser treats as trivia between elements.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Ws | TokenKind::Comment)
    }

    /// True for any of the bar-line token kinds.
    pub fn is_barline(self) -> bool {
        matches!(
            self,
            TokenKind::Barline
                | TokenKind::BarDouble
                | TokenKind::BarThinThick
                | TokenKind::BarThickThin
                | TokenKind::BarRepeatStart
                | TokenKind::BarRepeatEnd
                | TokenKind::BarColonPair
        )
    }
}

/// A token with its position in the source.
///
/// `line` and `column` are 0-based; `column` is the byte distance from the
/// start of the token's line. `offset` is the byte offset from the start of
/// the source. `id` is issued by the compilation's
/// [`SourceContext`](crate::context::SourceContext).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub id: u32,
}

impl Token {
    /// Reconstruct a source region from a token slice by concatenating
    /// lexemes. The scanner guarantees this round-trips (EOF excluded).
    pub fn join(tokens: &[Token]) -> String {
        tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.lexeme.as_str())
            .collect()
    }
}
