//! # ABC Scanner
//!
//! Character-level tokenizer for ABC source. The scanner is built from
//! primitives that each inspect the unscanned tail, either consume it and
//! push one or more tokens (returning `true`) or leave the cursor untouched
//! (returning `false`). A driver loop retries the primitives in precedence
//! order until end of input; when nothing matches, an invalid-character
//! collector emits an `Invalid` token and the scan continues. The scanner
//! never aborts and always ends the stream with a single `Eof` token.
//!
//! Line structure drives a small state machine: info headers (`X:`, `K:`,
//! `M:`, ...) switch into per-field sub-scanners (see [`info`]), `X:` opens
//! a tune, `K:` inside a tune opens the tune body, and a blank line closes
//! both. CR, LF and CRLF each produce one `Eol` token; a run of newlines
//! collapses into one `SectionBreak`.
//!
//! Round-trip invariant: concatenating every emitted lexeme (excluding
//! `Eof`) reproduces the source exactly. Whitespace and comments are
//! tokens, never discarded.

mod info;

use crate::context::SourceContext;
use crate::error::{ErrorKind, Position};
use crate::token::{Token, TokenKind};

/// Mutable scan state shared by the ABC and ABCT scanners: source text,
/// token sink, current token start, cursor, and line bookkeeping.
#[derive(Debug)]
pub(crate) struct Cursor<'s> {
    pub(crate) source: &'s str,
    pub(crate) tokens: Vec<Token>,
    pub(crate) start: usize,
    pub(crate) current: usize,
    pub(crate) line: usize,
    pub(crate) line_start: usize,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(source: &'s str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 0,
            line_start: 0,
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    pub(crate) fn rest(&self) -> &'s str {
        &self.source[self.current..]
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn peek_second(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    pub(crate) fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        Some(c)
    }

    pub(crate) fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn match_str(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            self.current += expected.len();
            true
        } else {
            false
        }
    }

    pub(crate) fn at_line_start(&self) -> bool {
        self.current == self.line_start
    }

    /// Position of the token currently being scanned.
    pub(crate) fn pos(&self) -> Position {
        Position::new(self.line, self.start - self.line_start, self.start)
    }

    /// Lexeme accumulated since `start`.
    pub(crate) fn pending(&self) -> &'s str {
        &self.source[self.start..self.current]
    }

    /// Push `start..current` as one token and reset `start`.
    pub(crate) fn push(&mut self, kind: TokenKind, ctx: &mut SourceContext) {
        let token = Token {
            kind,
            lexeme: self.pending().to_string(),
            line: self.line,
            column: self.start - self.line_start,
            offset: self.start,
            id: ctx.next_id(),
        };
        self.tokens.push(token);
        self.start = self.current;
    }

    pub(crate) fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    /// Consume exactly one line terminator (CRLF counts as one).
    pub(crate) fn consume_newline(&mut self) -> bool {
        self.match_str("\r\n") || self.match_char('\n') || self.match_char('\r')
    }
}

/// Scan an ABC source string. Total: lexical problems are recorded on the
/// context and the scan continues.
pub fn scan(source: &str, ctx: &mut SourceContext) -> Vec<Token> {
    AbcScanner::new(source, ctx).run()
}

/// Letters recognized as info-line headers when followed by a colon.
const INFO_KEYS: &str = "ABCDFGHIKLMNOPQRSTUVWXZmrsw";

/// Shorthand decoration characters in a tune body.
const DECORATION_SHORTHAND: &str = ".~HLMOPSTuv";

pub(crate) struct AbcScanner<'s, 'c> {
    pub(crate) cur: Cursor<'s>,
    pub(crate) ctx: &'c mut SourceContext,
    in_tune: bool,
    in_body: bool,
}

impl<'s, 'c> AbcScanner<'s, 'c> {
    fn new(source: &'s str, ctx: &'c mut SourceContext) -> Self {
        Self {
            cur: Cursor::new(source),
            ctx,
            in_tune: false,
            in_body: false,
        }
    }

    fn run(mut self) -> Vec<Token> {
        while !self.cur.is_at_end() {
            self.cur.start = self.cur.current;

            if self.newline() {
                continue;
            }
            if self.cur.at_line_start() {
                if self.directive() || self.comment() || self.info_line() {
                    continue;
                }
                if !self.in_body {
                    self.free_text();
                    continue;
                }
            }
            if self.in_body && self.music_token() {
                continue;
            }
            self.invalid();
        }

        self.cur.start = self.cur.current;
        self.cur.push(TokenKind::Eof, self.ctx);
        self.cur.tokens
    }

    /// One `Eol` per line terminator; a run of terminators becomes a
    /// `SectionBreak` that also closes any open tune.
    fn newline(&mut self) -> bool {
        if !matches!(self.cur.peek(), Some('\r' | '\n')) {
            return false;
        }
        self.cur.consume_newline();
        let mut lines = 1;
        if matches!(self.cur.peek(), Some('\r' | '\n')) {
            while self.cur.consume_newline() {
                lines += 1;
            }
            self.cur.push(TokenKind::SectionBreak, self.ctx);
            self.in_tune = false;
            self.in_body = false;
        } else {
            self.cur.push(TokenKind::Eol, self.ctx);
        }
        self.cur.line += lines;
        self.cur.line_start = self.cur.current;
        true
    }

    fn whitespace(&mut self) -> bool {
        if !matches!(self.cur.peek(), Some(' ' | '\t')) {
            return false;
        }
        while matches!(self.cur.peek(), Some(' ' | '\t')) {
            self.cur.advance();
        }
        self.cur.push(TokenKind::Ws, self.ctx);
        true
    }

    /// `%` comment to end of line. `%%` belongs to the directive primitive.
    fn comment(&mut self) -> bool {
        if self.cur.peek() != Some('%') || self.cur.rest().starts_with("%%") {
            return false;
        }
        while !matches!(self.cur.peek(), None | Some('\r' | '\n')) {
            self.cur.advance();
        }
        self.cur.push(TokenKind::Comment, self.ctx);
        true
    }

    /// `%%` stylesheet directive: marker token, then generic value tokens
    /// (words, numbers, quoted strings) to end of line.
    fn directive(&mut self) -> bool {
        if !self.cur.match_str("%%") {
            return false;
        }
        self.cur.push(TokenKind::StylesheetDirective, self.ctx);
        while !matches!(self.cur.peek(), None | Some('\r' | '\n')) {
            self.cur.start = self.cur.current;
            if self.whitespace() {
                continue;
            }
            match self.cur.peek() {
                Some('"') => self.quoted(TokenKind::InfoString, "Unterminated string in directive"),
                Some(c) if c.is_ascii_digit() || (c == '-' && self.next_is_digit()) => {
                    self.info_number();
                }
                Some(c) if c.is_alphanumeric() || c == '_' => {
                    while matches!(self.cur.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) {
                        self.cur.advance();
                    }
                    self.cur.push(TokenKind::InfoIdent, self.ctx);
                }
                Some(_) => {
                    self.cur.advance();
                    self.cur.push(TokenKind::InfoIdent, self.ctx);
                }
                None => break,
            }
        }
        true
    }

    fn next_is_digit(&self) -> bool {
        matches!(self.cur.peek_second(), Some(c) if c.is_ascii_digit())
    }

    /// A number in an info or directive context: optional sign, digits,
    /// optional decimal part. Pushes nothing when no number is present.
    pub(crate) fn info_number(&mut self) {
        self.cur.match_char('-');
        while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
            self.cur.advance();
        }
        if self.cur.peek() == Some('.') && self.next_is_digit() {
            self.cur.advance();
            while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
                self.cur.advance();
            }
        }
        if self.cur.current > self.cur.start {
            self.cur.push(TokenKind::InfoNumber, self.ctx);
        }
    }

    /// Quoted run to the closing quote or end of line. A backslash takes
    /// the next character with it. Emitted even when unterminated so the
    /// parser can keep going.
    pub(crate) fn quoted(&mut self, kind: TokenKind, unterminated_msg: &str) {
        let pos = self.cur.pos();
        self.cur.advance(); // opening quote
        loop {
            match self.cur.peek() {
                None | Some('\r' | '\n') => {
                    self.ctx.report(ErrorKind::Scanner, unterminated_msg, pos);
                    break;
                }
                Some('"') => {
                    self.cur.advance();
                    break;
                }
                Some('\\') => {
                    self.cur.advance();
                    self.cur.advance();
                }
                Some(_) => {
                    self.cur.advance();
                }
            }
        }
        self.cur.push(kind, self.ctx);
    }

    /// `<letter>:` at line start, then the per-field sub-scanner.
    fn info_line(&mut self) -> bool {
        let key = match (self.cur.peek(), self.cur.peek_second()) {
            (Some(c), Some(':')) if INFO_KEYS.contains(c) => c,
            _ => return false,
        };
        self.cur.advance();
        self.cur.advance();
        self.cur.push(TokenKind::InfoHeader, self.ctx);
        self.scan_info_value(key, info::Terminator::Eol);
        if key == 'X' {
            self.in_tune = true;
            self.in_body = false;
        }
        if key == 'K' && self.in_tune {
            self.in_body = true;
        }
        true
    }

    /// A line outside any tune body that is not an info line, comment or
    /// directive.
    fn free_text(&mut self) {
        while !matches!(self.cur.peek(), None | Some('\r' | '\n')) {
            self.cur.advance();
        }
        self.cur.push(TokenKind::FreeText, self.ctx);
    }

    /// One tune-body element. Primitives are tried in precedence order;
    /// multi-character operators before their single-character prefixes.
    fn music_token(&mut self) -> bool {
        self.whitespace()
            || self.comment()
            || self.inline_field()
            || self.barline()
            || self.repeat_number()
            || self.tuplet()
            || self.grace_brace()
            || self.chord_bracket()
            || self.slur()
            || self.annotation()
            || self.symbol()
            || self.pitch()
            || self.rest()
            || self.multi_measure_rest()
            || self.decoration()
            || self.rhythm()
            || self.tie()
            || self.y_spacer()
            || self.voice_overlay()
    }

    /// `[<letter>:...]` inside a tune body.
    fn inline_field(&mut self) -> bool {
        let rest = self.cur.rest();
        let mut chars = rest.chars();
        let (open, key, colon) = (chars.next(), chars.next(), chars.next());
        let key = match (open, key, colon) {
            (Some('['), Some(k), Some(':')) if INFO_KEYS.contains(k) => k,
            _ => return false,
        };
        self.cur.advance();
        self.cur.push(TokenKind::InlineFieldLeft, self.ctx);
        self.cur.advance();
        self.cur.advance();
        self.cur.push(TokenKind::InfoHeader, self.ctx);
        self.scan_info_value(key, info::Terminator::Bracket);
        if self.cur.peek() == Some(']') {
            self.cur.advance();
            self.cur.push(TokenKind::InlineFieldRight, self.ctx);
        } else {
            let pos = self.cur.pos();
            self.ctx
                .report(ErrorKind::Scanner, "Unterminated inline field, expected ']'", pos);
        }
        true
    }

    /// Bar tokens, two-character forms first.
    fn barline(&mut self) -> bool {
        const BARS: [(&str, TokenKind); 6] = [
            ("[|", TokenKind::BarThickThin),
            ("|]", TokenKind::BarThinThick),
            ("||", TokenKind::BarDouble),
            ("|:", TokenKind::BarRepeatStart),
            (":|", TokenKind::BarRepeatEnd),
            ("::", TokenKind::BarColonPair),
        ];
        for (text, kind) in BARS {
            if self.cur.match_str(text) {
                self.cur.push(kind, self.ctx);
                return true;
            }
        }
        if self.cur.peek() == Some('|') {
            self.cur.advance();
            self.cur.push(TokenKind::Barline, self.ctx);
            return true;
        }
        // `[1` opens a numbered ending
        if self.cur.peek() == Some('[') && self.next_is_digit() {
            self.cur.advance();
            self.cur.push(TokenKind::Barline, self.ctx);
            return true;
        }
        false
    }

    /// Repeat numbers directly after a bar: `|1`, `|1,2`, `|1-3`, `|1x2`.
    fn repeat_number(&mut self) -> bool {
        let prev = match self.cur.last_kind() {
            Some(k) => k,
            None => return false,
        };
        let after_digit = matches!(prev, TokenKind::BarDigit);
        let after_sep = matches!(
            prev,
            TokenKind::RepeatComma | TokenKind::RepeatDash | TokenKind::RepeatX
        );
        match self.cur.peek() {
            Some(c) if c.is_ascii_digit() && (prev.is_barline() || after_sep) => {
                while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
                    self.cur.advance();
                }
                self.cur.push(TokenKind::BarDigit, self.ctx);
                true
            }
            Some(',') if after_digit && self.next_is_digit() => {
                self.cur.advance();
                self.cur.push(TokenKind::RepeatComma, self.ctx);
                true
            }
            Some('-') if after_digit && self.next_is_digit() => {
                self.cur.advance();
                self.cur.push(TokenKind::RepeatDash, self.ctx);
                true
            }
            Some('x') if after_digit && self.next_is_digit() => {
                self.cur.advance();
                self.cur.push(TokenKind::RepeatX, self.ctx);
                true
            }
            _ => false,
        }
    }

    /// `(p`, `(p:q`, `(p:q:r`.
    fn tuplet(&mut self) -> bool {
        if self.cur.peek() != Some('(') || !self.next_is_digit() {
            return false;
        }
        self.cur.advance();
        while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
            self.cur.advance();
        }
        for _ in 0..2 {
            if self.cur.peek() == Some(':') {
                self.cur.advance();
                while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
                    self.cur.advance();
                }
            }
        }
        self.cur.push(TokenKind::Tuplet, self.ctx);
        true
    }

    fn grace_brace(&mut self) -> bool {
        match self.cur.peek() {
            Some('{') => {
                self.cur.advance();
                self.cur.push(TokenKind::GraceLeft, self.ctx);
                true
            }
            Some('}') => {
                self.cur.advance();
                self.cur.push(TokenKind::GraceRight, self.ctx);
                true
            }
            _ => false,
        }
    }

    fn chord_bracket(&mut self) -> bool {
        match self.cur.peek() {
            Some('[') => {
                self.cur.advance();
                self.cur.push(TokenKind::ChordLeft, self.ctx);
                true
            }
            Some(']') => {
                self.cur.advance();
                self.cur.push(TokenKind::ChordRight, self.ctx);
                true
            }
            _ => false,
        }
    }

    fn slur(&mut self) -> bool {
        match self.cur.peek() {
            Some('(') => {
                self.cur.advance();
                self.cur.push(TokenKind::SlurLeft, self.ctx);
                true
            }
            Some(')') => {
                self.cur.advance();
                self.cur.push(TokenKind::SlurRight, self.ctx);
                true
            }
            _ => false,
        }
    }

    fn annotation(&mut self) -> bool {
        if self.cur.peek() != Some('"') {
            return false;
        }
        self.quoted(TokenKind::Annotation, "Unterminated annotation");
        true
    }

    /// `!trill!` decoration symbol.
    fn symbol(&mut self) -> bool {
        if self.cur.peek() != Some('!') {
            return false;
        }
        let pos = self.cur.pos();
        self.cur.advance();
        loop {
            match self.cur.peek() {
                None | Some('\r' | '\n') => {
                    self.ctx
                        .report(ErrorKind::Scanner, "Unterminated symbol, expected '!'", pos);
                    break;
                }
                Some('!') => {
                    self.cur.advance();
                    break;
                }
                Some(_) => {
                    self.cur.advance();
                }
            }
        }
        self.cur.push(TokenKind::Symbol, self.ctx);
        true
    }

    /// Optional accidental, required note letter, optional octave markers.
    /// The accidental is only committed when a letter follows.
    fn pitch(&mut self) -> bool {
        let rest = self.cur.rest();
        let (acc_kind, acc_len) = if rest.starts_with("^^") {
            (Some(TokenKind::SharpDouble), 2)
        } else if rest.starts_with('^') {
            (Some(TokenKind::Sharp), 1)
        } else if rest.starts_with("__") {
            (Some(TokenKind::FlatDouble), 2)
        } else if rest.starts_with('_') {
            (Some(TokenKind::Flat), 1)
        } else if rest.starts_with('=') {
            (Some(TokenKind::Natural), 1)
        } else {
            (None, 0)
        };
        let letter = rest[acc_len..].chars().next();
        if !matches!(letter, Some('A'..='G' | 'a'..='g')) {
            return false;
        }
        if let Some(kind) = acc_kind {
            for _ in 0..acc_len {
                self.cur.advance();
            }
            self.cur.push(kind, self.ctx);
        }
        self.cur.advance();
        self.cur.push(TokenKind::NoteLetter, self.ctx);
        loop {
            match self.cur.peek() {
                Some('\'') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::OctaveUp, self.ctx);
                }
                Some(',') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::OctaveDown, self.ctx);
                }
                _ => break,
            }
        }
        true
    }

    fn rest(&mut self) -> bool {
        if matches!(self.cur.peek(), Some('z' | 'x')) {
            self.cur.advance();
            self.cur.push(TokenKind::Rest, self.ctx);
            true
        } else {
            false
        }
    }

    fn multi_measure_rest(&mut self) -> bool {
        if matches!(self.cur.peek(), Some('Z' | 'X')) {
            self.cur.advance();
            self.cur.push(TokenKind::MultiMeasureRest, self.ctx);
            true
        } else {
            false
        }
    }

    fn decoration(&mut self) -> bool {
        match self.cur.peek() {
            Some(c) if DECORATION_SHORTHAND.contains(c) => {
                self.cur.advance();
                self.cur.push(TokenKind::Decoration, self.ctx);
                true
            }
            _ => false,
        }
    }

    /// Rhythm digits, separator and broken markers. Digits after a `/`
    /// are denominators; elsewhere they are numerators (which also covers
    /// multi-measure rest lengths).
    fn rhythm(&mut self) -> bool {
        match self.cur.peek() {
            Some(c) if c.is_ascii_digit() => {
                while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
                    self.cur.advance();
                }
                let kind = if self.cur.last_kind() == Some(TokenKind::RhySep) {
                    TokenKind::RhyDenom
                } else {
                    TokenKind::RhyNumer
                };
                self.cur.push(kind, self.ctx);
                true
            }
            Some('/') => {
                self.cur.advance();
                if self.cur.last_kind() == Some(TokenKind::GraceLeft) {
                    self.cur.push(TokenKind::GraceSlash, self.ctx);
                } else {
                    // `//` shorthand halves again; one separator token
                    while self.cur.peek() == Some('/') {
                        self.cur.advance();
                    }
                    self.cur.push(TokenKind::RhySep, self.ctx);
                }
                true
            }
            Some('>') => {
                self.cur.advance();
                self.cur.match_char('>');
                self.cur.push(TokenKind::RhyBroken, self.ctx);
                true
            }
            Some('<') => {
                self.cur.advance();
                self.cur.match_char('<');
                self.cur.push(TokenKind::RhyBroken, self.ctx);
                true
            }
            _ => false,
        }
    }

    fn tie(&mut self) -> bool {
        if self.cur.peek() == Some('-') {
            self.cur.advance();
            self.cur.push(TokenKind::Tie, self.ctx);
            true
        } else {
            false
        }
    }

    fn y_spacer(&mut self) -> bool {
        if self.cur.peek() == Some('y') {
            self.cur.advance();
            self.cur.push(TokenKind::YSpacer, self.ctx);
            true
        } else {
            false
        }
    }

    fn voice_overlay(&mut self) -> bool {
        if self.cur.peek() == Some('&') {
            self.cur.advance();
            self.cur.push(TokenKind::VoiceOverlay, self.ctx);
            true
        } else {
            false
        }
    }

    /// Collect unrecognizable input up to the next delimiter.
    fn invalid(&mut self) {
        let pos = self.cur.pos();
        while let Some(c) = self.cur.peek() {
            if c.is_whitespace() || matches!(c, '|' | '[' | ']' | '%') {
                break;
            }
            self.cur.advance();
        }
        if self.cur.current == self.cur.start {
            self.cur.advance();
        }
        let message = format!("Unexpected characters '{}'", self.cur.pending());
        self.cur.push(TokenKind::Invalid, self.ctx);
        self.ctx.report(ErrorKind::Scanner, message, pos);
    }
}
