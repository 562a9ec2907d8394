//! # Parser
//!
//! Recursive descent over the scanned token vector, producing a
//! [`FileStructure`] AST. The parser is total: on any mismatch it collects
//! the offending tokens into an [`ErrorExpr`], reports a diagnostic, and
//! resynchronizes at the next end of line, end of chord, or blank line. It
//! never throws control flow on bad input, so partial trees stay usable.
//!
//! Tune bodies are split into systems (one source line each, with trailing
//! lyric lines attached) and each system is run through the beam-grouping
//! post-pass before it lands in the tree.

mod info;

use crate::beam;
use crate::context::SourceContext;
use crate::error::{ErrorKind, Position};
use crate::expr::*;
use crate::token::{Token, TokenKind};

/// Parse a token vector into a `FileStructure`. Total: syntax problems are
/// recorded on the context and an `ErrorExpr` marks each recovery.
pub fn parse(tokens: Vec<Token>, ctx: &mut SourceContext) -> FileStructure {
    Parser::new(tokens, ctx).parse_file()
}

pub(crate) struct Parser<'c> {
    tokens: Vec<Token>,
    current: usize,
    pub(crate) ctx: &'c mut SourceContext,
}

impl<'c> Parser<'c> {
    fn new(mut tokens: Vec<Token>, ctx: &'c mut SourceContext) -> Self {
        // the scanner always terminates the stream; guard anyway so peek()
        // stays total when callers hand in a hand-built vector
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (line, column, offset) = tokens
                .last()
                .map(|t| (t.line, t.column + t.lexeme.len(), t.offset + t.lexeme.len()))
                .unwrap_or((0, 0, 0));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line,
                column,
                offset,
                id: ctx.next_id(),
            });
        }
        Self {
            tokens,
            current: 0,
            ctx,
        }
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_second_kind(&self) -> TokenKind {
        self.tokens
            .get(self.current + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn match_kind(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn token_pos(token: &Token) -> Position {
        Position::new(token.line, token.column, token.offset)
    }

    pub(crate) fn report(&mut self, message: impl Into<String>) {
        let pos = Self::token_pos(self.peek());
        self.ctx.report(ErrorKind::Parser, message, pos);
    }

    /// True when the next token opens a tune (`X:` info header).
    fn at_tune_start(&self) -> bool {
        self.check(TokenKind::InfoHeader) && self.peek().lexeme.starts_with('X')
    }

    // ---------------------------------------------------------------- file

    fn parse_file(&mut self) -> FileStructure {
        let header = self.parse_file_header();
        let mut contents = Vec::new();
        while !self.is_at_end() {
            match self.peek_kind() {
                _ if self.at_tune_start() => {
                    let tune = self.parse_tune();
                    contents.push(Expr::Tune(tune));
                }
                TokenKind::Comment => contents.push(self.parse_comment()),
                TokenKind::StylesheetDirective => contents.push(self.parse_directive()),
                _ => contents.push(Expr::Token(self.advance())),
            }
        }
        let id = self.ctx.next_id();
        FileStructure {
            id,
            header,
            contents,
        }
    }

    /// Info lines, comments and directives before the first `X:`. Rewinds
    /// and returns `None` when nothing substantial precedes the first tune.
    fn parse_file_header(&mut self) -> Option<FileHeader> {
        let checkpoint = self.current;
        let mut contents = Vec::new();
        let mut substantial = false;
        while !self.is_at_end() && !self.at_tune_start() {
            match self.peek_kind() {
                TokenKind::InfoHeader => {
                    substantial = true;
                    let line = self.parse_info_line();
                    contents.push(line);
                }
                TokenKind::Comment => {
                    substantial = true;
                    contents.push(self.parse_comment());
                }
                TokenKind::StylesheetDirective => {
                    substantial = true;
                    contents.push(self.parse_directive());
                }
                TokenKind::Eol
                | TokenKind::SectionBreak
                | TokenKind::Ws
                | TokenKind::FreeText => {
                    contents.push(Expr::Token(self.advance()));
                }
                _ => break,
            }
        }
        if substantial {
            let id = self.ctx.next_id();
            Some(FileHeader { id, contents })
        } else {
            self.current = checkpoint;
            None
        }
    }

    fn parse_comment(&mut self) -> Expr {
        let token = self.advance();
        let id = self.ctx.next_id();
        Expr::Comment(Comment { id, token })
    }

    /// `%%` marker, key word, raw value tokens to end of line.
    fn parse_directive(&mut self) -> Expr {
        let marker = self.advance();
        let key = self.match_kind(TokenKind::InfoIdent);
        if key.is_none() {
            self.report("Missing directive key after '%%'");
        }
        let mut value = Vec::new();
        while !matches!(
            self.peek_kind(),
            TokenKind::Eol | TokenKind::SectionBreak | TokenKind::Eof
        ) {
            value.push(Expr::Token(self.advance()));
        }
        let id = self.ctx.next_id();
        Expr::Directive(Directive {
            id,
            marker,
            key,
            value,
        })
    }

    // ---------------------------------------------------------------- tune

    fn parse_tune(&mut self) -> Tune {
        let header = self.parse_tune_header();
        let body_follows = !matches!(
            self.peek_kind(),
            TokenKind::SectionBreak | TokenKind::Eof
        ) && !self.at_tune_start();
        let body = if body_follows {
            Some(self.parse_tune_body())
        } else {
            None
        };
        let id = self.ctx.next_id();
        Tune { id, header, body }
    }

    /// Info lines from `X:` through the `K:` line (inclusive, with its
    /// newline). Collects `V:` ids in encounter order, duplicates kept.
    fn parse_tune_header(&mut self) -> TuneHeader {
        let mut info_lines = Vec::new();
        let mut voices: Vec<String> = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::InfoHeader if !info_lines.is_empty() && self.at_tune_start() => break,
                TokenKind::InfoHeader => {
                    let is_key = self.peek().lexeme.starts_with('K');
                    let line = self.parse_info_line();
                    collect_voice_id(&line, &mut voices);
                    info_lines.push(line);
                    if is_key {
                        if let Some(eol) = self.match_kind(TokenKind::Eol) {
                            info_lines.push(Expr::Token(eol));
                        }
                        break;
                    }
                }
                TokenKind::Comment => info_lines.push(self.parse_comment()),
                TokenKind::StylesheetDirective => info_lines.push(self.parse_directive()),
                TokenKind::Eol | TokenKind::Ws => {
                    info_lines.push(Expr::Token(self.advance()));
                }
                TokenKind::SectionBreak | TokenKind::Eof => break,
                TokenKind::FreeText => {
                    info_lines.push(self.error_and_sync(
                        Some("info line"),
                        "Expected an info line in tune header",
                    ));
                }
                _ => break,
            }
        }
        let id = self.ctx.next_id();
        TuneHeader {
            id,
            info_lines,
            voices,
        }
    }

    fn parse_tune_body(&mut self) -> TuneBody {
        let mut systems = Vec::new();
        while !matches!(
            self.peek_kind(),
            TokenKind::SectionBreak | TokenKind::Eof
        ) && !self.at_tune_start()
        {
            let system = self.parse_system();
            let system = beam::group_system(system, self.ctx);
            systems.push(system);
        }
        let id = self.ctx.next_id();
        TuneBody { id, systems }
    }

    /// One source line of music (its terminating `Eol` included), plus any
    /// lyric lines that directly follow it.
    fn parse_system(&mut self) -> Vec<Expr> {
        let mut elements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eol => {
                    elements.push(Expr::Token(self.advance()));
                    break;
                }
                TokenKind::SectionBreak | TokenKind::Eof => break,
                TokenKind::InfoHeader if self.at_tune_start() => break,
                TokenKind::InfoHeader => {
                    if self.peek().lexeme.starts_with(['w', 'W']) {
                        break;
                    }
                    elements.push(self.parse_info_line());
                }
                TokenKind::Comment => elements.push(self.parse_comment()),
                TokenKind::StylesheetDirective => elements.push(self.parse_directive()),
                TokenKind::Ws => elements.push(Expr::Token(self.advance())),
                _ => {
                    let element = self.parse_music_element();
                    elements.push(element);
                }
            }
        }
        if self.check(TokenKind::InfoHeader) && self.peek().lexeme.starts_with(['w', 'W']) {
            elements.push(self.parse_lyric_section());
        }
        elements
    }

    /// Consecutive `w:`/`W:` lines grouped into one section.
    fn parse_lyric_section(&mut self) -> Expr {
        let mut lines = Vec::new();
        while self.check(TokenKind::InfoHeader) && self.peek().lexeme.starts_with(['w', 'W']) {
            let key = self.advance();
            let mut text = Vec::new();
            while matches!(self.peek_kind(), TokenKind::InfoText | TokenKind::Ws) {
                text.push(self.advance());
            }
            let id = self.ctx.next_id();
            lines.push(Expr::LyricLine(LyricLine { id, key, text }));
            if let Some(eol) = self.match_kind(TokenKind::Eol) {
                lines.push(Expr::Token(eol));
            }
        }
        let id = self.ctx.next_id();
        Expr::LyricSection(LyricSection { id, lines })
    }

    // --------------------------------------------------------------- music

    fn parse_music_element(&mut self) -> Expr {
        match self.peek_kind() {
            k if k.is_barline() => self.parse_bar_line(),
            TokenKind::Tie => {
                // a leading tie binds to the note it precedes; otherwise
                // the tie stands alone
                if self.starts_note(self.peek_second_kind()) {
                    self.parse_note()
                } else {
                    Expr::Token(self.advance())
                }
            }
            k if self.starts_note(k) => self.parse_note(),
            TokenKind::MultiMeasureRest => self.parse_multi_measure_rest(),
            TokenKind::ChordLeft => self.parse_chord(),
            TokenKind::GraceLeft => self.parse_grace_group(),
            TokenKind::Tuplet => self.parse_tuplet(),
            TokenKind::SlurLeft | TokenKind::SlurRight => Expr::Token(self.advance()),
            TokenKind::Decoration => {
                let token = self.advance();
                let id = self.ctx.next_id();
                Expr::Decoration(Decoration { id, token })
            }
            TokenKind::Annotation => {
                let token = self.advance();
                let id = self.ctx.next_id();
                Expr::Annotation(Annotation { id, token })
            }
            TokenKind::Symbol => {
                let token = self.advance();
                let id = self.ctx.next_id();
                Expr::Symbol(Symbol { id, token })
            }
            TokenKind::YSpacer => {
                let token = self.advance();
                let rhythm = self.parse_rhythm_opt();
                let id = self.ctx.next_id();
                Expr::YSpacer(YSpacer { id, token, rhythm })
            }
            TokenKind::InlineFieldLeft => self.parse_inline_field(),
            TokenKind::VoiceOverlay => {
                let token = self.advance();
                let id = self.ctx.next_id();
                Expr::VoiceOverlay(VoiceOverlay { id, token })
            }
            _ => self.error_and_sync(Some("music element"), {
                let t = self.peek();
                format!("Unexpected token '{}' in tune body", t.lexeme)
            }),
        }
    }

    fn starts_note(&self, kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::NoteLetter
                | TokenKind::Sharp
                | TokenKind::SharpDouble
                | TokenKind::Flat
                | TokenKind::FlatDouble
                | TokenKind::Natural
                | TokenKind::Rest
        )
    }

    fn parse_note(&mut self) -> Expr {
        let leading_tie = if self.check(TokenKind::Tie) {
            Some(self.advance())
        } else {
            None
        };
        let head = if self.check(TokenKind::Rest) {
            let token = self.advance();
            let id = self.ctx.next_id();
            NoteHead::Rest(Rest { id, token })
        } else {
            NoteHead::Pitch(self.parse_pitch())
        };
        let rhythm = self.parse_rhythm_opt();
        let tie = match leading_tie {
            Some(t) => Some(t),
            None => self.match_kind(TokenKind::Tie),
        };
        let id = self.ctx.next_id();
        Expr::Note(Note {
            id,
            head,
            rhythm,
            tie,
        })
    }

    fn parse_pitch(&mut self) -> Pitch {
        let accidental = match self.peek_kind() {
            TokenKind::Sharp
            | TokenKind::SharpDouble
            | TokenKind::Flat
            | TokenKind::FlatDouble
            | TokenKind::Natural => Some(self.advance()),
            _ => None,
        };
        // the scanner only emits an accidental when a letter follows
        let note_letter = self.advance();
        let mut octaves = Vec::new();
        while matches!(
            self.peek_kind(),
            TokenKind::OctaveUp | TokenKind::OctaveDown
        ) {
            octaves.push(self.advance());
        }
        let id = self.ctx.next_id();
        Pitch {
            id,
            accidental,
            note_letter,
            octaves,
        }
    }

    fn parse_rhythm_opt(&mut self) -> Option<Rhythm> {
        if !matches!(
            self.peek_kind(),
            TokenKind::RhyNumer | TokenKind::RhySep | TokenKind::RhyBroken
        ) {
            return None;
        }
        let numerator = self.match_kind(TokenKind::RhyNumer);
        let separator = self.match_kind(TokenKind::RhySep);
        let denominator = if separator.is_some() {
            self.match_kind(TokenKind::RhyDenom)
        } else {
            None
        };
        let broken = self.match_kind(TokenKind::RhyBroken);
        let id = self.ctx.next_id();
        Some(Rhythm {
            id,
            numerator,
            separator,
            denominator,
            broken,
        })
    }

    fn parse_multi_measure_rest(&mut self) -> Expr {
        let token = self.advance();
        let length = self.match_kind(TokenKind::RhyNumer);
        let id = self.ctx.next_id();
        Expr::MultiMeasureRest(MultiMeasureRest { id, token, length })
    }

    /// Bar tokens then repeat numbers: `:||: `, `|1,2-3`, ...
    fn parse_bar_line(&mut self) -> Expr {
        let mut bars = vec![self.advance()];
        while self.peek_kind().is_barline() {
            bars.push(self.advance());
        }
        let mut repeat_numbers = Vec::new();
        while matches!(
            self.peek_kind(),
            TokenKind::BarDigit
                | TokenKind::RepeatComma
                | TokenKind::RepeatDash
                | TokenKind::RepeatX
        ) {
            repeat_numbers.push(self.advance());
        }
        let id = self.ctx.next_id();
        Expr::BarLine(BarLine {
            id,
            bars,
            repeat_numbers,
        })
    }

    fn parse_chord(&mut self) -> Expr {
        let left_bracket = self.advance();
        let mut contents = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::ChordRight | TokenKind::Eol | TokenKind::SectionBreak | TokenKind::Eof => {
                    break
                }
                k if self.starts_note(k) => contents.push(self.parse_note()),
                TokenKind::Annotation => {
                    let token = self.advance();
                    let id = self.ctx.next_id();
                    contents.push(Expr::Annotation(Annotation { id, token }));
                }
                // comments and stray whitespace inside a chord are
                // transparent
                TokenKind::Ws | TokenKind::Comment => {
                    contents.push(Expr::Token(self.advance()))
                }
                _ => {
                    contents.push(self.error_and_sync(Some("note"), {
                        let t = self.peek();
                        format!("Unexpected token '{}' in chord", t.lexeme)
                    }));
                }
            }
        }
        let right_bracket = self.match_kind(TokenKind::ChordRight);
        if right_bracket.is_none() {
            self.report("Unterminated chord, expected ']'");
        }
        let rhythm = self.parse_rhythm_opt();
        let tie = self.match_kind(TokenKind::Tie);
        let id = self.ctx.next_id();
        Expr::Chord(Chord {
            id,
            left_bracket,
            contents,
            right_bracket,
            rhythm,
            tie,
        })
    }

    fn parse_grace_group(&mut self) -> Expr {
        let left_brace = self.advance();
        let acciaccatura = self.match_kind(TokenKind::GraceSlash);
        let mut notes = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::GraceRight | TokenKind::Eol | TokenKind::SectionBreak | TokenKind::Eof => {
                    break
                }
                k if self.starts_note(k) => notes.push(self.parse_note()),
                TokenKind::Ws | TokenKind::Comment => notes.push(Expr::Token(self.advance())),
                _ => {
                    notes.push(self.error_and_sync(Some("grace note"), {
                        let t = self.peek();
                        format!("Unexpected token '{}' in grace group", t.lexeme)
                    }));
                }
            }
        }
        let right_brace = self.match_kind(TokenKind::GraceRight);
        if right_brace.is_none() {
            self.report("Unterminated grace group, expected '}'");
        }
        let id = self.ctx.next_id();
        Expr::GraceGroup(GraceGroup {
            id,
            left_brace,
            acciaccatura,
            notes,
            right_brace,
        })
    }

    /// `(p`, `(p:q`, `(p:q:r`; the numbers live in the token's lexeme.
    fn parse_tuplet(&mut self) -> Expr {
        let token = self.advance();
        let digits = token.lexeme.trim_start_matches('(');
        let mut parts = digits.split(':');
        let p = parts
            .next()
            .and_then(|d| d.parse::<u8>().ok())
            .unwrap_or_default();
        let q = parts.next().and_then(|d| d.parse::<u8>().ok());
        let r = parts.next().and_then(|d| d.parse::<u8>().ok());
        if p == 0 {
            self.report("Tuplet count must be a positive number");
        }
        let id = self.ctx.next_id();
        Expr::Tuplet(Tuplet { id, token, p, q, r })
    }

    fn parse_inline_field(&mut self) -> Expr {
        let left_bracket = self.advance();
        let field = if self.check(TokenKind::InfoHeader) {
            match self.parse_info_line() {
                Expr::InfoLine(line) => line,
                // V:/K:/M: sub-parsers always yield an InfoLine here
                other => {
                    let id = other.id();
                    InfoLine {
                        id,
                        key: left_bracket.clone(),
                        value: vec![other],
                    }
                }
            }
        } else {
            self.report("Expected an info field after '['");
            let id = self.ctx.next_id();
            InfoLine {
                id,
                key: left_bracket.clone(),
                value: Vec::new(),
            }
        };
        let right_bracket = self.match_kind(TokenKind::InlineFieldRight);
        let id = self.ctx.next_id();
        Expr::InlineField(InlineField {
            id,
            left_bracket,
            field: Box::new(field),
            right_bracket,
        })
    }

    // ------------------------------------------------------------ recovery

    /// Collect tokens into an `ErrorExpr` and skip to the next safe
    /// boundary: end of line, end of chord, end of tune, or blank line.
    pub(crate) fn error_and_sync(
        &mut self,
        expected: Option<&str>,
        message: impl Into<String>,
    ) -> Expr {
        let message = message.into();
        self.report(message.clone());
        let mut tokens = Vec::new();
        if !self.is_at_end() {
            tokens.push(self.advance());
        }
        while !matches!(
            self.peek_kind(),
            TokenKind::Eol
                | TokenKind::SectionBreak
                | TokenKind::Eof
                | TokenKind::ChordRight
                | TokenKind::Ws
        ) {
            tokens.push(self.advance());
        }
        let id = self.ctx.next_id();
        Expr::Error(ErrorExpr {
            id,
            tokens,
            expected: expected.map(str::to_string),
            message: Some(message),
        })
    }
}

/// Record the id of a `V:` line for the tune header's voice list.
fn collect_voice_id(line: &Expr, voices: &mut Vec<String>) {
    if let Expr::InfoLine(info) = line {
        if info.key.lexeme.starts_with('V') {
            for child in &info.value {
                if let Expr::Token(t) = child {
                    if t.kind == TokenKind::VoiceId {
                        voices.push(t.lexeme.clone());
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    fn parse_str(source: &str) -> (FileStructure, SourceContext) {
        let mut ctx = SourceContext::new();
        let tokens = scan(source, &mut ctx);
        let ast = parse(tokens, &mut ctx);
        (ast, ctx)
    }

    fn only_tune(ast: &FileStructure) -> &Tune {
        ast.contents
            .iter()
            .find_map(|e| match e {
                Expr::Tune(t) => Some(t),
                _ => None,
            })
            .expect("expected a tune")
    }

    fn count_info_lines(header: &TuneHeader) -> usize {
        header
            .info_lines
            .iter()
            .filter(|e| matches!(e, Expr::InfoLine(_)))
            .count()
    }

    #[test]
    fn test_small_tune_shape() {
        let (ast, ctx) = parse_str("X:1\nT:Test\nK:C\nCDEF|\n");
        assert!(!ctx.has_errors());
        let tune = only_tune(&ast);
        assert_eq!(count_info_lines(&tune.header), 3);
        let body = tune.body.as_ref().expect("body");
        assert_eq!(body.systems.len(), 1);
        let system = &body.systems[0];
        // beam of four notes, then the bar line, then the newline
        assert!(matches!(&system[0], Expr::Beam(b) if b.contents.len() == 4));
        assert!(matches!(&system[1], Expr::BarLine(_)));
        assert!(matches!(&system[2], Expr::Token(t) if t.kind == TokenKind::Eol));
    }

    #[test]
    fn test_file_header_before_tune() {
        let (ast, _ctx) = parse_str("%%scale 0.8\n% a remark\nT:Book\n\nX:1\nK:C\nC|\n");
        let header = ast.header.as_ref().expect("file header");
        assert!(header
            .contents
            .iter()
            .any(|e| matches!(e, Expr::Directive(_))));
        assert!(header.contents.iter().any(|e| matches!(e, Expr::Comment(_))));
        assert!(header
            .contents
            .iter()
            .any(|e| matches!(e, Expr::InfoLine(_))));
        assert_eq!(ast.contents.iter().filter(|e| matches!(e, Expr::Tune(_))).count(), 1);
    }

    #[test]
    fn test_no_file_header_when_file_starts_with_tune() {
        let (ast, _) = parse_str("X:1\nK:C\nC|\n");
        assert!(ast.header.is_none());
    }

    #[test]
    fn test_voice_collection_in_order_with_duplicates() {
        let (ast, _) = parse_str("X:1\nV:T1 clef=treble\nV:B1 clef=bass\nV:T1\nK:C\nC|\n");
        let tune = only_tune(&ast);
        assert_eq!(tune.header.voices, vec!["T1", "B1", "T1"]);
    }

    #[test]
    fn test_note_with_everything() {
        let (ast, _) = parse_str("X:1\nK:C\n^c'3/2-\n");
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        let note = match &system[0] {
            Expr::Note(n) => n,
            other => panic!("expected note, got {other:?}"),
        };
        let pitch = match &note.head {
            NoteHead::Pitch(p) => p,
            NoteHead::Rest(_) => panic!("expected pitch"),
        };
        assert_eq!(pitch.accidental.as_ref().unwrap().kind, TokenKind::Sharp);
        assert_eq!(pitch.note_letter.lexeme, "c");
        assert_eq!(pitch.octaves.len(), 1);
        let rhythm = note.rhythm.as_ref().unwrap();
        assert_eq!(rhythm.numerator.as_ref().unwrap().lexeme, "3");
        assert_eq!(rhythm.denominator.as_ref().unwrap().lexeme, "2");
        assert!(note.tie.is_some());
    }

    #[test]
    fn test_leading_tie_binds_to_next_note() {
        let (ast, _) = parse_str("X:1\nK:C\nC -D\n");
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        let notes: Vec<&Note> = system
            .iter()
            .filter_map(|e| match e {
                Expr::Note(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].tie.is_none());
        assert!(notes[1].tie.is_some());
    }

    #[test]
    fn test_chord_with_rhythm_and_tie() {
        let (ast, ctx) = parse_str("X:1\nK:C\n[CEG]2-\n");
        assert!(!ctx.has_errors());
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        let chord = match &system[0] {
            Expr::Chord(c) => c,
            other => panic!("expected chord, got {other:?}"),
        };
        assert_eq!(
            chord
                .contents
                .iter()
                .filter(|e| matches!(e, Expr::Note(_)))
                .count(),
            3
        );
        assert!(chord.right_bracket.is_some());
        assert!(chord.rhythm.is_some());
        assert!(chord.tie.is_some());
    }

    #[test]
    fn test_unterminated_chord_recovers() {
        let (ast, ctx) = parse_str("X:1\nK:C\n[CEG\nDEF|\n");
        assert!(ctx.has_errors());
        let tune = only_tune(&ast);
        // both systems survive
        assert_eq!(tune.body.as_ref().unwrap().systems.len(), 2);
    }

    #[test]
    fn test_grace_group_acciaccatura() {
        let (ast, _) = parse_str("X:1\nK:C\n{/ab}c\n");
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        let grace = match &system[0] {
            Expr::GraceGroup(g) => g,
            other => panic!("expected grace group, got {other:?}"),
        };
        assert!(matches!(&system[1], Expr::Note(_)));
        assert!(grace.acciaccatura.is_some());
        assert_eq!(
            grace
                .notes
                .iter()
                .filter(|e| matches!(e, Expr::Note(_)))
                .count(),
            2
        );
    }

    #[test]
    fn test_tuplet_ratio() {
        let (ast, _) = parse_str("X:1\nK:C\n(3:2:3CDE\n");
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        let beam = match &system[0] {
            Expr::Beam(b) => b,
            other => panic!("expected beam, got {other:?}"),
        };
        let tuplet = match &beam.contents[0] {
            Expr::Tuplet(t) => t,
            other => panic!("expected tuplet, got {other:?}"),
        };
        assert_eq!((tuplet.p, tuplet.q, tuplet.r), (3, Some(2), Some(3)));
    }

    #[test]
    fn test_bar_line_with_repeat_numbers() {
        let (ast, _) = parse_str("X:1\nK:C\nC|1,2 D\n");
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        let bar = system
            .iter()
            .find_map(|e| match e {
                Expr::BarLine(b) => Some(b),
                _ => None,
            })
            .expect("bar line");
        assert_eq!(bar.bars.len(), 1);
        assert_eq!(
            bar.repeat_numbers
                .iter()
                .map(|t| t.lexeme.as_str())
                .collect::<Vec<_>>(),
            vec!["1", ",", "2"]
        );
    }

    #[test]
    fn test_inline_field_in_body() {
        let (ast, _) = parse_str("X:1\nK:C\nCD[K:G]EF\n");
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        fn find_inline(exprs: &[Expr]) -> Option<&InlineField> {
            exprs.iter().find_map(|e| match e {
                Expr::InlineField(f) => Some(f),
                Expr::Beam(b) => find_inline(&b.contents),
                _ => None,
            })
        }
        let field = find_inline(system).expect("inline field");
        assert!(field.field.key.lexeme.starts_with('K'));
        assert!(field.right_bracket.is_some());
    }

    #[test]
    fn test_lyric_section_groups_lines() {
        let (ast, _) = parse_str("X:1\nK:C\nCDEF|\nw:la la\nw:lee lee\nGABc|\n");
        let tune = only_tune(&ast);
        let body = tune.body.as_ref().unwrap();
        assert_eq!(body.systems.len(), 2);
        let section = body.systems[0]
            .iter()
            .find_map(|e| match e {
                Expr::LyricSection(s) => Some(s),
                _ => None,
            })
            .expect("lyric section");
        assert_eq!(
            section
                .lines
                .iter()
                .filter(|e| matches!(e, Expr::LyricLine(_)))
                .count(),
            2
        );
    }

    #[test]
    fn test_totality_on_garbage() {
        let (ast, ctx) = parse_str("X:1\nK:C\nC ??? D\n");
        assert!(ctx.has_errors());
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        fn has_error(exprs: &[Expr]) -> bool {
            exprs.iter().any(|e| match e {
                Expr::Error(_) => true,
                Expr::Beam(b) => has_error(&b.contents),
                _ => false,
            })
        }
        assert!(has_error(system));
        // the notes around the garbage still parse
        fn count_notes(exprs: &[Expr]) -> usize {
            exprs
                .iter()
                .map(|e| match e {
                    Expr::Note(_) => 1,
                    Expr::Beam(b) => count_notes(&b.contents),
                    _ => 0,
                })
                .sum()
        }
        assert_eq!(count_notes(system), 2);
    }

    #[test]
    fn test_two_tunes() {
        let (ast, _) = parse_str("X:1\nK:C\nC|\n\nX:2\nK:G\nG|\n");
        let tunes = ast
            .contents
            .iter()
            .filter(|e| matches!(e, Expr::Tune(_)))
            .count();
        assert_eq!(tunes, 2);
    }

    #[test]
    fn test_header_only_tune_has_no_body() {
        let (ast, _) = parse_str("X:1\nT:Fragment\nK:C\n");
        let tune = only_tune(&ast);
        assert!(tune.body.is_none());
    }

    #[test]
    fn test_multi_measure_rest() {
        let (ast, _) = parse_str("X:1\nK:C\nZ4|\n");
        let tune = only_tune(&ast);
        let system = &tune.body.as_ref().unwrap().systems[0];
        let mmr = match &system[0] {
            Expr::MultiMeasureRest(m) => m,
            other => panic!("expected multi-measure rest, got {other:?}"),
        };
        assert_eq!(mmr.length.as_ref().unwrap().lexeme, "4");
    }
}
