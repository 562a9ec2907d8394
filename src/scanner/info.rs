//! Info-line sub-scanners.
//!
//! After an info header (`K:`, `M:`, `L:`, `Q:`, `V:`, `X:`) the driver
//! switches into a per-field micro-grammar; this keeps characters like `/`
//! unambiguous (meter separator here, rhythm separator in a tune body).
//! Free-text fields (`T:`, `C:`, `O:`, `w:`, ...) are collected into a
//! single text token. Content a sub-scanner cannot place is collapsed into
//! one recovery token and reported.

use crate::error::ErrorKind;
use crate::token::TokenKind;

use super::AbcScanner;

/// Where a field value ends: at end of line, or at the `]` that closes an
/// inline field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminator {
    Eol,
    Bracket,
}

/// Structured fields that get their own sub-scanner; everything else is
/// free text.
const STRUCTURED_KEYS: [char; 6] = ['K', 'M', 'L', 'Q', 'V', 'X'];

const MODE_WORDS: [&str; 20] = [
    "m", "maj", "major", "min", "minor", "mix", "mixolydian", "dor", "dorian", "phr", "phrygian",
    "lyd", "lydian", "loc", "locrian", "aeo", "aeolian", "ion", "ionian", "exp",
];

const CLEF_NAMES: [&str; 10] = [
    "treble", "bass", "alto", "tenor", "baritone", "mezzo", "soprano", "perc", "none", "auto",
];

impl AbcScanner<'_, '_> {
    pub(crate) fn scan_info_value(&mut self, key: char, term: Terminator) {
        if !STRUCTURED_KEYS.contains(&key) {
            self.scan_free_text_field(term);
            return;
        }
        match key {
            'K' => self.scan_key_field(term),
            'M' => self.scan_meter_field(term),
            'L' => self.scan_note_length_field(term),
            'Q' => self.scan_tempo_field(term),
            'V' => self.scan_voice_field(term),
            'X' => self.scan_reference_field(term),
            _ => unreachable!(),
        }
    }

    fn at_field_end(&self, term: Terminator) -> bool {
        match self.cur.peek() {
            None | Some('\r' | '\n') => true,
            Some(']') => term == Terminator::Bracket,
            _ => false,
        }
    }

    /// Leading run of ASCII letters at the cursor.
    fn peek_word(&self) -> &str {
        let rest = self.cur.rest();
        let end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn consume_word(&mut self) {
        while matches!(self.cur.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.cur.advance();
        }
    }

    fn field_ws(&mut self) -> bool {
        if !matches!(self.cur.peek(), Some(' ' | '\t')) {
            return false;
        }
        while matches!(self.cur.peek(), Some(' ' | '\t')) {
            self.cur.advance();
        }
        self.cur.push(TokenKind::Ws, self.ctx);
        true
    }

    fn field_digits(&mut self) -> bool {
        if !matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
            return false;
        }
        while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
            self.cur.advance();
        }
        true
    }

    /// Everything to the terminator becomes one token (omitted when the
    /// field is empty).
    fn scan_free_text_field(&mut self, term: Terminator) {
        while !self.at_field_end(term) {
            self.cur.advance();
        }
        if self.cur.current > self.cur.start {
            self.cur.push(TokenKind::InfoText, self.ctx);
        }
    }

    /// Collect the rest of the field into one recovery token and report.
    fn invalid_info(&mut self, term: Terminator, message: &str) {
        let pos = self.cur.pos();
        while !self.at_field_end(term) {
            self.cur.advance();
        }
        if self.cur.current > self.cur.start {
            self.cur.push(TokenKind::InvalidInfo, self.ctx);
        }
        self.ctx.report(ErrorKind::Scanner, message, pos);
    }

    /// `K:`: root, accidental, mode, explicit accidentals, `none`, plus
    /// clef and other `key=value` modifiers.
    fn scan_key_field(&mut self, term: Terminator) {
        let mut seen_root = false;
        while !self.at_field_end(term) {
            self.cur.start = self.cur.current;
            if self.field_ws() {
                continue;
            }
            let word = self.peek_word();
            if word.eq_ignore_ascii_case("none") {
                self.consume_word();
                self.cur.push(TokenKind::KeyNone, self.ctx);
                continue;
            }
            if word == "HP" || word == "Hp" {
                self.consume_word();
                self.cur.push(TokenKind::KeyHp, self.ctx);
                continue;
            }
            let c = match self.cur.peek() {
                Some(c) => c,
                None => return,
            };
            if !seen_root && matches!(c, 'A'..='G') {
                self.cur.advance();
                self.cur.push(TokenKind::KeyRoot, self.ctx);
                seen_root = true;
                if matches!(self.cur.peek(), Some('#' | 'b')) {
                    self.cur.advance();
                    self.cur.push(TokenKind::KeyAccidental, self.ctx);
                }
                continue;
            }
            if matches!(c, '^' | '_' | '=')
                && matches!(self.cur.peek_second(), Some('a'..='g' | 'A'..='G'))
            {
                self.cur.advance();
                self.cur.advance();
                self.cur.push(TokenKind::KeyExplicitAcc, self.ctx);
                continue;
            }
            if !word.is_empty() {
                // `Cmaj`: the root has been taken, the tail may be a mode
                if MODE_WORDS.contains(&word.to_ascii_lowercase().as_str()) {
                    self.consume_word();
                    self.cur.push(TokenKind::KeyMode, self.ctx);
                    continue;
                }
                if self.word_is_modifier(word) {
                    self.scan_modifier(term);
                    continue;
                }
                if CLEF_NAMES.contains(&word.to_ascii_lowercase().as_str()) {
                    self.consume_word();
                    self.cur.push(TokenKind::ClefName, self.ctx);
                    continue;
                }
            }
            self.invalid_info(term, "Invalid content in K: field");
            return;
        }
    }

    /// True when the word at the cursor is followed by `=`.
    fn word_is_modifier(&self, word: &str) -> bool {
        self.cur.rest()[word.len()..].starts_with('=')
    }

    /// `name=value` modifier in a K: or V: field.
    fn scan_modifier(&mut self, term: Terminator) {
        let name = self.peek_word().to_ascii_lowercase();
        self.consume_word();
        self.cur.push(TokenKind::InfoIdent, self.ctx);
        self.cur.advance(); // =
        self.cur.push(TokenKind::InfoEquals, self.ctx);
        self.cur.start = self.cur.current;
        match name.as_str() {
            "clef" => self.scan_clef_value(),
            "middle" => self.scan_pitch_value(term),
            "transpose" | "octave" | "stafflines" | "staffscale" => self.info_number(),
            _ => match self.cur.peek() {
                Some('"') => self.quoted(TokenKind::InfoString, "Unterminated string in info field"),
                Some(c) if c.is_ascii_digit() || c == '-' => self.info_number(),
                _ => {
                    while matches!(self.cur.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_')
                    {
                        self.cur.advance();
                    }
                    if self.cur.current > self.cur.start {
                        self.cur.push(TokenKind::InfoIdent, self.ctx);
                    } else {
                        self.invalid_info(term, "Missing value after '='");
                    }
                }
            },
        }
    }

    /// Clef name, optional staff line, optional `+8`/`-8`.
    fn scan_clef_value(&mut self) {
        if !self.peek_word().is_empty() {
            self.consume_word();
            self.cur.push(TokenKind::ClefName, self.ctx);
        }
        if matches!(self.cur.peek(), Some('1'..='5')) {
            self.cur.advance();
            self.cur.push(TokenKind::ClefNum, self.ctx);
        }
        if self.cur.rest().starts_with("+8") || self.cur.rest().starts_with("-8") {
            self.cur.advance();
            self.cur.advance();
            self.cur.push(TokenKind::ClefOctave, self.ctx);
        }
    }

    /// An absolute pitch: optional accidental, letter, octave markers.
    fn scan_pitch_value(&mut self, term: Terminator) {
        match self.cur.peek() {
            Some('^') => {
                self.cur.advance();
                self.cur.push(TokenKind::Sharp, self.ctx);
            }
            Some('_') => {
                self.cur.advance();
                self.cur.push(TokenKind::Flat, self.ctx);
            }
            Some('=') => {
                self.cur.advance();
                self.cur.push(TokenKind::Natural, self.ctx);
            }
            _ => {}
        }
        if matches!(self.cur.peek(), Some('a'..='g' | 'A'..='G')) {
            self.cur.advance();
            self.cur.push(TokenKind::NoteLetter, self.ctx);
        } else {
            self.invalid_info(term, "Expected a pitch after '='");
            return;
        }
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
    }

    /// `M:`: `C`, `C|`, or a compound numeric expression.
    fn scan_meter_field(&mut self, term: Terminator) {
        while !self.at_field_end(term) {
            self.cur.start = self.cur.current;
            if self.field_ws() {
                continue;
            }
            if self.cur.match_str("C|") {
                self.cur.push(TokenKind::MeterCBar, self.ctx);
                continue;
            }
            if self.cur.match_char('C') {
                self.cur.push(TokenKind::MeterC, self.ctx);
                continue;
            }
            if self.field_digits() {
                self.cur.push(TokenKind::MeterNumber, self.ctx);
                continue;
            }
            match self.cur.peek() {
                Some('/') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::MeterSeparator, self.ctx);
                }
                Some('(') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::MeterLparen, self.ctx);
                }
                Some(')') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::MeterRparen, self.ctx);
                }
                Some('+') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::MeterPlus, self.ctx);
                }
                _ => {
                    if self.peek_word().eq_ignore_ascii_case("none") {
                        self.consume_word();
                        self.cur.push(TokenKind::InfoIdent, self.ctx);
                        continue;
                    }
                    self.invalid_info(term, "Invalid content in M: field");
                    return;
                }
            }
        }
    }

    /// `L:`: a plain fraction.
    fn scan_note_length_field(&mut self, term: Terminator) {
        while !self.at_field_end(term) {
            self.cur.start = self.cur.current;
            if self.field_ws() {
                continue;
            }
            if self.field_digits() {
                self.cur.push(TokenKind::InfoNumber, self.ctx);
                continue;
            }
            if self.cur.match_char('/') {
                self.cur.push(TokenKind::InfoSlash, self.ctx);
                continue;
            }
            self.invalid_info(term, "Invalid content in L: field");
            return;
        }
    }

    /// `Q:`: optional strings, numbers, `/` and `=` in any of the accepted
    /// arrangements; shape is checked by the parser and analyzer.
    fn scan_tempo_field(&mut self, term: Terminator) {
        while !self.at_field_end(term) {
            self.cur.start = self.cur.current;
            if self.field_ws() {
                continue;
            }
            match self.cur.peek() {
                Some('"') => {
                    self.quoted(TokenKind::InfoString, "Unterminated string in Q: field");
                }
                Some(c) if c.is_ascii_digit() => {
                    self.field_digits();
                    self.cur.push(TokenKind::InfoNumber, self.ctx);
                }
                Some('/') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::InfoSlash, self.ctx);
                }
                Some('=') => {
                    self.cur.advance();
                    self.cur.push(TokenKind::InfoEquals, self.ctx);
                }
                _ => {
                    self.invalid_info(term, "Invalid content in Q: field");
                    return;
                }
            }
        }
    }

    /// `V:`: voice id, then modifiers.
    fn scan_voice_field(&mut self, term: Terminator) {
        while !self.at_field_end(term) {
            self.cur.start = self.cur.current;
            if self.field_ws() {
                continue;
            }
            break;
        }
        self.cur.start = self.cur.current;
        while matches!(self.cur.peek(), Some(c) if c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            self.cur.advance();
        }
        if self.cur.current > self.cur.start {
            self.cur.push(TokenKind::VoiceId, self.ctx);
        } else if !self.at_field_end(term) {
            self.invalid_info(term, "Missing voice id in V: field");
            return;
        }
        while !self.at_field_end(term) {
            self.cur.start = self.cur.current;
            if self.field_ws() {
                continue;
            }
            let word = self.peek_word();
            if !word.is_empty() && self.word_is_modifier(word) {
                self.scan_modifier(term);
                continue;
            }
            if self.cur.peek() == Some('"') {
                self.quoted(TokenKind::InfoString, "Unterminated string in V: field");
                continue;
            }
            self.invalid_info(term, "Invalid content in V: field");
            return;
        }
    }

    /// `X:`: the tune reference number.
    fn scan_reference_field(&mut self, term: Terminator) {
        while !self.at_field_end(term) {
            self.cur.start = self.cur.current;
            if self.field_ws() {
                continue;
            }
            if self.field_digits() {
                self.cur.push(TokenKind::InfoNumber, self.ctx);
                continue;
            }
            self.invalid_info(term, "Invalid content in X: field");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::context::SourceContext;
    use crate::scanner::scan;
    use crate::token::{Token, TokenKind};

    fn scan_str(source: &str) -> (Vec<Token>, SourceContext) {
        let mut ctx = SourceContext::new();
        let tokens = scan(source, &mut ctx);
        (tokens, ctx)
    }

    fn field_kinds(source: &str) -> Vec<TokenKind> {
        // tokens between the last InfoHeader and its Eol
        let (tokens, _) = scan_str(source);
        let start = tokens
            .iter()
            .rposition(|t| t.kind == TokenKind::InfoHeader)
            .unwrap();
        tokens[start + 1..]
            .iter()
            .take_while(|t| !matches!(t.kind, TokenKind::Eol | TokenKind::Eof))
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_key_with_accidental_and_mode() {
        assert_eq!(
            field_kinds("K:Bb minor\n"),
            vec![
                TokenKind::KeyRoot,
                TokenKind::KeyAccidental,
                TokenKind::Ws,
                TokenKind::KeyMode,
            ]
        );
    }

    #[test]
    fn test_key_attached_mode() {
        assert_eq!(
            field_kinds("K:Cm\n"),
            vec![TokenKind::KeyRoot, TokenKind::KeyMode]
        );
    }

    #[test]
    fn test_key_explicit_accidentals() {
        assert_eq!(
            field_kinds("K:D exp ^f ^c\n"),
            vec![
                TokenKind::KeyRoot,
                TokenKind::Ws,
                TokenKind::KeyMode,
                TokenKind::Ws,
                TokenKind::KeyExplicitAcc,
                TokenKind::Ws,
                TokenKind::KeyExplicitAcc,
            ]
        );
    }

    #[test]
    fn test_key_none() {
        assert_eq!(field_kinds("K:none\n"), vec![TokenKind::KeyNone]);
    }

    #[test]
    fn test_key_clef_modifier() {
        assert_eq!(
            field_kinds("K:G clef=bass3-8 middle=B,\n"),
            vec![
                TokenKind::KeyRoot,
                TokenKind::Ws,
                TokenKind::InfoIdent,
                TokenKind::InfoEquals,
                TokenKind::ClefName,
                TokenKind::ClefNum,
                TokenKind::ClefOctave,
                TokenKind::Ws,
                TokenKind::InfoIdent,
                TokenKind::InfoEquals,
                TokenKind::NoteLetter,
                TokenKind::OctaveDown,
            ]
        );
    }

    #[test]
    fn test_meter_tokens() {
        assert_eq!(
            field_kinds("M:(2+3)/8\n"),
            vec![
                TokenKind::MeterLparen,
                TokenKind::MeterNumber,
                TokenKind::MeterPlus,
                TokenKind::MeterNumber,
                TokenKind::MeterRparen,
                TokenKind::MeterSeparator,
                TokenKind::MeterNumber,
            ]
        );
        assert_eq!(field_kinds("M:C|\n"), vec![TokenKind::MeterCBar]);
        assert_eq!(field_kinds("M:C\n"), vec![TokenKind::MeterC]);
    }

    #[test]
    fn test_tempo_tokens() {
        assert_eq!(
            field_kinds("Q:\"Allegro\" 1/4=120\n"),
            vec![
                TokenKind::InfoString,
                TokenKind::Ws,
                TokenKind::InfoNumber,
                TokenKind::InfoSlash,
                TokenKind::InfoNumber,
                TokenKind::InfoEquals,
                TokenKind::InfoNumber,
            ]
        );
    }

    #[test]
    fn test_voice_tokens() {
        assert_eq!(
            field_kinds("V:T1 name=\"Tenor\" clef=treble\n"),
            vec![
                TokenKind::VoiceId,
                TokenKind::Ws,
                TokenKind::InfoIdent,
                TokenKind::InfoEquals,
                TokenKind::InfoString,
                TokenKind::Ws,
                TokenKind::InfoIdent,
                TokenKind::InfoEquals,
                TokenKind::ClefName,
            ]
        );
    }

    #[test]
    fn test_invalid_info_is_collected_and_reported() {
        let (tokens, ctx) = scan_str("M:what?\n");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::InvalidInfo));
        assert!(ctx.has_errors());
        // the bad content is still present for round-tripping
        assert_eq!(Token::join(&tokens), "M:what?\n");
    }

    #[test]
    fn test_free_text_field() {
        assert_eq!(field_kinds("T:The Title\n"), vec![TokenKind::InfoText]);
        let (tokens, _) = scan_str("T: Spaced \n");
        let text = tokens.iter().find(|t| t.kind == TokenKind::InfoText).unwrap();
        assert_eq!(text.lexeme, " Spaced ");
    }
}
