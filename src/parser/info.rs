//! Per-field info-line sub-parsers.
//!
//! Structured fields (`K:`, `M:`, `L:`, `Q:`, `V:`) are parsed into
//! sub-expressions (`Rational`, `Binary`, `Grouping`, `KeyValue`,
//! `AbsolutePitch`) so the analyzer works over shapes rather than raw
//! lexemes. Free-text fields keep their value tokens as-is. The meter
//! expression is a small recursive descent over number, `+`, `/` and
//! parenthesis tokens.

use crate::expr::*;
use crate::token::TokenKind;

use super::Parser;

impl Parser<'_> {
    /// Header token already at the cursor; dispatches on the field letter.
    pub(super) fn parse_info_line(&mut self) -> Expr {
        let key = self.advance();
        let field = key.lexeme.chars().next().unwrap_or('\0');
        match field {
            'K' => self.parse_key_line(key),
            'M' => self.parse_meter_line(key),
            'L' => self.parse_note_length_line(key),
            'Q' => self.parse_tempo_line(key),
            'V' => self.parse_voice_line(key),
            'w' | 'W' => self.parse_lyric_info(key),
            _ => self.parse_text_line(key),
        }
    }

    fn at_info_value_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Eol | TokenKind::SectionBreak | TokenKind::Eof | TokenKind::InlineFieldRight
        )
    }

    fn parse_text_line(&mut self, key: crate::token::Token) -> Expr {
        let mut value = Vec::new();
        while !self.at_info_value_end() {
            value.push(Expr::Token(self.advance()));
        }
        let id = self.ctx.next_id();
        Expr::InfoLine(InfoLine { id, key, value })
    }

    fn parse_lyric_info(&mut self, key: crate::token::Token) -> Expr {
        let mut text = Vec::new();
        while !self.at_info_value_end() {
            text.push(self.advance());
        }
        let id = self.ctx.next_id();
        Expr::LyricLine(LyricLine { id, key, text })
    }

    /// `K:` value: signature tokens, clef and other modifiers.
    fn parse_key_line(&mut self, key: crate::token::Token) -> Expr {
        let mut value = Vec::new();
        while !self.at_info_value_end() {
            match self.peek().kind {
                TokenKind::InfoIdent => value.push(self.parse_key_value()),
                // signature tokens, clef pieces and whitespace stay as-is
                _ => value.push(Expr::Token(self.advance())),
            }
        }
        let id = self.ctx.next_id();
        Expr::InfoLine(InfoLine { id, key, value })
    }

    /// `name=value` inside a K: or V: field.
    fn parse_key_value(&mut self) -> Expr {
        let key = self.advance();
        let op = match self.match_kind(TokenKind::InfoEquals) {
            Some(op) => op,
            None => {
                // lone ident; keep it as a token
                return Expr::Token(key);
            }
        };
        let value = self.parse_modifier_value();
        let id = self.ctx.next_id();
        Expr::KeyValue(KeyValue {
            id,
            key,
            op,
            value: Box::new(value),
        })
    }

    fn parse_modifier_value(&mut self) -> Expr {
        match self.peek().kind {
            TokenKind::ClefName
            | TokenKind::InfoNumber
            | TokenKind::InfoString
            | TokenKind::InfoIdent => Expr::Token(self.advance()),
            TokenKind::Sharp | TokenKind::Flat | TokenKind::Natural | TokenKind::NoteLetter => {
                self.parse_absolute_pitch()
            }
            _ => self.error_and_sync(Some("modifier value"), "Missing value after '='"),
        }
    }

    /// `middle=B,` style pitch outside a tune body.
    fn parse_absolute_pitch(&mut self) -> Expr {
        let accidental = match self.peek().kind {
            TokenKind::Sharp | TokenKind::Flat | TokenKind::Natural => Some(self.advance()),
            _ => None,
        };
        let note = self.advance();
        let mut octaves = Vec::new();
        while matches!(
            self.peek().kind,
            TokenKind::OctaveUp | TokenKind::OctaveDown
        ) {
            octaves.push(self.advance());
        }
        let id = self.ctx.next_id();
        Expr::AbsolutePitch(AbsolutePitch {
            id,
            note,
            accidental,
            octaves,
        })
    }

    /// `M:` value: `C`, `C|`, `none`, or a compound expression like
    /// `(2+3)/8`.
    fn parse_meter_line(&mut self, key: crate::token::Token) -> Expr {
        let mut value = Vec::new();
        while !self.at_info_value_end() {
            match self.peek().kind {
                TokenKind::MeterNumber | TokenKind::MeterLparen => {
                    value.push(self.meter_expr());
                }
                _ => value.push(Expr::Token(self.advance())),
            }
        }
        let id = self.ctx.next_id();
        Expr::InfoLine(InfoLine { id, key, value })
    }

    /// expr := term { '/' term }
    fn meter_expr(&mut self) -> Expr {
        let mut lhs = self.meter_term();
        while self.check(TokenKind::MeterSeparator) {
            let op = self.advance();
            let rhs = self.meter_term();
            let id = self.ctx.next_id();
            lhs = Expr::Binary(Binary {
                id,
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            });
        }
        lhs
    }

    /// term := primary { '+' primary }
    fn meter_term(&mut self) -> Expr {
        let mut lhs = self.meter_primary();
        while self.check(TokenKind::MeterPlus) {
            let op = self.advance();
            let rhs = self.meter_primary();
            let id = self.ctx.next_id();
            lhs = Expr::Binary(Binary {
                id,
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            });
        }
        lhs
    }

    /// primary := Number | '(' expr ')'
    fn meter_primary(&mut self) -> Expr {
        if let Some(number) = self.match_kind(TokenKind::MeterNumber) {
            return Expr::Token(number);
        }
        if self.check(TokenKind::MeterLparen) {
            let left_paren = self.advance();
            let inner = self.meter_expr();
            let right_paren = self.match_kind(TokenKind::MeterRparen);
            if right_paren.is_none() {
                self.report("Expected ')' in M: field");
            }
            let id = self.ctx.next_id();
            return Expr::Grouping(Grouping {
                id,
                left_paren,
                inner: Box::new(inner),
                right_paren,
            });
        }
        self.error_and_sync(Some("meter number"), "Expected a number in M: field")
    }

    /// `L:` value: `num/den`.
    fn parse_note_length_line(&mut self, key: crate::token::Token) -> Expr {
        let mut value = Vec::new();
        while !self.at_info_value_end() {
            match self.peek().kind {
                TokenKind::Ws | TokenKind::InvalidInfo => value.push(Expr::Token(self.advance())),
                TokenKind::InfoNumber => {
                    let numerator = self.advance();
                    if let Some(separator) = self.match_kind(TokenKind::InfoSlash) {
                        if let Some(denominator) = self.match_kind(TokenKind::InfoNumber) {
                            let id = self.ctx.next_id();
                            value.push(Expr::Rational(Rational {
                                id,
                                numerator,
                                separator,
                                denominator,
                            }));
                        } else {
                            value.push(Expr::Token(numerator));
                            value.push(Expr::Token(separator));
                            value.push(self.error_and_sync(
                                Some("number"),
                                "Expected a denominator in L: field",
                            ));
                        }
                    } else {
                        value.push(Expr::Token(numerator));
                    }
                }
                _ => value.push(self.error_and_sync(
                    Some("note length"),
                    "Expected a fraction in L: field",
                )),
            }
        }
        let id = self.ctx.next_id();
        Expr::InfoLine(InfoLine { id, key, value })
    }

    /// `Q:` value: optional leading string, `num/den=bpm` or a bare bpm,
    /// optional trailing string.
    fn parse_tempo_line(&mut self, key: crate::token::Token) -> Expr {
        let mut value = Vec::new();
        while !self.at_info_value_end() {
            match self.peek().kind {
                TokenKind::Ws | TokenKind::InfoString | TokenKind::InvalidInfo => {
                    value.push(Expr::Token(self.advance()))
                }
                TokenKind::InfoNumber => value.push(self.tempo_equation()),
                _ => value.push(Expr::Token(self.advance())),
            }
        }
        let id = self.ctx.next_id();
        Expr::InfoLine(InfoLine { id, key, value })
    }

    /// `1/4=120`, a bare duration `1/4`, or a bare bpm.
    fn tempo_equation(&mut self) -> Expr {
        let numerator = self.advance();
        let duration = if let Some(separator) = self.match_kind(TokenKind::InfoSlash) {
            match self.match_kind(TokenKind::InfoNumber) {
                Some(denominator) => {
                    let id = self.ctx.next_id();
                    Expr::Rational(Rational {
                        id,
                        numerator,
                        separator,
                        denominator,
                    })
                }
                None => {
                    return self
                        .error_and_sync(Some("number"), "Expected a denominator in Q: field");
                }
            }
        } else {
            Expr::Token(numerator)
        };
        if self.check(TokenKind::InfoEquals) {
            let op = self.advance();
            match self.match_kind(TokenKind::InfoNumber) {
                Some(bpm) => {
                    let id = self.ctx.next_id();
                    Expr::Binary(Binary {
                        id,
                        lhs: Box::new(duration),
                        op,
                        rhs: Box::new(Expr::Token(bpm)),
                    })
                }
                None => self.error_and_sync(Some("number"), "Expected a tempo after '='"),
            }
        } else {
            duration
        }
    }

    /// `V:` value: voice id then modifiers.
    fn parse_voice_line(&mut self, key: crate::token::Token) -> Expr {
        let mut value = Vec::new();
        while !self.at_info_value_end() {
            match self.peek().kind {
                TokenKind::InfoIdent => value.push(self.parse_key_value()),
                _ => value.push(Expr::Token(self.advance())),
            }
        }
        let id = self.ctx.next_id();
        Expr::InfoLine(InfoLine { id, key, value })
    }
}

#[cfg(test)]
mod tests {
    use crate::context::SourceContext;
    use crate::expr::*;
    use crate::parser::parse;
    use crate::scanner::scan;
    use crate::token::TokenKind;

    fn info_line(source: &str, key: char) -> InfoLine {
        let mut ctx = SourceContext::new();
        let tokens = scan(source, &mut ctx);
        let ast = parse(tokens, &mut ctx);
        fn find(exprs: &[Expr], key: char) -> Option<InfoLine> {
            for e in exprs {
                match e {
                    Expr::InfoLine(line) if line.key.lexeme.starts_with(key) => {
                        return Some(line.clone())
                    }
                    Expr::Tune(t) => {
                        if let Some(found) = find(&t.header.info_lines, key) {
                            return Some(found);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        let mut roots = Vec::new();
        if let Some(h) = &ast.header {
            roots.extend(h.contents.iter().cloned());
        }
        roots.extend(ast.contents.iter().cloned());
        find(&roots, key).expect("info line not found")
    }

    #[test]
    fn test_meter_simple_fraction() {
        let line = info_line("X:1\nM:6/8\nK:C\n", 'M');
        let binary = line
            .value
            .iter()
            .find_map(|e| match e {
                Expr::Binary(b) => Some(b),
                _ => None,
            })
            .expect("binary");
        assert!(matches!(&*binary.lhs, Expr::Token(t) if t.lexeme == "6"));
        assert_eq!(binary.op.kind, TokenKind::MeterSeparator);
        assert!(matches!(&*binary.rhs, Expr::Token(t) if t.lexeme == "8"));
    }

    #[test]
    fn test_meter_compound_expression() {
        let line = info_line("X:1\nM:(2+3)/8\nK:C\n", 'M');
        let outer = line
            .value
            .iter()
            .find_map(|e| match e {
                Expr::Binary(b) => Some(b),
                _ => None,
            })
            .expect("binary");
        let grouping = match &*outer.lhs {
            Expr::Grouping(g) => g,
            other => panic!("expected grouping, got {other:?}"),
        };
        assert!(matches!(&*grouping.inner, Expr::Binary(inner)
            if inner.op.kind == TokenKind::MeterPlus));
    }

    #[test]
    fn test_note_length_rational() {
        let line = info_line("X:1\nL:1/8\nK:C\n", 'L');
        let rational = line
            .value
            .iter()
            .find_map(|e| match e {
                Expr::Rational(r) => Some(r),
                _ => None,
            })
            .expect("rational");
        assert_eq!(rational.numerator.lexeme, "1");
        assert_eq!(rational.denominator.lexeme, "8");
    }

    #[test]
    fn test_tempo_equation_shape() {
        let line = info_line("X:1\nQ:1/4=120\nK:C\n", 'Q');
        let binary = line
            .value
            .iter()
            .find_map(|e| match e {
                Expr::Binary(b) => Some(b),
                _ => None,
            })
            .expect("binary");
        assert!(matches!(&*binary.lhs, Expr::Rational(_)));
        assert!(matches!(&*binary.rhs, Expr::Token(t) if t.lexeme == "120"));
    }

    #[test]
    fn test_tempo_with_strings() {
        let line = info_line("X:1\nQ:\"Allegro\" 1/4=120\nK:C\n", 'Q');
        assert!(matches!(&line.value[0], Expr::Token(t)
            if t.kind == TokenKind::InfoString && t.lexeme == "\"Allegro\""));
        assert!(line
            .value
            .iter()
            .any(|e| matches!(e, Expr::Binary(_))));
    }

    #[test]
    fn test_key_with_clef_key_value() {
        let line = info_line("X:1\nK:G clef=bass middle=B,\n", 'K');
        let kvs: Vec<&KeyValue> = line
            .value
            .iter()
            .filter_map(|e| match e {
                Expr::KeyValue(kv) => Some(kv),
                _ => None,
            })
            .collect();
        assert_eq!(kvs.len(), 2);
        assert_eq!(kvs[0].key.lexeme, "clef");
        assert!(matches!(&*kvs[0].value, Expr::Token(t) if t.lexeme == "bass"));
        assert_eq!(kvs[1].key.lexeme, "middle");
        let pitch = match &*kvs[1].value {
            Expr::AbsolutePitch(p) => p,
            other => panic!("expected absolute pitch, got {other:?}"),
        };
        assert_eq!(pitch.note.lexeme, "B");
        assert_eq!(pitch.octaves.len(), 1);
    }

    #[test]
    fn test_voice_modifiers() {
        let line = info_line("X:1\nV:T1 name=\"Tenor\" octave=-1\nK:C\n", 'V');
        assert!(matches!(&line.value[0], Expr::Token(t)
            if t.kind == TokenKind::VoiceId && t.lexeme == "T1"));
        let kvs: Vec<&KeyValue> = line
            .value
            .iter()
            .filter_map(|e| match e {
                Expr::KeyValue(kv) => Some(kv),
                _ => None,
            })
            .collect();
        assert_eq!(kvs.len(), 2);
        assert!(matches!(&*kvs[1].value, Expr::Token(t) if t.lexeme == "-1"));
    }
}
