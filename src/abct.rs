//! # ABCT Scanner
//!
//! Tokenizer for ABCT, the pipe-based transformation language that embeds
//! ABC through fenced literals. Same architecture as the ABC scanner: a
//! mutable cursor, primitives tried in precedence order, recovery through
//! `Invalid` tokens, one final `Eof`.
//!
//! Contracts specific to ABCT:
//! - Maximal munch: multi-character operators (`|=`, `==`, `!=`, `<=`,
//!   `>=`, `=>`) are tried before their single-character prefixes.
//! - Keywords are reclassified from identifiers only on an exact lexeme
//!   match, so `andromeda` stays an identifier.
//! - Numbers: fraction (`1/2`) before decimal (`3.14`) before integer; a
//!   leading `-` is never part of the number.
//! - A fence opens only at line start (possibly indented): `` ```abc ``
//!   with an optional `:L[:C][-L[:C]]` location suffix, then end of line.
//!   The close is a line consisting solely of `` ``` `` (indent and
//!   trailing blanks allowed). Inline backtick runs are content.
//! - [`sanitize`] / [`desanitize`] escape and restore the sequences that
//!   would collide with fence and comment syntax when ABC text is embedded;
//!   `desanitize(sanitize(s)) == s` for every string.

use crate::context::SourceContext;
use crate::error::ErrorKind;
use crate::scanner::Cursor;
use crate::token::{Token, TokenKind};

/// Reserved words, reclassified after an identifier match.
const KEYWORDS: [(&str, TokenKind); 15] = [
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
    ("fn", TokenKind::Fn),
    ("match", TokenKind::Match),
    ("over", TokenKind::Over),
    ("let", TokenKind::Let),
    ("if", TokenKind::If),
    ("then", TokenKind::Then),
    ("else", TokenKind::Else),
    ("topdown", TokenKind::Topdown),
    ("bottomup", TokenKind::Bottomup),
    ("oncetd", TokenKind::Oncetd),
    ("alltd", TokenKind::Alltd),
    ("load", TokenKind::Load),
];

/// Two-character operators first, then their prefixes.
const OPERATORS: [(&str, TokenKind); 22] = [
    ("|=", TokenKind::PipeEq),
    ("==", TokenKind::EqualEqual),
    ("=>", TokenKind::Arrow),
    ("!=", TokenKind::NotEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("|", TokenKind::Pipe),
    ("+", TokenKind::Plus),
    ("=", TokenKind::Equal),
    ("@", TokenKind::At),
    (":", TokenKind::Colon),
    ("-", TokenKind::Minus),
    (".", TokenKind::Dot),
    (",", TokenKind::Comma),
    ("(", TokenKind::Lparen),
    (")", TokenKind::Rparen),
    ("[", TokenKind::Lbracket),
    ("]", TokenKind::Rbracket),
    ("{", TokenKind::Lbrace),
    ("}", TokenKind::Rbrace),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
];

/// Escape embedded ABC so fence and comment syntax cannot collide:
/// ```` ``` ```` becomes `` \`\`\` `` and `#` becomes `\#`.
pub fn sanitize(text: &str) -> String {
    text.replace("```", "\\`\\`\\`").replace('#', "\\#")
}

/// Inverse of [`sanitize`].
pub fn desanitize(text: &str) -> String {
    text.replace("\\#", "#").replace("\\`\\`\\`", "```")
}

/// Scan an ABCT source string. Total: lexical problems are recorded on the
/// context and the scan continues.
pub fn scan_abct(source: &str, ctx: &mut SourceContext) -> Vec<Token> {
    AbctScanner {
        cur: Cursor::new(source),
        ctx,
    }
    .run()
}

struct AbctScanner<'s, 'c> {
    cur: Cursor<'s>,
    ctx: &'c mut SourceContext,
}

impl AbctScanner<'_, '_> {
    fn run(mut self) -> Vec<Token> {
        while !self.cur.is_at_end() {
            self.cur.start = self.cur.current;
            let matched = self.newline()
                || self.abc_fence()
                || self.whitespace()
                || self.comment()
                || self.string()
                || self.abc_literal()
                || self.number()
                || self.identifier()
                || self.operator();
            if !matched {
                self.invalid();
            }
        }
        self.cur.start = self.cur.current;
        self.cur.push(TokenKind::Eof, self.ctx);
        self.cur.tokens
    }

    fn newline(&mut self) -> bool {
        if !matches!(self.cur.peek(), Some('\r' | '\n')) {
            return false;
        }
        self.cur.consume_newline();
        self.cur.push(TokenKind::Eol, self.ctx);
        self.cur.line += 1;
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

    fn comment(&mut self) -> bool {
        if self.cur.peek() != Some('#') {
            return false;
        }
        while !matches!(self.cur.peek(), None | Some('\r' | '\n')) {
            self.cur.advance();
        }
        self.cur.push(TokenKind::Comment, self.ctx);
        true
    }

    /// Double-quoted string with backslash escapes. Unterminated strings
    /// are reported but still emitted for recovery.
    fn string(&mut self) -> bool {
        if self.cur.peek() != Some('"') {
            return false;
        }
        let pos = self.cur.pos();
        self.cur.advance();
        loop {
            match self.cur.peek() {
                None | Some('\r' | '\n') => {
                    self.ctx
                        .report(ErrorKind::Scanner, "Unterminated string literal", pos);
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
        self.cur.push(TokenKind::StringLiteral, self.ctx);
        true
    }

    /// Backtick-delimited single-line ABC literal.
    fn abc_literal(&mut self) -> bool {
        if self.cur.peek() != Some('`') {
            return false;
        }
        let pos = self.cur.pos();
        self.cur.advance();
        loop {
            match self.cur.peek() {
                None | Some('\r' | '\n') => {
                    self.ctx
                        .report(ErrorKind::Scanner, "Unterminated ABC literal", pos);
                    break;
                }
                Some('`') => {
                    self.cur.advance();
                    break;
                }
                Some(_) => {
                    self.cur.advance();
                }
            }
        }
        self.cur.push(TokenKind::AbcLiteral, self.ctx);
        true
    }

    /// Fraction before decimal before integer; `/` and `.` only bind
    /// between digits, so `1/` is a number and a pipe-less operator error
    /// elsewhere, and `1.foo` is `1` `.` `foo`.
    fn number(&mut self) -> bool {
        if !matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
            return false;
        }
        while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
            self.cur.advance();
        }
        let next_is_digit = |s: &Self| matches!(s.cur.peek_second(), Some(c) if c.is_ascii_digit());
        if self.cur.peek() == Some('/') && next_is_digit(self) {
            self.cur.advance();
            while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
                self.cur.advance();
            }
        } else if self.cur.peek() == Some('.') && next_is_digit(self) {
            self.cur.advance();
            while matches!(self.cur.peek(), Some(c) if c.is_ascii_digit()) {
                self.cur.advance();
            }
        }
        self.cur.push(TokenKind::Number, self.ctx);
        true
    }

    fn identifier(&mut self) -> bool {
        if !matches!(self.cur.peek(), Some(c) if c.is_ascii_alphabetic() || c == '_') {
            return false;
        }
        while matches!(self.cur.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.cur.advance();
        }
        let kind = KEYWORDS
            .iter()
            .find(|(word, _)| *word == self.cur.pending())
            .map(|(_, kind)| *kind)
            .unwrap_or(TokenKind::Identifier);
        self.cur.push(kind, self.ctx);
        true
    }

    fn operator(&mut self) -> bool {
        for (text, kind) in OPERATORS {
            if self.cur.match_str(text) {
                self.cur.push(kind, self.ctx);
                return true;
            }
        }
        false
    }

    fn invalid(&mut self) {
        let pos = self.cur.pos();
        self.cur.advance();
        let message = format!("Unexpected character '{}'", self.cur.pending());
        self.cur.push(TokenKind::Invalid, self.ctx);
        self.ctx.report(ErrorKind::Scanner, message, pos);
    }

    /// Fenced ABC literal. The opening line (with its newline) is one
    /// token, the raw body is one token (omitted when empty), the closing
    /// line is one token. Reaching end of input inside the fence still
    /// emits the partial body.
    fn abc_fence(&mut self) -> bool {
        if !self.cur.at_line_start() {
            return false;
        }
        let open_len = match fence_open_len(self.cur.rest()) {
            Some(len) => len,
            None => return false,
        };
        let pos = self.cur.pos();
        let had_newline = self.cur.source[self.cur.start..self.cur.start + open_len].ends_with(['\n', '\r']);
        self.cur.current += open_len;
        self.cur.push(TokenKind::AbcFenceOpen, self.ctx);
        if had_newline {
            self.cur.line += 1;
            self.cur.line_start = self.cur.current;
        }

        let content_start = self.cur.current;
        let content_line = self.cur.line;
        loop {
            if self.cur.is_at_end() {
                self.push_content(content_start, content_line);
                self.ctx.report(
                    ErrorKind::Scanner,
                    "Unterminated ABC fence, expected closing ```",
                    pos,
                );
                return true;
            }
            if let Some(close_len) = fence_close_len(self.cur.rest()) {
                self.push_content(content_start, content_line);
                self.cur.current += close_len;
                self.cur.push(TokenKind::AbcFenceClose, self.ctx);
                return true;
            }
            while !matches!(self.cur.peek(), None | Some('\r' | '\n')) {
                self.cur.advance();
            }
            if self.cur.consume_newline() {
                self.cur.line += 1;
                self.cur.line_start = self.cur.current;
            }
        }
    }

    /// Emit the accumulated fence body, if any, stamped at the line where
    /// it began.
    fn push_content(&mut self, content_start: usize, content_line: usize) {
        if self.cur.current == content_start {
            self.cur.start = self.cur.current;
            return;
        }
        let token = Token {
            kind: TokenKind::AbcContent,
            lexeme: self.cur.source[content_start..self.cur.current].to_string(),
            line: content_line,
            column: 0,
            offset: content_start,
            id: self.ctx.next_id(),
        };
        self.cur.tokens.push(token);
        self.cur.start = self.cur.current;
    }
}

/// Byte length of a fence-open line including its newline, or `None` if
/// the text at line start is not a fence open.
fn fence_open_len(rest: &str) -> Option<usize> {
    let mut i = leading_blanks(rest);
    if !rest[i..].starts_with("```") {
        return None;
    }
    i += 3;
    if rest[i..].starts_with("abc") {
        i += 3;
        if rest[i..].starts_with(':') {
            i = fence_location_len(rest, i + 1)?;
        }
    }
    i += leading_blanks(&rest[i..]);
    line_end_len(&rest[i..]).map(|n| i + n)
}

/// `L[:C][-L[:C]]` starting at `i`; returns the index after the suffix.
fn fence_location_len(rest: &str, i: usize) -> Option<usize> {
    let mut i = digits_len(rest, i)?;
    if rest[i..].starts_with(':') {
        i = digits_len(rest, i + 1)?;
    }
    if rest[i..].starts_with('-') {
        i = digits_len(rest, i + 1)?;
        if rest[i..].starts_with(':') {
            i = digits_len(rest, i + 1)?;
        }
    }
    Some(i)
}

fn digits_len(rest: &str, i: usize) -> Option<usize> {
    let n = rest[i..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len() - i);
    if n == 0 {
        None
    } else {
        Some(i + n)
    }
}

fn leading_blanks(s: &str) -> usize {
    s.find(|c: char| c != ' ' && c != '\t').unwrap_or(s.len())
}

/// `0` for end of input, otherwise the newline length, or `None` when the
/// line continues.
fn line_end_len(rest: &str) -> Option<usize> {
    if rest.is_empty() {
        Some(0)
    } else if rest.starts_with("\r\n") {
        Some(2)
    } else if rest.starts_with('\n') || rest.starts_with('\r') {
        Some(1)
    } else {
        None
    }
}

/// Byte length of a close-fence line excluding its newline, or `None` if
/// the line at the cursor is not a close.
fn fence_close_len(rest: &str) -> Option<usize> {
    let mut i = leading_blanks(rest);
    if !rest[i..].starts_with("```") {
        return None;
    }
    i += 3;
    i += leading_blanks(&rest[i..]);
    line_end_len(&rest[i..]).map(|_| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn scan_str(source: &str) -> (Vec<Token>, SourceContext) {
        let mut ctx = SourceContext::new();
        let tokens = scan_abct(source, &mut ctx);
        (tokens, ctx)
    }

    #[test]
    fn test_fence_three_tokens() {
        let (tokens, ctx) = scan_str("```abc\nCDEF GABc\n```");
        assert!(!ctx.has_errors());
        let pairs: Vec<(TokenKind, &str)> =
            tokens.iter().map(|t| (t.kind, t.lexeme.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                (TokenKind::AbcFenceOpen, "```abc\n"),
                (TokenKind::AbcContent, "CDEF GABc\n"),
                (TokenKind::AbcFenceClose, "```"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn test_fence_with_location_suffix() {
        let (tokens, ctx) = scan_str("```abc:3:1-5:2\nCDE\n```\n");
        assert!(!ctx.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::AbcFenceOpen);
        assert_eq!(tokens[0].lexeme, "```abc:3:1-5:2\n");
        assert_eq!(tokens[3].kind, TokenKind::Eol);
    }

    #[test]
    fn test_empty_fence_omits_content_token() {
        let (tokens, _) = scan_str("```abc\n```");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::AbcFenceOpen, TokenKind::AbcFenceClose, TokenKind::Eof]
        );
    }

    #[test]
    fn test_inline_backticks_are_content() {
        let (tokens, _) = scan_str("```abc\nCDE ``` FGA\n```");
        let content = tokens
            .iter()
            .find(|t| t.kind == TokenKind::AbcContent)
            .unwrap();
        assert_eq!(content.lexeme, "CDE ``` FGA\n");
    }

    #[test]
    fn test_unterminated_fence_keeps_partial_content() {
        let (tokens, ctx) = scan_str("```abc\nCDEF\nGAB");
        assert!(ctx.has_errors());
        assert!(ctx.reporter.errors()[0]
            .message
            .contains("Unterminated ABC fence"));
        let content = tokens
            .iter()
            .find(|t| t.kind == TokenKind::AbcContent)
            .unwrap();
        assert_eq!(content.lexeme, "CDEF\nGAB");
    }

    #[test]
    fn test_indented_close_fence() {
        let (tokens, ctx) = scan_str("```abc\nCDE\n  ```  \n");
        assert!(!ctx.has_errors());
        let close = tokens
            .iter()
            .find(|t| t.kind == TokenKind::AbcFenceClose)
            .unwrap();
        assert_eq!(close.lexeme, "  ```  ");
    }

    #[test]
    fn test_keyword_stream() {
        let (tokens, _) = scan_str("@notes and @rests or not @chords");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::At,
                TokenKind::Identifier,
                TokenKind::Ws,
                TokenKind::And,
                TokenKind::Ws,
                TokenKind::At,
                TokenKind::Identifier,
                TokenKind::Ws,
                TokenKind::Or,
                TokenKind::Ws,
                TokenKind::Not,
                TokenKind::Ws,
                TokenKind::At,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_need_exact_lexeme() {
        for source in ["andromeda", "orchid", "letter", "iffy", "loads"] {
            let (tokens, _) = scan_str(source);
            assert_eq!(tokens[0].kind, TokenKind::Identifier, "{source}");
        }
        let (tokens, _) = scan_str("match");
        assert_eq!(tokens[0].kind, TokenKind::Match);
    }

    #[test]
    fn test_fraction_is_one_token() {
        let (tokens, _) = scan_str("1/2");
        assert_eq!(kinds(&tokens), vec![TokenKind::Number, TokenKind::Eof]);
        assert_eq!(tokens[0].lexeme, "1/2");
    }

    #[test]
    fn test_decimal_and_integer() {
        let (tokens, _) = scan_str("3.14 42");
        assert_eq!(tokens[0].lexeme, "3.14");
        assert_eq!(tokens[2].lexeme, "42");
    }

    #[test]
    fn test_leading_minus_is_an_operator() {
        let (tokens, _) = scan_str("-3");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Minus, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn test_maximal_munch_operators() {
        let (tokens, _) = scan_str("|= => == != <= >= | = < >");
        let ops: Vec<TokenKind> = tokens
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::Ws | TokenKind::Eof))
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            ops,
            vec![
                TokenKind::PipeEq,
                TokenKind::Arrow,
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Pipe,
                TokenKind::Equal,
                TokenKind::Less,
                TokenKind::Greater,
            ]
        );
    }

    #[test]
    fn test_string_with_escape() {
        let (tokens, ctx) = scan_str(r#""say \"hi\"" x"#);
        assert!(!ctx.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].lexeme, r#""say \"hi\"""#);
    }

    #[test]
    fn test_unterminated_string_still_emitted() {
        let (tokens, ctx) = scan_str("\"oops\nx");
        assert!(ctx.has_errors());
        assert!(ctx.reporter.errors()[0]
            .message
            .contains("Unterminated string literal"));
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].lexeme, "\"oops");
    }

    #[test]
    fn test_comment_to_end_of_line() {
        let (tokens, _) = scan_str("x # a comment\ny");
        let comment = tokens.iter().find(|t| t.kind == TokenKind::Comment).unwrap();
        assert_eq!(comment.lexeme, "# a comment");
    }

    #[test]
    fn test_round_trip() {
        let source = "let beats = 1/2 # halves\n```abc:2\nX:1\nK:C\nCDEF|\n```\n@notes |= transpose(3) => out\n";
        let (tokens, _) = scan_str(source);
        assert_eq!(Token::join(&tokens), source);
    }

    #[test]
    fn test_sanitize_round_trip() {
        let cases = [
            "plain",
            "with # hash",
            "with ``` fence",
            "mixed # and ``` and #",
            "",
            "\\# already escaped",
        ];
        for case in cases {
            assert_eq!(desanitize(&sanitize(case)), case, "{case:?}");
        }
    }

    #[test]
    fn test_sanitize_escapes() {
        assert_eq!(sanitize("a```b"), "a\\`\\`\\`b");
        assert_eq!(sanitize("a#b"), "a\\#b");
        assert_eq!(desanitize("a\\#b"), "a#b");
    }
}
