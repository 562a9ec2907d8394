//! # Semantic Analyzer
//!
//! A visitor over the parsed tree that materializes typed semantic data,
//! keyed by node id, and validates directive and info-line parameters.
//!
//! For each node the analyzer may write one [`SemanticData`] entry, emit
//! diagnostics, and recurse. Dispatch is keyed by the header token's exact
//! lexeme: info lines by their field letter, directives by their key word
//! (see [`directives`]). A node whose parameters fail validation gets no
//! entry; the syntactic node stays in the tree and consumers handle the
//! absence.
//!
//! Context rules enforced here: `K:` and `M:` are rejected in the file
//! header (the nodes still parse), and repeated `V:` declarations of one
//! id merge with later values winning per property.

mod directives;

use std::collections::HashMap;

use crate::context::SourceContext;
use crate::error::{Diagnostic, ErrorKind, Position};
use crate::expr::*;
use crate::semantics::*;
use crate::token::{Token, TokenKind};

/// Analyze a parsed file. Total: problems are recorded on the context and
/// the walk continues.
pub fn analyze(ast: &FileStructure, ctx: &mut SourceContext) -> SemanticMap {
    let mut analyzer = Analyzer {
        ctx,
        map: HashMap::new(),
        in_file_header: false,
        voice_state: HashMap::new(),
    };
    analyzer.visit_file_structure(ast);
    analyzer.map
}

pub(crate) struct Analyzer<'c> {
    pub(crate) ctx: &'c mut SourceContext,
    map: SemanticMap,
    in_file_header: bool,
    voice_state: HashMap<String, VoiceInfo>,
}

impl Analyzer<'_> {
    fn token_pos(token: &Token) -> Position {
        Position::new(token.line, token.column, token.offset)
    }

    pub(crate) fn error(&mut self, node_id: u32, at: &Token, message: impl Into<String>) {
        self.ctx.reporter.report(
            Diagnostic::new(ErrorKind::Analyzer, message, Self::token_pos(at)).with_node(node_id),
        );
    }

    fn context_error(&mut self, node_id: u32, at: &Token, message: impl Into<String>) {
        self.ctx.reporter.report(
            Diagnostic::new(ErrorKind::Interpreter, message, Self::token_pos(at))
                .with_node(node_id),
        );
    }

    pub(crate) fn record(&mut self, node_id: u32, data: SemanticData) {
        self.map.insert(node_id, data);
    }

    // ----------------------------------------------------------- info lines

    fn analyze_info_line(&mut self, line: &InfoLine) {
        let field = line.key.lexeme.chars().next().unwrap_or('\0');
        match field {
            'K' => {
                if self.in_file_header {
                    self.context_error(line.id, &line.key, "K: not allowed in file header");
                }
                self.analyze_key(line);
            }
            'M' => {
                if self.in_file_header {
                    self.context_error(line.id, &line.key, "M: not allowed in file header");
                }
                self.analyze_meter(line);
            }
            'L' => self.analyze_note_length(line),
            'Q' => self.analyze_tempo(line),
            'V' => self.analyze_voice(line),
            'T' => self.analyze_text(line, SemanticData::Title),
            'C' => self.analyze_text(line, SemanticData::Composer),
            'O' => self.analyze_text(line, SemanticData::Origin),
            'X' => self.analyze_reference(line),
            // free-text fields with no semantic payload
            'A' | 'B' | 'D' | 'F' | 'G' | 'H' | 'I' | 'N' | 'P' | 'R' | 'S' | 'U' | 'W' | 'Z'
            | 'm' | 'r' | 's' | 'w' => {}
            _ => {
                let message = format!("Unknown info line key '{}'", line.key.lexeme);
                self.error(line.id, &line.key, message);
            }
        }
    }

    fn analyze_key(&mut self, line: &InfoLine) {
        let mut signature = KeySignature {
            root: KeyRoot::None,
            acc: None,
            mode: Mode::Major,
            accidentals: Vec::new(),
        };
        let mut clef: Option<ClefInfo> = None;
        let mut have_root = false;

        for child in &line.value {
            match child {
                Expr::Token(t) => match t.kind {
                    TokenKind::KeyRoot => {
                        let letter = t.lexeme.chars().next().unwrap_or('\0');
                        if let Some(root) = KeyRoot::from_letter(letter) {
                            signature.root = root;
                            have_root = true;
                        }
                    }
                    TokenKind::KeyAccidental => {
                        signature.acc = match t.lexeme.as_str() {
                            "#" => Some(KeyAcc::Sharp),
                            "b" => Some(KeyAcc::Flat),
                            _ => None,
                        };
                    }
                    TokenKind::KeyMode => {
                        if let Some(mode) = Mode::from_name(&t.lexeme) {
                            signature.mode = mode;
                        } else {
                            let message = format!("Unknown mode '{}'", t.lexeme);
                            self.error(line.id, t, message);
                        }
                    }
                    TokenKind::KeyExplicitAcc => signature.accidentals.push(t.lexeme.clone()),
                    TokenKind::KeyNone => {
                        signature.root = KeyRoot::None;
                        have_root = true;
                    }
                    TokenKind::KeyHp => {
                        signature.root = KeyRoot::Hp;
                        have_root = true;
                    }
                    TokenKind::ClefName => {
                        self.apply_clef_name(&mut clef, line.id, t);
                    }
                    TokenKind::ClefNum => {
                        clef.get_or_insert_with(ClefInfo::default).line =
                            t.lexeme.parse::<u8>().ok();
                    }
                    TokenKind::ClefOctave => {
                        clef.get_or_insert_with(ClefInfo::default).octave_shift =
                            if t.lexeme.starts_with('-') { -8 } else { 8 };
                    }
                    _ => {}
                },
                Expr::KeyValue(kv) => self.apply_clef_modifier(&mut clef, line.id, kv),
                _ => {}
            }
        }

        if !have_root && signature.accidentals.is_empty() {
            self.error(line.id, &line.key, "Missing key signature in K: field");
            return;
        }
        self.record(line.id, SemanticData::Key(KeyInfo { signature, clef }));
    }

    /// Unknown clef names fall back to treble.
    fn apply_clef_name(&mut self, clef: &mut Option<ClefInfo>, _node_id: u32, token: &Token) {
        let kind = ClefKind::from_name(&token.lexeme).unwrap_or(ClefKind::Treble);
        clef.get_or_insert_with(ClefInfo::default).kind = kind;
    }

    /// `clef=`, `middle=`, `transpose=`, `stafflines=`, `staffscale=`,
    /// `style=` on a K: line.
    fn apply_clef_modifier(&mut self, clef: &mut Option<ClefInfo>, node_id: u32, kv: &KeyValue) {
        let target = clef.get_or_insert_with(ClefInfo::default);
        match kv.key.lexeme.to_ascii_lowercase().as_str() {
            "clef" => {
                if let Expr::Token(t) = &*kv.value {
                    target.kind = ClefKind::from_name(&t.lexeme).unwrap_or(ClefKind::Treble);
                }
            }
            "middle" => target.middle = Some(expr_text(&kv.value)),
            "transpose" => match number_of(&kv.value) {
                Some(v) => target.transpose = Some(v),
                None => self.error(node_id, &kv.key, "Expected a number after 'transpose='"),
            },
            "stafflines" => match number_of(&kv.value) {
                Some(v) if v >= 0.0 => target.stafflines = Some(v as u8),
                _ => self.error(node_id, &kv.key, "Expected a number after 'stafflines='"),
            },
            "staffscale" => match number_of(&kv.value) {
                Some(v) => target.staffscale = Some(v),
                None => self.error(node_id, &kv.key, "Expected a number after 'staffscale='"),
            },
            "style" => target.style = Some(expr_text(&kv.value)),
            other => {
                let message = format!("Unknown modifier '{other}' in K: field");
                self.error(node_id, &kv.key, message);
            }
        }
    }

    fn analyze_meter(&mut self, line: &InfoLine) {
        for child in &line.value {
            match child {
                Expr::Token(t) if t.kind == TokenKind::MeterC => {
                    self.record(
                        line.id,
                        SemanticData::Meter(MeterInfo {
                            meter_type: MeterType::CommonTime,
                            numerator: 4,
                            denominator: 4,
                        }),
                    );
                    return;
                }
                Expr::Token(t) if t.kind == TokenKind::MeterCBar => {
                    self.record(
                        line.id,
                        SemanticData::Meter(MeterInfo {
                            meter_type: MeterType::CutTime,
                            numerator: 2,
                            denominator: 2,
                        }),
                    );
                    return;
                }
                // `M:none`: free meter, no semantic entry
                Expr::Token(t) if t.kind == TokenKind::InfoIdent => return,
                Expr::Binary(b) if b.op.kind == TokenKind::MeterSeparator => {
                    match (meter_sum(&b.lhs), meter_sum(&b.rhs)) {
                        (Some(numerator), Some(denominator)) if denominator > 0 => {
                            self.record(
                                line.id,
                                SemanticData::Meter(MeterInfo {
                                    meter_type: MeterType::Specified,
                                    numerator,
                                    denominator,
                                }),
                            );
                        }
                        _ => self.error(line.id, &line.key, "Invalid meter in M: field"),
                    }
                    return;
                }
                Expr::Token(t) if t.kind == TokenKind::MeterNumber => {
                    self.error(line.id, &line.key, "Missing denominator in M: field");
                    return;
                }
                _ => {}
            }
        }
    }

    fn analyze_note_length(&mut self, line: &InfoLine) {
        for child in &line.value {
            if let Expr::Rational(r) = child {
                let numerator = r.numerator.lexeme.parse::<u32>().ok();
                let denominator = r.denominator.lexeme.parse::<u32>().ok();
                match (numerator, denominator) {
                    (Some(n), Some(d)) if d > 0 && n <= d => {
                        self.record(
                            line.id,
                            SemanticData::NoteLength(NoteLengthInfo {
                                numerator: n,
                                denominator: d,
                            }),
                        );
                    }
                    _ => self.error(line.id, &line.key, "Invalid note length in L: field"),
                }
                return;
            }
        }
        self.error(line.id, &line.key, "Expected a fraction in L: field");
    }

    fn analyze_tempo(&mut self, line: &InfoLine) {
        let mut tempo = TempoInfo::default();
        let mut seen_value = false;
        let mut valid = true;
        for child in &line.value {
            match child {
                Expr::Token(t) if t.kind == TokenKind::InfoString => {
                    let text = unquote(&t.lexeme);
                    if seen_value {
                        tempo.post_string = Some(text);
                    } else {
                        tempo.pre_string = Some(text);
                    }
                }
                Expr::Token(t) if t.kind == TokenKind::InfoNumber => {
                    seen_value = true;
                    match t.lexeme.parse::<u32>() {
                        Ok(bpm) => tempo.bpm = Some(bpm),
                        Err(_) => {
                            self.error(line.id, t, "Invalid tempo in Q: field");
                            valid = false;
                        }
                    }
                }
                Expr::Rational(r) => {
                    seen_value = true;
                    match rational_pair(r) {
                        Some(pair) => tempo.duration = Some(pair),
                        None => {
                            self.error(line.id, &r.numerator, "Invalid duration in Q: field");
                            valid = false;
                        }
                    }
                }
                Expr::Binary(b) if b.op.kind == TokenKind::InfoEquals => {
                    seen_value = true;
                    match &*b.lhs {
                        Expr::Rational(r) => match rational_pair(r) {
                            Some(pair) => tempo.duration = Some(pair),
                            None => {
                                self.error(line.id, &r.numerator, "Invalid duration in Q: field");
                                valid = false;
                            }
                        },
                        _ => {
                            self.error(line.id, &b.op, "Expected a duration before '='");
                            valid = false;
                        }
                    }
                    if let Expr::Token(t) = &*b.rhs {
                        match t.lexeme.parse::<u32>() {
                            Ok(bpm) => tempo.bpm = Some(bpm),
                            Err(_) => {
                                self.error(line.id, t, "Invalid tempo in Q: field");
                                valid = false;
                            }
                        }
                    }
                }
                Expr::Error(_) => valid = false,
                _ => {}
            }
        }
        if !valid {
            return;
        }
        if tempo.bpm.is_none()
            && tempo.duration.is_none()
            && tempo.pre_string.is_none()
            && tempo.post_string.is_none()
        {
            self.error(line.id, &line.key, "Empty Q: field");
            return;
        }
        self.record(line.id, SemanticData::Tempo(tempo));
    }

    fn analyze_voice(&mut self, line: &InfoLine) {
        let id_token = line.value.iter().find_map(|e| match e {
            Expr::Token(t) if t.kind == TokenKind::VoiceId => Some(t),
            _ => None,
        });
        let id_token = match id_token {
            Some(t) => t.clone(),
            None => {
                self.error(line.id, &line.key, "Missing voice id in V: field");
                return;
            }
        };
        // later declarations of the same id override per property
        let mut voice = self
            .voice_state
            .get(&id_token.lexeme)
            .cloned()
            .unwrap_or_else(|| VoiceInfo {
                id: id_token.lexeme.clone(),
                ..VoiceInfo::default()
            });
        let mut clef = voice.clef.take();
        for child in &line.value {
            match child {
                Expr::KeyValue(kv) => {
                    let name = kv.key.lexeme.to_ascii_lowercase();
                    match name.as_str() {
                        "clef" | "middle" | "stafflines" | "staffscale" | "style" => {
                            self.apply_clef_modifier(&mut clef, line.id, kv)
                        }
                        "name" | "nm" => voice.name = Some(expr_text(&kv.value)),
                        "octave" => match number_of(&kv.value) {
                            Some(v) => voice.octave = Some(v as i32),
                            None => {
                                self.error(line.id, &kv.key, "Expected a number after 'octave='")
                            }
                        },
                        "transpose" => match number_of(&kv.value) {
                            Some(v) => voice.transpose = Some(v as i32),
                            None => self.error(
                                line.id,
                                &kv.key,
                                "Expected a number after 'transpose='",
                            ),
                        },
                        _ => {
                            voice.properties.insert(name, expr_text(&kv.value));
                        }
                    }
                }
                Expr::Token(t) if t.kind == TokenKind::ClefNum => {
                    clef.get_or_insert_with(ClefInfo::default).line = t.lexeme.parse::<u8>().ok();
                }
                Expr::Token(t) if t.kind == TokenKind::ClefOctave => {
                    clef.get_or_insert_with(ClefInfo::default).octave_shift =
                        if t.lexeme.starts_with('-') { -8 } else { 8 };
                }
                _ => {}
            }
        }
        voice.clef = clef;
        self.voice_state
            .insert(id_token.lexeme.clone(), voice.clone());
        self.record(line.id, SemanticData::Voice(voice));
    }

    fn analyze_text(&mut self, line: &InfoLine, make: fn(String) -> SemanticData) {
        let text: String = line
            .value
            .iter()
            .filter_map(|e| match e {
                Expr::Token(t) if t.kind == TokenKind::InfoText => Some(t.lexeme.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.record(line.id, make(trimmed.to_string()));
    }

    fn analyze_reference(&mut self, line: &InfoLine) {
        let number = line.value.iter().find_map(|e| match e {
            Expr::Token(t) if t.kind == TokenKind::InfoNumber => t.lexeme.parse::<u32>().ok(),
            _ => None,
        });
        match number {
            Some(n) => self.record(line.id, SemanticData::Reference(n)),
            None => self.error(line.id, &line.key, "Missing tune number in X: field"),
        }
    }
}

/// Sum of the numerators in a meter sub-expression: numbers, `+` chains
/// and parenthesized groups.
fn meter_sum(expr: &Expr) -> Option<u32> {
    match expr {
        Expr::Token(t) if t.kind == TokenKind::MeterNumber => t.lexeme.parse::<u32>().ok(),
        Expr::Binary(b) if b.op.kind == TokenKind::MeterPlus => {
            Some(meter_sum(&b.lhs)? + meter_sum(&b.rhs)?)
        }
        Expr::Grouping(g) => meter_sum(&g.inner),
        _ => None,
    }
}

fn rational_pair(r: &crate::expr::Rational) -> Option<(u32, u32)> {
    let numerator = r.numerator.lexeme.parse::<u32>().ok()?;
    let denominator = r.denominator.lexeme.parse::<u32>().ok()?;
    if denominator == 0 {
        return None;
    }
    Some((numerator, denominator))
}

/// Flatten an info-value expression to display text.
fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Token(t) => unquote(&t.lexeme),
        Expr::AbsolutePitch(p) => {
            let mut text = String::new();
            if let Some(acc) = &p.accidental {
                text.push_str(&acc.lexeme);
            }
            text.push_str(&p.note.lexeme);
            for o in &p.octaves {
                text.push_str(&o.lexeme);
            }
            text
        }
        _ => String::new(),
    }
}

fn number_of(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Token(t) => t.lexeme.parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn unquote(lexeme: &str) -> String {
    let inner = lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme);
    inner.replace("\\\"", "\"")
}

impl Visitor<()> for Analyzer<'_> {
    fn visit_file_structure(&mut self, expr: &FileStructure) {
        if let Some(header) = &expr.header {
            self.in_file_header = true;
            self.visit_file_header(header);
            self.in_file_header = false;
        }
        for child in &expr.contents {
            child.accept(self);
        }
    }

    fn visit_file_header(&mut self, expr: &FileHeader) {
        for child in &expr.contents {
            child.accept(self);
        }
    }

    fn visit_tune(&mut self, expr: &Tune) {
        self.visit_tune_header(&expr.header);
        if let Some(body) = &expr.body {
            self.visit_tune_body(body);
        }
    }

    fn visit_tune_header(&mut self, expr: &TuneHeader) {
        for child in &expr.info_lines {
            child.accept(self);
        }
    }

    fn visit_tune_body(&mut self, expr: &TuneBody) {
        for system in &expr.systems {
            for child in system {
                child.accept(self);
            }
        }
    }

    fn visit_info_line(&mut self, expr: &InfoLine) {
        self.analyze_info_line(expr);
    }

    fn visit_directive(&mut self, expr: &Directive) {
        self.analyze_directive(expr);
    }

    fn visit_comment(&mut self, _expr: &Comment) {}

    fn visit_lyric_line(&mut self, _expr: &LyricLine) {}

    fn visit_lyric_section(&mut self, expr: &LyricSection) {
        for child in &expr.lines {
            child.accept(self);
        }
    }

    fn visit_pitch(&mut self, _expr: &Pitch) {}

    fn visit_note(&mut self, _expr: &Note) {}

    fn visit_rest(&mut self, _expr: &Rest) {}

    fn visit_multi_measure_rest(&mut self, _expr: &MultiMeasureRest) {}

    fn visit_rhythm(&mut self, _expr: &Rhythm) {}

    fn visit_chord(&mut self, expr: &Chord) {
        for child in &expr.contents {
            child.accept(self);
        }
    }

    fn visit_bar_line(&mut self, _expr: &BarLine) {}

    fn visit_grace_group(&mut self, expr: &GraceGroup) {
        for child in &expr.notes {
            child.accept(self);
        }
    }

    fn visit_tuplet(&mut self, _expr: &Tuplet) {}

    fn visit_decoration(&mut self, _expr: &Decoration) {}

    fn visit_annotation(&mut self, _expr: &Annotation) {}

    fn visit_symbol(&mut self, _expr: &Symbol) {}

    fn visit_y_spacer(&mut self, _expr: &YSpacer) {}

    fn visit_inline_field(&mut self, expr: &InlineField) {
        self.analyze_info_line(&expr.field);
    }

    fn visit_voice_overlay(&mut self, _expr: &VoiceOverlay) {}

    fn visit_beam(&mut self, expr: &Beam) {
        for child in &expr.contents {
            child.accept(self);
        }
    }

    fn visit_key_value(&mut self, _expr: &KeyValue) {}

    fn visit_binary(&mut self, _expr: &Binary) {}

    fn visit_grouping(&mut self, _expr: &Grouping) {}

    fn visit_rational(&mut self, _expr: &Rational) {}

    fn visit_measurement(&mut self, _expr: &Measurement) {}

    fn visit_absolute_pitch(&mut self, _expr: &AbsolutePitch) {}

    fn visit_error(&mut self, _expr: &ErrorExpr) {}

    fn visit_token(&mut self, _token: &Token) {}
}
