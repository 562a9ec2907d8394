//! Stylesheet-directive analysis.
//!
//! Dispatch is exhaustive by key: every `%%` directive either lands in one
//! of the typed categories below, is a reserved key that reports "not
//! implemented", or is unknown and reported as such. Invalid parameters
//! are reported and leave no semantic entry, except where a rule says the
//! parse proceeds (a stray `box` on a non-box font).

use crate::expr::{Directive, Expr};
use crate::semantics::*;
use crate::token::{Token, TokenKind};

use super::{unquote, Analyzer};

/// Fonts that accept a trailing `box` parameter.
const FONT_BOX_KEYS: [&str; 14] = [
    "titlefont",
    "gchordfont",
    "composerfont",
    "subtitlefont",
    "voicefont",
    "partsfont",
    "textfont",
    "annotationfont",
    "historyfont",
    "infofont",
    "measurefont",
    "barlabelfont",
    "barnumberfont",
    "barnumfont",
];

const FONT_PLAIN_KEYS: [&str; 10] = [
    "tempofont",
    "footerfont",
    "headerfont",
    "tripletfont",
    "vocalfont",
    "repeatfont",
    "wordsfont",
    "tablabelfont",
    "tabnumberfont",
    "tabgracefont",
];

const BOOLEAN_FLAG_KEYS: [&str; 16] = [
    "bagpipes",
    "flatbeams",
    "jazzchords",
    "accentAbove",
    "germanAlphabet",
    "landscape",
    "titlecaps",
    "titleleft",
    "measurebox",
    "continueall",
    "begintext",
    "endtext",
    "beginps",
    "endps",
    "font",
    "nobarcheck",
];

const IDENTIFIER_KEYS: [&str; 6] = [
    "papersize",
    "map",
    "playtempo",
    "auquality",
    "continuous",
    "voicecolor",
];

const BOOLEAN_VALUE_KEYS: [&str; 5] = [
    "graceslurs",
    "staffnonote",
    "printtempo",
    "partsbox",
    "freegchord",
];

const NUMBER_KEYS: [&str; 4] = ["lineThickness", "voicescale", "scale", "fontboxpadding"];

const POSITION_KEYS: [&str; 5] = ["vocal", "dynamic", "gchord", "ornament", "volume"];

const MEASUREMENT_KEYS: [&str; 24] = [
    "botmargin",
    "botspace",
    "composerspace",
    "indent",
    "leftmargin",
    "linesep",
    "musicspace",
    "partsspace",
    "pageheight",
    "pagewidth",
    "rightmargin",
    "stafftopmargin",
    "staffsep",
    "staffwidth",
    "subtitlespace",
    "sysstaffsep",
    "systemsep",
    "textspace",
    "titlespace",
    "topmargin",
    "topspace",
    "vocalspace",
    "wordsspace",
    "vskip",
];

const ANNOTATION_KEYS: [&str; 7] = [
    "text",
    "center",
    "abc-copyright",
    "abc-creator",
    "abc-edited-by",
    "abc-version",
    "abc-charset",
];

/// Declared in the dispatch table but deliberately unimplemented.
const RESERVED_KEYS: [&str; 8] = [
    "setfont", "staves", "score", "header", "footer", "midi", "percmap", "deco",
];

impl Analyzer<'_> {
    pub(super) fn analyze_directive(&mut self, directive: &Directive) {
        let key = match &directive.key {
            Some(key) => key.clone(),
            // a bare `%%` was already reported by the parser
            None => return,
        };
        let params: Vec<&Token> = directive
            .value
            .iter()
            .filter_map(|e| match e {
                Expr::Token(t) if t.kind != TokenKind::Ws => Some(t),
                _ => None,
            })
            .collect();
        let name = key.lexeme.as_str();
        match name {
            n if FONT_BOX_KEYS.contains(&n) => self.font(directive, &key, &params, true),
            n if FONT_PLAIN_KEYS.contains(&n) => self.font(directive, &key, &params, false),
            n if BOOLEAN_FLAG_KEYS.contains(&n) => self.boolean_flag(directive, &key, &params),
            n if IDENTIFIER_KEYS.contains(&n) => self.identifier(directive, &key, &params),
            n if BOOLEAN_VALUE_KEYS.contains(&n) => self.boolean_value(directive, &key, &params),
            n if NUMBER_KEYS.contains(&n) => self.number(directive, &key, &params, None, None),
            "stretchlast" => self.number(directive, &key, &params, Some(0.0), Some(1.0)),
            "barsperstaff" | "setbarnb" => self.number(directive, &key, &params, Some(1.0), None),
            "measurenb" | "barnumbers" => self.number(directive, &key, &params, Some(0.0), None),
            n if POSITION_KEYS.contains(&n) => self.position(directive, &key, &params),
            n if MEASUREMENT_KEYS.contains(&n) => self.measurement(directive, &key, &params),
            "sep" => self.sep(directive, &key, &params),
            n if ANNOTATION_KEYS.contains(&n) => self.annotation(directive, &params),
            "newpage" => self.newpage(directive, &key, &params),
            n if RESERVED_KEYS.contains(&n) => {
                let message = format!("Directive '{n}' is not implemented");
                self.error(directive.id, &key, message);
            }
            n => {
                let message = format!("Unknown directive '{n}'");
                self.error(directive.id, &key, message);
            }
        }
    }

    fn boolean_flag(&mut self, directive: &Directive, key: &Token, params: &[&Token]) {
        if let Some(extra) = params.first() {
            let message = format!(
                "Directive '{}' takes no parameters, found '{}'",
                key.lexeme, extra.lexeme
            );
            self.error(directive.id, extra, message);
            return;
        }
        self.record(directive.id, SemanticData::BooleanFlag(true));
    }

    fn identifier(&mut self, directive: &Directive, key: &Token, params: &[&Token]) {
        match params {
            [value] if value.kind == TokenKind::InfoIdent => {
                self.record(
                    directive.id,
                    SemanticData::Identifier(value.lexeme.clone()),
                );
            }
            _ => {
                let message = format!("Directive '{}' expects one identifier", key.lexeme);
                self.error(directive.id, key, message);
            }
        }
    }

    fn boolean_value(&mut self, directive: &Directive, key: &Token, params: &[&Token]) {
        let value = match params {
            [value] => match value.lexeme.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        match value {
            Some(v) => self.record(directive.id, SemanticData::BooleanValue(v)),
            None => {
                let message = format!("Directive '{}' expects true or false", key.lexeme);
                self.error(directive.id, key, message);
            }
        }
    }

    fn number(
        &mut self,
        directive: &Directive,
        key: &Token,
        params: &[&Token],
        min: Option<f64>,
        max: Option<f64>,
    ) {
        let value = match params {
            [value] => value.lexeme.parse::<f64>().ok(),
            _ => None,
        };
        let value = match value {
            Some(v) => v,
            None => {
                let message = format!("Directive '{}' expects one number", key.lexeme);
                self.error(directive.id, key, message);
                return;
            }
        };
        if let Some(min) = min {
            if value < min {
                let message = format!("Number {value} is below minimum {min}");
                self.error(directive.id, key, message);
                return;
            }
        }
        if let Some(max) = max {
            if value > max {
                let message = format!("Number {value} is above maximum {max}");
                self.error(directive.id, key, message);
                return;
            }
        }
        self.record(directive.id, SemanticData::Number(value));
    }

    fn position(&mut self, directive: &Directive, key: &Token, params: &[&Token]) {
        let choice = match params {
            [value] => PositionChoice::from_name(&value.lexeme),
            _ => None,
        };
        match choice {
            Some(p) => self.record(directive.id, SemanticData::Position(p)),
            None => {
                let message = format!(
                    "Directive '{}' expects auto, above, below or hidden",
                    key.lexeme
                );
                self.error(directive.id, key, message);
            }
        }
    }

    fn measurement(&mut self, directive: &Directive, key: &Token, params: &[&Token]) {
        let parsed = match params {
            [number] => number.lexeme.parse::<f64>().ok().map(|v| (v, None)),
            [number, unit] => match (
                number.lexeme.parse::<f64>().ok(),
                MeasureUnit::from_name(&unit.lexeme),
            ) {
                (Some(v), Some(u)) => Some((v, Some(u))),
                _ => None,
            },
            _ => None,
        };
        match parsed {
            Some((value, unit)) => self.record(
                directive.id,
                SemanticData::Measurement(MeasurementValue { value, unit }),
            ),
            None => {
                let message = format!(
                    "Directive '{}' expects a number with an optional pt/in/cm/mm unit",
                    key.lexeme
                );
                self.error(directive.id, key, message);
            }
        }
    }

    /// Up to three numbers: space above, space below, line length.
    fn sep(&mut self, directive: &Directive, key: &Token, params: &[&Token]) {
        if params.len() > 3 {
            let message = format!("Directive '{}' expects at most three numbers", key.lexeme);
            self.error(directive.id, key, message);
            return;
        }
        let mut numbers = Vec::new();
        for param in params {
            match param.lexeme.parse::<f64>() {
                Ok(v) => numbers.push(v),
                Err(_) => {
                    let message =
                        format!("Directive '{}' expects numbers, found '{}'", key.lexeme, param.lexeme);
                    self.error(directive.id, param, message);
                    return;
                }
            }
        }
        self.record(
            directive.id,
            SemanticData::Sep(SepSpec {
                above: numbers.first().copied(),
                below: numbers.get(1).copied(),
                length: numbers.get(2).copied(),
            }),
        );
    }

    /// Free text; parameter lexemes joined with single spaces.
    fn annotation(&mut self, directive: &Directive, params: &[&Token]) {
        let text = params
            .iter()
            .map(|t| t.lexeme.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        self.record(directive.id, SemanticData::Annotation(text));
    }

    fn newpage(&mut self, directive: &Directive, key: &Token, params: &[&Token]) {
        match params {
            [] => self.record(directive.id, SemanticData::Newpage(None)),
            [number] => match number.lexeme.parse::<f64>() {
                Ok(v) => self.record(directive.id, SemanticData::Newpage(Some(v))),
                Err(_) => {
                    let message = format!("Directive '{}' expects a page number", key.lexeme);
                    self.error(directive.id, key, message);
                }
            },
            _ => {
                let message = format!("Directive '{}' expects at most one number", key.lexeme);
                self.error(directive.id, key, message);
            }
        }
    }

    /// Three font formats, detected by the first token:
    /// `* size [box]`, `size [box]`, or `face [utf8] [size] [mods] [box]`.
    fn font(&mut self, directive: &Directive, key: &Token, params: &[&Token], box_allowed: bool) {
        if params.is_empty() {
            let message = format!("Missing font specification for '{}'", key.lexeme);
            self.error(directive.id, key, message);
            return;
        }
        let mut spec = FontSpec::default();
        let mut index = 0;

        if params[0].lexeme == "*" {
            index = 1;
            match params.get(1) {
                Some(size) if is_number(size) => {
                    spec.size = size.lexeme.parse::<f64>().ok();
                    index = 2;
                }
                _ => {
                    let message = format!("Expected a font size after '*' in '{}'", key.lexeme);
                    self.error(directive.id, key, message);
                    return;
                }
            }
        } else if is_number(params[0]) {
            spec.size = params[0].lexeme.parse::<f64>().ok();
            index = 1;
        } else {
            let mut face_parts: Vec<String> = Vec::new();
            while let Some(token) = params.get(index) {
                if is_number(token) || is_font_modifier(&token.lexeme) {
                    break;
                }
                face_parts.push(unquote(&token.lexeme));
                index += 1;
            }
            if !face_parts.is_empty() {
                spec.face = Some(face_parts.join(" "));
            }
        }

        while let Some(token) = params.get(index) {
            match token.lexeme.as_str() {
                "bold" => spec.weight = FontWeight::Bold,
                "italic" => spec.style = FontStyle::Italic,
                "underline" => spec.decoration = FontDecoration::Underline,
                "box" => {
                    if box_allowed {
                        spec.boxed = true;
                    } else {
                        let message =
                            format!("'box' is not allowed for directive '{}'", key.lexeme);
                        self.error(directive.id, token, message);
                    }
                }
                // encoding markers are accepted and dropped
                "utf" | "utf8" | "utf-8" => {}
                lexeme if is_number(token) => {
                    spec.size = lexeme.parse::<f64>().ok();
                }
                lexeme => {
                    let message =
                        format!("Unexpected font parameter '{lexeme}' in '{}'", key.lexeme);
                    self.error(directive.id, token, message);
                }
            }
            index += 1;
        }

        if spec.face.is_none() && spec.size.is_none() {
            let message = format!("Missing font specification for '{}'", key.lexeme);
            self.error(directive.id, key, message);
            return;
        }
        self.record(directive.id, SemanticData::Font(spec));
    }
}

fn is_number(token: &Token) -> bool {
    token.kind == TokenKind::InfoNumber
}

fn is_font_modifier(lexeme: &str) -> bool {
    matches!(
        lexeme,
        "bold" | "italic" | "underline" | "box" | "utf" | "utf8" | "utf-8"
    )
}
