//! Typed semantic data produced by the analyzer.
//!
//! The analyzer materializes one [`SemanticData`] entry per analyzed node,
//! keyed by the node's id in a [`SemanticMap`]. Keys are integers rather
//! than references so passes can rebuild the map without touching the
//! tree. A node whose analysis fails simply has no entry; consumers must
//! handle absence.

use serde::Serialize;
use std::collections::HashMap;

/// node id → semantic data. At most one entry per id.
pub type SemanticMap = HashMap<u32, SemanticData>;

/// Tagged union over the semantic categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SemanticData {
    Font(FontSpec),
    BooleanFlag(bool),
    Identifier(String),
    BooleanValue(bool),
    Number(f64),
    Position(PositionChoice),
    Measurement(MeasurementValue),
    Sep(SepSpec),
    Annotation(String),
    Newpage(Option<f64>),
    Key(KeyInfo),
    Meter(MeterInfo),
    NoteLength(NoteLengthInfo),
    Tempo(TempoInfo),
    Voice(VoiceInfo),
    Title(String),
    Composer(String),
    Origin(String),
    Reference(u32),
}

/// A parsed font directive.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FontSpec {
    pub face: Option<String>,
    pub size: Option<f64>,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub decoration: FontDecoration,
    pub boxed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FontDecoration {
    #[default]
    None,
    Underline,
}

/// Placement choice for vocals, dynamics, chords, ornaments and volume
/// marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionChoice {
    Auto,
    Above,
    Below,
    Hidden,
}

impl PositionChoice {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "auto" => Some(Self::Auto),
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// A number with an optional length unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementValue {
    pub value: f64,
    pub unit: Option<MeasureUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeasureUnit {
    Pt,
    In,
    Cm,
    Mm,
}

impl MeasureUnit {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pt" => Some(Self::Pt),
            "in" => Some(Self::In),
            "cm" => Some(Self::Cm),
            "mm" => Some(Self::Mm),
            _ => None,
        }
    }
}

/// `%%sep above below length`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SepSpec {
    pub above: Option<f64>,
    pub below: Option<f64>,
    pub length: Option<f64>,
}

/// `K:` analysis result: the signature plus an optional clef.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyInfo {
    pub signature: KeySignature,
    pub clef: Option<ClefInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySignature {
    pub root: KeyRoot,
    pub acc: Option<KeyAcc>,
    pub mode: Mode,
    /// Explicit accidentals, e.g. `^f` `_b`, in encounter order.
    pub accidentals: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyRoot {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    /// `K:none`
    None,
    /// `K:HP` / `K:Hp` bagpipe notation
    Hp,
}

impl KeyRoot {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            'E' => Some(Self::E),
            'F' => Some(Self::F),
            'G' => Some(Self::G),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyAcc {
    Sharp,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Mode {
    #[default]
    Major,
    Minor,
    Mixolydian,
    Dorian,
    Phrygian,
    Lydian,
    Locrian,
    Aeolian,
    Ionian,
    /// `exp`: the signature is given entirely by explicit accidentals.
    Explicit,
}

impl Mode {
    /// Mode words and their unambiguous prefixes, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "m" | "min" | "minor" => Some(Self::Minor),
            "maj" | "major" => Some(Self::Major),
            "mix" | "mixolydian" => Some(Self::Mixolydian),
            "dor" | "dorian" => Some(Self::Dorian),
            "phr" | "phrygian" => Some(Self::Phrygian),
            "lyd" | "lydian" => Some(Self::Lydian),
            "loc" | "locrian" => Some(Self::Locrian),
            "aeo" | "aeolian" => Some(Self::Aeolian),
            "ion" | "ionian" => Some(Self::Ionian),
            "exp" => Some(Self::Explicit),
            _ => None,
        }
    }
}

/// Clef kinds with their staff placement, pre-tabulated. Unknown names
/// fall back to treble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ClefKind {
    #[default]
    Treble,
    Bass,
    Alto,
    Tenor,
    Baritone,
    Mezzo,
    Soprano,
    Perc,
    None,
}

impl ClefKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "treble" | "g" => Some(Self::Treble),
            "bass" | "f" => Some(Self::Bass),
            "alto" | "c" => Some(Self::Alto),
            "tenor" => Some(Self::Tenor),
            "baritone" => Some(Self::Baritone),
            "mezzo" | "mezzosoprano" => Some(Self::Mezzo),
            "soprano" => Some(Self::Soprano),
            "perc" => Some(Self::Perc),
            "none" | "auto" => Some(Self::None),
            _ => Option::None,
        }
    }

    /// Vertical offset of middle C relative to the staff midline, in
    /// scale steps.
    pub fn vertical_position(self) -> i8 {
        match self {
            Self::Treble => 0,
            Self::Bass => -12,
            Self::Alto => -6,
            Self::Tenor => -8,
            Self::Baritone => -10,
            Self::Mezzo => -4,
            Self::Soprano => -2,
            Self::Perc => 0,
            Self::None => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ClefInfo {
    pub kind: ClefKind,
    /// Staff line 1-5 when written, e.g. `clef=bass3`.
    pub line: Option<u8>,
    /// `+8` / `-8` octave shift.
    pub octave_shift: i8,
    pub middle: Option<String>,
    pub transpose: Option<f64>,
    pub stafflines: Option<u8>,
    pub staffscale: Option<f64>,
    pub style: Option<String>,
}

/// `M:` analysis result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterInfo {
    pub meter_type: MeterType,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeterType {
    CommonTime,
    CutTime,
    Specified,
}

/// `L:` analysis result, a rational with numerator ≤ denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoteLengthInfo {
    pub numerator: u32,
    pub denominator: u32,
}

/// `Q:` analysis result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TempoInfo {
    pub bpm: Option<u32>,
    /// The note value carrying the beat, as `(numerator, denominator)`.
    pub duration: Option<(u32, u32)>,
    pub pre_string: Option<String>,
    pub post_string: Option<String>,
}

/// `V:` analysis result. Repeated declarations of the same id merge with
/// later values winning per property.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: Option<String>,
    pub clef: Option<ClefInfo>,
    pub octave: Option<i32>,
    pub transpose: Option<i32>,
    /// Remaining `key=value` modifiers, verbatim.
    pub properties: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_and_prefixes() {
        assert_eq!(Mode::from_name("m"), Some(Mode::Minor));
        assert_eq!(Mode::from_name("Mixolydian"), Some(Mode::Mixolydian));
        assert_eq!(Mode::from_name("DOR"), Some(Mode::Dorian));
        assert_eq!(Mode::from_name("nonsense"), None);
    }

    #[test]
    fn test_unknown_clef_has_no_kind() {
        assert_eq!(ClefKind::from_name("Bass"), Some(ClefKind::Bass));
        assert_eq!(ClefKind::from_name("kazoo"), None);
    }

    #[test]
    fn test_clef_positions_tabulated() {
        assert_eq!(ClefKind::Treble.vertical_position(), 0);
        assert_eq!(ClefKind::Bass.vertical_position(), -12);
    }

    #[test]
    fn test_units() {
        assert_eq!(MeasureUnit::from_name("cm"), Some(MeasureUnit::Cm));
        assert_eq!(MeasureUnit::from_name("px"), None);
    }
}
