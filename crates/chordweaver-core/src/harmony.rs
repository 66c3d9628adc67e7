//! Harmonic context: keys, modes, Roman numerals and next-chord suggestions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chord::{ChordName, ChordType, TriadQuality};
use crate::error::{ChordweaverError, Result};
use crate::pitch::{Interval, NoteName};

/// Heptatonic modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
}

impl Mode {
    pub const ALL: [Mode; 9] = [
        Self::Major,
        Self::Minor,
        Self::Dorian,
        Self::Phrygian,
        Self::Lydian,
        Self::Mixolydian,
        Self::Locrian,
        Self::HarmonicMinor,
        Self::MelodicMinor,
    ];

    /// Scale intervals (semitones from the tonic)
    pub fn intervals(&self) -> &'static [u8; 7] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Dorian => "Dorian",
            Self::Phrygian => "Phrygian",
            Self::Lydian => "Lydian",
            Self::Mixolydian => "Mixolydian",
            Self::Locrian => "Locrian",
            Self::HarmonicMinor => "Harmonic Minor",
            Self::MelodicMinor => "Melodic Minor",
        }
    }

    /// Major <-> minor; other modes have no parallel
    pub fn parallel(&self) -> Option<Mode> {
        match self {
            Self::Major => Some(Self::Minor),
            Self::Minor => Some(Self::Major),
            _ => None,
        }
    }

    /// Modes whose tonic triad is minor
    pub fn has_minor_third(&self) -> bool {
        self.intervals()[2] == 3
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = ChordweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "major" | "ionian" | "maj" => Ok(Self::Major),
            "minor" | "aeolian" | "naturalminor" | "min" => Ok(Self::Minor),
            "dorian" => Ok(Self::Dorian),
            "phrygian" => Ok(Self::Phrygian),
            "lydian" => Ok(Self::Lydian),
            "mixolydian" => Ok(Self::Mixolydian),
            "locrian" => Ok(Self::Locrian),
            "harmonicminor" => Ok(Self::HarmonicMinor),
            "melodicminor" => Ok(Self::MelodicMinor),
            _ => Err(ChordweaverError::UnknownMode(s.to_string())),
        }
    }
}

/// Tonic plus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: NoteName,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: NoteName, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// Scale degrees spelled one letter apart
    pub fn scale_notes(&self) -> [NoteName; 7] {
        let intervals = self.mode.intervals();
        std::array::from_fn(|d| {
            self.tonic
                .transpose(Interval::new(d as u8 + 1, intervals[d] as i8))
        })
    }

    pub fn parallel(&self) -> Option<Key> {
        self.mode.parallel().map(|mode| Key { tonic: self.tonic, mode })
    }

    fn stacked_thirds(&self, degree: usize) -> [u8; 3] {
        let scale = self.scale_notes();
        let root = scale[degree % 7];
        [2, 4, 6].map(|step| root.semitones_to(scale[(degree + step) % 7]))
    }

    /// Quality of the triad built on a scale degree (0-based)
    pub fn triad_quality(&self, degree: usize) -> TriadQuality {
        match self.stacked_thirds(degree) {
            [3, 6, _] => TriadQuality::Diminished,
            [4, 8, _] => TriadQuality::Augmented,
            [3, _, _] => TriadQuality::Minor,
            _ => TriadQuality::Major,
        }
    }

    /// Seventh chord built on a scale degree (0-based)
    pub fn diatonic_seventh(&self, degree: usize) -> ChordName {
        let root = self.scale_notes()[degree % 7];
        let kind = match self.stacked_thirds(degree) {
            [4, 7, 11] => ChordType::Major7,
            [4, 7, 10] => ChordType::Dominant7,
            [3, 7, 10] => ChordType::Minor7,
            [3, 7, 11] => ChordType::MinorMajor7,
            [3, 6, 10] => ChordType::HalfDiminished7,
            [3, 6, 9] => ChordType::Diminished7,
            [4, 8, 11] => ChordType::Major7Sharp5,
            [4, 8, 10] => ChordType::Dominant7Sharp5,
            [3, 6, _] => ChordType::Diminished,
            [4, 8, _] => ChordType::Augmented,
            [3, _, _] => ChordType::Minor,
            _ => ChordType::Major,
        };
        ChordName::new(root, kind)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

/// Quality encoded by a numeral's case and marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumeralQuality {
    Major,
    Minor,
    Diminished,
    HalfDiminished,
    Augmented,
}

impl NumeralQuality {
    fn triad(self) -> TriadQuality {
        match self {
            Self::Major => TriadQuality::Major,
            Self::Minor => TriadQuality::Minor,
            Self::Diminished | Self::HalfDiminished => TriadQuality::Diminished,
            Self::Augmented => TriadQuality::Augmented,
        }
    }

    fn from_triad(quality: TriadQuality) -> Self {
        match quality {
            TriadQuality::Minor => Self::Minor,
            TriadQuality::Diminished => Self::Diminished,
            TriadQuality::Augmented => Self::Augmented,
            TriadQuality::Major | TriadQuality::Suspended => Self::Major,
        }
    }

    fn is_lower_case(self) -> bool {
        matches!(self, Self::Minor | Self::Diminished | Self::HalfDiminished)
    }
}

/// Numeral quality and extension text for each chord type
fn numeral_shape(kind: ChordType) -> (NumeralQuality, &'static str) {
    use NumeralQuality as Q;
    match kind {
        ChordType::Major => (Q::Major, ""),
        ChordType::Minor => (Q::Minor, ""),
        ChordType::Diminished => (Q::Diminished, ""),
        ChordType::Augmented => (Q::Augmented, ""),
        ChordType::Sus2 => (Q::Major, "sus2"),
        ChordType::Sus4 => (Q::Major, "sus4"),
        ChordType::Power => (Q::Major, "5"),
        ChordType::Major6 => (Q::Major, "6"),
        ChordType::Minor6 => (Q::Minor, "6"),
        ChordType::Dominant7 => (Q::Major, "7"),
        ChordType::Major7 => (Q::Major, "maj7"),
        ChordType::Minor7 => (Q::Minor, "7"),
        ChordType::MinorMajor7 => (Q::Minor, "maj7"),
        ChordType::Diminished7 => (Q::Diminished, "7"),
        ChordType::HalfDiminished7 => (Q::HalfDiminished, ""),
        ChordType::Major7Sharp5 => (Q::Augmented, "maj7"),
        ChordType::Dominant7Sus4 => (Q::Major, "7sus4"),
        ChordType::Dominant7Flat9 => (Q::Major, "7b9"),
        ChordType::Dominant7Sharp5 => (Q::Augmented, "7"),
        ChordType::Dominant9 => (Q::Major, "9"),
        ChordType::Major9 => (Q::Major, "maj9"),
        ChordType::Minor9 => (Q::Minor, "9"),
        ChordType::Add9 => (Q::Major, "add9"),
    }
}

fn chord_type_for_shape(quality: NumeralQuality, extension: &str) -> Option<ChordType> {
    ChordType::ALL
        .into_iter()
        .find(|&kind| numeral_shape(kind) == (quality, extension))
}

const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// A Roman numeral label such as `bVImaj7`, `viiø7` or `#iv°`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RomanNumeral {
    /// -1 flat, 0 diatonic, 1 sharp
    pub accidental: i8,
    /// Scale degree, 0-based
    pub degree: u8,
    pub quality: NumeralQuality,
    pub extension: String,
}

impl RomanNumeral {
    fn triad_label(degree: usize, quality: TriadQuality) -> Self {
        Self {
            accidental: 0,
            degree: degree as u8,
            quality: NumeralQuality::from_triad(quality),
            extension: String::new(),
        }
    }

    fn prefix(&self) -> &'static str {
        match self.accidental {
            a if a > 0 => "#",
            a if a < 0 => "b",
            _ => "",
        }
    }

    fn letters(&self) -> String {
        let numeral = NUMERALS[self.degree as usize % 7];
        if self.quality.is_lower_case() {
            numeral.to_lowercase()
        } else {
            numeral.to_string()
        }
    }

    /// Accidental, numeral letters and `°` only
    pub fn simplified(&self) -> String {
        let marker = if self.quality == NumeralQuality::Diminished { "°" } else { "" };
        format!("{}{}{}", self.prefix(), self.letters(), marker)
    }

    /// The same numeral reduced to its triad
    pub fn triad(&self) -> Self {
        let quality = match self.quality {
            NumeralQuality::HalfDiminished => NumeralQuality::Diminished,
            other => other,
        };
        Self {
            quality,
            extension: String::new(),
            ..self.clone()
        }
    }
}

impl fmt::Display for RomanNumeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.quality {
            NumeralQuality::Diminished => "°",
            NumeralQuality::HalfDiminished => "ø7",
            NumeralQuality::Augmented => "+",
            NumeralQuality::Major | NumeralQuality::Minor => "",
        };
        write!(f, "{}{}{}{}", self.prefix(), self.letters(), marker, self.extension)
    }
}

impl FromStr for RomanNumeral {
    type Err = ChordweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ChordweaverError::InvalidRomanNumeral(s.to_string());
        let mut rest = s.trim();

        let mut accidental = 0;
        if let Some(r) = rest.strip_prefix(['#', '♯']) {
            accidental = 1;
            rest = r;
        } else if let Some(r) = rest.strip_prefix(['b', '♭']) {
            accidental = -1;
            rest = r;
        }

        let split = rest
            .find(|c: char| !matches!(c, 'I' | 'V' | 'i' | 'v'))
            .unwrap_or(rest.len());
        let (letters, tail) = rest.split_at(split);
        let upper = letters.to_uppercase();
        let degree = NUMERALS.iter().position(|n| *n == upper).ok_or_else(invalid)?;
        let lower_case = if letters == upper {
            false
        } else if letters == upper.to_lowercase() {
            true
        } else {
            return Err(invalid());
        };

        let mut quality = if lower_case { NumeralQuality::Minor } else { NumeralQuality::Major };
        let mut extension = tail;
        if let Some(r) = tail.strip_prefix(['°', 'o']) {
            quality = NumeralQuality::Diminished;
            extension = r;
        } else if let Some(r) = tail.strip_prefix('ø') {
            quality = NumeralQuality::HalfDiminished;
            extension = r.strip_prefix('7').unwrap_or(r);
        } else if let Some(r) = tail.strip_prefix('+') {
            quality = NumeralQuality::Augmented;
            extension = r;
        }
        chord_type_for_shape(quality, extension).ok_or_else(invalid)?;

        Ok(Self {
            accidental,
            degree: degree as u8,
            quality,
            extension: extension.to_string(),
        })
    }
}

fn alter(note: NoteName, accidental: i8) -> NoteName {
    let altered = note.accidental + accidental;
    if altered.abs() <= 2 {
        NoteName::new(note.letter, altered)
    } else {
        let pc = (note.pitch_class() as i32 + accidental as i32).rem_euclid(12) as u8;
        NoteName::from_pitch_class(pc, accidental < 0)
    }
}

/// Locate a chord's root in the key as (degree, accidental)
fn locate_root(root: NoteName, key: &Key) -> Option<(usize, i8)> {
    let scale = key.scale_notes();
    if let Some(degree) = scale.iter().position(|n| n.pitch_class() == root.pitch_class()) {
        return Some((degree, 0));
    }
    let signed = |degree: usize| {
        let diff = scale[degree].semitones_to(root) as i32;
        if diff > 6 { diff - 12 } else { diff }
    };
    if let Some(degree) = scale.iter().position(|n| n.letter == root.letter) {
        let diff = signed(degree);
        if diff.abs() == 1 {
            return Some((degree, diff as i8));
        }
    }
    (0..7)
        .map(|degree| (degree, signed(degree)))
        .filter(|(_, diff)| diff.abs() <= 3)
        .min_by_key(|&(_, diff)| (diff.abs(), diff > 0))
        .map(|(degree, diff)| (degree, diff.signum() as i8))
}

/// Label a chord relative to a key
pub fn roman_numeral_for_chord(chord: &ChordName, key: &Key) -> Option<RomanNumeral> {
    let (degree, accidental) = locate_root(chord.root, key)?;
    let (quality, extension) = numeral_shape(chord.kind);
    Some(RomanNumeral {
        accidental,
        degree: degree as u8,
        quality,
        extension: extension.to_string(),
    })
}

/// Resolve a numeral to a chord in the key
pub fn chord_from_numeral(numeral: &RomanNumeral, key: &Key) -> Option<ChordName> {
    let degree = numeral.degree as usize % 7;
    if numeral.accidental == 0 && numeral.quality.triad() == key.triad_quality(degree) {
        let diatonic = key.diatonic_seventh(degree);
        let (_, extension) = numeral_shape(diatonic.kind);
        if numeral.extension.is_empty() || numeral.extension == extension {
            return Some(diatonic);
        }
    }
    let root = alter(key.scale_notes()[degree], numeral.accidental);
    let kind = chord_type_for_shape(numeral.quality, &numeral.extension)?;
    Some(ChordName::new(root, kind))
}

/// Parse and resolve a numeral; unparseable input gives `None`
pub fn chord_from_roman_numeral(roman: &str, key: &Key) -> Option<ChordName> {
    let numeral: RomanNumeral = roman.parse().ok()?;
    chord_from_numeral(&numeral, key)
}

/// A chord with its label in some key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledChord {
    pub numeral: RomanNumeral,
    pub chord: ChordName,
}

/// Seventh chords on each degree, labelled with triad numerals
pub fn diatonic_chords(key: &Key) -> Vec<LabelledChord> {
    (0..7)
        .map(|degree| LabelledChord {
            numeral: RomanNumeral::triad_label(degree, key.triad_quality(degree)),
            chord: key.diatonic_seventh(degree),
        })
        .collect()
}

/// Parallel-mode diatonic chords not already diatonic here
pub fn borrowed_chords(key: &Key) -> Vec<LabelledChord> {
    let Some(parallel) = key.parallel() else {
        return Vec::new();
    };
    let home: Vec<String> = diatonic_chords(key).iter().map(|c| c.chord.symbol()).collect();
    diatonic_chords(&parallel)
        .into_iter()
        .filter(|c| !home.contains(&c.chord.symbol()))
        .filter_map(|c| {
            let numeral = roman_numeral_for_chord(&c.chord, key)?.triad();
            Some(LabelledChord { numeral, chord: c.chord })
        })
        .collect()
}

/// Next-chord ideas grouped by flavour
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    pub coherent: Vec<ChordName>,
    pub inventive: Vec<ChordName>,
    pub jazzy: Vec<ChordName>,
    pub classical: Vec<ChordName>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.coherent.is_empty()
            && self.inventive.is_empty()
            && self.jazzy.is_empty()
            && self.classical.is_empty()
    }
}

type Transitions = &'static [(&'static str, &'static [&'static str])];

const MAJOR_TRANSITIONS: Transitions = &[
    ("I", &["IV", "V", "ii", "vi"]),
    ("ii", &["V", "vii°", "IV"]),
    ("iii", &["vi", "IV", "ii"]),
    ("IV", &["V", "I", "ii", "vii°"]),
    ("V", &["I", "vi", "IV"]),
    ("vi", &["ii", "IV", "V", "iii"]),
    ("vii°", &["I", "iii"]),
    ("iv", &["I", "V"]),
    ("bIII", &["IV", "bVI"]),
    ("bVI", &["bVII", "V", "I"]),
    ("bVII", &["I", "IV"]),
];

const MINOR_TRANSITIONS: Transitions = &[
    ("i", &["iv", "v", "VI", "VII"]),
    ("ii°", &["V", "v", "VII"]),
    ("III", &["VI", "iv", "VII"]),
    ("iv", &["v", "VII", "i", "V"]),
    ("v", &["i", "VI", "iv"]),
    ("V", &["i", "VI"]),
    ("VI", &["iv", "ii°", "VII", "III"]),
    ("VII", &["III", "i", "VI"]),
];

/// Degree movements for modes without a dedicated table
const DEGREE_TRANSITIONS: [&[usize]; 7] = [
    &[3, 4, 1, 5],
    &[4, 6, 3],
    &[5, 3, 1],
    &[4, 0, 1, 6],
    &[0, 5, 3],
    &[1, 3, 4, 2],
    &[0, 2],
];

const MAJOR_OPENINGS: &[&str] = &["I", "IV", "V", "vi"];
const MINOR_OPENINGS: &[&str] = &["i", "iv", "VI", "VII"];
const MAJOR_MIXTURE: &[&str] = &["iv", "bVI", "bIII", "bVII"];
const MINOR_MIXTURE: &[&str] = &["IV", "I", "ii", "V"];

fn resolve_all(numerals: &[&str], key: &Key) -> Vec<ChordName> {
    numerals
        .iter()
        .filter_map(|n| chord_from_roman_numeral(n, key))
        .collect()
}

fn coherent_for(numeral: Option<&RomanNumeral>, key: &Key) -> Vec<ChordName> {
    let table = match key.mode {
        Mode::Major => Some(MAJOR_TRANSITIONS),
        Mode::Minor => Some(MINOR_TRANSITIONS),
        _ => None,
    };
    let Some(numeral) = numeral else {
        return match key.mode {
            Mode::Major => resolve_all(MAJOR_OPENINGS, key),
            Mode::Minor => resolve_all(MINOR_OPENINGS, key),
            _ => [0, 3, 4, 5].iter().map(|&d| key.diatonic_seventh(d)).collect(),
        };
    };

    let simplified = numeral.simplified().replace('°', "");
    let listed = table.and_then(|table| {
        table
            .iter()
            .find(|(from, _)| from.replace('°', "") == simplified)
            .map(|(_, to)| resolve_all(to, key))
    });
    listed.unwrap_or_else(|| {
        DEGREE_TRANSITIONS[numeral.degree as usize % 7]
            .iter()
            .map(|&d| key.diatonic_seventh(d))
            .collect()
    })
}

fn jazzy_for(context: Option<&ChordName>, key: &Key) -> Vec<ChordName> {
    let scale = key.scale_notes();
    let mut chords = Vec::new();
    match context {
        Some(chord) if chord.kind.is_dominant() => {
            chords.push(ChordName::new(chord.root, ChordType::Dominant7Flat9));
            chords.push(ChordName::new(chord.root, ChordType::Dominant7Sharp5));
            let substitute = chord.root.transpose(Interval::DIMINISHED_FIFTH);
            chords.push(ChordName::new(substitute, ChordType::Dominant7));
        }
        _ => {
            chords.push(ChordName::new(scale[4], ChordType::Dominant7Flat9));
            chords.push(ChordName::new(scale[4], ChordType::Dominant7Sharp5));
        }
    }
    chords.push(ChordName::new(scale[1], ChordType::Major9));
    chords
}

fn classical_for(key: &Key) -> Vec<ChordName> {
    let scale = key.scale_notes();
    vec![
        ChordName::new(scale[4].transpose(Interval::PERFECT_FIFTH), ChordType::Dominant7),
        ChordName::new(scale[5].transpose(Interval::PERFECT_FIFTH), ChordType::Dominant7),
        ChordName::new(key.tonic.transpose(Interval::MINOR_SECOND), ChordType::Major),
    ]
}

fn finalize(chords: Vec<ChordName>, context: Option<&ChordName>) -> Vec<ChordName> {
    let mut unique: Vec<ChordName> = Vec::with_capacity(chords.len());
    for chord in chords {
        if context.is_some_and(|c| c.same_sound(&chord)) {
            continue;
        }
        if unique.iter().any(|u| u.same_sound(&chord)) {
            continue;
        }
        unique.push(chord);
    }
    unique
}

/// Suggest what to play after `context` (or how to open when there is none)
pub fn suggestions_for_chord(context: Option<&ChordName>, key: &Key) -> Suggestions {
    let numeral = match context {
        Some(chord) => match roman_numeral_for_chord(chord, key) {
            Some(numeral) => Some(numeral),
            None => return Suggestions::default(),
        },
        None => None,
    };

    let mixture = if key.mode.has_minor_third() { MINOR_MIXTURE } else { MAJOR_MIXTURE };
    Suggestions {
        coherent: finalize(coherent_for(numeral.as_ref(), key), context),
        inventive: finalize(resolve_all(mixture, key), context),
        jazzy: finalize(jazzy_for(context, key), context),
        classical: finalize(classical_for(key), context),
    }
}

/// One suggested move away from a chord
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub target: LabelledChord,
    pub description: &'static str,
}

/// Narrative description of a chord's harmonic function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarmonicTheory {
    pub numeral: RomanNumeral,
    pub function: &'static str,
    pub description: &'static str,
    pub movements: Vec<Movement>,
}

struct FunctionEntry {
    function: &'static str,
    description: &'static str,
    movements: &'static [(usize, &'static str)],
}

const FUNCTIONS: [FunctionEntry; 7] = [
    FunctionEntry {
        function: "Tonic",
        description: "Home base of the key. Phrases start and end here.",
        movements: &[
            (3, "Open the phrase toward the subdominant"),
            (4, "Build tension on the dominant"),
            (5, "Soften the color with the relative chord"),
        ],
    },
    FunctionEntry {
        function: "Supertonic",
        description: "Predominant chord that prepares the dominant.",
        movements: &[(4, "Classic ii-V motion"), (6, "Approach through the leading tone")],
    },
    FunctionEntry {
        function: "Mediant",
        description: "Weak tonic substitute sharing two tones with the tonic.",
        movements: &[(5, "Fall a fifth to the submediant"), (3, "Step up to the subdominant")],
    },
    FunctionEntry {
        function: "Subdominant",
        description: "Predominant chord that moves away from home.",
        movements: &[
            (4, "Continue to the dominant"),
            (0, "Plagal return to the tonic"),
            (1, "Drift to the supertonic"),
        ],
    },
    FunctionEntry {
        function: "Dominant",
        description: "Strongest tension in the key, pulling back to the tonic.",
        movements: &[(0, "Authentic cadence"), (5, "Deceptive cadence")],
    },
    FunctionEntry {
        function: "Submediant",
        description: "Relative of the tonic, often used as its substitute.",
        movements: &[
            (1, "Fall a fifth to the supertonic"),
            (3, "Move to the subdominant"),
            (4, "Approach the dominant"),
        ],
    },
    FunctionEntry {
        function: "Leading tone",
        description: "Dominant-function chord a half step below home.",
        movements: &[(0, "Resolve up to the tonic"), (2, "Slip to the mediant")],
    },
];

/// Function prose for a diatonic-rooted chord; chromatic roots have none
pub fn harmonic_theory_for_chord(context: &ChordName, key: &Key) -> Option<HarmonicTheory> {
    let numeral = roman_numeral_for_chord(context, key)?;
    if numeral.accidental != 0 {
        return None;
    }
    let entry = &FUNCTIONS[numeral.degree as usize % 7];
    let labels = diatonic_chords(key);
    let movements = entry
        .movements
        .iter()
        .map(|&(degree, description)| Movement {
            target: labels[degree].clone(),
            description,
        })
        .collect();
    Some(HarmonicTheory {
        numeral,
        function: entry.function,
        description: entry.description,
        movements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tonic: &str, mode: Mode) -> Key {
        Key::new(tonic.parse().unwrap(), mode)
    }

    fn chord(s: &str) -> ChordName {
        s.parse().unwrap()
    }

    fn symbols(chords: &[ChordName]) -> Vec<String> {
        chords.iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_scale_spelling() {
        let f_major: Vec<String> = key("F", Mode::Major).scale_notes().iter().map(|n| n.to_string()).collect();
        assert_eq!(f_major, ["F", "G", "A", "Bb", "C", "D", "E"]);
        let harmonic: Vec<String> =
            key("A", Mode::HarmonicMinor).scale_notes().iter().map(|n| n.to_string()).collect();
        assert_eq!(harmonic, ["A", "B", "C", "D", "E", "F", "G#"]);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("major".parse::<Mode>().unwrap(), Mode::Major);
        assert_eq!("Harmonic Minor".parse::<Mode>().unwrap(), Mode::HarmonicMinor);
        assert_eq!("aeolian".parse::<Mode>().unwrap(), Mode::Minor);
        assert!("bebop".parse::<Mode>().is_err());
    }

    #[test]
    fn test_c_major_diatonic_chords() {
        let chords = diatonic_chords(&key("C", Mode::Major));
        let numerals: Vec<String> = chords.iter().map(|c| c.numeral.to_string()).collect();
        assert_eq!(numerals, ["I", "ii", "iii", "IV", "V", "vi", "vii°"]);
        let names: Vec<String> = chords.iter().map(|c| c.chord.symbol()).collect();
        assert_eq!(names, ["Cmaj7", "Dm7", "Em7", "Fmaj7", "G7", "Am7", "Bm7b5"]);
    }

    #[test]
    fn test_a_minor_diatonic_chords() {
        let chords = diatonic_chords(&key("A", Mode::Minor));
        let numerals: Vec<String> = chords.iter().map(|c| c.numeral.to_string()).collect();
        assert_eq!(numerals, ["i", "ii°", "III", "iv", "v", "VI", "VII"]);
        assert_eq!(chords[6].chord.symbol(), "G7");
    }

    #[test]
    fn test_borrowed_chords_c_major() {
        let c_major = key("C", Mode::Major);
        let borrowed = borrowed_chords(&c_major);
        let home: Vec<String> = diatonic_chords(&c_major).iter().map(|c| c.chord.symbol()).collect();
        let minor: Vec<String> =
            diatonic_chords(&key("C", Mode::Minor)).iter().map(|c| c.chord.symbol()).collect();
        let expected: Vec<&String> = minor.iter().filter(|s| !home.contains(s)).collect();
        let got: Vec<String> = borrowed.iter().map(|c| c.chord.symbol()).collect();
        assert_eq!(got.iter().collect::<Vec<_>>(), expected);
        let labels: Vec<String> = borrowed.iter().map(|c| c.numeral.to_string()).collect();
        assert_eq!(labels, ["i", "ii°", "bIII", "iv", "v", "bVI", "bVII"]);
    }

    #[test]
    fn test_borrowed_chords_need_parallel_mode() {
        assert!(borrowed_chords(&key("D", Mode::Dorian)).is_empty());
        assert!(borrowed_chords(&key("E", Mode::HarmonicMinor)).is_empty());
    }

    #[test]
    fn test_roman_numeral_labels() {
        let c = key("C", Mode::Major);
        let label = |s: &str| roman_numeral_for_chord(&chord(s), &c).unwrap().to_string();
        assert_eq!(label("G7"), "V7");
        assert_eq!(label("Cmaj7"), "Imaj7");
        assert_eq!(label("Bb"), "bVII");
        assert_eq!(label("Abmaj7"), "bVImaj7");
        assert_eq!(label("F#dim"), "#iv°");
        assert_eq!(label("Bm7b5"), "viiø7");
        assert_eq!(label("Eaug"), "III+");
        assert_eq!(label("Db7"), "bII7");
        assert_eq!(label("C#m"), "#i");
    }

    #[test]
    fn test_simplified_numerals() {
        let c = key("C", Mode::Major);
        let simple = |s: &str| roman_numeral_for_chord(&chord(s), &c).unwrap().simplified();
        assert_eq!(simple("G7b9"), "V");
        assert_eq!(simple("Bdim7"), "vii°");
        assert_eq!(simple("Bm7b5"), "vii");
        assert_eq!(simple("Ebmaj7"), "bIII");
    }

    #[test]
    fn test_every_root_is_located() {
        for mode in Mode::ALL {
            let k = key("C", mode);
            for pc in 0..12 {
                let root = NoteName::from_pitch_class(pc, true);
                assert!(roman_numeral_for_chord(&ChordName::new(root, ChordType::Major), &k).is_some());
            }
        }
    }

    #[test]
    fn test_chord_from_roman_numeral() {
        let c = key("C", Mode::Major);
        let resolve = |s: &str| chord_from_roman_numeral(s, &c).map(|c| c.symbol());
        assert_eq!(resolve("V7").as_deref(), Some("G7"));
        assert_eq!(resolve("ii").as_deref(), Some("Dm7"));
        assert_eq!(resolve("I").as_deref(), Some("Cmaj7"));
        assert_eq!(resolve("I7").as_deref(), Some("C7"));
        assert_eq!(resolve("bVI").as_deref(), Some("Ab"));
        assert_eq!(resolve("iv").as_deref(), Some("Fm"));
        assert_eq!(resolve("viiø7").as_deref(), Some("Bm7b5"));
        assert_eq!(resolve("vii°7").as_deref(), Some("Bdim7"));
        assert_eq!(resolve("V9").as_deref(), Some("G9"));
        assert_eq!(resolve("X"), None);
        assert_eq!(resolve("Iv"), None);
        assert_eq!(resolve("Vfoo"), None);

        let a_minor = key("A", Mode::Minor);
        assert_eq!(chord_from_roman_numeral("V", &a_minor).unwrap().symbol(), "E");
        assert_eq!(chord_from_roman_numeral("VI", &a_minor).unwrap().symbol(), "Fmaj7");
    }

    #[test]
    fn test_numeral_round_trip_for_diatonic_chords() {
        for mode in [Mode::Major, Mode::Minor, Mode::Dorian, Mode::HarmonicMinor] {
            let k = key("Eb", mode);
            for entry in diatonic_chords(&k) {
                let numeral = roman_numeral_for_chord(&entry.chord, &k).unwrap();
                let text = numeral.to_string();
                assert_eq!(chord_from_roman_numeral(&text, &k), Some(entry.chord), "{}", text);
            }
        }
    }

    #[test]
    fn test_suggestions_without_context() {
        let s = suggestions_for_chord(None, &key("C", Mode::Major));
        assert_eq!(symbols(&s.coherent), ["Cmaj7", "Fmaj7", "G7", "Am7"]);
        assert_eq!(symbols(&s.inventive), ["Fm", "Ab", "Eb", "Bb"]);
        assert_eq!(symbols(&s.jazzy), ["G7b9", "G7#5", "Dmaj9"]);
        assert_eq!(symbols(&s.classical), ["D7", "E7", "Db"]);

        let minor = suggestions_for_chord(None, &key("A", Mode::Minor));
        assert_eq!(symbols(&minor.coherent), ["Am7", "Dm7", "Fmaj7", "G7"]);
        assert_eq!(symbols(&minor.classical), ["B7", "C7", "Bb"]);
    }

    #[test]
    fn test_suggestions_for_dominant_include_tritone_substitute() {
        let c = key("C", Mode::Major);
        let g7 = chord("G7");
        let s = suggestions_for_chord(Some(&g7), &c);
        assert!(s.jazzy.iter().any(|c| c.symbol() == "Db7"));
        assert_eq!(symbols(&s.jazzy), ["G7b9", "G7#5", "Db7", "Dmaj9"]);
        assert_eq!(symbols(&s.coherent), ["Cmaj7", "Am7", "Fmaj7"]);
    }

    #[test]
    fn test_suggestions_exclude_context() {
        let c = key("C", Mode::Major);
        let context = chord("D7");
        let s = suggestions_for_chord(Some(&context), &c);
        assert!(!s.classical.iter().any(|c| c.same_sound(&context)));
        let all = [&s.coherent, &s.inventive, &s.jazzy, &s.classical];
        for list in all {
            for (i, a) in list.iter().enumerate() {
                assert!(!a.same_sound(&context));
                assert!(list[i + 1..].iter().all(|b| !a.same_sound(b)));
            }
        }
    }

    #[test]
    fn test_suggestions_for_other_modes() {
        let d_dorian = key("D", Mode::Dorian);
        let s = suggestions_for_chord(Some(&chord("Dm7")), &d_dorian);
        assert_eq!(symbols(&s.coherent), ["G7", "Am7", "Em7", "Bm7b5"]);
        assert!(!s.inventive.is_empty());
    }

    #[test]
    fn test_harmonic_theory() {
        let c = key("C", Mode::Major);
        let theory = harmonic_theory_for_chord(&chord("G7"), &c).unwrap();
        assert_eq!(theory.function, "Dominant");
        assert_eq!(theory.numeral.to_string(), "V7");
        let targets: Vec<String> = theory.movements.iter().map(|m| m.target.chord.symbol()).collect();
        assert_eq!(targets, ["Cmaj7", "Am7"]);
        assert!(harmonic_theory_for_chord(&chord("Bb"), &c).is_none());
    }
}
