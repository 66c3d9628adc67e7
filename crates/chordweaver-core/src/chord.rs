//! Chord types, chord names and root-position spelling

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordweaverError, Result};
use crate::pitch::{split_note_name, Interval, NoteName, PitchName};

/// Triad quality underlying a chord type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriadQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended,
}

/// Supported chord types, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordType {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Power,
    Major6,
    Minor6,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished7,
    HalfDiminished7,
    Major7Sharp5,
    Dominant7Sus4,
    Dominant7Flat9,
    Dominant7Sharp5,
    Dominant9,
    Major9,
    Minor9,
    Add9,
}

impl ChordType {
    pub const ALL: [ChordType; 23] = [
        Self::Major,
        Self::Minor,
        Self::Diminished,
        Self::Augmented,
        Self::Sus2,
        Self::Sus4,
        Self::Power,
        Self::Major6,
        Self::Minor6,
        Self::Dominant7,
        Self::Major7,
        Self::Minor7,
        Self::MinorMajor7,
        Self::Diminished7,
        Self::HalfDiminished7,
        Self::Major7Sharp5,
        Self::Dominant7Sus4,
        Self::Dominant7Flat9,
        Self::Dominant7Sharp5,
        Self::Dominant9,
        Self::Major9,
        Self::Minor9,
        Self::Add9,
    ];

    /// Chord tones above the root as spelled intervals, root included
    pub fn intervals(&self) -> &'static [Interval] {
        const R: Interval = Interval::UNISON;
        const M2: Interval = Interval::MAJOR_SECOND;
        const M3: Interval = Interval::MAJOR_THIRD;
        const MI3: Interval = Interval::MINOR_THIRD;
        const P4: Interval = Interval::PERFECT_FOURTH;
        const D5: Interval = Interval::DIMINISHED_FIFTH;
        const P5: Interval = Interval::PERFECT_FIFTH;
        const A5: Interval = Interval::AUGMENTED_FIFTH;
        const M6: Interval = Interval::new(6, 9);
        const D7: Interval = Interval::new(7, 9);
        const MI7: Interval = Interval::new(7, 10);
        const MA7: Interval = Interval::new(7, 11);
        const B9: Interval = Interval::new(9, 13);
        const N9: Interval = Interval::new(9, 14);
        match self {
            Self::Major => &[R, M3, P5],
            Self::Minor => &[R, MI3, P5],
            Self::Diminished => &[R, MI3, D5],
            Self::Augmented => &[R, M3, A5],
            Self::Sus2 => &[R, M2, P5],
            Self::Sus4 => &[R, P4, P5],
            Self::Power => &[R, P5],
            Self::Major6 => &[R, M3, P5, M6],
            Self::Minor6 => &[R, MI3, P5, M6],
            Self::Dominant7 => &[R, M3, P5, MI7],
            Self::Major7 => &[R, M3, P5, MA7],
            Self::Minor7 => &[R, MI3, P5, MI7],
            Self::MinorMajor7 => &[R, MI3, P5, MA7],
            Self::Diminished7 => &[R, MI3, D5, D7],
            Self::HalfDiminished7 => &[R, MI3, D5, MI7],
            Self::Major7Sharp5 => &[R, M3, A5, MA7],
            Self::Dominant7Sus4 => &[R, P4, P5, MI7],
            Self::Dominant7Flat9 => &[R, M3, P5, MI7, B9],
            Self::Dominant7Sharp5 => &[R, M3, A5, MI7],
            Self::Dominant9 => &[R, M3, P5, MI7, N9],
            Self::Major9 => &[R, M3, P5, MA7, N9],
            Self::Minor9 => &[R, MI3, P5, MI7, N9],
            Self::Add9 => &[R, M3, P5, N9],
        }
    }

    /// Canonical symbol suffix
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Major => "",
            Self::Minor => "m",
            Self::Diminished => "dim",
            Self::Augmented => "aug",
            Self::Sus2 => "sus2",
            Self::Sus4 => "sus4",
            Self::Power => "5",
            Self::Major6 => "6",
            Self::Minor6 => "m6",
            Self::Dominant7 => "7",
            Self::Major7 => "maj7",
            Self::Minor7 => "m7",
            Self::MinorMajor7 => "mMaj7",
            Self::Diminished7 => "dim7",
            Self::HalfDiminished7 => "m7b5",
            Self::Major7Sharp5 => "maj7#5",
            Self::Dominant7Sus4 => "7sus4",
            Self::Dominant7Flat9 => "7b9",
            Self::Dominant7Sharp5 => "7#5",
            Self::Dominant9 => "9",
            Self::Major9 => "maj9",
            Self::Minor9 => "m9",
            Self::Add9 => "add9",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Major => &["M", "maj", "Maj", "major"],
            Self::Minor => &["min", "-", "minor"],
            Self::Diminished => &["°", "o"],
            Self::Augmented => &["+"],
            Self::Sus2 => &[],
            Self::Sus4 => &["sus"],
            Self::Power => &[],
            Self::Major6 => &["M6", "maj6"],
            Self::Minor6 => &["min6", "-6"],
            Self::Dominant7 => &["dom7", "dom"],
            Self::Major7 => &["M7", "Maj7", "ma7", "Δ", "Δ7"],
            Self::Minor7 => &["min7", "-7"],
            Self::MinorMajor7 => &["mM7", "m(maj7)", "minmaj7", "-Δ7"],
            Self::Diminished7 => &["°7", "o7"],
            Self::HalfDiminished7 => &["ø", "ø7", "-7b5", "min7b5"],
            Self::Major7Sharp5 => &["M7#5", "+M7", "augmaj7"],
            Self::Dominant7Sus4 => &["7sus"],
            Self::Dominant7Flat9 => &[],
            Self::Dominant7Sharp5 => &["aug7", "+7"],
            Self::Dominant9 => &["dom9"],
            Self::Major9 => &["M9", "Maj9"],
            Self::Minor9 => &["min9", "-9"],
            Self::Add9 => &["add2"],
        }
    }

    /// Look up a chord type by canonical suffix or alias
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.suffix() == suffix || kind.aliases().contains(&suffix))
    }

    /// Pitch-class offsets from the root as a 12-bit mask
    pub fn pitch_class_mask(&self) -> u16 {
        self.intervals()
            .iter()
            .fold(0u16, |mask, i| mask | 1 << (i.semitones as i32).rem_euclid(12))
    }

    pub fn triad_quality(&self) -> TriadQuality {
        match self {
            Self::Minor | Self::Minor6 | Self::Minor7 | Self::MinorMajor7 | Self::Minor9 => {
                TriadQuality::Minor
            }
            Self::Diminished | Self::Diminished7 | Self::HalfDiminished7 => TriadQuality::Diminished,
            Self::Augmented | Self::Major7Sharp5 | Self::Dominant7Sharp5 => TriadQuality::Augmented,
            Self::Sus2 | Self::Sus4 | Self::Power | Self::Dominant7Sus4 => TriadQuality::Suspended,
            _ => TriadQuality::Major,
        }
    }

    /// Chords carrying a major third and minor seventh
    pub fn is_dominant(&self) -> bool {
        matches!(
            self,
            Self::Dominant7
                | Self::Dominant7Sus4
                | Self::Dominant7Flat9
                | Self::Dominant7Sharp5
                | Self::Dominant9
        )
    }
}

/// A chord symbol: spelled root plus chord type, e.g. `Ebmaj7`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChordName {
    pub root: NoteName,
    pub kind: ChordType,
}

impl ChordName {
    pub const fn new(root: NoteName, kind: ChordType) -> Self {
        Self { root, kind }
    }

    /// Canonical symbol, e.g. `C#m7b5`
    pub fn symbol(&self) -> String {
        self.to_string()
    }

    /// Chord tones spelled by interval from the root
    pub fn note_names(&self) -> Vec<NoteName> {
        self.kind
            .intervals()
            .iter()
            .map(|&interval| self.root.transpose(interval))
            .collect()
    }

    /// Pitch classes of the chord as a 12-bit mask
    pub fn pitch_class_mask(&self) -> u16 {
        let mask = self.kind.pitch_class_mask() as u32;
        let shift = self.root.pitch_class() as u32;
        (((mask << shift) | (mask >> (12 - shift))) & 0x0fff) as u16
    }

    /// Same pitch content regardless of spelling
    pub fn same_sound(&self, other: &ChordName) -> bool {
        self.root.pitch_class() == other.root.pitch_class() && self.kind == other.kind
    }
}

impl fmt::Display for ChordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.kind.suffix())
    }
}

impl FromStr for ChordName {
    type Err = ChordweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || ChordweaverError::InvalidChord(s.to_string());
        let (root, suffix) = split_note_name(trimmed).ok_or_else(invalid)?;
        let kind = ChordType::from_suffix(suffix).ok_or_else(invalid)?;
        Ok(Self { root, kind })
    }
}

impl TryFrom<String> for ChordName {
    type Error = ChordweaverError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChordName> for String {
    fn from(value: ChordName) -> Self {
        value.to_string()
    }
}

/// Spell a chord in root position with the root at `octave`
pub fn chord_notes_with_octaves(chord: &ChordName, octave: i8) -> Vec<PitchName> {
    let root = chord.root.with_octave(octave);
    let root_midi = root.midi();
    chord
        .kind
        .intervals()
        .iter()
        .map(|&interval| {
            let midi = root_midi + interval.semitones as i32;
            let name = chord.root.transpose(interval);
            PitchName::from_midi_spelled(midi, name).unwrap_or_else(|| PitchName::from_midi(midi))
        })
        .collect()
}

/// Mask of the pitch classes present in `notes`
pub fn pitch_class_mask(notes: &[PitchName]) -> u16 {
    notes
        .iter()
        .fold(0u16, |mask, note| mask | 1 << note.pitch_class())
}
