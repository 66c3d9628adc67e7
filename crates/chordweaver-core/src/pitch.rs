//! Spelled note names and pitches with octaves

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordweaverError, Result};

/// Natural note letters in scale order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    /// Position of the letter within C D E F G A B
    pub fn index(self) -> i32 {
        match self {
            Self::C => 0,
            Self::D => 1,
            Self::E => 2,
            Self::F => 3,
            Self::G => 4,
            Self::A => 5,
            Self::B => 6,
        }
    }

    /// Letter at a (wrapping) scale position
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(7) as usize]
    }

    /// Pitch class of the unaltered letter
    pub fn natural_pitch_class(self) -> i32 {
        match self {
            Self::C => 0,
            Self::D => 2,
            Self::E => 4,
            Self::F => 5,
            Self::G => 7,
            Self::A => 9,
            Self::B => 11,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            'E' => Some(Self::E),
            'F' => Some(Self::F),
            'G' => Some(Self::G),
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
            Self::G => 'G',
            Self::A => 'A',
            Self::B => 'B',
        }
    }
}

/// A diatonic interval: scale-step count (1 = unison, 3 = third, 9 = ninth)
/// plus its size in semitones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub degree: u8,
    pub semitones: i8,
}

impl Interval {
    pub const fn new(degree: u8, semitones: i8) -> Self {
        Self { degree, semitones }
    }

    pub const UNISON: Interval = Interval::new(1, 0);
    pub const MINOR_SECOND: Interval = Interval::new(2, 1);
    pub const MAJOR_SECOND: Interval = Interval::new(2, 2);
    pub const MINOR_THIRD: Interval = Interval::new(3, 3);
    pub const MAJOR_THIRD: Interval = Interval::new(3, 4);
    pub const PERFECT_FOURTH: Interval = Interval::new(4, 5);
    pub const DIMINISHED_FIFTH: Interval = Interval::new(5, 6);
    pub const PERFECT_FIFTH: Interval = Interval::new(5, 7);
    pub const AUGMENTED_FIFTH: Interval = Interval::new(5, 8);
}

/// A spelled pitch class such as `Eb` or `F#`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteName {
    pub letter: Letter,
    /// -2 (double flat) ..= 2 (double sharp)
    pub accidental: i8,
}

impl NoteName {
    pub const fn new(letter: Letter, accidental: i8) -> Self {
        Self { letter, accidental }
    }

    pub const fn natural(letter: Letter) -> Self {
        Self { letter, accidental: 0 }
    }

    /// Pitch class 0..12 (C = 0)
    pub fn pitch_class(self) -> u8 {
        (self.letter.natural_pitch_class() + self.accidental as i32).rem_euclid(12) as u8
    }

    /// Simplest spelling of a pitch class
    pub fn from_pitch_class(pitch_class: u8, prefer_flats: bool) -> Self {
        const SHARPS: [(Letter, i8); 12] = [
            (Letter::C, 0), (Letter::C, 1), (Letter::D, 0), (Letter::D, 1),
            (Letter::E, 0), (Letter::F, 0), (Letter::F, 1), (Letter::G, 0),
            (Letter::G, 1), (Letter::A, 0), (Letter::A, 1), (Letter::B, 0),
        ];
        const FLATS: [(Letter, i8); 12] = [
            (Letter::C, 0), (Letter::D, -1), (Letter::D, 0), (Letter::E, -1),
            (Letter::E, 0), (Letter::F, 0), (Letter::G, -1), (Letter::G, 0),
            (Letter::A, -1), (Letter::A, 0), (Letter::B, -1), (Letter::B, 0),
        ];
        let table = if prefer_flats { &FLATS } else { &SHARPS };
        let (letter, accidental) = table[(pitch_class % 12) as usize];
        Self { letter, accidental }
    }

    /// Whether this name is written with flats
    pub fn is_flat(self) -> bool {
        self.accidental < 0
    }

    /// Spell the note `interval` above this one, keeping letter names
    /// consistent with the interval's degree.
    pub fn transpose(self, interval: Interval) -> Self {
        let letter = Letter::from_index(self.letter.index() + interval.degree as i32 - 1);
        let target = (self.pitch_class() as i32 + interval.semitones as i32).rem_euclid(12);
        let mut accidental = (target - letter.natural_pitch_class()).rem_euclid(12);
        if accidental > 6 {
            accidental -= 12;
        }
        if accidental.abs() > 2 {
            return Self::from_pitch_class(target as u8, interval.semitones < 0 || self.is_flat());
        }
        Self { letter, accidental: accidental as i8 }
    }

    /// Ascending distance in semitones from `self` to `other` (0..12)
    pub fn semitones_to(self, other: NoteName) -> u8 {
        (other.pitch_class() as i32 - self.pitch_class() as i32).rem_euclid(12) as u8
    }

    pub fn with_octave(self, octave: i8) -> PitchName {
        PitchName { note: self, octave }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter.as_char())?;
        let symbol = if self.accidental < 0 { "b" } else { "#" };
        for _ in 0..self.accidental.unsigned_abs() {
            f.write_str(symbol)?;
        }
        Ok(())
    }
}

/// Parse the leading note name of `s`, returning it with the unparsed tail.
pub(crate) fn split_note_name(s: &str) -> Option<(NoteName, &str)> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    let letter = Letter::from_char(first)?;
    let mut accidental: i8 = 0;
    let mut rest_start = first.len_utf8();
    for (idx, c) in chars {
        let delta = match c {
            '#' | '♯' => 1,
            'b' | '♭' => -1,
            'x' | '𝄪' => 2,
            _ => break,
        };
        accidental += delta;
        rest_start = idx + c.len_utf8();
    }
    if accidental.abs() > 2 {
        return None;
    }
    Some((NoteName::new(letter, accidental), &s[rest_start..]))
}

impl FromStr for NoteName {
    type Err = ChordweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match split_note_name(trimmed) {
            Some((note, "")) => Ok(note),
            _ => Err(ChordweaverError::InvalidPitch(s.to_string())),
        }
    }
}

impl TryFrom<String> for NoteName {
    type Error = ChordweaverError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NoteName> for String {
    fn from(value: NoteName) -> Self {
        value.to_string()
    }
}

/// A note name with an explicit octave, e.g. `C4` (middle C, MIDI 60)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PitchName {
    pub note: NoteName,
    pub octave: i8,
}

impl PitchName {
    pub const fn new(note: NoteName, octave: i8) -> Self {
        Self { note, octave }
    }

    /// MIDI note number (may fall outside 0..=127 for extreme octaves)
    pub fn midi(self) -> i32 {
        (self.octave as i32 + 1) * 12
            + self.note.letter.natural_pitch_class()
            + self.note.accidental as i32
    }

    pub fn pitch_class(self) -> u8 {
        self.note.pitch_class()
    }

    /// Pitch for a MIDI number, spelled with sharps
    pub fn from_midi(midi: i32) -> Self {
        let note = NoteName::from_pitch_class(midi.rem_euclid(12) as u8, false);
        Self::from_midi_spelled(midi, note).unwrap_or(Self { note, octave: 4 })
    }

    /// Place `note` at the octave that yields `midi`, if its pitch class matches
    pub fn from_midi_spelled(midi: i32, note: NoteName) -> Option<Self> {
        let base = note.letter.natural_pitch_class() + note.accidental as i32;
        let offset = midi - base;
        if offset.rem_euclid(12) != 0 {
            return None;
        }
        let octave = offset.div_euclid(12) - 1;
        i8::try_from(octave).ok().map(|octave| Self { note, octave })
    }

    /// `None` when the result leaves the `i8` octave range
    pub fn checked_transpose_octaves(self, octaves: i32) -> Option<Self> {
        let octave = i8::try_from(self.octave as i32 + octaves).ok()?;
        Some(Self { note: self.note, octave })
    }

    pub fn transpose_octaves(self, octaves: i32) -> Self {
        let octave = (self.octave as i32 + octaves).clamp(i8::MIN as i32, i8::MAX as i32);
        Self { note: self.note, octave: octave as i8 }
    }

    /// Equal-tempered frequency at A4 = 440 Hz
    pub fn frequency(self) -> f64 {
        440.0 * 2f64.powf((self.midi() - 69) as f64 / 12.0)
    }
}

impl fmt::Display for PitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note, self.octave)
    }
}

impl FromStr for PitchName {
    type Err = ChordweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || ChordweaverError::InvalidPitch(s.to_string());
        let (note, rest) = split_note_name(trimmed).ok_or_else(invalid)?;
        let octave: i8 = rest.parse().map_err(|_| invalid())?;
        Ok(Self { note, octave })
    }
}

impl TryFrom<String> for PitchName {
    type Error = ChordweaverError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PitchName> for String {
    fn from(value: PitchName) -> Self {
        value.to_string()
    }
}

/// Parse a list of pitch strings, failing on the first invalid one
pub fn parse_notes<S: AsRef<str>>(notes: &[S]) -> Result<Vec<PitchName>> {
    notes.iter().map(|n| n.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_midi() {
        let c4: PitchName = "C4".parse().unwrap();
        assert_eq!(c4.midi(), 60);
        assert_eq!("A4".parse::<PitchName>().unwrap().midi(), 69);
        assert_eq!("Eb3".parse::<PitchName>().unwrap().midi(), 51);
        assert_eq!("B#3".parse::<PitchName>().unwrap().midi(), 60);
        assert_eq!("Cb4".parse::<PitchName>().unwrap().midi(), 59);
        assert_eq!("C-1".parse::<PitchName>().unwrap().midi(), 0);
        assert_eq!("Bbb2".parse::<PitchName>().unwrap().to_string(), "Bbb2");
    }

    #[test]
    fn test_invalid_pitches() {
        assert!("H4".parse::<PitchName>().is_err());
        assert!("C".parse::<PitchName>().is_err());
        assert!("C###4".parse::<PitchName>().is_err());
        assert!("".parse::<PitchName>().is_err());
    }

    #[test]
    fn test_from_midi_round_trip() {
        for midi in 0..128 {
            assert_eq!(PitchName::from_midi(midi).midi(), midi);
        }
        assert_eq!(PitchName::from_midi(61).to_string(), "C#4");
    }

    #[test]
    fn test_from_midi_spelled() {
        let db: NoteName = "Db".parse().unwrap();
        assert_eq!(PitchName::from_midi_spelled(61, db).unwrap().to_string(), "Db4");
        assert!(PitchName::from_midi_spelled(62, db).is_none());
        let b_sharp: NoteName = "B#".parse().unwrap();
        assert_eq!(PitchName::from_midi_spelled(60, b_sharp).unwrap().to_string(), "B#3");
    }

    #[test]
    fn test_transpose_spelling() {
        let c = NoteName::natural(Letter::C);
        assert_eq!(c.transpose(Interval::MINOR_THIRD).to_string(), "Eb");
        assert_eq!(c.transpose(Interval::new(7, 9)).to_string(), "Bbb");
        let g = NoteName::natural(Letter::G);
        assert_eq!(g.transpose(Interval::DIMINISHED_FIFTH).to_string(), "Db");
        let e = NoteName::natural(Letter::E);
        assert_eq!(e.transpose(Interval::MAJOR_THIRD).to_string(), "G#");
    }

    #[test]
    fn test_frequency() {
        let a4: PitchName = "A4".parse().unwrap();
        assert!((a4.frequency() - 440.0).abs() < 1e-9);
    }
}
