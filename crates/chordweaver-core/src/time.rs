//! Musical time: tempo, time tokens and bar:beat positions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordweaverError, Result};

/// Ticks per quarter note for `i` tokens
pub const PPQ: u32 = 192;

/// Tempo and meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub bpm: f64,
    pub beats_per_bar: u32,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
        }
    }
}

impl Tempo {
    pub fn new(bpm: f64, beats_per_bar: u32) -> Self {
        Self { bpm, beats_per_bar }
    }

    /// Positive, finite bpm and a non-empty bar
    pub fn is_valid(&self) -> bool {
        self.bpm.is_finite() && self.bpm > 0.0 && self.beats_per_bar > 0
    }

    /// Seconds per beat, 0 for an invalid tempo
    pub fn seconds_per_beat(&self) -> f64 {
        if self.is_valid() { 60.0 / self.bpm } else { 0.0 }
    }

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.seconds_per_beat()
    }

    /// Beats elapsed in `seconds`, 0 for an invalid tempo
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        if self.is_valid() { seconds * self.bpm / 60.0 } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteModifier {
    Straight,
    Dotted,
    Triplet,
}

/// A duration expressed the way the editor writes it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeToken {
    /// `4n`, `8n.`, `16t`
    Notation { division: u32, modifier: NoteModifier },
    /// `1m`
    Measures(f64),
    /// `96i`
    Ticks(u32),
    /// plain number of seconds, `0.25`
    Seconds(f64),
}

impl Default for TimeToken {
    fn default() -> Self {
        Self::Notation {
            division: 16,
            modifier: NoteModifier::Straight,
        }
    }
}

impl TimeToken {
    /// Wall-clock length at `tempo`; 0 when the tempo is invalid
    pub fn to_seconds(&self, tempo: Tempo) -> f64 {
        if !tempo.is_valid() {
            return 0.0;
        }
        let beats = match *self {
            Self::Seconds(seconds) => return seconds,
            Self::Notation { division, modifier } => {
                let base = 4.0 / division as f64;
                match modifier {
                    NoteModifier::Straight => base,
                    NoteModifier::Dotted => base * 1.5,
                    NoteModifier::Triplet => base * 2.0 / 3.0,
                }
            }
            Self::Measures(bars) => bars * tempo.beats_per_bar as f64,
            Self::Ticks(ticks) => ticks as f64 / PPQ as f64,
        };
        tempo.beats_to_seconds(beats)
    }

    /// Length in beats, going through seconds at the current tempo
    pub fn to_beats(&self, tempo: Tempo) -> f64 {
        tempo.seconds_to_beats(self.to_seconds(tempo))
    }
}

impl fmt::Display for TimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notation { division, modifier } => {
                let suffix = match modifier {
                    NoteModifier::Straight => "n",
                    NoteModifier::Dotted => "n.",
                    NoteModifier::Triplet => "t",
                };
                write!(f, "{}{}", division, suffix)
            }
            Self::Measures(bars) => write!(f, "{}m", bars),
            Self::Ticks(ticks) => write!(f, "{}i", ticks),
            Self::Seconds(seconds) => write!(f, "{}", seconds),
        }
    }
}

impl FromStr for TimeToken {
    type Err = ChordweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        let invalid = || ChordweaverError::InvalidTimeToken(s.to_string());

        let notation = |digits: &str, modifier: NoteModifier| -> Result<Self> {
            let division: u32 = digits.parse().map_err(|_| invalid())?;
            if division == 0 {
                return Err(invalid());
            }
            Ok(Self::Notation { division, modifier })
        };

        if let Some(digits) = token.strip_suffix("n.") {
            notation(digits, NoteModifier::Dotted)
        } else if let Some(digits) = token.strip_suffix('n') {
            notation(digits, NoteModifier::Straight)
        } else if let Some(digits) = token.strip_suffix('t') {
            notation(digits, NoteModifier::Triplet)
        } else if let Some(bars) = token.strip_suffix('m') {
            let bars: f64 = bars.parse().map_err(|_| invalid())?;
            if !bars.is_finite() || bars < 0.0 {
                return Err(invalid());
            }
            Ok(Self::Measures(bars))
        } else if let Some(ticks) = token.strip_suffix('i') {
            Ok(Self::Ticks(ticks.parse().map_err(|_| invalid())?))
        } else {
            let seconds: f64 = token.parse().map_err(|_| invalid())?;
            if !seconds.is_finite() {
                return Err(invalid());
            }
            Ok(Self::Seconds(seconds))
        }
    }
}

impl TryFrom<String> for TimeToken {
    type Error = ChordweaverError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeToken> for String {
    fn from(value: TimeToken) -> Self {
        value.to_string()
    }
}

/// Bar and beat within the bar, both 0-based
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Position {
    pub bar: u32,
    pub beat: f64,
}

impl Position {
    pub const ZERO: Position = Position { bar: 0, beat: 0.0 };

    pub fn from_beats(beats: f64, beats_per_bar: u32) -> Self {
        let beats = beats.max(0.0);
        let per_bar = beats_per_bar.max(1) as f64;
        let bar = (beats / per_bar).floor();
        Self {
            bar: bar as u32,
            beat: beats - bar * per_bar,
        }
    }

    pub fn to_beats(&self, beats_per_bar: u32) -> f64 {
        self.bar as f64 * beats_per_bar.max(1) as f64 + self.beat
    }
}

impl fmt::Display for Position {
    /// `bar:beat:sixteenth`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.beat.floor();
        let sixteenths = (self.beat - whole) * 4.0;
        let rounded = (sixteenths * 1000.0).round() / 1000.0;
        write!(f, "{}:{}:{}", self.bar, whole as u32, rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beats(token: &str) -> f64 {
        token.parse::<TimeToken>().unwrap().to_beats(Tempo::default())
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(
            "8n.".parse::<TimeToken>().unwrap(),
            TimeToken::Notation { division: 8, modifier: NoteModifier::Dotted }
        );
        assert_eq!("1m".parse::<TimeToken>().unwrap(), TimeToken::Measures(1.0));
        assert_eq!("96i".parse::<TimeToken>().unwrap(), TimeToken::Ticks(96));
        assert_eq!("0.25".parse::<TimeToken>().unwrap(), TimeToken::Seconds(0.25));
        assert!("0n".parse::<TimeToken>().is_err());
        assert!("quarter".parse::<TimeToken>().is_err());
        assert!("".parse::<TimeToken>().is_err());
    }

    #[test]
    fn test_token_display_round_trip() {
        for text in ["4n", "8n.", "16t", "2m", "96i", "0.25"] {
            assert_eq!(text.parse::<TimeToken>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_token_beats() {
        assert!((beats("4n") - 1.0).abs() < 1e-9);
        assert!((beats("16n") - 0.25).abs() < 1e-9);
        assert!((beats("8n.") - 0.75).abs() < 1e-9);
        assert!((beats("8t") - 1.0 / 3.0).abs() < 1e-9);
        assert!((beats("1m") - 4.0).abs() < 1e-9);
        assert!((beats("96i") - 0.5).abs() < 1e-9);
        assert!((beats("0.25") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_seconds_depend_on_tempo() {
        let token: TimeToken = "4n".parse().unwrap();
        assert!((token.to_seconds(Tempo::new(60.0, 4)) - 1.0).abs() < 1e-9);
        assert!((token.to_seconds(Tempo::new(120.0, 4)) - 0.5).abs() < 1e-9);
        let fixed = TimeToken::Seconds(0.5);
        assert!((fixed.to_beats(Tempo::new(60.0, 4)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_tempo_gives_zero() {
        let token: TimeToken = "4n".parse().unwrap();
        assert_eq!(token.to_beats(Tempo::new(0.0, 4)), 0.0);
        assert_eq!(token.to_beats(Tempo::new(-90.0, 4)), 0.0);
        assert_eq!(token.to_beats(Tempo::new(f64::NAN, 4)), 0.0);
        assert_eq!(TimeToken::Seconds(-1.0).to_beats(Tempo::default()), -2.0);
    }

    #[test]
    fn test_position() {
        let p = Position::from_beats(5.5, 4);
        assert_eq!(p, Position { bar: 1, beat: 1.5 });
        assert_eq!(p.to_string(), "1:1:2");
        assert_eq!(Position::from_beats(0.0, 4).to_string(), "0:0:0");
        assert_eq!(Position::from_beats(3.0, 3).to_string(), "1:0:0");
        assert!(Position::from_beats(2.0, 4) < Position::from_beats(4.0, 4));
    }
}
