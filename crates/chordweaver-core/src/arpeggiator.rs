//! Arpeggiator settings

use serde::{Deserialize, Serialize};

use crate::time::TimeToken;

/// How many passes through the chord an arpeggio makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatCount {
    Times(u32),
    /// Keep stepping until the chord ends
    #[default]
    Unbounded,
}

impl RepeatCount {
    /// Passes are at least one
    pub fn times(n: u32) -> Self {
        Self::Times(n.max(1))
    }

    /// Maximum notes for a chord of `note_count` notes
    pub fn note_limit(&self, note_count: usize) -> Option<usize> {
        match self {
            Self::Times(n) => Some((*n).max(1) as usize * note_count),
            Self::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpeggiatorConfig {
    pub active: bool,
    pub step: TimeToken,
    pub repeat: RepeatCount,
}

impl Default for ArpeggiatorConfig {
    fn default() -> Self {
        Self {
            active: false,
            step: TimeToken::default(),
            repeat: RepeatCount::Unbounded,
        }
    }
}

impl ArpeggiatorConfig {
    pub fn new(active: bool, step: TimeToken, repeat: RepeatCount) -> Self {
        Self { active, step, repeat }
    }
}
