//! Error types for chordweaver

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChordweaverError {
    #[error("Invalid pitch name: {0}")]
    InvalidPitch(String),
    #[error("Invalid chord name: {0}")]
    InvalidChord(String),
    #[error("Invalid roman numeral: {0}")]
    InvalidRomanNumeral(String),
    #[error("Invalid time token: {0}")]
    InvalidTimeToken(String),
    #[error("Invalid duration: {0} (must be a positive number of beats)")]
    InvalidDuration(f64),
    #[error("Invalid instrument settings: {0}")]
    InvalidInstrument(String),
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    #[error("Event not found: {0}")]
    EventNotFound(u64),
}

pub type Result<T> = std::result::Result<T, ChordweaverError>;
