//! chordweaver-core: music theory and scheduling for the chordweaver composer

pub mod arpeggiator;
pub mod chord;
pub mod effects;
mod error;
pub mod harmony;
pub mod history;
pub mod instrument;
pub mod pitch;
pub mod progression;
pub mod schedule;
pub mod time;
mod transport;
pub mod voicing;

pub use arpeggiator::{ArpeggiatorConfig, RepeatCount};
pub use chord::{chord_notes_with_octaves, ChordName, ChordType, TriadQuality};
pub use effects::EffectsState;
pub use error::{ChordweaverError, Result};
pub use harmony::{
    borrowed_chords, chord_from_numeral, chord_from_roman_numeral, diatonic_chords,
    harmonic_theory_for_chord, roman_numeral_for_chord, suggestions_for_chord, HarmonicTheory,
    Key, LabelledChord, Mode, Movement, NumeralQuality, RomanNumeral, Suggestions,
};
pub use history::{History, DEFAULT_HISTORY_CAPACITY};
pub use instrument::{
    AmVoice, Archetype, BasicVoice, Envelope, FilterEnvelope, FmVoice, InstrumentPatch,
    InstrumentSettings, MonoVoice, Waveform,
};
pub use pitch::{parse_notes, Interval, Letter, NoteName, PitchName};
pub use progression::{ChordEvent, EventId, Progression};
pub use schedule::{compile, Payload, Schedule, ScheduleEvent};
pub use time::{NoteModifier, Position, Tempo, TimeToken, PPQ};
pub use transport::{Span, Transport, TransportState};
pub use voicing::{
    build_ascending_voicing, detect_chord_from_notes, next_inversion, permuted_voicing,
    permuted_voicing_with, previous_inversion, wrap_notes_to_range,
};
