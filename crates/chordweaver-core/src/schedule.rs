//! Progression-to-schedule compiler
//!
//! Turns a progression snapshot, the arpeggiator settings and a tempo into a
//! flat, time-ordered list of trigger events plus the loop boundary. The
//! compiler is pure: it never touches its inputs and equal inputs always
//! give an equal schedule.

use crate::arpeggiator::ArpeggiatorConfig;
use crate::pitch::PitchName;
use crate::progression::{EventId, Progression};
use crate::time::{Position, Tempo};

/// Arpeggio notes sound for this fraction of a step
pub const NOTE_LENGTH_RATIO: f64 = 0.9;
/// Shortest arpeggio note, in seconds
pub const MIN_NOTE_SECONDS: f64 = 0.03;
/// Shortest arpeggio step, in seconds; anything finer is degenerate
pub const MIN_STEP_SECONDS: f64 = 0.01;

const STEP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Silent placeholder that only drives now-playing updates
    Rest,
    Note(PitchName),
    Chord(Vec<PitchName>),
}

impl Payload {
    /// Notes to trigger; empty for rests
    pub fn notes(&self) -> &[PitchName] {
        match self {
            Self::Rest => &[],
            Self::Note(note) => std::slice::from_ref(note),
            Self::Chord(notes) => notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEvent {
    pub start: Position,
    pub start_beats: f64,
    pub payload: Payload,
    pub duration_beats: f64,
    pub source: EventId,
    /// First event emitted for its source chord
    pub onset: bool,
}

/// Compiled, immutable trigger list for one loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    events: Vec<ScheduleEvent>,
    loop_beats: f64,
    loop_end: Position,
}

impl Schedule {
    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn loop_length_beats(&self) -> f64 {
        self.loop_beats
    }

    pub fn loop_end(&self) -> Position {
        self.loop_end
    }

    /// Index of the first event starting at or after `beats`
    pub fn first_index_at_or_after(&self, beats: f64) -> usize {
        self.events
            .partition_point(|e| e.start_beats < beats - STEP_EPSILON)
    }
}

pub fn compile(progression: &Progression, arpeggiator: &ArpeggiatorConfig, tempo: Tempo) -> Schedule {
    let beats_per_bar = tempo.beats_per_bar.max(1);
    let mut events = Vec::new();
    let mut accumulated = 0.0;

    for chord in progression.events() {
        let start_beats = accumulated;
        let duration = chord.duration();
        let placeholder = |events: &mut Vec<ScheduleEvent>| {
            events.push(ScheduleEvent {
                start: Position::from_beats(start_beats, beats_per_bar),
                start_beats,
                payload: Payload::Rest,
                duration_beats: duration,
                source: chord.id(),
                onset: true,
            });
        };

        if chord.is_rest() {
            placeholder(&mut events);
        } else if !arpeggiator.active {
            events.push(ScheduleEvent {
                start: Position::from_beats(start_beats, beats_per_bar),
                start_beats,
                payload: Payload::Chord(chord.notes().to_vec()),
                duration_beats: duration,
                source: chord.id(),
                onset: true,
            });
        } else {
            let step = arpeggiator.step.to_beats(tempo);
            if !step.is_finite() || step <= 0.0 || step < tempo.seconds_to_beats(MIN_STEP_SECONDS) {
                // nothing sensible to step by
                placeholder(&mut events);
            } else {
                let notes = chord.notes();
                let note_length = (step * NOTE_LENGTH_RATIO).max(tempo.seconds_to_beats(MIN_NOTE_SECONDS));
                let limit = arpeggiator.repeat.note_limit(notes.len());
                let end = start_beats + duration;
                let mut index = 0usize;
                loop {
                    let at = start_beats + index as f64 * step;
                    if at >= end - STEP_EPSILON || limit.is_some_and(|l| index >= l) {
                        break;
                    }
                    events.push(ScheduleEvent {
                        start: Position::from_beats(at, beats_per_bar),
                        start_beats: at,
                        payload: Payload::Note(notes[index % notes.len()]),
                        duration_beats: note_length.min(end - at),
                        source: chord.id(),
                        onset: index == 0,
                    });
                    index += 1;
                }
            }
        }

        accumulated += duration;
    }

    Schedule {
        events,
        loop_beats: accumulated,
        loop_end: Position::from_beats(accumulated, beats_per_bar),
    }
}
