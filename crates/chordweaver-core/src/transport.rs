//! Transport state and the musical clock

use serde::{Deserialize, Serialize};

use crate::time::{Position, Tempo};

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    /// No schedule, clock stopped
    #[default]
    Idle,
    /// Schedule attached, clock stopped
    Scheduled,
    /// Clock advancing, events firing
    Running,
    /// Clock stopped, position kept
    Paused,
}

/// A stretch of musical time `[from, to)` covered by one advance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub from: f64,
    pub to: f64,
    /// The span runs into the loop boundary
    pub reaches_end: bool,
}

/// Upper bound on loop passes within a single advance
const MAX_WRAPS: usize = 1024;

/// Musical clock measured in beats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    pub state: TransportState,
    /// Current position in beats
    position_beats: f64,
    pub tempo: Tempo,
    pub loop_enabled: bool,
    /// Loop length in beats; 0 when nothing is scheduled
    loop_beats: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            state: TransportState::Idle,
            position_beats: 0.0,
            tempo: Tempo::default(),
            loop_enabled: true,
            loop_beats: 0.0,
        }
    }
}

impl Transport {
    pub fn new(tempo: Tempo) -> Self {
        Self {
            tempo,
            ..Default::default()
        }
    }

    pub fn play(&mut self) {
        self.state = TransportState::Running;
    }

    /// Back to the start with nothing attached
    pub fn stop(&mut self) {
        self.state = TransportState::Idle;
        self.position_beats = 0.0;
    }

    pub fn pause(&mut self) {
        if self.state == TransportState::Running {
            self.state = TransportState::Paused;
        }
    }

    /// A schedule was attached to a stopped clock
    pub fn mark_scheduled(&mut self) {
        if self.state == TransportState::Idle {
            self.state = TransportState::Scheduled;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    pub fn position_beats(&self) -> f64 {
        self.position_beats
    }

    pub fn position(&self) -> Position {
        Position::from_beats(self.position_beats, self.tempo.beats_per_bar)
    }

    /// Move to `beats`, wrapped into the loop when one is set
    pub fn seek(&mut self, beats: f64) {
        let beats = if beats.is_finite() { beats.max(0.0) } else { 0.0 };
        self.position_beats = if self.loop_beats > 0.0 {
            beats % self.loop_beats
        } else {
            beats
        };
    }

    pub fn loop_beats(&self) -> f64 {
        self.loop_beats
    }

    /// Set the loop length and keep the position inside it
    pub fn set_loop_beats(&mut self, beats: f64) {
        self.loop_beats = if beats.is_finite() { beats.max(0.0) } else { 0.0 };
        self.seek(self.position_beats);
    }

    /// Advance by `seconds` at the current tempo.
    ///
    /// Returns the spans crossed, in order. When looping, a span that reaches
    /// the boundary is followed by one starting again at 0. Without looping
    /// the clock parks at the boundary and the caller decides what to do.
    pub fn advance(&mut self, seconds: f64) -> Vec<Span> {
        let mut spans = Vec::new();
        if !self.is_running() || !seconds.is_finite() || seconds <= 0.0 {
            return spans;
        }
        let mut remaining = self.tempo.seconds_to_beats(seconds);
        while remaining > 0.0 {
            let from = self.position_beats;
            let to = from + remaining;
            if self.loop_beats <= 0.0 || to < self.loop_beats {
                self.position_beats = to;
                spans.push(Span { from, to, reaches_end: false });
                break;
            }
            spans.push(Span { from, to: self.loop_beats, reaches_end: true });
            remaining = to - self.loop_beats;
            if !self.loop_enabled || spans.len() >= MAX_WRAPS {
                self.position_beats = self.loop_beats;
                break;
            }
            self.position_beats = 0.0;
        }
        spans
    }

    /// Format position as bar:beat:sixteenth
    pub fn format_position(&self) -> String {
        self.position().to_string()
    }

    /// Samples per beat at current tempo
    pub fn samples_per_beat(&self, sample_rate: u32) -> f64 {
        sample_rate as f64 * self.tempo.seconds_per_beat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(loop_beats: f64) -> Transport {
        let mut t = Transport::new(Tempo::new(120.0, 4));
        t.set_loop_beats(loop_beats);
        t.play();
        t
    }

    #[test]
    fn test_state_transitions() {
        let mut t = Transport::default();
        t.mark_scheduled();
        assert_eq!(t.state, TransportState::Scheduled);
        t.pause();
        assert_eq!(t.state, TransportState::Scheduled);
        t.play();
        t.pause();
        assert_eq!(t.state, TransportState::Paused);
        t.stop();
        assert_eq!(t.state, TransportState::Idle);
        assert_eq!(t.position_beats(), 0.0);
    }

    #[test]
    fn test_advance_only_while_running() {
        let mut t = Transport::new(Tempo::default());
        t.set_loop_beats(8.0);
        assert!(t.advance(1.0).is_empty());
        t.play();
        let spans = t.advance(1.0);
        assert_eq!(spans, [Span { from: 0.0, to: 2.0, reaches_end: false }]);
        assert_eq!(t.format_position(), "0:2:0");
    }

    #[test]
    fn test_advance_wraps_loop() {
        let mut t = running(4.0);
        t.advance(1.5);
        let spans = t.advance(1.0);
        assert_eq!(
            spans,
            [
                Span { from: 3.0, to: 4.0, reaches_end: true },
                Span { from: 0.0, to: 1.0, reaches_end: false },
            ]
        );
        assert_eq!(t.position_beats(), 1.0);
    }

    #[test]
    fn test_advance_parks_at_end_without_loop() {
        let mut t = running(4.0);
        t.loop_enabled = false;
        let spans = t.advance(3.0);
        assert_eq!(spans, [Span { from: 0.0, to: 4.0, reaches_end: true }]);
        assert_eq!(t.position_beats(), 4.0);
    }

    #[test]
    fn test_seek_wraps_into_loop() {
        let mut t = running(4.0);
        t.seek(9.0);
        assert_eq!(t.position_beats(), 1.0);
        t.set_loop_beats(0.5);
        assert_eq!(t.position_beats(), 0.0);
    }

    #[test]
    fn test_samples_per_beat() {
        let t = Transport::new(Tempo::new(120.0, 4));
        assert_eq!(t.samples_per_beat(48_000), 24_000.0);
    }
}
