//! Playback session
//!
//! Owns the musical clock, the active schedule, the voice pool, the master
//! bus and the now-playing feed. Every mutation goes through `&mut Session`,
//! so a clock tick can never interleave with a recompile or an instrument
//! swap.

use std::time::Duration;

use chordweaver_core::{
    compile, Archetype, ArpeggiatorConfig, ChordweaverError, EffectsState, EventId,
    InstrumentPatch, InstrumentSettings, PitchName, Position, Progression, Schedule, Span, Tempo,
    Transport, TransportState,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::audio_effects::{EffectChain, GainEffect, PolySynth, ReverbEffect, VoiceFactory};
use crate::context::{AudioContext, ContextState};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Queued now-playing notifications before new ones are dropped
pub const NOW_PLAYING_CAPACITY: usize = 1024;
/// Length of an auditioned chord
pub const PREVIEW_SECONDS: f64 = 1.0;
const MAX_BLOCK_FRAMES: usize = 1024;

const REVERB: &str = "Reverb";
const GAIN: &str = "Gain";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session has been disposed")]
    Disposed,
    #[error("Audio context unavailable: {0}")]
    Context(String),
    #[error(transparent)]
    Invalid(#[from] ChordweaverError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Initial session settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tempo: Tempo,
    pub instrument: InstrumentSettings,
    pub arpeggiator: ArpeggiatorConfig,
    pub effects: EffectsState,
    pub loop_enabled: bool,
    pub sample_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            instrument: InstrumentSettings::default(),
            arpeggiator: ArpeggiatorConfig::default(),
            effects: EffectsState::default(),
            loop_enabled: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// A chord became audible, or playback went quiet (`chord: None`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NowPlaying {
    pub chord: Option<EventId>,
    /// Musical time of the trigger
    pub position: Position,
}

/// Consumer side of the now-playing feed
#[derive(Debug, Clone)]
pub struct NowPlayingReceiver {
    rx: Receiver<NowPlaying>,
}

impl NowPlayingReceiver {
    /// Hand every queued notification to `callback` in firing order
    pub fn dispatch<F: FnMut(NowPlaying)>(&self, mut callback: F) -> usize {
        let mut delivered = 0;
        for message in self.rx.try_iter() {
            callback(message);
            delivered += 1;
        }
        delivered
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<NowPlaying> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn receiver(&self) -> &Receiver<NowPlaying> {
        &self.rx
    }
}

fn send_now_playing(tx: &Sender<NowPlaying>, message: NowPlaying) {
    match tx.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!(chord = ?message.chord, "Now-playing queue full, dropping update"),
        Err(TrySendError::Disconnected(_)) => trace!("Now-playing receiver dropped"),
    }
}

pub struct Session {
    transport: Transport,
    progression: Progression,
    arpeggiator: ArpeggiatorConfig,
    instrument: InstrumentSettings,
    effects: EffectsState,
    schedule: Option<Schedule>,
    /// Next schedule event to fire
    cursor: usize,
    /// Bumped on every attach
    generation: u64,
    pool: Option<Box<dyn PolySynth>>,
    master: EffectChain,
    context: Box<dyn AudioContext>,
    factory: Box<dyn VoiceFactory>,
    notifier: Sender<NowPlaying>,
    sample_rate: u32,
    mix: Vec<f32>,
    disposed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.transport.state)
            .field("position", &self.transport.position())
            .field("events", &self.progression.len())
            .field("archetype", &self.instrument.archetype())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Session {
    /// Build a session and the receiver for its now-playing feed
    pub fn initialize(
        config: SessionConfig,
        context: Box<dyn AudioContext>,
        factory: Box<dyn VoiceFactory>,
    ) -> (Self, NowPlayingReceiver) {
        let (tx, rx) = bounded(NOW_PLAYING_CAPACITY);

        let instrument = match config.instrument.validate() {
            Ok(()) => config.instrument,
            Err(e) => {
                warn!(error = %e, "Malformed instrument settings, using default basic voice");
                InstrumentSettings::default()
            }
        };
        let tempo = if config.tempo.is_valid() { config.tempo } else { Tempo::default() };
        let sample_rate = if config.sample_rate > 0 { config.sample_rate } else { DEFAULT_SAMPLE_RATE };
        let effects = config.effects.sanitized();

        let mut master = EffectChain::new();
        master.add(Box::new(ReverbEffect::new(
            effects.reverb_wet as f32,
            effects.reverb_decay as f32,
            sample_rate as f32,
        )));
        master.add(Box::new(GainEffect::new(effects.master_gain as f32)));

        let pool = factory.build(&instrument, sample_rate as f32);

        let mut transport = Transport::new(tempo);
        transport.loop_enabled = config.loop_enabled;

        info!(
            archetype = %instrument.archetype(),
            bpm = tempo.bpm,
            sample_rate,
            "Session initialized"
        );

        let session = Self {
            transport,
            progression: Progression::new(),
            arpeggiator: config.arpeggiator,
            instrument,
            effects,
            schedule: None,
            cursor: 0,
            generation: 0,
            pool: Some(pool),
            master,
            context,
            factory,
            notifier: tx,
            sample_rate,
            mix: Vec::with_capacity(MAX_BLOCK_FRAMES),
            disposed: false,
        };
        (session, NowPlayingReceiver { rx })
    }

    pub fn state(&self) -> TransportState {
        self.transport.state
    }

    pub fn position(&self) -> Position {
        self.transport.position()
    }

    pub fn position_beats(&self) -> f64 {
        self.transport.position_beats()
    }

    pub fn tempo(&self) -> Tempo {
        self.transport.tempo
    }

    pub fn loop_enabled(&self) -> bool {
        self.transport.loop_enabled
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    pub fn arpeggiator(&self) -> &ArpeggiatorConfig {
        &self.arpeggiator
    }

    pub fn instrument(&self) -> &InstrumentSettings {
        &self.instrument
    }

    pub fn archetype(&self) -> Archetype {
        self.instrument.archetype()
    }

    pub fn effects(&self) -> &EffectsState {
        &self.effects
    }

    pub fn master(&self) -> &EffectChain {
        &self.master
    }

    /// The attached schedule, if any
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Counts schedule attachments; unchanged means no recompile happened
    pub fn schedule_generation(&self) -> u64 {
        self.generation
    }

    pub fn context_state(&self) -> ContextState {
        self.context.state()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed { Err(SessionError::Disposed) } else { Ok(()) }
    }

    fn resume_context(&mut self) -> Result<()> {
        if !self.context.is_running() {
            self.context.resume()?;
            debug!("Audio context resumed");
        }
        Ok(())
    }

    fn notify(&self, chord: Option<EventId>, position: Position) {
        send_now_playing(&self.notifier, NowPlaying { chord, position });
    }

    // Schedule lifecycle

    /// Drop the schedule; nothing pending can fire after this
    fn detach(&mut self) {
        if self.schedule.take().is_some() {
            trace!("Schedule detached");
        }
        self.cursor = 0;
    }

    fn attach(&mut self, schedule: Schedule, position_beats: f64) {
        self.transport.set_loop_beats(schedule.loop_length_beats());
        self.transport.seek(position_beats);
        self.cursor = schedule.first_index_at_or_after(self.transport.position_beats());
        self.generation += 1;
        debug!(
            events = schedule.len(),
            loop_beats = schedule.loop_length_beats(),
            position = %self.transport.position(),
            "Schedule attached"
        );
        self.schedule = Some(schedule);
        self.transport.mark_scheduled();
    }

    /// Clock to idle, notes released, position reset, "now playing = none"
    fn halt(&mut self) {
        self.transport.stop();
        self.detach();
        self.transport.set_loop_beats(0.0);
        if let Some(pool) = self.pool.as_mut() {
            pool.release_all();
        }
        self.notify(None, Position::ZERO);
    }

    /// Pause, swap in a freshly compiled schedule and resume at the same position
    fn recompile(&mut self) {
        if self.progression.is_empty() {
            if self.schedule.is_some() || self.transport.state != TransportState::Idle {
                debug!("Progression is empty, stopping");
                self.halt();
            }
            return;
        }
        let was_running = self.transport.is_running();
        let position = self.transport.position_beats();
        self.transport.pause();
        self.detach();
        let schedule = compile(&self.progression, &self.arpeggiator, self.transport.tempo);
        self.attach(schedule, position);
        if was_running {
            self.transport.play();
        }
    }

    fn swap_instrument(&mut self, settings: InstrumentSettings) {
        let from = self.instrument.archetype();
        let was_running = self.transport.is_running();
        let had_schedule = self.schedule.is_some();
        let position = self.transport.position_beats();

        // Pause, then drop the schedule while the old pool is still alive
        self.transport.pause();
        self.detach();

        if let Some(mut old) = self.pool.take() {
            old.release_all();
            old.dispose();
        }

        self.instrument = settings;
        self.pool = Some(self.factory.build(&settings, self.sample_rate as f32));

        if had_schedule && !self.progression.is_empty() {
            let schedule = compile(&self.progression, &self.arpeggiator, self.transport.tempo);
            self.attach(schedule, position);
        }
        if was_running {
            self.transport.play();
        }
        info!(%from, to = %settings.archetype(), "Instrument changed");
    }

    // Editing

    /// Replace the progression and recompile
    pub fn set_progression(&mut self, progression: Progression) -> Result<()> {
        self.ensure_live()?;
        debug!(events = progression.len(), beats = progression.total_beats(), "Progression updated");
        self.progression = progression;
        self.recompile();
        Ok(())
    }

    /// Change the clock rate. Schedules are in beats, so only an active
    /// arpeggiator needs a recompile.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        self.ensure_live()?;
        let tempo = Tempo::new(bpm, self.transport.tempo.beats_per_bar);
        if !tempo.is_valid() {
            warn!(bpm, "Ignoring invalid tempo");
            return Ok(());
        }
        self.transport.tempo = tempo;
        debug!(bpm, "Tempo changed");
        if self.arpeggiator.active {
            self.recompile();
        }
        Ok(())
    }

    /// Switch instrument. A different archetype rebuilds the voice pool;
    /// the same archetype is a live update.
    pub fn set_instrument(&mut self, settings: InstrumentSettings) -> Result<()> {
        self.ensure_live()?;
        let settings = match settings.validate() {
            Ok(()) => settings,
            Err(e) => {
                warn!(error = %e, "Malformed instrument settings, using default basic voice");
                InstrumentSettings::default()
            }
        };
        if settings.archetype() == self.instrument.archetype() {
            self.instrument = settings;
            if let Some(pool) = self.pool.as_mut() {
                pool.apply(&settings);
            }
            debug!(archetype = %settings.archetype(), "Instrument settings applied live");
            return Ok(());
        }
        self.swap_instrument(settings);
        Ok(())
    }

    /// Switch instrument from a loose settings record
    pub fn set_instrument_record(&mut self, archetype: Archetype, mut record: serde_json::Value) -> Result<()> {
        if let Some(fields) = record.as_object_mut() {
            fields.insert("archetype".to_string(), archetype.name().into());
        }
        self.set_instrument(InstrumentSettings::from_value(record))
    }

    /// Tweak the current instrument without recompiling or rebuilding the pool
    pub fn update_instrument_parameters(&mut self, patch: &InstrumentPatch) -> Result<()> {
        self.ensure_live()?;
        if patch.is_empty() {
            return Ok(());
        }
        let next = self.instrument.merged(patch)?;
        self.instrument = next;
        if let Some(pool) = self.pool.as_mut() {
            pool.apply(&next);
        }
        trace!(?patch, "Instrument parameters updated");
        Ok(())
    }

    pub fn set_arpeggiator(&mut self, config: ArpeggiatorConfig) -> Result<()> {
        self.ensure_live()?;
        debug!(active = config.active, step = %config.step, "Arpeggiator updated");
        self.arpeggiator = config;
        self.recompile();
        Ok(())
    }

    pub fn set_master_gain(&mut self, value: f64) -> Result<()> {
        self.ensure_live()?;
        self.effects.set_master_gain(value);
        self.master.set_param(GAIN, "gain", self.effects.master_gain as f32);
        Ok(())
    }

    pub fn set_reverb_wet(&mut self, value: f64) -> Result<()> {
        self.ensure_live()?;
        self.effects.set_reverb_wet(value);
        self.master.set_param(REVERB, "wet", self.effects.reverb_wet as f32);
        Ok(())
    }

    pub fn set_reverb_decay(&mut self, value: f64) -> Result<()> {
        self.ensure_live()?;
        self.effects.set_reverb_decay(value);
        self.master.set_param(REVERB, "decay", self.effects.reverb_decay as f32);
        Ok(())
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_live()?;
        self.transport.loop_enabled = enabled;
        Ok(())
    }

    /// Audition `notes` right away, independent of the transport
    pub fn preview_chord(&mut self, notes: &[PitchName]) -> Result<()> {
        self.ensure_live()?;
        self.resume_context()?;
        if notes.is_empty() {
            return Ok(());
        }
        if let Some(pool) = self.pool.as_mut() {
            pool.trigger_attack_release(notes, PREVIEW_SECONDS, 0);
        }
        Ok(())
    }

    // Transport

    /// Resume the audio context; required before anything can sound
    pub fn start(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.resume_context()
    }

    /// Continue from a paused position
    pub fn resume(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.transport.state == TransportState::Paused {
            return self.play();
        }
        self.resume_context()
    }

    pub fn play(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.resume_context()?;
        if self.transport.is_running() {
            return Ok(());
        }
        if self.schedule.is_none() {
            if self.progression.is_empty() {
                debug!("Nothing to play");
                return Ok(());
            }
            let schedule = compile(&self.progression, &self.arpeggiator, self.transport.tempo);
            self.attach(schedule, self.transport.position_beats());
        }
        self.transport.play();
        info!(position = %self.transport.position(), "Playback started");
        Ok(())
    }

    /// Stop the clock and keep the position
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.transport.is_running() {
            self.transport.pause();
            if let Some(pool) = self.pool.as_mut() {
                pool.release_all();
            }
            info!(position = %self.transport.position(), "Playback paused");
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.halt();
        info!("Playback stopped");
        Ok(())
    }

    /// Tear everything down; later calls are no-ops
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.transport.stop();
        self.detach();
        if let Some(mut pool) = self.pool.take() {
            pool.release_all();
            pool.dispose();
        }
        self.master.clear();
        self.context.close();
        self.notify(None, Position::ZERO);
        self.disposed = true;
        info!("Session disposed");
    }

    // Clock

    fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == 0 || sample_rate == self.sample_rate {
            return;
        }
        debug!(from = self.sample_rate, to = sample_rate, "Sample rate changed");
        self.sample_rate = sample_rate;
        if let Some(pool) = self.pool.as_mut() {
            pool.set_sample_rate(sample_rate as f32);
        }
        self.master.set_sample_rate(sample_rate as f32);
    }

    /// Fire the events whose start falls inside `span`
    fn fire_span(&mut self, span: Span, offset_beats: f64, samples_per_beat: f64, frames: usize) {
        let Some(schedule) = self.schedule.as_ref() else {
            return;
        };
        let tempo = self.transport.tempo;
        let events = schedule.events();
        while let Some(event) = events.get(self.cursor) {
            if event.start_beats >= span.to {
                break;
            }
            self.cursor += 1;

            let beats_into_block = offset_beats + (event.start_beats - span.from).max(0.0);
            let offset = ((beats_into_block * samples_per_beat) as usize).min(frames.saturating_sub(1));

            let notes = event.payload.notes();
            if !notes.is_empty() {
                if let Some(pool) = self.pool.as_mut() {
                    pool.trigger_attack_release(notes, tempo.beats_to_seconds(event.duration_beats), offset as u32);
                }
            }
            send_now_playing(
                &self.notifier,
                NowPlaying {
                    chord: Some(event.source),
                    position: event.start,
                },
            );
        }
    }

    /// Advance the clock by one block and fire what it crosses
    fn tick(&mut self, frames: usize) {
        if !self.transport.is_running() {
            return;
        }
        let seconds = frames as f64 / self.sample_rate as f64;
        let samples_per_beat = self.transport.samples_per_beat(self.sample_rate);
        let spans = self.transport.advance(seconds);

        let mut offset_beats = 0.0;
        for span in spans {
            self.fire_span(span, offset_beats, samples_per_beat, frames);
            offset_beats += span.to - span.from;
            if span.reaches_end {
                if self.transport.loop_enabled {
                    self.cursor = 0;
                    trace!("Loop wrapped");
                } else {
                    info!("Reached end of progression");
                    self.halt();
                    break;
                }
            }
        }
    }

    /// Tick and render one mono block into `self.mix`
    fn render_block(&mut self, frames: usize) {
        self.tick(frames);
        self.mix.clear();
        if let Some(pool) = self.pool.as_mut() {
            self.mix.extend_from_slice(pool.process(frames));
        }
        self.mix.resize(frames, 0.0);
        self.master.process(&mut self.mix);
    }

    /// Run the clock for `seconds` of audio without an output device
    pub fn advance(&mut self, seconds: f64) {
        if self.disposed || !seconds.is_finite() || seconds <= 0.0 {
            return;
        }
        let mut remaining = (seconds * self.sample_rate as f64).round() as usize;
        while remaining > 0 {
            let frames = remaining.min(MAX_BLOCK_FRAMES);
            self.render_block(frames);
            remaining -= frames;
        }
    }

    /// Fill an interleaved output buffer; silence until the context runs
    pub fn render(&mut self, buffer: &mut [f32], channels: u16, sample_rate: u32) {
        let channels = channels.max(1) as usize;
        if self.disposed || !self.context.is_running() {
            buffer.fill(0.0);
            return;
        }
        self.set_sample_rate(sample_rate);

        let total_frames = buffer.len() / channels;
        let mut start = 0;
        while start < total_frames {
            let frames = (total_frames - start).min(MAX_BLOCK_FRAMES);
            self.render_block(frames);
            let block = &mut buffer[start * channels..(start + frames) * channels];
            for (frame, sample) in block.chunks_mut(channels).zip(&self.mix) {
                frame.fill(*sample);
            }
            start += frames;
        }
        buffer[total_frames * channels..].fill(0.0);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_effects::NativeVoiceFactory;
    use crate::context::OfflineContext;
    use chordweaver_core::{parse_notes, RepeatCount, TimeToken};

    const RATE: u32 = 8_000;

    fn session() -> (Session, NowPlayingReceiver) {
        let config = SessionConfig {
            sample_rate: RATE,
            ..Default::default()
        };
        Session::initialize(config, Box::new(OfflineContext::new()), Box::new(NativeVoiceFactory))
    }

    fn progression(chords: &[(&[&str], f64)]) -> Progression {
        let mut p = Progression::new();
        for (notes, beats) in chords {
            p.push(parse_notes(notes).unwrap(), *beats).unwrap();
        }
        p
    }

    fn drain(rx: &NowPlayingReceiver) -> Vec<Option<EventId>> {
        let mut seen = Vec::new();
        rx.dispatch(|n| seen.push(n.chord));
        seen
    }

    #[test]
    fn test_play_resumes_context_first() {
        let (mut s, _rx) = session();
        s.set_progression(progression(&[(&["C4", "E4", "G4"], 4.0)])).unwrap();
        assert_eq!(s.state(), TransportState::Scheduled);
        assert_eq!(s.context_state(), ContextState::Suspended);
        s.play().unwrap();
        assert_eq!(s.context_state(), ContextState::Running);
        assert_eq!(s.state(), TransportState::Running);
    }

    #[test]
    fn test_refused_context_blocks_playback() {
        let config = SessionConfig { sample_rate: RATE, ..Default::default() };
        let (mut s, _rx) =
            Session::initialize(config, Box::new(OfflineContext::refusing()), Box::new(NativeVoiceFactory));
        s.set_progression(progression(&[(&["C4", "E4"], 4.0)])).unwrap();
        assert!(matches!(s.play(), Err(SessionError::Context(_))));
        assert!(matches!(s.preview_chord(&parse_notes(&["C4"]).unwrap()), Err(SessionError::Context(_))));
        assert_eq!(s.state(), TransportState::Scheduled);
    }

    #[test]
    fn test_pause_keeps_position_and_resume_continues() {
        let (mut s, rx) = session();
        s.set_progression(progression(&[(&["C4", "E4"], 4.0), (&["D4", "F4"], 4.0)])).unwrap();
        s.play().unwrap();
        s.advance(1.25);
        s.pause().unwrap();
        assert_eq!(s.state(), TransportState::Paused);
        let paused_at = s.position_beats();
        assert!((paused_at - 2.5).abs() < 1e-6);
        s.advance(3.0);
        assert_eq!(s.position_beats(), paused_at);

        s.resume().unwrap();
        s.advance(1.0);
        assert!((s.position_beats() - 4.5).abs() < 1e-6);
        assert_eq!(drain(&rx).len(), 2);
    }

    #[test]
    fn test_stop_resets_and_notifies_none() {
        let (mut s, rx) = session();
        s.set_progression(progression(&[(&["C4", "E4"], 4.0)])).unwrap();
        s.play().unwrap();
        s.advance(0.5);
        s.stop().unwrap();
        assert_eq!(s.state(), TransportState::Idle);
        assert_eq!(s.position_beats(), 0.0);
        assert!(s.schedule().is_none());
        let seen = drain(&rx);
        assert_eq!(seen.last(), Some(&None));

        // play recompiles after a stop
        s.play().unwrap();
        assert!(s.schedule().is_some());
    }

    #[test]
    fn test_end_without_loop_stops() {
        let (mut s, rx) = session();
        s.set_loop_enabled(false).unwrap();
        let p = progression(&[(&["C4", "E4"], 2.0), (&["D4", "F4"], 2.0)]);
        let ids: Vec<EventId> = p.events().iter().map(|e| e.id()).collect();
        s.set_progression(p).unwrap();
        s.play().unwrap();
        s.advance(3.0);
        assert_eq!(s.state(), TransportState::Idle);
        assert_eq!(drain(&rx), [Some(ids[0]), Some(ids[1]), None]);
    }

    #[test]
    fn test_empty_progression_forces_stop() {
        let (mut s, rx) = session();
        s.set_progression(progression(&[(&["C4", "E4"], 4.0)])).unwrap();
        s.play().unwrap();
        s.advance(0.5);
        s.set_progression(Progression::new()).unwrap();
        assert_eq!(s.state(), TransportState::Idle);
        assert_eq!(drain(&rx).last(), Some(&None));
        // nothing to play
        s.play().unwrap();
        assert_eq!(s.state(), TransportState::Idle);
    }

    #[test]
    fn test_recompile_resumes_at_same_position() {
        let (mut s, _rx) = session();
        s.set_progression(progression(&[(&["C4", "E4"], 4.0), (&["D4", "F4"], 4.0)])).unwrap();
        s.play().unwrap();
        s.advance(1.5);
        let before = s.position_beats();
        let generation = s.schedule_generation();
        s.set_progression(progression(&[(&["C4", "E4"], 4.0), (&["G4", "B4"], 2.0)])).unwrap();
        assert_eq!(s.state(), TransportState::Running);
        assert_eq!(s.position_beats(), before);
        assert_eq!(s.schedule_generation(), generation + 1);

        // shrinking the loop wraps the position into it
        s.set_progression(progression(&[(&["C4", "E4"], 2.0)])).unwrap();
        assert!((s.position_beats() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tempo_recompiles_only_with_arpeggiator() {
        let (mut s, _rx) = session();
        s.set_progression(progression(&[(&["C4", "E4", "G4"], 4.0)])).unwrap();
        let generation = s.schedule_generation();
        s.set_tempo(90.0).unwrap();
        assert_eq!(s.schedule_generation(), generation);
        assert_eq!(s.tempo().bpm, 90.0);

        let arp = ArpeggiatorConfig::new(true, TimeToken::Seconds(0.5), RepeatCount::Unbounded);
        s.set_arpeggiator(arp).unwrap();
        let generation = s.schedule_generation();
        let before = s.schedule().map(Schedule::len);
        s.set_tempo(60.0).unwrap();
        assert_eq!(s.schedule_generation(), generation + 1);
        assert_ne!(s.schedule().map(Schedule::len), before);

        s.set_tempo(f64::NAN).unwrap();
        assert_eq!(s.tempo().bpm, 60.0);
    }

    #[test]
    fn test_invalid_patch_leaves_instrument_unchanged() {
        let (mut s, _rx) = session();
        let before = *s.instrument();
        let bad = InstrumentPatch { sustain: Some(2.0), ..Default::default() };
        assert!(matches!(s.update_instrument_parameters(&bad), Err(SessionError::Invalid(_))));
        assert_eq!(*s.instrument(), before);
    }

    #[test]
    fn test_malformed_record_falls_back_to_basic() {
        let (mut s, _rx) = session();
        s.set_instrument_record(Archetype::Fm, serde_json::json!({ "harmonicity": 3.5 })).unwrap();
        assert_eq!(s.archetype(), Archetype::Fm);
        s.set_instrument_record(Archetype::Mono, serde_json::json!({ "filter_cutoff": -1.0 })).unwrap();
        assert_eq!(s.archetype(), Archetype::Basic);
    }

    #[test]
    fn test_master_controls_clamp() {
        let (mut s, _rx) = session();
        s.set_master_gain(5.0).unwrap();
        s.set_reverb_wet(0.5).unwrap();
        s.set_reverb_decay(0.0).unwrap();
        assert_eq!(s.effects().master_gain, 2.0);
        assert_eq!(s.effects().reverb_wet, 0.5);
        let reverb = s.master().effects()[0].get_params();
        assert_eq!(reverb[0].value, 0.5);
        assert_eq!(reverb[1].value, 0.1);
    }

    #[test]
    fn test_render_duplicates_mono_and_waits_for_context() {
        let (mut s, _rx) = session();
        let mut buffer = vec![1.0f32; 512];
        s.render(&mut buffer, 2, RATE);
        assert!(buffer.iter().all(|x| *x == 0.0));

        s.preview_chord(&parse_notes(&["C4", "E4", "G4"]).unwrap()).unwrap();
        s.render(&mut buffer, 2, RATE);
        assert!(buffer.iter().any(|x| x.abs() > 1e-4));
        for frame in buffer.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut s, rx) = session();
        s.set_progression(progression(&[(&["C4", "E4"], 4.0)])).unwrap();
        s.play().unwrap();
        s.advance(0.1);
        s.dispose();
        s.dispose();
        assert!(s.is_disposed());
        assert_eq!(s.context_state(), ContextState::Closed);
        assert!(matches!(s.play(), Err(SessionError::Disposed)));
        assert!(matches!(s.set_tempo(100.0), Err(SessionError::Disposed)));
        assert_eq!(drain(&rx), [Some(s.progression().events()[0].id()), None]);
    }
}
