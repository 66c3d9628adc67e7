//! Polyphonic synth covering every voice archetype

use std::f64::consts::TAU;
use std::fmt;

use chordweaver_core::{Envelope, InstrumentSettings, PitchName, Archetype};
use fundsp::hacker::*;
use tracing::{debug, warn};

use crate::audio_effects::{PolySynth, VoiceFactory};

pub const MAX_VOICES: usize = 32;
const MAX_BLOCK_SIZE: usize = 4096;
/// Filter coefficients are refreshed every this many samples
const FILTER_UPDATE_INTERVAL: usize = 32;

/// ADSR progress for one voice
#[derive(Debug, Clone, Copy, Default)]
struct AdsrState {
    elapsed: f64,
    /// (seconds since release, level when released)
    released: Option<(f64, f64)>,
    level: f64,
}

impl AdsrState {
    fn start(&mut self) {
        *self = Self::default();
    }

    fn release(&mut self) {
        if self.released.is_none() {
            self.released = Some((0.0, self.level));
        }
    }

    /// Advance by `dt`; `None` once the release stage has finished
    fn tick(&mut self, env: &Envelope, dt: f64) -> Option<f64> {
        let level = match &mut self.released {
            None => {
                let t = self.elapsed;
                self.elapsed += dt;
                if t < env.attack {
                    t / env.attack
                } else if t < env.attack + env.decay {
                    1.0 - (1.0 - env.sustain) * (t - env.attack) / env.decay
                } else {
                    env.sustain
                }
            }
            Some((since, from)) => {
                let t = *since;
                *since += dt;
                if t >= env.release {
                    return None;
                }
                *from * (1.0 - t / env.release)
            }
        };
        self.level = level;
        Some(level)
    }
}

struct SynthVoice {
    active: bool,
    age: usize,
    midi: i32,
    frequency: f64,
    phase: f64,
    mod_phase: f64,
    /// Samples left before the gate closes
    gate: usize,
    amp: AdsrState,
    /// Modulation envelope (fm) or filter envelope (mono)
    modulation: AdsrState,
    filter: An<FixedSvf<f64, LowpassMode<f64>>>,
}

impl SynthVoice {
    fn new(sample_rate: f32) -> Self {
        let mut filter = lowpass_hz(1000.0, 0.707);
        filter.set_sample_rate(sample_rate as f64);
        Self {
            active: false,
            age: 0,
            midi: 0,
            frequency: 0.0,
            phase: 0.0,
            mod_phase: 0.0,
            gate: 0,
            amp: AdsrState::default(),
            modulation: AdsrState::default(),
            filter,
        }
    }

    fn trigger(&mut self, note: &PendingNote, sample_rate: f32) {
        self.active = true;
        self.age = 0;
        self.midi = note.midi;
        self.frequency = note.frequency;
        self.phase = 0.0;
        self.mod_phase = 0.0;
        self.gate = (note.gate_secs * sample_rate as f64).round() as usize;
        self.amp.start();
        self.modulation.start();
        self.filter.reset();
    }

    fn release(&mut self) {
        self.gate = 0;
        self.amp.release();
        self.modulation.release();
    }

    fn tick(&mut self, settings: &InstrumentSettings, sample_rate: f32) -> f32 {
        if !self.active {
            return 0.0;
        }

        self.age += 1;
        let dt = 1.0 / sample_rate as f64;

        if self.gate == 0 {
            self.amp.release();
            self.modulation.release();
        } else {
            self.gate -= 1;
        }

        let Some(level) = self.amp.tick(&settings.envelope(), dt) else {
            self.active = false;
            return 0.0;
        };

        let sample = match settings {
            InstrumentSettings::Basic(v) => v.waveform.sample(self.phase),
            InstrumentSettings::Fm(v) => {
                let depth = self.modulation.tick(&v.modulation_envelope, dt).unwrap_or(0.0)
                    * v.modulation_index;
                let modulator = (self.mod_phase * TAU).sin();
                self.mod_phase = (self.mod_phase + self.frequency * v.harmonicity * dt).fract();
                (self.phase * TAU + depth * modulator).sin()
            }
            InstrumentSettings::Am(v) => {
                let modulator = v.modulation_waveform.sample(self.mod_phase);
                self.mod_phase = (self.mod_phase + self.frequency * v.harmonicity * dt).fract();
                (self.phase * TAU).sin() * (0.5 + 0.5 * modulator)
            }
            InstrumentSettings::Mono(v) => {
                let sweep = self
                    .modulation
                    .tick(&v.filter_envelope.amplitude(), dt)
                    .unwrap_or(0.0);
                if self.age % FILTER_UPDATE_INTERVAL == 1 {
                    let nyquist = sample_rate as f64 * 0.45;
                    let cutoff = (v.filter_cutoff * 2f64.powf(sweep * v.filter_envelope.octaves))
                        .min(nyquist);
                    self.filter
                        .set(Setting::center_q(cutoff as f32, v.filter_resonance as f32));
                }
                let input = Frame::from([v.waveform.sample(self.phase) as f32]);
                let output = self.filter.tick(&input);
                output[0] as f64
            }
        };

        self.phase = (self.phase + self.frequency * dt).fract();
        (sample * level) as f32
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingNote {
    midi: i32,
    frequency: f64,
    gate_secs: f64,
    offset: u32,
}

/// Native voice pool; one instance per archetype lifetime
pub struct NativePolySynth {
    settings: InstrumentSettings,
    sample_rate: f32,
    voices: Vec<SynthVoice>,
    pending: Vec<PendingNote>,
    output: Vec<f32>,
    /// Linear output level from the settings' dB volume
    level: f32,
    disposed: bool,
}

impl fmt::Debug for NativePolySynth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativePolySynth")
            .field("archetype", &self.settings.archetype())
            .field("sample_rate", &self.sample_rate)
            .field("active_voices", &self.active_voices())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl NativePolySynth {
    pub fn new(settings: InstrumentSettings, sample_rate: f32) -> Self {
        let voices = (0..MAX_VOICES).map(|_| SynthVoice::new(sample_rate)).collect();
        Self {
            settings,
            sample_rate,
            voices,
            pending: Vec::new(),
            output: vec![0.0; MAX_BLOCK_SIZE],
            level: db_amp(settings.volume() as f32) as f32,
            disposed: false,
        }
    }

    pub fn settings(&self) -> &InstrumentSettings {
        &self.settings
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    fn start_note(&mut self, note: &PendingNote) {
        // Find voice: same pitch (retrigger), or inactive, or oldest
        let voice_idx = self
            .voices
            .iter()
            .position(|v| v.active && v.midi == note.midi)
            .or_else(|| self.voices.iter().position(|v| !v.active))
            .unwrap_or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, v)| v.age)
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            });

        self.voices[voice_idx].trigger(note, self.sample_rate);
    }
}

impl PolySynth for NativePolySynth {
    fn archetype(&self) -> Archetype {
        self.settings.archetype()
    }

    fn trigger_attack_release(&mut self, notes: &[PitchName], duration_secs: f64, sample_offset: u32) {
        if self.disposed {
            warn!(notes = notes.len(), "Trigger on disposed voice pool ignored");
            return;
        }
        let gate_secs = if duration_secs.is_finite() { duration_secs.max(0.0) } else { 0.0 };
        for note in notes {
            self.pending.push(PendingNote {
                midi: note.midi(),
                frequency: note.frequency(),
                gate_secs,
                offset: sample_offset,
            });
        }
    }

    fn release_all(&mut self) {
        self.pending.clear();
        for voice in &mut self.voices {
            if voice.active {
                voice.release();
            }
        }
    }

    fn apply(&mut self, settings: &InstrumentSettings) {
        if settings.archetype() != self.settings.archetype() {
            warn!(
                current = %self.settings.archetype(),
                requested = %settings.archetype(),
                "Live update cannot change archetype"
            );
            return;
        }
        self.settings = *settings;
        self.level = db_amp(settings.volume() as f32) as f32;
    }

    fn process(&mut self, num_frames: usize) -> &[f32] {
        let frames = Ord::min(num_frames, MAX_BLOCK_SIZE);
        self.output[..frames].fill(0.0);
        if self.disposed {
            return &self.output[..frames];
        }

        // Sort events by offset
        self.pending.sort_by_key(|n| n.offset);

        for frame_idx in 0..frames {
            while let Some(&note) = self.pending.first() {
                if note.offset as usize > frame_idx {
                    break;
                }
                self.pending.remove(0);
                self.start_note(&note);
            }

            let mut mix = 0.0f32;
            for voice in &mut self.voices {
                if voice.active {
                    mix += voice.tick(&self.settings, self.sample_rate);
                }
            }

            // Apply level and soft clip
            self.output[frame_idx] = (mix * self.level).tanh();
        }

        for note in &mut self.pending {
            note.offset -= frames as u32;
        }

        &self.output[..frames]
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for voice in &mut self.voices {
            voice.filter.set_sample_rate(sample_rate as f64);
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.pending.clear();
        for voice in &mut self.voices {
            voice.active = false;
        }
        self.disposed = true;
        debug!(archetype = %self.settings.archetype(), "Voice pool disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Builds [`NativePolySynth`] pools
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeVoiceFactory;

impl VoiceFactory for NativeVoiceFactory {
    fn build(&self, settings: &InstrumentSettings, sample_rate: f32) -> Box<dyn PolySynth> {
        debug!(archetype = %settings.archetype(), sample_rate, "Building voice pool");
        Box::new(NativePolySynth::new(*settings, sample_rate))
    }
}
