//! Instrument settings: one variant per voice archetype

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordweaverError, Result};

/// Amplitude envelope; times in seconds, sustain as a 0..=1 level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.02,
            decay: 0.3,
            sustain: 0.6,
            release: 0.8,
        }
    }
}

impl Envelope {
    pub fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self { attack, decay, sustain, release }
    }

    fn validate(&self, what: &str) -> Result<()> {
        let times = [self.attack, self.decay, self.release];
        if times.iter().any(|t| !t.is_finite() || *t < 0.0 || *t > 30.0) {
            return Err(ChordweaverError::InvalidInstrument(format!(
                "{what} times must be between 0 and 30 seconds"
            )));
        }
        if !(0.0..=1.0).contains(&self.sustain) {
            return Err(ChordweaverError::InvalidInstrument(format!(
                "{what} sustain must be between 0 and 1"
            )));
        }
        Ok(())
    }
}

/// Filter envelope sweeping `octaves` above the cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterEnvelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
    pub octaves: f64,
}

impl Default for FilterEnvelope {
    fn default() -> Self {
        Self {
            attack: 0.05,
            decay: 0.4,
            sustain: 0.3,
            release: 1.0,
            octaves: 3.0,
        }
    }
}

impl FilterEnvelope {
    pub fn amplitude(&self) -> Envelope {
        Envelope::new(self.attack, self.decay, self.sustain, self.release)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// One sample at `phase` in 0..1
    pub fn sample(&self, phase: f64) -> f64 {
        let phase = phase - phase.floor();
        match self {
            Self::Sine => (phase * std::f64::consts::TAU).sin(),
            Self::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Self::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }
            Self::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// Voice archetypes; switching between them builds a new voice pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    #[default]
    Basic,
    Fm,
    Am,
    Mono,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [Self::Basic, Self::Fm, Self::Am, Self::Mono];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Fm => "fm",
            Self::Am => "am",
            Self::Mono => "mono",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Archetype {
    type Err = ChordweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == lower)
            .ok_or_else(|| ChordweaverError::InvalidInstrument(format!("unknown archetype: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicVoice {
    pub envelope: Envelope,
    /// Output level in dB
    pub volume: f64,
    pub waveform: Waveform,
}

impl Default for BasicVoice {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            volume: -8.0,
            waveform: Waveform::Triangle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmVoice {
    pub envelope: Envelope,
    pub volume: f64,
    /// Modulator frequency as a ratio of the carrier
    pub harmonicity: f64,
    pub modulation_index: f64,
    pub modulation_envelope: Envelope,
}

impl Default for FmVoice {
    fn default() -> Self {
        Self {
            envelope: Envelope::new(0.01, 0.5, 0.4, 1.2),
            volume: -10.0,
            harmonicity: 3.0,
            modulation_index: 10.0,
            modulation_envelope: Envelope::new(0.5, 0.1, 1.0, 0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmVoice {
    pub envelope: Envelope,
    pub volume: f64,
    pub harmonicity: f64,
    pub modulation_waveform: Waveform,
}

impl Default for AmVoice {
    fn default() -> Self {
        Self {
            envelope: Envelope::new(0.01, 0.3, 0.5, 1.0),
            volume: -8.0,
            harmonicity: 2.0,
            modulation_waveform: Waveform::Square,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonoVoice {
    pub envelope: Envelope,
    pub volume: f64,
    pub waveform: Waveform,
    /// Base lowpass cutoff in Hz
    pub filter_cutoff: f64,
    /// Filter Q
    pub filter_resonance: f64,
    pub filter_envelope: FilterEnvelope,
}

impl Default for MonoVoice {
    fn default() -> Self {
        Self {
            envelope: Envelope::new(0.005, 0.2, 0.5, 0.6),
            volume: -10.0,
            waveform: Waveform::Sawtooth,
            filter_cutoff: 300.0,
            filter_resonance: 1.5,
            filter_envelope: FilterEnvelope::default(),
        }
    }
}

/// Settings for the current instrument, tagged by archetype
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "archetype", rename_all = "lowercase")]
pub enum InstrumentSettings {
    Basic(BasicVoice),
    Fm(FmVoice),
    Am(AmVoice),
    Mono(MonoVoice),
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self::Basic(BasicVoice::default())
    }
}

impl InstrumentSettings {
    pub fn default_for(archetype: Archetype) -> Self {
        match archetype {
            Archetype::Basic => Self::Basic(BasicVoice::default()),
            Archetype::Fm => Self::Fm(FmVoice::default()),
            Archetype::Am => Self::Am(AmVoice::default()),
            Archetype::Mono => Self::Mono(MonoVoice::default()),
        }
    }

    pub fn archetype(&self) -> Archetype {
        match self {
            Self::Basic(_) => Archetype::Basic,
            Self::Fm(_) => Archetype::Fm,
            Self::Am(_) => Archetype::Am,
            Self::Mono(_) => Archetype::Mono,
        }
    }

    pub fn envelope(&self) -> Envelope {
        match self {
            Self::Basic(v) => v.envelope,
            Self::Fm(v) => v.envelope,
            Self::Am(v) => v.envelope,
            Self::Mono(v) => v.envelope,
        }
    }

    /// Output level in dB
    pub fn volume(&self) -> f64 {
        match self {
            Self::Basic(v) => v.volume,
            Self::Fm(v) => v.volume,
            Self::Am(v) => v.volume,
            Self::Mono(v) => v.volume,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.envelope().validate("envelope")?;
        let volume = self.volume();
        if !volume.is_finite() || !(-96.0..=12.0).contains(&volume) {
            return Err(ChordweaverError::InvalidInstrument(format!(
                "volume {volume} dB outside -96..=12"
            )));
        }
        match self {
            Self::Basic(_) => Ok(()),
            Self::Fm(v) => {
                v.modulation_envelope.validate("modulation envelope")?;
                check_range("harmonicity", v.harmonicity, 0.01, 32.0)?;
                check_range("modulation index", v.modulation_index, 0.0, 100.0)
            }
            Self::Am(v) => check_range("harmonicity", v.harmonicity, 0.01, 32.0),
            Self::Mono(v) => {
                v.filter_envelope.amplitude().validate("filter envelope")?;
                check_range("filter cutoff", v.filter_cutoff, 20.0, 20_000.0)?;
                check_range("filter resonance", v.filter_resonance, 0.1, 30.0)?;
                check_range("filter envelope octaves", v.filter_envelope.octaves, 0.0, 8.0)
            }
        }
    }

    /// Strictly decode a loose settings record
    pub fn try_from_value(value: serde_json::Value) -> Result<Self> {
        let settings: Self = serde_json::from_value(value)
            .map_err(|e| ChordweaverError::InvalidInstrument(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Decode a loose settings record, falling back to the default basic voice
    pub fn from_value(value: serde_json::Value) -> Self {
        Self::try_from_value(value).unwrap_or_default()
    }

    /// Apply a partial update; fields that do not exist on this archetype are ignored
    pub fn merged(&self, patch: &InstrumentPatch) -> Result<Self> {
        let mut next = *self;
        {
            let envelope = match &mut next {
                Self::Basic(v) => &mut v.envelope,
                Self::Fm(v) => &mut v.envelope,
                Self::Am(v) => &mut v.envelope,
                Self::Mono(v) => &mut v.envelope,
            };
            set(&mut envelope.attack, patch.attack);
            set(&mut envelope.decay, patch.decay);
            set(&mut envelope.sustain, patch.sustain);
            set(&mut envelope.release, patch.release);
        }
        match &mut next {
            Self::Basic(v) => {
                set(&mut v.volume, patch.volume);
                set(&mut v.waveform, patch.waveform);
            }
            Self::Fm(v) => {
                set(&mut v.volume, patch.volume);
                set(&mut v.harmonicity, patch.harmonicity);
                set(&mut v.modulation_index, patch.modulation_index);
            }
            Self::Am(v) => {
                set(&mut v.volume, patch.volume);
                set(&mut v.harmonicity, patch.harmonicity);
                set(&mut v.modulation_waveform, patch.modulation_waveform);
            }
            Self::Mono(v) => {
                set(&mut v.volume, patch.volume);
                set(&mut v.waveform, patch.waveform);
                set(&mut v.filter_cutoff, patch.filter_cutoff);
                set(&mut v.filter_resonance, patch.filter_resonance);
                set(&mut v.filter_envelope.octaves, patch.filter_octaves);
            }
        }
        next.validate()?;
        Ok(next)
    }
}

fn set<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ChordweaverError::InvalidInstrument(format!(
            "{name} {value} outside {min}..={max}"
        )))
    }
}

/// Live knob changes for the current instrument
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentPatch {
    pub attack: Option<f64>,
    pub decay: Option<f64>,
    pub sustain: Option<f64>,
    pub release: Option<f64>,
    pub volume: Option<f64>,
    pub waveform: Option<Waveform>,
    pub harmonicity: Option<f64>,
    pub modulation_index: Option<f64>,
    pub modulation_waveform: Option<Waveform>,
    pub filter_cutoff: Option<f64>,
    pub filter_resonance: Option<f64>,
    pub filter_octaves: Option<f64>,
}

impl InstrumentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
