//! Master-bus effects and the voice pool seam

mod native;
pub mod native_instruments;

pub use native::{GainEffect, ReverbEffect};
pub use native_instruments::{NativePolySynth, NativeVoiceFactory};

use std::fmt::Debug;

use chordweaver_core::{Archetype, InstrumentSettings, PitchName};

/// Audio effect that can process samples in-place
pub trait AudioEffect: Send + Debug {
    fn name(&self) -> &str;
    fn process(&mut self, samples: &mut [f32]);
    fn set_param(&mut self, name: &str, value: f32);
    fn get_params(&self) -> Vec<EffectParam>;
    fn set_bypass(&mut self, bypass: bool);
    fn is_bypassed(&self) -> bool;
    /// Update sample rate for effects that depend on it
    fn set_sample_rate(&mut self, _sample_rate: f32) {}
}

/// Polyphonic voice pool for one instrument archetype.
///
/// A pool is owned by exactly one session at a time. Once disposed it
/// must ignore every trigger.
pub trait PolySynth: Send + Debug {
    fn archetype(&self) -> Archetype;
    /// Start `notes` at `sample_offset` into the next processed block and
    /// release them after `duration_secs`
    fn trigger_attack_release(&mut self, notes: &[PitchName], duration_secs: f64, sample_offset: u32);
    /// Move every sounding voice into its release stage
    fn release_all(&mut self);
    /// Live parameter update for the same archetype
    fn apply(&mut self, settings: &InstrumentSettings);
    /// Render the next mono block
    fn process(&mut self, num_frames: usize) -> &[f32];
    fn set_sample_rate(&mut self, sample_rate: f32);
    fn dispose(&mut self);
    fn is_disposed(&self) -> bool;
}

/// Builds voice pools from instrument settings
pub trait VoiceFactory: Send {
    fn build(&self, settings: &InstrumentSettings, sample_rate: f32) -> Box<dyn PolySynth>;
}

#[derive(Debug, Clone)]
pub struct EffectParam {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub unit: String,
}

impl EffectParam {
    pub fn new(name: &str, value: f32, min: f32, max: f32, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
            unit: unit.to_string(),
        }
    }
}

/// Chain of audio effects processed in order
#[derive(Debug, Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn AudioEffect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Box<dyn AudioEffect>) {
        self.effects.push(effect);
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for effect in &mut self.effects {
            if !effect.is_bypassed() {
                effect.process(samples);
            }
        }
    }

    /// Set a parameter on the first effect called `effect`
    pub fn set_param(&mut self, effect: &str, param: &str, value: f32) -> bool {
        match self.effects.iter_mut().find(|e| e.name() == effect) {
            Some(target) => {
                target.set_param(param, value);
                true
            }
            None => false,
        }
    }

    pub fn effects(&self) -> &[Box<dyn AudioEffect>] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for effect in &mut self.effects {
            effect.set_sample_rate(sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_runs_in_order_and_bypasses() {
        let mut chain = EffectChain::new();
        chain.add(Box::new(GainEffect::new(0.5)));
        chain.add(Box::new(GainEffect::new(4.0)));
        let mut samples = [0.25f32; 4];
        chain.process(&mut samples);
        // second gain is clamped to 2.0
        assert_eq!(samples, [0.25; 4]);

        let mut muted = GainEffect::new(0.0);
        muted.set_bypass(true);
        chain.add(Box::new(muted));
        let mut samples = [0.25f32; 4];
        chain.process(&mut samples);
        assert_eq!(samples, [0.25; 4]);
        assert_eq!(chain.len(), 3);

        chain.clear();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_set_param_by_effect_name() {
        let mut chain = EffectChain::new();
        chain.add(Box::new(ReverbEffect::new(0.25, 2.5, 44_100.0)));
        chain.add(Box::new(GainEffect::new(1.0)));
        assert!(chain.set_param("Gain", "gain", 0.5));
        assert!(!chain.set_param("Chorus", "depth", 0.5));
        let gain = &chain.effects()[1].get_params()[0];
        assert_eq!(gain.value, 0.5);
        assert!(chain.set_param("Reverb", "wet", 0.75));
        let wet = &chain.effects()[0].get_params()[0];
        assert_eq!(wet.value, 0.75);
    }
}
