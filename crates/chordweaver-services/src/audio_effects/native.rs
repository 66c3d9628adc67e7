//! Master-bus effects

use std::cmp::Ord;
use std::fmt;

use chordweaver_core::effects::{MAX_MASTER_GAIN, MAX_REVERB_DECAY, MIN_REVERB_DECAY};
use fundsp::hacker::*;

use super::{AudioEffect, EffectParam};

/// Linear master gain
#[derive(Debug)]
pub struct GainEffect {
    gain: f32,
    bypassed: bool,
}

impl GainEffect {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: clamp_gain(gain),
            bypassed: false,
        }
    }
}

fn clamp_gain(gain: f32) -> f32 {
    if gain.is_finite() { gain.clamp(0.0, MAX_MASTER_GAIN as f32) } else { 1.0 }
}

impl AudioEffect for GainEffect {
    fn name(&self) -> &str { "Gain" }

    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample *= self.gain;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "gain" => self.gain = clamp_gain(value),
            "gain_db" => self.gain = clamp_gain(db_amp(value) as f32),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("gain", self.gain, 0.0, MAX_MASTER_GAIN as f32, ""),
            EffectParam::new("gain_db", amp_db(self.gain), -60.0, 6.0, "dB"),
        ]
    }

    fn set_bypass(&mut self, bypass: bool) { self.bypassed = bypass; }
    fn is_bypassed(&self) -> bool { self.bypassed }
}

const COMB_RATIOS: [f32; 4] = [1.0, 1.13, 1.27, 1.41];
const BASE_DELAY_MS: f32 = 37.0;

/// Parallel comb reverb (Schroeder) with an RT60-style decay time
pub struct ReverbEffect {
    /// Wet mix 0..=1
    wet: f32,
    /// Seconds for the tail to fall by 60 dB
    decay: f32,
    delays: Vec<Vec<f32>>,
    positions: Vec<usize>,
    feedback: Vec<f32>,
    sample_rate: f32,
    bypassed: bool,
}

impl ReverbEffect {
    pub fn new(wet: f32, decay: f32, sample_rate: f32) -> Self {
        let mut effect = Self {
            wet: wet.clamp(0.0, 1.0),
            decay: clamp_decay(decay),
            delays: Vec::new(),
            positions: Vec::new(),
            feedback: Vec::new(),
            sample_rate,
            bypassed: false,
        };
        effect.rebuild_delays();
        effect
    }

    fn rebuild_delays(&mut self) {
        self.delays = COMB_RATIOS
            .iter()
            .map(|ratio| {
                let samples = (BASE_DELAY_MS * ratio * self.sample_rate / 1000.0) as usize;
                vec![0.0; Ord::max(samples, 1)]
            })
            .collect();
        self.positions = vec![0; self.delays.len()];
        self.update_feedback();
    }

    /// g = 10^(-3 * delay / decay) gives a 60 dB fall after `decay` seconds
    fn update_feedback(&mut self) {
        let sample_rate = self.sample_rate.max(1.0);
        let decay = self.decay;
        self.feedback = self
            .delays
            .iter()
            .map(|line| {
                let delay_secs = line.len() as f32 / sample_rate;
                10f32.powf(-3.0 * delay_secs / decay).min(0.98)
            })
            .collect();
    }
}

fn clamp_decay(decay: f32) -> f32 {
    if decay.is_finite() {
        decay.clamp(MIN_REVERB_DECAY as f32, MAX_REVERB_DECAY as f32)
    } else {
        MIN_REVERB_DECAY as f32
    }
}

impl fmt::Debug for ReverbEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverbEffect")
            .field("wet", &self.wet)
            .field("decay", &self.decay)
            .field("bypassed", &self.bypassed)
            .finish()
    }
}

impl AudioEffect for ReverbEffect {
    fn name(&self) -> &str { "Reverb" }

    fn process(&mut self, samples: &mut [f32]) {
        let lines = self.delays.len() as f32;
        for sample in samples.iter_mut() {
            let dry = *sample;
            let mut wet = 0.0;

            for (i, delay_buf) in self.delays.iter_mut().enumerate() {
                let pos = self.positions[i];
                let delayed = delay_buf[pos];
                wet += delayed;
                delay_buf[pos] = dry + delayed * self.feedback[i];
                self.positions[i] = (pos + 1) % delay_buf.len();
            }

            wet /= lines;
            *sample = dry * (1.0 - self.wet) + wet * self.wet;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "wet" if value.is_finite() => self.wet = value.clamp(0.0, 1.0),
            "decay" => {
                self.decay = clamp_decay(value);
                self.update_feedback();
            }
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("wet", self.wet, 0.0, 1.0, ""),
            EffectParam::new("decay", self.decay, MIN_REVERB_DECAY as f32, MAX_REVERB_DECAY as f32, "s"),
        ]
    }

    fn set_bypass(&mut self, bypass: bool) { self.bypassed = bypass; }
    fn is_bypassed(&self) -> bool { self.bypassed }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        if (sample_rate - self.sample_rate).abs() < 1.0 {
            return;
        }
        self.sample_rate = sample_rate;
        self.rebuild_delays();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_scales_and_clamps() {
        let mut gain = GainEffect::new(0.5);
        let mut samples = [1.0f32, -1.0];
        gain.process(&mut samples);
        assert_eq!(samples, [0.5, -0.5]);

        gain.set_param("gain", 10.0);
        assert_eq!(gain.get_params()[0].value, 2.0);
        gain.set_param("gain", f32::NAN);
        assert_eq!(gain.get_params()[0].value, 1.0);
    }

    #[test]
    fn test_dry_reverb_passes_signal_through() {
        let mut reverb = ReverbEffect::new(0.0, 2.0, 8_000.0);
        let mut samples = [0.3f32; 64];
        reverb.process(&mut samples);
        assert!(samples.iter().all(|s| (*s - 0.3).abs() < 1e-6));
    }

    #[test]
    fn test_longer_decay_rings_longer() {
        fn tail_energy(decay: f32) -> f32 {
            let mut reverb = ReverbEffect::new(1.0, decay, 8_000.0);
            let mut block = vec![0.0f32; 8_000];
            block[0] = 1.0;
            reverb.process(&mut block);
            block[4_000..].iter().map(|s| s * s).sum()
        }
        assert!(tail_energy(5.0) > tail_energy(0.2));
    }

    #[test]
    fn test_decay_param_is_clamped() {
        let mut reverb = ReverbEffect::new(0.25, 2.5, 44_100.0);
        reverb.set_param("decay", 100.0);
        assert_eq!(reverb.get_params()[1].value, MAX_REVERB_DECAY as f32);
        reverb.set_param("wet", 3.0);
        assert_eq!(reverb.get_params()[0].value, 1.0);
    }
}
