//! Master effect parameters

use serde::{Deserialize, Serialize};

pub const MAX_MASTER_GAIN: f64 = 2.0;
pub const MIN_REVERB_DECAY: f64 = 0.1;
pub const MAX_REVERB_DECAY: f64 = 20.0;

/// Scalar master-bus settings, edited independently of the schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsState {
    /// Linear output gain
    pub master_gain: f64,
    /// Reverb wet mix 0..=1
    pub reverb_wet: f64,
    /// Reverb decay time in seconds
    pub reverb_decay: f64,
}

impl Default for EffectsState {
    fn default() -> Self {
        Self {
            master_gain: 0.8,
            reverb_wet: 0.25,
            reverb_decay: 2.5,
        }
    }
}

fn clamp_finite(value: f64, min: f64, max: f64, current: f64) -> f64 {
    if value.is_finite() { value.clamp(min, max) } else { current }
}

impl EffectsState {
    pub fn set_master_gain(&mut self, value: f64) {
        self.master_gain = clamp_finite(value, 0.0, MAX_MASTER_GAIN, self.master_gain);
    }

    pub fn set_reverb_wet(&mut self, value: f64) {
        self.reverb_wet = clamp_finite(value, 0.0, 1.0, self.reverb_wet);
    }

    pub fn set_reverb_decay(&mut self, value: f64) {
        self.reverb_decay = clamp_finite(value, MIN_REVERB_DECAY, MAX_REVERB_DECAY, self.reverb_decay);
    }

    /// Copy with every field clamped into range
    pub fn sanitized(&self) -> Self {
        let mut state = Self::default();
        state.set_master_gain(self.master_gain);
        state.set_reverb_wet(self.reverb_wet);
        state.set_reverb_decay(self.reverb_decay);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp() {
        let mut fx = EffectsState::default();
        fx.set_master_gain(5.0);
        assert_eq!(fx.master_gain, MAX_MASTER_GAIN);
        fx.set_reverb_wet(-0.5);
        assert_eq!(fx.reverb_wet, 0.0);
        fx.set_reverb_decay(0.0);
        assert_eq!(fx.reverb_decay, MIN_REVERB_DECAY);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        let mut fx = EffectsState::default();
        fx.set_master_gain(f64::NAN);
        fx.set_reverb_decay(f64::INFINITY);
        assert_eq!(fx, EffectsState::default());
    }
}
