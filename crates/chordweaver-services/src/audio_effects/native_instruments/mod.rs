//! Built-in voice pools

pub mod poly_synth;

pub use poly_synth::{NativePolySynth, NativeVoiceFactory, MAX_VOICES};
