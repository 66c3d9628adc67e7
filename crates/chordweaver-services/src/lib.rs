//! chordweaver-services: playback session, voice pools, effects and audio output

pub mod audio_effects;
pub mod audio_engine;
pub mod audio_io;
pub mod context;
pub mod session;

pub use audio_effects::{AudioEffect, EffectChain, EffectParam, GainEffect, ReverbEffect};
pub use audio_effects::{NativePolySynth, NativeVoiceFactory, PolySynth, VoiceFactory};
pub use audio_engine::{AudioEngine, AudioEngineError};
pub use audio_io::{default_device_info, AudioOutputError, RealtimeOutputStream};
pub use context::{AudioContext, ContextState, OfflineContext, RealtimeContext};
pub use session::{
    NowPlaying, NowPlayingReceiver, Session, SessionConfig, SessionError, DEFAULT_SAMPLE_RATE,
    PREVIEW_SECONDS,
};
