//! Realtime engine: a session driven by the output device callback

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use crate::audio_effects::VoiceFactory;
use crate::audio_io::{AudioOutputError, RealtimeOutputStream};
use crate::context::RealtimeContext;
use crate::session::{NowPlayingReceiver, Session, SessionConfig, SessionError};

#[derive(Debug, Error)]
pub enum AudioEngineError {
    #[error("Audio output error: {0}")]
    Output(#[from] AudioOutputError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Engine already running")]
    AlreadyRunning,
    #[error("Engine not running")]
    NotRunning,
    #[error("Session lock poisoned")]
    Poisoned,
}

/// Owns the output stream and shares the session with the audio thread
pub struct AudioEngine {
    session: Arc<Mutex<Session>>,
    context: RealtimeContext,
    stream: Option<RealtimeOutputStream>,
}

impl AudioEngine {
    pub fn new(config: SessionConfig, factory: Box<dyn VoiceFactory>) -> (Self, NowPlayingReceiver) {
        let context = RealtimeContext::new();
        let (session, now_playing) = Session::initialize(config, Box::new(context.clone()), factory);
        let engine = Self {
            session: Arc::new(Mutex::new(session)),
            context,
            stream: None,
        };
        (engine, now_playing)
    }

    /// Shared session handle
    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }

    /// Open the output device; audio stays silent until the session's context resumes
    pub fn start(&mut self) -> Result<(), AudioEngineError> {
        if self.stream.is_some() {
            return Err(AudioEngineError::AlreadyRunning);
        }

        let session = self.session.clone();

        let stream = RealtimeOutputStream::start(move |buffer, sample_rate, channels| {
            Self::render_audio(&session, buffer, sample_rate, channels);
        })?;

        self.stream = Some(stream);
        info!("Audio engine started");
        Ok(())
    }

    /// Close the output device
    pub fn stop(&mut self) -> Result<(), AudioEngineError> {
        let stream = self.stream.take().ok_or(AudioEngineError::NotRunning)?;
        stream.stop();
        self.context.suspend();
        info!("Audio engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Render into the device buffer (called from audio thread)
    fn render_audio(session: &Mutex<Session>, buffer: &mut [f32], sample_rate: u32, channels: u16) {
        let Ok(mut session) = session.lock() else {
            buffer.fill(0.0);
            return;
        };
        session.render(buffer, channels, sample_rate);
    }

    /// Run `f` against the locked session
    pub fn with_session<F, R>(&self, f: F) -> Result<R, AudioEngineError>
    where
        F: FnOnce(&mut Session) -> R,
    {
        self.session
            .lock()
            .map(|mut s| f(&mut s))
            .map_err(|_| AudioEngineError::Poisoned)
    }

    /// Full teardown: session disposed, stream closed
    pub fn dispose(&mut self) {
        if let Err(e) = self.with_session(|s| s.dispose()) {
            warn!(error = %e, "Could not dispose session");
        }
        let _ = self.stop();
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
