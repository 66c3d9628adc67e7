//! Audio context gate
//!
//! Playback entry points must resume the context before starting the clock.
//! A realtime context is a flag shared with the output callback; the offline
//! context is used for rendering and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::session::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

pub trait AudioContext: Send + std::fmt::Debug {
    fn state(&self) -> ContextState;
    /// Allow audio to flow; fails once closed or when the platform refuses
    fn resume(&mut self) -> Result<(), SessionError>;
    fn close(&mut self);

    fn is_running(&self) -> bool {
        self.state() == ContextState::Running
    }
}

/// Context for offline rendering; starts suspended
#[derive(Debug, Default)]
pub struct OfflineContext {
    running: bool,
    closed: bool,
    refuse: bool,
    resumes: usize,
}

impl OfflineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose `resume` always fails
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Successful resume calls that found the context suspended
    pub fn resume_count(&self) -> usize {
        self.resumes
    }
}

impl AudioContext for OfflineContext {
    fn state(&self) -> ContextState {
        if self.closed {
            ContextState::Closed
        } else if self.running {
            ContextState::Running
        } else {
            ContextState::Suspended
        }
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Context("context is closed".into()));
        }
        if self.refuse {
            return Err(SessionError::Context("resume refused".into()));
        }
        if !self.running {
            self.running = true;
            self.resumes += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.running = false;
        self.closed = true;
    }
}

/// Context backed by a flag the realtime callback reads; silence while suspended
#[derive(Debug, Clone, Default)]
pub struct RealtimeContext {
    gate: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl RealtimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend(&self) {
        self.gate.store(false, Ordering::SeqCst);
    }
}

impl AudioContext for RealtimeContext {
    fn state(&self) -> ContextState {
        if self.closed.load(Ordering::SeqCst) {
            ContextState::Closed
        } else if self.gate.load(Ordering::SeqCst) {
            ContextState::Running
        } else {
            ContextState::Suspended
        }
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Context("context is closed".into()));
        }
        if !self.gate.swap(true, Ordering::SeqCst) {
            debug!("Audio context resumed");
        }
        Ok(())
    }

    fn close(&mut self) {
        self.gate.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}
