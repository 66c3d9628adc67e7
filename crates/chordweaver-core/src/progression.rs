//! Progression model: ordered chord and rest events measured in beats

use std::fmt;

use serde::Serialize;

use crate::error::{ChordweaverError, Result};
use crate::pitch::PitchName;

/// Stable identifier of a chord event within a progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn check_duration(beats: f64) -> Result<f64> {
    if beats.is_finite() && beats > 0.0 {
        Ok(beats)
    } else {
        Err(ChordweaverError::InvalidDuration(beats))
    }
}

/// A chord (or a rest when `notes` is empty) held for `duration` beats
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordEvent {
    id: EventId,
    notes: Vec<PitchName>,
    duration: f64,
}

impl ChordEvent {
    pub fn new(id: EventId, notes: Vec<PitchName>, duration: f64) -> Result<Self> {
        Ok(Self {
            id,
            notes,
            duration: check_duration(duration)?,
        })
    }

    pub fn rest(id: EventId, duration: f64) -> Result<Self> {
        Self::new(id, Vec::new(), duration)
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn notes(&self) -> &[PitchName] {
        &self.notes
    }

    /// Duration in beats, always positive
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Ordered sequence of chord events; order is playback order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Progression {
    events: Vec<ChordEvent>,
    next_id: u64,
}

impl Progression {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn events(&self) -> &[ChordEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: EventId) -> Option<&ChordEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn position_of(&self, id: EventId) -> Option<usize> {
        self.events.iter().position(|e| e.id == id)
    }

    fn index_of(&self, id: EventId) -> Result<usize> {
        self.position_of(id).ok_or(ChordweaverError::EventNotFound(id.0))
    }

    /// Loop length in beats
    pub fn total_beats(&self) -> f64 {
        self.events.iter().map(|e| e.duration).sum()
    }

    /// Append a chord (empty `notes` appends a rest)
    pub fn push(&mut self, notes: Vec<PitchName>, duration: f64) -> Result<EventId> {
        let index = self.events.len();
        self.insert(index, notes, duration)
    }

    pub fn push_rest(&mut self, duration: f64) -> Result<EventId> {
        self.push(Vec::new(), duration)
    }

    /// Insert before `index`, clamped to the end
    pub fn insert(&mut self, index: usize, notes: Vec<PitchName>, duration: f64) -> Result<EventId> {
        let duration = check_duration(duration)?;
        let id = self.allocate_id();
        let index = index.min(self.events.len());
        self.events.insert(index, ChordEvent { id, notes, duration });
        Ok(id)
    }

    pub fn remove(&mut self, id: EventId) -> Result<ChordEvent> {
        let index = self.index_of(id)?;
        Ok(self.events.remove(index))
    }

    /// Move an event so it ends up at `to` (clamped)
    pub fn move_event(&mut self, id: EventId, to: usize) -> Result<()> {
        let from = self.index_of(id)?;
        let event = self.events.remove(from);
        let to = to.min(self.events.len());
        self.events.insert(to, event);
        Ok(())
    }

    pub fn set_duration(&mut self, id: EventId, duration: f64) -> Result<()> {
        let duration = check_duration(duration)?;
        let index = self.index_of(id)?;
        self.events[index].duration = duration;
        Ok(())
    }

    pub fn set_notes(&mut self, id: EventId, notes: Vec<PitchName>) -> Result<()> {
        let index = self.index_of(id)?;
        self.events[index].notes = notes;
        Ok(())
    }

    /// Replace every event at once; nothing changes if any duration is invalid
    pub fn replace(&mut self, events: Vec<(Vec<PitchName>, f64)>) -> Result<Vec<EventId>> {
        for (_, duration) in &events {
            check_duration(*duration)?;
        }
        self.events.clear();
        let mut ids = Vec::with_capacity(events.len());
        for (notes, duration) in events {
            ids.push(self.push(notes, duration)?);
        }
        Ok(ids)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
