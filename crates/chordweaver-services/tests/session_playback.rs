//! Integration test: progression → session → offline clock → now-playing feed and voice pool calls.

use std::sync::{Arc, Mutex};

use chordweaver_core::{
    parse_notes, Archetype, ArpeggiatorConfig, EventId, InstrumentPatch, InstrumentSettings,
    PitchName, Position, Progression, RepeatCount, TransportState,
};
use chordweaver_services::{
    NowPlaying, NowPlayingReceiver, OfflineContext, PolySynth, Session, SessionConfig,
    VoiceFactory,
};

const RATE: u32 = 8_000;

#[derive(Debug, Default)]
struct Log {
    built: Vec<Archetype>,
    /// (pool id, notes, sample offset)
    triggers: Vec<(usize, Vec<PitchName>, u32)>,
    triggers_after_dispose: usize,
    applied: usize,
    releases: usize,
    disposed: Vec<usize>,
}

#[derive(Debug)]
struct RecordingPool {
    id: usize,
    archetype: Archetype,
    log: Arc<Mutex<Log>>,
    disposed: bool,
    buffer: Vec<f32>,
}

impl PolySynth for RecordingPool {
    fn archetype(&self) -> Archetype {
        self.archetype
    }

    fn trigger_attack_release(&mut self, notes: &[PitchName], _duration_secs: f64, sample_offset: u32) {
        let mut log = self.log.lock().unwrap();
        if self.disposed {
            log.triggers_after_dispose += 1;
        } else {
            log.triggers.push((self.id, notes.to_vec(), sample_offset));
        }
    }

    fn release_all(&mut self) {
        self.log.lock().unwrap().releases += 1;
    }

    fn apply(&mut self, _settings: &InstrumentSettings) {
        self.log.lock().unwrap().applied += 1;
    }

    fn process(&mut self, num_frames: usize) -> &[f32] {
        self.buffer.resize(num_frames, 0.0);
        &self.buffer[..num_frames]
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn dispose(&mut self) {
        self.disposed = true;
        self.log.lock().unwrap().disposed.push(self.id);
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

struct RecordingFactory {
    log: Arc<Mutex<Log>>,
}

impl VoiceFactory for RecordingFactory {
    fn build(&self, settings: &InstrumentSettings, _sample_rate: f32) -> Box<dyn PolySynth> {
        let mut log = self.log.lock().unwrap();
        let id = log.built.len();
        log.built.push(settings.archetype());
        Box::new(RecordingPool {
            id,
            archetype: settings.archetype(),
            log: self.log.clone(),
            disposed: false,
            buffer: Vec::new(),
        })
    }
}

fn recording_session(config: SessionConfig) -> (Session, NowPlayingReceiver, Arc<Mutex<Log>>) {
    let log = Arc::new(Mutex::new(Log::default()));
    let factory = RecordingFactory { log: log.clone() };
    let config = SessionConfig { sample_rate: RATE, ..config };
    let (session, rx) = Session::initialize(config, Box::new(OfflineContext::new()), Box::new(factory));
    (session, rx, log)
}

fn two_chords() -> (Progression, EventId, EventId) {
    let mut p = Progression::new();
    let a = p.push(parse_notes(&["C4", "E4", "G4"]).unwrap(), 4.0).unwrap();
    let b = p.push(parse_notes(&["A3", "C4", "E4"]).unwrap(), 4.0).unwrap();
    (p, a, b)
}

fn collect(rx: &NowPlayingReceiver) -> Vec<NowPlaying> {
    let mut seen = Vec::new();
    rx.dispatch(|n| seen.push(n));
    seen
}

fn run(session: &mut Session, seconds: f64, step: f64) {
    let mut elapsed = 0.0;
    while elapsed + 1e-9 < seconds {
        session.advance(step);
        elapsed += step;
    }
}

#[test]
fn two_chords_notify_in_order_every_loop() {
    let (mut session, rx, log) = recording_session(SessionConfig::default());
    let (p, a, b) = two_chords();
    session.set_progression(p).unwrap();
    session.play().unwrap();

    // 9.5 s at 120 bpm is 19 beats over an 8-beat loop
    run(&mut session, 9.5, 0.5);

    let seen = collect(&rx);
    let chords: Vec<Option<EventId>> = seen.iter().map(|n| n.chord).collect();
    assert_eq!(chords, [Some(a), Some(b), Some(a), Some(b), Some(a)]);

    let bars: Vec<Position> = seen.iter().map(|n| n.position).collect();
    assert_eq!(
        bars,
        [
            Position { bar: 0, beat: 0.0 },
            Position { bar: 1, beat: 0.0 },
            Position { bar: 0, beat: 0.0 },
            Position { bar: 1, beat: 0.0 },
            Position { bar: 0, beat: 0.0 },
        ]
    );

    let log = log.lock().unwrap();
    assert_eq!(log.triggers.len(), 5);
    assert!(log.triggers.iter().all(|(pool, notes, _)| *pool == 0 && notes.len() == 3));
}

#[test]
fn archetype_swap_mid_playback_never_touches_a_disposed_pool() {
    let (mut session, rx, log) = recording_session(SessionConfig::default());
    let (p, _, b) = two_chords();
    session.set_progression(p).unwrap();
    session.play().unwrap();
    run(&mut session, 1.0, 0.25);

    session
        .set_instrument(InstrumentSettings::default_for(Archetype::Fm))
        .unwrap();
    assert_eq!(session.state(), TransportState::Running);
    assert!((session.position_beats() - 2.0).abs() < 1e-6);

    run(&mut session, 1.5, 0.25);
    // swap again while running, straight back to basic
    session
        .set_instrument(InstrumentSettings::default_for(Archetype::Basic))
        .unwrap();
    run(&mut session, 2.0, 0.25);

    let log = log.lock().unwrap();
    assert_eq!(log.triggers_after_dispose, 0);
    assert_eq!(log.built, [Archetype::Basic, Archetype::Fm, Archetype::Basic]);
    assert_eq!(log.disposed, [0, 1]);
    // chord b at beat 4 fired on the fm pool, chord a at beat 8 on the new basic pool
    let pools: Vec<usize> = log.triggers.iter().map(|(pool, _, _)| *pool).collect();
    assert_eq!(pools, [0, 1, 2]);

    let chords: Vec<Option<EventId>> = collect(&rx).iter().map(|n| n.chord).collect();
    assert_eq!(chords[1], Some(b));
}

#[test]
fn live_parameter_update_keeps_pool_and_schedule() {
    let (mut session, _rx, log) = recording_session(SessionConfig::default());
    let (p, _, _) = two_chords();
    session.set_progression(p).unwrap();
    session.play().unwrap();
    run(&mut session, 0.5, 0.25);
    let generation = session.schedule_generation();

    let patch = InstrumentPatch {
        attack: Some(0.2),
        volume: Some(-3.0),
        ..Default::default()
    };
    session.update_instrument_parameters(&patch).unwrap();

    let quieter = session
        .instrument()
        .merged(&InstrumentPatch { volume: Some(-12.0), ..Default::default() })
        .unwrap();
    session.set_instrument(quieter).unwrap();

    assert_eq!(session.schedule_generation(), generation);
    assert_eq!(session.state(), TransportState::Running);
    assert_eq!(session.instrument().envelope().attack, 0.2);
    assert_eq!(session.instrument().volume(), -12.0);

    let log = log.lock().unwrap();
    assert_eq!(log.built.len(), 1);
    assert_eq!(log.applied, 2);
    assert!(log.disposed.is_empty());
}

#[test]
fn arpeggio_fires_single_notes_round_robin() {
    let config = SessionConfig {
        arpeggiator: ArpeggiatorConfig::new(true, "4n".parse().unwrap(), RepeatCount::Unbounded),
        ..Default::default()
    };
    let (mut session, rx, log) = recording_session(config);
    let mut p = Progression::new();
    let notes = parse_notes(&["C4", "E4", "G4"]).unwrap();
    let id = p.push(notes.clone(), 4.0).unwrap();
    session.set_progression(p).unwrap();
    session.play().unwrap();

    // 1.9 s is 3.8 beats: quarter steps at 0, 1, 2 and 3
    run(&mut session, 1.9, 0.1);

    let log = log.lock().unwrap();
    let fired: Vec<PitchName> = log.triggers.iter().map(|(_, n, _)| n[0]).collect();
    assert_eq!(fired, [notes[0], notes[1], notes[2], notes[0]]);
    assert!(log.triggers.iter().all(|(_, n, offset)| n.len() == 1 && *offset < 1024));

    // every step is announced with its chord, in firing order
    let seen = collect(&rx);
    let chords: Vec<Option<EventId>> = seen.iter().map(|n| n.chord).collect();
    assert_eq!(chords, [Some(id); 4]);
    let beats: Vec<f64> = seen.iter().map(|n| n.position.beat).collect();
    assert_eq!(beats, [0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn stop_releases_notes_and_announces_silence() {
    let (mut session, rx, log) = recording_session(SessionConfig::default());
    let (p, a, _) = two_chords();
    session.set_progression(p).unwrap();
    session.play().unwrap();
    run(&mut session, 0.5, 0.25);
    session.stop().unwrap();

    let chords: Vec<Option<EventId>> = collect(&rx).iter().map(|n| n.chord).collect();
    assert_eq!(chords, [Some(a), None]);
    assert_eq!(session.position_beats(), 0.0);
    assert!(log.lock().unwrap().releases >= 1);

    // stopped clock fires nothing
    run(&mut session, 1.0, 0.25);
    assert!(collect(&rx).is_empty());
}

#[test]
fn preview_is_independent_of_transport() {
    let (mut session, _rx, log) = recording_session(SessionConfig::default());
    let notes = parse_notes(&["D4", "F#4", "A4"]).unwrap();
    session.preview_chord(&notes).unwrap();
    assert_eq!(session.state(), TransportState::Idle);
    let log = log.lock().unwrap();
    assert_eq!(log.triggers, vec![(0usize, notes, 0u32)]);
}
