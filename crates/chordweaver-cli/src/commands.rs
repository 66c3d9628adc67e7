//! Subcommand implementations

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chordweaver_core::{
    borrowed_chords, chord_from_roman_numeral, chord_notes_with_octaves, compile,
    detect_chord_from_notes, diatonic_chords, harmonic_theory_for_chord, next_inversion,
    parse_notes, permuted_voicing, previous_inversion, suggestions_for_chord, wrap_notes_to_range,
    ChordName, EventId, Key, LabelledChord, Payload, PitchName, Progression,
};
use chordweaver_services::{default_device_info, AudioEngine, NativeVoiceFactory, SessionError};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Beats for an entry without an explicit duration
const DEFAULT_BEATS: f64 = 4.0;

/// Parse `Cmaj7:4,Am7:4,rest:2`. An entry is a chord symbol, `rest`, or
/// space-separated notes such as `C4 E4 G4:2`.
pub(crate) fn parse_progression(text: &str, octave: i8) -> Result<Progression> {
    let mut progression = Progression::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (body, beats) = match entry.rsplit_once(':') {
            Some((body, beats)) => {
                let beats = beats
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("bad duration in '{entry}'"))?;
                (body.trim(), beats)
            }
            None => (entry, DEFAULT_BEATS),
        };

        if body.eq_ignore_ascii_case("rest") {
            progression.push_rest(beats)?;
            continue;
        }
        let names: Vec<&str> = body.split_whitespace().collect();
        let notes = if names.len() > 1 {
            parse_notes(&names)?
        } else {
            let chord: ChordName = body.parse()?;
            chord_notes_with_octaves(&chord, octave)
        };
        progression.push(notes, beats)?;
    }
    if progression.is_empty() {
        bail!("progression is empty");
    }
    Ok(progression)
}

fn label(notes: &[PitchName]) -> String {
    if notes.is_empty() {
        return "rest".to_string();
    }
    detect_chord_from_notes(notes)
        .map(|c| c.symbol())
        .unwrap_or_else(|| join(notes))
}

fn join(notes: &[PitchName]) -> String {
    notes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ")
}

fn symbols(chords: &[ChordName]) -> String {
    chords.iter().map(|c| c.symbol()).collect::<Vec<_>>().join("  ")
}

fn labelled(chords: &[LabelledChord]) -> String {
    chords
        .iter()
        .map(|c| format!("{} {}", c.numeral, c.chord))
        .collect::<Vec<_>>()
        .join("  ")
}

pub(crate) fn resolve_key(tonic: Option<String>, mode: Option<String>, config: &AppConfig) -> Result<Key> {
    let mut key = config.key.clone();
    if let Some(tonic) = tonic {
        key.tonic = tonic;
    }
    if let Some(mode) = mode {
        key.mode = mode;
    }
    key.key()
}

pub(crate) fn detect(notes: &[String]) -> Result<()> {
    let notes = parse_notes(notes)?;
    match detect_chord_from_notes(&notes) {
        Some(chord) => println!("{chord}"),
        None => println!("no chord recognised"),
    }
    Ok(())
}

pub(crate) fn invert(notes: &[String], previous: bool) -> Result<()> {
    let notes = parse_notes(notes)?;
    let voiced = if previous { previous_inversion(&notes) } else { next_inversion(&notes) };
    println!("{}  ({})", join(&voiced), label(&voiced));
    Ok(())
}

pub(crate) fn permute(notes: &[String]) -> Result<()> {
    let notes = parse_notes(notes)?;
    let voiced = permuted_voicing(&notes);
    println!("{}  ({})", join(&voiced), label(&voiced));
    Ok(())
}

pub(crate) fn wrap(notes: &[String]) -> Result<()> {
    let notes = parse_notes(notes)?;
    println!("{}", join(&wrap_notes_to_range(&notes)));
    Ok(())
}

pub(crate) fn key(key: &Key) -> Result<()> {
    println!("{key}");
    println!("  diatonic: {}", labelled(&diatonic_chords(key)));
    let borrowed = borrowed_chords(key);
    if borrowed.is_empty() {
        println!("  borrowed: none");
    } else {
        println!("  borrowed: {}", labelled(&borrowed));
    }
    Ok(())
}

pub(crate) fn roman(numeral: &str, key: &Key, octave: i8) -> Result<()> {
    let Some(chord) = chord_from_roman_numeral(numeral, key) else {
        bail!("'{numeral}' does not resolve in {key}");
    };
    println!("{chord}  {}", join(&chord_notes_with_octaves(&chord, octave)));
    Ok(())
}

pub(crate) fn suggest(key: &Key, chord: Option<&str>) -> Result<()> {
    let context = chord.map(str::parse::<ChordName>).transpose()?;
    let suggestions = suggestions_for_chord(context.as_ref(), key);
    println!("coherent:  {}", symbols(&suggestions.coherent));
    println!("inventive: {}", symbols(&suggestions.inventive));
    println!("jazzy:     {}", symbols(&suggestions.jazzy));
    println!("classical: {}", symbols(&suggestions.classical));

    if let Some(context) = context {
        match harmonic_theory_for_chord(&context, key) {
            Some(theory) => {
                println!();
                println!("{} is {} ({})", context, theory.numeral, theory.function);
                println!("  {}", theory.description);
                for movement in theory.movements {
                    println!(
                        "  -> {} {}: {}",
                        movement.target.numeral, movement.target.chord, movement.description
                    );
                }
            }
            None => println!("\n{context} is chromatic in {key}"),
        }
    }
    Ok(())
}

pub(crate) fn schedule(progression: &Progression, config: &AppConfig) -> Result<()> {
    let session = &config.session;
    let schedule = compile(progression, &session.arpeggiator, session.tempo);
    for event in schedule.events() {
        let what = match &event.payload {
            Payload::Rest => "rest".to_string(),
            Payload::Note(note) => note.to_string(),
            Payload::Chord(notes) => format!("{} [{}]", label(notes), join(notes)),
        };
        let marker = if event.onset { "*" } else { " " };
        println!(
            "{marker} {:<10} {:>6.3} beats  {}  {what}",
            event.start.to_string(),
            event.duration_beats,
            event.source
        );
    }
    println!(
        "loop: {} beats, ends at {}",
        schedule.loop_length_beats(),
        schedule.loop_end()
    );
    Ok(())
}

pub(crate) fn play(progression: Progression, seconds: f64, config: &AppConfig) -> Result<()> {
    let mut session_config = config.session;
    match default_device_info() {
        Ok((device, sample_rate, channels)) => {
            info!(%device, sample_rate, channels, "Using default output device");
            session_config.sample_rate = sample_rate;
        }
        Err(e) => warn!(error = %e, "No output device info, keeping configured sample rate"),
    }

    let names: HashMap<EventId, String> = progression
        .events()
        .iter()
        .map(|e| (e.id(), label(e.notes())))
        .collect();

    let (mut engine, now_playing) = AudioEngine::new(session_config, Box::new(NativeVoiceFactory));
    engine.start()?;
    engine.with_session(|s| -> Result<(), SessionError> {
        s.set_progression(progression)?;
        s.play()
    })??;

    let deadline = Instant::now() + Duration::from_secs_f64(seconds.max(0.0));
    while Instant::now() < deadline {
        let Some(update) = now_playing.recv_timeout(Duration::from_millis(50)) else {
            continue;
        };
        match update.chord {
            Some(id) => println!(
                "{:<10} {}",
                update.position.to_string(),
                names.get(&id).map(String::as_str).unwrap_or("?")
            ),
            None => {
                println!("stopped");
                break;
            }
        }
    }

    engine.dispose();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progression_entries() {
        let p = parse_progression("Cmaj7:4, Am7:2,rest:1.5, D4 F#4 A4:1, G7", 4).unwrap();
        assert_eq!(p.len(), 5);
        let durations: Vec<f64> = p.events().iter().map(|e| e.duration()).collect();
        assert_eq!(durations, [4.0, 2.0, 1.5, 1.0, DEFAULT_BEATS]);
        assert!(p.events()[2].is_rest());
        assert_eq!(label(p.events()[0].notes()), "Cmaj7");
        assert_eq!(label(p.events()[3].notes()), "D");
    }

    #[test]
    fn test_parse_progression_rejects_garbage() {
        assert!(parse_progression("Cmaj7:four", 4).is_err());
        assert!(parse_progression("Qmaj7:4", 4).is_err());
        assert!(parse_progression("C:0", 4).is_err());
        assert!(parse_progression(" , ", 4).is_err());
    }
}
