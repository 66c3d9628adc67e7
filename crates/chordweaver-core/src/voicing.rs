//! Voicing algebra: chord detection, inversions, permutations and register wrapping
//!
//! Every function here is total. Inputs that are too small or not a
//! recognisable chord come back unchanged (or `None` for detection).

use crate::chord::{pitch_class_mask, ChordName, ChordType};
use crate::pitch::{NoteName, PitchName};

/// Playable register as MIDI numbers
pub const WINDOW_LOW: i32 = 48;
pub const WINDOW_HIGH: i32 = 72;
pub const WINDOW_CENTER: i32 = 60;

/// Shuffle attempts before accepting an unchanged order
const PERMUTE_ATTEMPTS: usize = 10;

fn sorted_by_midi(notes: &[PitchName]) -> Vec<PitchName> {
    let mut sorted = notes.to_vec();
    sorted.sort_by_key(|n| n.midi());
    sorted
}

/// Name the chord formed by `notes`, ignoring octaves.
///
/// A chord rooted on the bass note wins; otherwise the first match in
/// chord-type table order. The root keeps the spelling found in `notes`.
pub fn detect_chord_from_notes(notes: &[PitchName]) -> Option<ChordName> {
    if notes.len() < 2 {
        return None;
    }
    let mask = pitch_class_mask(notes);
    let sorted = sorted_by_midi(notes);
    let bass = sorted.first()?.note;

    let rooted_on = |root: NoteName| {
        ChordType::ALL
            .into_iter()
            .map(move |kind| ChordName::new(root, kind))
            .find(|chord| chord.pitch_class_mask() == mask)
    };
    if let Some(chord) = rooted_on(bass) {
        return Some(chord);
    }

    ChordType::ALL.into_iter().find_map(|kind| {
        sorted
            .iter()
            .map(|n| ChordName::new(n.note, kind))
            .find(|chord| chord.pitch_class_mask() == mask)
    })
}

/// Place each note in the lowest octave strictly above the previous one.
/// `None` when a voice would land outside the representable octaves.
pub fn build_ascending_voicing(bass: PitchName, upper: &[NoteName]) -> Option<Vec<PitchName>> {
    let mut voicing = Vec::with_capacity(upper.len() + 1);
    voicing.push(bass);
    let mut previous = bass.midi();
    for &name in upper {
        let floor = previous + 1;
        let midi = floor + (name.pitch_class() as i32 - floor).rem_euclid(12);
        voicing.push(PitchName::from_midi_spelled(midi, name)?);
        previous = midi;
    }
    Some(voicing)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

fn invert(notes: &[PitchName], direction: Direction) -> Vec<PitchName> {
    if notes.len() < 2 {
        return notes.to_vec();
    }
    let sorted = sorted_by_midi(notes);
    match detect_chord_from_notes(&sorted) {
        Some(chord) => invert_chord(&sorted, &chord, direction),
        None => rotate(sorted, direction),
    }
}

fn invert_chord(sorted: &[PitchName], chord: &ChordName, direction: Direction) -> Vec<PitchName> {
    let tones: Vec<u8> = chord.note_names().iter().map(|n| n.pitch_class()).collect();
    let count = tones.len();
    let old_bass = sorted[0];
    let Some(bass_index) = tones.iter().position(|&pc| pc == old_bass.pitch_class()) else {
        return sorted.to_vec();
    };
    let new_index = match direction {
        Direction::Up => (bass_index + 1) % count,
        Direction::Down => (bass_index + count - 1) % count,
    };
    let new_pc = tones[new_index] as i32;
    let old_pc = old_bass.pitch_class() as i32;
    let new_midi = match direction {
        Direction::Up => {
            let step = (new_pc - old_pc).rem_euclid(12);
            old_bass.midi() + if step == 0 { 12 } else { step }
        }
        Direction::Down => {
            let step = (old_pc - new_pc).rem_euclid(12);
            old_bass.midi() - if step == 0 { 12 } else { step }
        }
    };

    let mut upper: Vec<NoteName> = sorted.iter().map(|n| n.note).collect();
    let Some(taken) = upper.iter().position(|n| n.pitch_class() as i32 == new_pc) else {
        return sorted.to_vec();
    };
    let bass_name = upper.remove(taken);
    let Some(new_bass) = PitchName::from_midi_spelled(new_midi, bass_name) else {
        return sorted.to_vec();
    };

    let order = |name: &NoteName| {
        let index = tones
            .iter()
            .position(|&pc| pc == name.pitch_class())
            .unwrap_or(new_index);
        (index + count - new_index) % count
    };
    upper.sort_by_key(order);
    build_ascending_voicing(new_bass, &upper).unwrap_or_else(|| sorted.to_vec())
}

fn rotate(mut sorted: Vec<PitchName>, direction: Direction) -> Vec<PitchName> {
    let original = sorted.clone();
    match direction {
        Direction::Up => {
            let top = sorted[sorted.len() - 1].midi();
            let mut moved = sorted.remove(0);
            while moved.midi() <= top {
                let Some(higher) = moved.checked_transpose_octaves(1) else {
                    return original;
                };
                moved = higher;
            }
            sorted.push(moved);
        }
        Direction::Down => {
            let bottom = sorted[0].midi();
            let mut moved = sorted.remove(sorted.len() - 1);
            while moved.midi() >= bottom {
                let Some(lower) = moved.checked_transpose_octaves(-1) else {
                    return original;
                };
                moved = lower;
            }
            sorted.insert(0, moved);
        }
    }
    sorted
}

/// Move the bass up to the next chord tone
pub fn next_inversion(notes: &[PitchName]) -> Vec<PitchName> {
    invert(notes, Direction::Up)
}

/// Move the bass down to the previous chord tone
pub fn previous_inversion(notes: &[PitchName]) -> Vec<PitchName> {
    invert(notes, Direction::Down)
}

/// Keep the bass, shuffle the upper voices and restack them
pub fn permuted_voicing(notes: &[PitchName]) -> Vec<PitchName> {
    permuted_voicing_with(notes, &mut fastrand::Rng::new())
}

pub fn permuted_voicing_with(notes: &[PitchName], rng: &mut fastrand::Rng) -> Vec<PitchName> {
    if notes.len() < 3 {
        return notes.to_vec();
    }
    let sorted = sorted_by_midi(notes);
    let bass = sorted[0];
    let upper: Vec<NoteName> = sorted[1..].iter().map(|n| n.note).collect();
    fn classes(names: &[NoteName]) -> Vec<u8> {
        names.iter().map(|n| n.pitch_class()).collect()
    }
    let original = classes(&upper);

    let mut candidate = upper.clone();
    if original.iter().any(|&pc| pc != original[0]) {
        for _ in 0..PERMUTE_ATTEMPTS {
            candidate = upper.clone();
            rng.shuffle(&mut candidate);
            if classes(&candidate) != original {
                break;
            }
        }
    }
    build_ascending_voicing(bass, &candidate).unwrap_or_else(|| sorted.clone())
}

/// Shift the voicing by whole octaves so its average sits near the window center
pub fn wrap_notes_to_range(notes: &[PitchName]) -> Vec<PitchName> {
    if notes.is_empty() {
        return Vec::new();
    }
    let average = notes.iter().map(|n| n.midi() as f64).sum::<f64>() / notes.len() as f64;
    let shift = ((average - WINDOW_CENTER as f64) / 12.0).round() as i32;
    notes.iter().map(|n| n.transpose_octaves(-shift)).collect()
}
