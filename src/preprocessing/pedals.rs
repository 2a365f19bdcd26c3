use crate::constants::PITCHES_NUM;
use crate::error::{CodecError, Result};
use crate::notes::{Note, Pedal};

/// Extend note offsets to the end of the sustain pedal that holds them.
///
/// # Arguments
///
/// * `notes` - Notes in any order.
/// * `pedals` - Time-sorted, non-overlapping pedal intervals.
///
/// # Returns
///
/// * The extended notes sorted by start time. Notes of the same pitch never
///   overlap: an extended note is cut at the next attack on its pitch.
pub fn extend_offset_by_pedal(mut notes: Vec<Note>, pedals: &[Pedal]) -> Result<Vec<Note>> {
    notes.sort_by(|a, b| a.end.total_cmp(&b.end));

    let mut notes_by_pitch: Vec<Vec<Note>> = vec![Vec::new(); PITCHES_NUM];
    let mut remaining = notes.into_iter().peekable();
    let mut pedals = pedals.iter();
    let mut current_pedal = pedals.next();

    while let Some(pedal) = current_pedal {
        let Some(end) = remaining.peek().map(|note| note.end) else {
            break;
        };

        if end < pedal.start {
            if let Some(note) = remaining.next() {
                notes_by_pitch[note.pitch as usize].push(note);
            }
        } else if pedal.start <= end && end < pedal.end {
            if let Some(mut note) = remaining.next() {
                note.end = pedal.end;
                notes_by_pitch[note.pitch as usize].push(note);
            }
        } else if pedal.end <= end {
            // The note outlasts this pedal, and so does every later note.
            current_pedal = pedals.next();
        } else {
            return Err(CodecError::UnmatchedNote {
                end,
                pedal_start: pedal.start,
                pedal_end: pedal.end,
            });
        }
    }

    for note in remaining {
        notes_by_pitch[note.pitch as usize].push(note);
    }

    for pitch_notes in notes_by_pitch.iter_mut() {
        pitch_notes.sort_by(|a, b| a.start.total_cmp(&b.start));
        for i in 1..pitch_notes.len() {
            let next_start = pitch_notes[i].start;
            let previous = &mut pitch_notes[i - 1];
            if previous.end > next_start {
                previous.end = next_start;
            }
        }
    }

    let mut new_notes: Vec<Note> = notes_by_pitch.into_iter().flatten().collect();
    new_notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

    Ok(new_notes)
}
