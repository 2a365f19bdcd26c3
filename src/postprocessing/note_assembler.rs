use std::collections::VecDeque;

use crate::constants::PITCHES_NUM;
use crate::notes::Note;
use crate::tokenization::events::Event;

/// Pair note onsets with offsets to rebuild notes.
///
/// # Arguments
///
/// * `events` - Decoded events sorted by time.
///
/// # Returns
///
/// * Notes sorted by (start, pitch, end, velocity). Onsets of one pitch are
///   closed first-in first-out; an offset without a pending onset is dropped.
pub fn events_to_notes(events: &[Event]) -> Vec<Note> {
    let mut note_on_buffer: Vec<VecDeque<(f64, u8)>> = vec![VecDeque::new(); PITCHES_NUM];
    let mut notes = vec![];

    for event in events {
        match *event {
            Event::NoteOn {
                time,
                pitch,
                velocity,
                ..
            } => {
                if let Some(queue) = note_on_buffer.get_mut(pitch as usize) {
                    queue.push_back((time, velocity));
                }
            }
            Event::NoteOff { time, pitch, .. } => {
                let onset = note_on_buffer
                    .get_mut(pitch as usize)
                    .and_then(|queue| queue.pop_front());
                if let Some((start, velocity)) = onset {
                    notes.push(Note {
                        pitch,
                        velocity,
                        start,
                        end: time,
                    });
                }
            }
            _ => {}
        }
    }

    notes.sort_by(|a, b| {
        a.start
            .total_cmp(&b.start)
            .then(a.pitch.cmp(&b.pitch))
            .then(a.end.total_cmp(&b.end))
            .then(a.velocity.cmp(&b.velocity))
    });

    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(time: f64, pitch: u8, velocity: u8) -> Event {
        Event::NoteOn {
            time,
            label: None,
            pitch,
            velocity,
        }
    }

    fn off(time: f64, pitch: u8) -> Event {
        Event::NoteOff {
            time,
            label: None,
            pitch,
        }
    }

    #[test]
    fn pairs_onsets_first_in_first_out() {
        let events = [on(0.0, 60, 10), on(0.5, 60, 20), off(1.0, 60), off(2.0, 60)];
        let notes = events_to_notes(&events);

        assert_eq!(
            notes,
            vec![
                Note {
                    pitch: 60,
                    velocity: 10,
                    start: 0.0,
                    end: 1.0,
                },
                Note {
                    pitch: 60,
                    velocity: 20,
                    start: 0.5,
                    end: 2.0,
                },
            ]
        );
    }

    #[test]
    fn orphan_offsets_are_dropped() {
        let events = [off(0.2, 40), on(0.5, 41, 90), off(0.7, 40), off(0.9, 41)];
        let notes = events_to_notes(&events);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 41);
        assert_eq!(notes[0].end, 0.9);
    }

    #[test]
    fn unclosed_onsets_and_other_events_are_ignored() {
        let events = [
            Event::PedalOn {
                time: 0.0,
                label: None,
            },
            on(0.1, 72, 64),
            Event::Beat { time: 0.5 },
        ];
        assert!(events_to_notes(&events).is_empty());
    }

    #[test]
    fn output_sorted_by_start_then_pitch() {
        let events = [
            on(0.0, 67, 50),
            on(0.0, 60, 50),
            off(0.5, 67),
            on(0.25, 55, 50),
            off(1.0, 60),
            off(1.0, 55),
        ];
        let notes = events_to_notes(&events);
        let order: Vec<(f64, u8)> = notes.iter().map(|n| (n.start, n.pitch)).collect();
        assert_eq!(order, vec![(0.0, 60), (0.0, 67), (0.25, 55)]);
    }
}
