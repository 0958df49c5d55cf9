//! Overlap repair (spec §4.5): a sustain must never reach into the next
//! note/chord, and two phrases of the same kind must never overlap. The
//! earlier sustain is truncated at the overlap point, and the later one is
//! extended to cover whatever remainder that truncation would otherwise
//! lose, so total covered time never shrinks.

use crate::model::{NoteEvent, Phrase};
use std::collections::HashMap;

/// Truncates a sustain that reaches into the start of the next note of the
/// *same* color, extending the later note to cover the remainder (spec
/// §4.5). Cross-color overlap (e.g. a red sustain running under a later
/// green) is left alone — only same-type overlap is a repair target.
pub(super) fn repair_notes(mut groups: Vec<Vec<NoteEvent>>) -> Vec<Vec<NoteEvent>> {
    // Map from note type to the (group, note) index of its most recent
    // unresolved sustain, walked left to right.
    let mut pending: HashMap<crate::model::NoteType, (usize, usize)> = HashMap::new();

    for i in 0..groups.len() {
        let Some(next_tick) = groups[i].first().map(|n| n.tick) else { continue };

        for note_type in groups[i].iter().map(|n| n.note_type).collect::<Vec<_>>() {
            if let Some(&(gi, ni)) = pending.get(&note_type) {
                let (earlier_tick, earlier_length, earlier_ms_length) = {
                    let n = &groups[gi][ni];
                    (n.tick, n.length, n.ms_length)
                };
                let end_tick = earlier_tick + earlier_length;
                if end_tick > next_tick {
                    let remainder_ticks = end_tick - next_tick;
                    let ms_per_tick =
                        if earlier_length > 0 { earlier_ms_length / earlier_length as f64 } else { 0.0 };

                    let new_earlier_length = next_tick - earlier_tick;
                    let earlier = &mut groups[gi][ni];
                    earlier.length = new_earlier_length;
                    earlier.ms_length = new_earlier_length as f64 * ms_per_tick;

                    if let Some(later) = groups[i].iter_mut().find(|n| n.note_type == note_type) {
                        if later.length < remainder_ticks {
                            later.length = remainder_ticks;
                            later.ms_length = remainder_ticks as f64 * ms_per_tick;
                        }
                    }
                }
            }
        }

        for (ni, note) in groups[i].iter().enumerate() {
            pending.insert(note.note_type, (i, ni));
        }
    }
    groups
}

/// Same truncate-then-extend rule as [`repair_notes`], applied to a single
/// phrase stream (star power, solo, flex lane, drum freestyle — spec §4.5).
pub(super) fn repair_phrases(mut phrases: Vec<Phrase>) -> Vec<Phrase> {
    phrases.sort_by_key(|p| p.tick);
    for i in 0..phrases.len() {
        let Some(next_tick) = phrases.get(i + 1).map(|p| p.tick) else { continue };
        let (tick, length, ms_length) = {
            let p = &phrases[i];
            (p.tick, p.length, p.ms_length)
        };
        let end_tick = tick + length;
        if end_tick > next_tick {
            let remainder = end_tick - next_tick;
            let ms_per_tick = if length > 0 { ms_length / length as f64 } else { 0.0 };

            let phrase = &mut phrases[i];
            phrase.length = next_tick - tick;
            phrase.ms_length = phrase.length as f64 * ms_per_tick;

            if let Some(next) = phrases.get_mut(i + 1) {
                if next.length < remainder {
                    next.length = remainder;
                    next.ms_length = remainder as f64 * ms_per_tick;
                }
            }
        }
    }
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoteType;

    fn note(tick: u64, length: u64) -> NoteEvent {
        NoteEvent { tick, ms_time: tick as f64, length, ms_length: length as f64, note_type: NoteType::Green, flags: 0 }
    }

    #[test]
    fn truncates_sustain_that_reaches_next_note() {
        let groups = vec![vec![note(0, 500)], vec![note(100, 0)]];
        let repaired = repair_notes(groups);
        assert_eq!(repaired[0][0].length, 100);
    }

    #[test]
    fn leaves_non_overlapping_sustain_alone() {
        let groups = vec![vec![note(0, 50)], vec![note(100, 0)]];
        let repaired = repair_notes(groups);
        assert_eq!(repaired[0][0].length, 50);
    }

    #[test]
    fn extends_later_note_to_cover_the_remainder() {
        let groups = vec![vec![note(0, 500)], vec![note(100, 0)]];
        let repaired = repair_notes(groups);
        assert_eq!(repaired[0][0].length, 100);
        assert_eq!(repaired[1][0].length, 400);
        assert_eq!(repaired[1][0].ms_length, 400.0);
    }

    #[test]
    fn leaves_different_colored_sustain_alone() {
        let mut green = note(0, 500);
        green.note_type = NoteType::Green;
        let mut red = note(100, 0);
        red.note_type = NoteType::Red;
        let groups = vec![vec![green], vec![red]];
        let repaired = repair_notes(groups);
        assert_eq!(repaired[0][0].length, 500);
    }

    #[test]
    fn truncates_overlapping_phrase() {
        let phrases = vec![
            Phrase { tick: 0, ms_time: 0.0, length: 500, ms_length: 500.0 },
            Phrase { tick: 100, ms_time: 100.0, length: 50, ms_length: 50.0 },
        ];
        let repaired = repair_phrases(phrases);
        assert_eq!(repaired[0].length, 100);
        assert_eq!(repaired[1].length, 400);
    }
}
