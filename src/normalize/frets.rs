//! Five-fret/six-fret modifier resolution: chord snapping, forced-open
//! promotion, and HOPO/strum/tap resolution (spec §4.5).

use crate::model::{self, ChartFormat, IniChartModifiers, NoteEvent, NoteType};
use crate::raw::{RawEventKind, RawTrack, RawTrackEvent};
use crate::timing::TempoMap;
use std::collections::BTreeMap;

fn note_type_for(kind: RawEventKind) -> Option<NoteType> {
    Some(match kind {
        RawEventKind::FretOpen => NoteType::Open,
        RawEventKind::FretGreen => NoteType::Green,
        RawEventKind::FretRed => NoteType::Red,
        RawEventKind::FretYellow => NoteType::Yellow,
        RawEventKind::FretBlue => NoteType::Blue,
        RawEventKind::FretOrange => NoteType::Orange,
        RawEventKind::FretBlack1 => NoteType::Black1,
        RawEventKind::FretBlack2 => NoteType::Black2,
        RawEventKind::FretBlack3 => NoteType::Black3,
        RawEventKind::FretWhite1 => NoteType::White1,
        RawEventKind::FretWhite2 => NoteType::White2,
        RawEventKind::FretWhite3 => NoteType::White3,
        _ => return None,
    })
}

fn modifier_intervals(track: &RawTrack, kind: RawEventKind) -> Vec<(u64, u64)> {
    track
        .events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| (e.tick, e.tick + e.length.max(1)))
        .collect()
}

fn active_at(intervals: &[(u64, u64)], tick: u64) -> bool {
    intervals.iter().any(|(start, end)| tick >= *start && tick < *end)
}

fn hopo_threshold(resolution: u32, format: ChartFormat, mods: &IniChartModifiers) -> u64 {
    if mods.hopo_frequency > 0 {
        u64::from(mods.hopo_frequency)
    } else if mods.eighthnote_hopo {
        1 + u64::from(resolution) / 2
    } else if format == ChartFormat::Mid {
        1 + u64::from(resolution) / 3
    } else {
        65 * u64::from(resolution) / 192
    }
}

/// Snaps near-simultaneous note events onto a single canonical tick, so
/// that chords authored with small human timing error (or rounding from a
/// DAW export) are recognized as one chord (spec §4.5).
fn snap_ticks(mut ticks: Vec<u64>, threshold: u64) -> BTreeMap<u64, u64> {
    ticks.sort_unstable();
    ticks.dedup();
    let mut mapping = BTreeMap::new();
    let mut anchor = None;
    for tick in ticks {
        match anchor {
            Some(a) if tick - a <= threshold => {
                mapping.insert(tick, a);
            }
            _ => {
                anchor = Some(tick);
                mapping.insert(tick, tick);
            }
        }
    }
    mapping
}

pub(super) fn resolve_notes(
    track: &RawTrack,
    format: ChartFormat,
    mods: &IniChartModifiers,
    tempo_map: &TempoMap,
) -> Vec<Vec<NoteEvent>> {
    let force_open = modifier_intervals(track, RawEventKind::ForceOpen);
    let force_hopo = modifier_intervals(track, RawEventKind::ForceHopo);
    let force_strum = modifier_intervals(track, RawEventKind::ForceStrum);
    let force_tap = modifier_intervals(track, RawEventKind::ForceTap);
    let force_unnatural = modifier_intervals(track, RawEventKind::ForceUnnatural);

    let fret_ticks: Vec<u64> = track
        .events
        .iter()
        .filter(|e| note_type_for(e.kind).is_some())
        .map(|e| e.tick)
        .collect();
    let snap_map = snap_ticks(fret_ticks, u64::from(mods.chord_snap_threshold));

    let mut by_tick: BTreeMap<u64, Vec<RawTrackEvent>> = BTreeMap::new();
    for event in &track.events {
        if note_type_for(event.kind).is_none() {
            continue;
        }
        let canonical = *snap_map.get(&event.tick).unwrap_or(&event.tick);
        let mut snapped = *event;
        snapped.tick = canonical;
        by_tick.entry(canonical).or_default().push(snapped);
    }

    let threshold = hopo_threshold(tempo_map_resolution(tempo_map), format, mods);
    let mut groups = Vec::with_capacity(by_tick.len());
    let mut previous: Option<(u64, NoteType)> = None;

    for (tick, mut events) in by_tick {
        if active_at(&force_open, tick) && events.len() > 1 {
            // forceOpen promotes the longest note in the group to `open`;
            // the rest of the group is dropped (spec §4.5).
            let longest = events
                .iter()
                .enumerate()
                .max_by_key(|(_, e)| e.length)
                .map(|(i, _)| i)
                .expect("non-empty group");
            events = vec![events[longest]];
        }

        let is_open_forced = active_at(&force_open, tick) && events.len() == 1;
        let mut notes = Vec::with_capacity(events.len());
        let mut chord_note_type = None;

        for event in &events {
            let mut note_type = note_type_for(event.kind).expect("filtered above");
            if is_open_forced {
                note_type = NoteType::Open;
            }
            chord_note_type.get_or_insert(note_type);
            notes.push((event, note_type));
        }

        let is_chord = notes.len() > 1;
        let representative = notes[0].1;

        let natural_hopo = !is_chord
            && representative != NoteType::Open
            && previous
                .map(|(prev_tick, prev_type)| {
                    prev_type != representative && tick.saturating_sub(prev_tick) <= threshold
                })
                .unwrap_or(false);

        let forced_tap = active_at(&force_tap, tick);
        let forced_hopo = active_at(&force_hopo, tick);
        let forced_strum = active_at(&force_strum, tick);
        let forced_unnatural = format == ChartFormat::Chart && active_at(&force_unnatural, tick);

        let is_hopo = if forced_hopo {
            true
        } else if forced_strum {
            false
        } else if forced_unnatural {
            !natural_hopo
        } else {
            natural_hopo
        };

        let flags = if forced_tap {
            model::note_flag::TAP
        } else if is_hopo {
            model::note_flag::HOPO
        } else {
            model::note_flag::STRUM
        };

        for (event, note_type) in notes {
            groups_push(&mut groups, crate::normalize::to_note(event, note_type, flags, tempo_map));
        }

        previous = Some((tick, representative));
    }

    groups
}

fn groups_push(groups: &mut Vec<Vec<NoteEvent>>, note: NoteEvent) {
    match groups.last_mut() {
        Some(last) if last.first().map(|n| n.tick) == Some(note.tick) => last.push(note),
        _ => groups.push(vec![note]),
    }
}

fn tempo_map_resolution(tempo_map: &TempoMap) -> u32 {
    tempo_map.resolution()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TempoMarker;

    fn tempo_map() -> TempoMap {
        TempoMap::new(192, &[TempoMarker { tick: 0, bpm: 120.0 }])
    }

    #[test]
    fn lone_note_after_silence_is_strum() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::FretGreen));
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), &tempo_map());
        assert!(groups[0][0].has_flag(model::note_flag::STRUM));
    }

    #[test]
    fn close_alternating_notes_are_hopo() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::FretGreen));
        track.events.push(RawTrackEvent::instant(32, RawEventKind::FretRed));
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), &tempo_map());
        assert!(groups[1][0].has_flag(model::note_flag::HOPO));
    }

    #[test]
    fn chord_is_never_naturally_hopo() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::FretGreen));
        track.events.push(RawTrackEvent::instant(32, RawEventKind::FretRed));
        track.events.push(RawTrackEvent::instant(32, RawEventKind::FretYellow));
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), &tempo_map());
        assert!(groups[1].iter().all(|n| n.has_flag(model::note_flag::STRUM)));
    }

    #[test]
    fn force_unnatural_toggles_strum_to_hopo() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::FretGreen));
        track.events.push(RawTrackEvent::with_length(400, 0, RawEventKind::FretRed));
        track.events.push(RawTrackEvent::instant(400, RawEventKind::ForceUnnatural));
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), &tempo_map());
        assert!(groups[1][0].has_flag(model::note_flag::HOPO));
    }

    #[test]
    fn chord_snap_merges_near_simultaneous_notes() {
        let mut mods = IniChartModifiers::default();
        mods.chord_snap_threshold = 5;
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(100, RawEventKind::FretGreen));
        track.events.push(RawTrackEvent::instant(103, RawEventKind::FretRed));
        let groups = resolve_notes(&track, ChartFormat::Chart, &mods, &tempo_map());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn force_open_on_a_chord_promotes_the_longest_note() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::with_length(0, 10, RawEventKind::FretGreen));
        track.events.push(RawTrackEvent::with_length(0, 40, RawEventKind::FretRed));
        track.events.push(RawTrackEvent::instant(0, RawEventKind::ForceOpen));
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), &tempo_map());
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].note_type, NoteType::Open);
        assert_eq!(groups[0][0].length, 40);
    }
}
