//! Drum-specific normalization: drum type inference, tom/cymbal
//! resolution, five-lane-to-four-lane remap, disco flip, and
//! flam/accent/ghost dynamics (spec §4.5).

use crate::model::{self, ChartFormat, DrumType, IniChartModifiers, Instrument, NoteEvent, NoteType};
use crate::raw::{RawEventKind, RawTrack};
use crate::timing::TempoMap;
use std::collections::BTreeMap;

pub(super) fn infer_drum_type(raw: &crate::raw::RawChart, mods: &IniChartModifiers) -> Option<DrumType> {
    let has_drums = raw.tracks.keys().any(|(instrument, _)| *instrument == Instrument::Drums);
    if !has_drums {
        return None;
    }
    if mods.five_lane_drums {
        return Some(DrumType::FiveLane);
    }
    let has_markers = raw.tracks.iter().any(|((instrument, _), track)| {
        *instrument == Instrument::Drums
            && track.events.iter().any(|e| {
                matches!(
                    e.kind,
                    RawEventKind::YellowTomMarker
                        | RawEventKind::BlueTomMarker
                        | RawEventKind::GreenTomMarker
                        | RawEventKind::YellowCymbalMarker
                        | RawEventKind::BlueCymbalMarker
                        | RawEventKind::GreenCymbalMarker
                )
            })
    });
    if mods.pro_drums || has_markers {
        Some(DrumType::FourLanePro)
    } else {
        Some(DrumType::FourLane)
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum DiscoState {
    Off,
    On,
    NoFlip,
}

fn disco_timeline(track: &RawTrack) -> Vec<(u64, DiscoState)> {
    let mut timeline = vec![(0, DiscoState::Off)];
    for event in &track.events {
        let state = match event.kind {
            RawEventKind::DiscoFlipOn => DiscoState::On,
            RawEventKind::DiscoFlipOff => DiscoState::Off,
            RawEventKind::DiscoNoFlipOn => DiscoState::NoFlip,
            _ => continue,
        };
        timeline.push((event.tick, state));
    }
    timeline.sort_by_key(|(tick, _)| *tick);
    timeline
}

fn disco_state_at(timeline: &[(u64, DiscoState)], tick: u64) -> DiscoState {
    match timeline.binary_search_by_key(&tick, |(t, _)| *t) {
        Ok(i) => timeline[i].1,
        Err(0) => DiscoState::Off,
        Err(i) => timeline[i - 1].1,
    }
}

fn marker_intervals(track: &RawTrack, kind: RawEventKind) -> Vec<(u64, u64)> {
    track
        .events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| (e.tick, e.tick + e.length.max(1)))
        .collect()
}

fn in_intervals(intervals: &[(u64, u64)], tick: u64) -> bool {
    intervals.iter().any(|(start, end)| tick >= *start && tick < *end)
}

enum Lane {
    Kick,
    DoubleKick,
    Red,
    Yellow,
    Blue,
    Green,
    Orange,
}

fn lane_for(kind: RawEventKind) -> Option<Lane> {
    Some(match kind {
        RawEventKind::DrumKick => Lane::Kick,
        RawEventKind::Drum2xKick => Lane::DoubleKick,
        RawEventKind::DrumRed => Lane::Red,
        RawEventKind::DrumYellow => Lane::Yellow,
        RawEventKind::DrumBlue => Lane::Blue,
        RawEventKind::DrumGreen => Lane::Green,
        RawEventKind::DrumOrange => Lane::Orange,
        _ => return None,
    })
}

fn four_lane_note_type(lane: &Lane) -> NoteType {
    match lane {
        Lane::Red => NoteType::RedDrum,
        Lane::Yellow => NoteType::YellowDrum,
        Lane::Blue => NoteType::BlueDrum,
        Lane::Green | Lane::Orange => NoteType::GreenDrum,
        Lane::Kick | Lane::DoubleKick => NoteType::Kick,
    }
}

pub(super) fn resolve_notes(
    track: &RawTrack,
    format: ChartFormat,
    _mods: &IniChartModifiers,
    drum_type: Option<DrumType>,
    tempo_map: &TempoMap,
) -> Vec<Vec<NoteEvent>> {
    let drum_type = drum_type.unwrap_or(DrumType::FourLane);
    let disco = disco_timeline(track);

    // .chart marks cymbal ranges explicitly (default tom); .mid marks tom
    // ranges explicitly (default cymbal). See DESIGN.md.
    let yellow_cymbal = marker_intervals(track, RawEventKind::YellowCymbalMarker);
    let blue_cymbal = marker_intervals(track, RawEventKind::BlueCymbalMarker);
    let green_cymbal = marker_intervals(track, RawEventKind::GreenCymbalMarker);
    let yellow_tom = marker_intervals(track, RawEventKind::YellowTomMarker);
    let blue_tom = marker_intervals(track, RawEventKind::BlueTomMarker);
    let green_tom = marker_intervals(track, RawEventKind::GreenTomMarker);

    let flam_ticks: std::collections::BTreeSet<u64> = track
        .events
        .iter()
        .filter(|e| e.kind == RawEventKind::ForceFlam)
        .map(|e| e.tick)
        .collect();

    // Five-lane green/orange conflict resolution (spec §4.5): a green pad
    // only escalates to the blue slot when an orange pad sounds in the same
    // group; alone, it collapses onto the green slot like orange does.
    let orange_ticks: std::collections::BTreeSet<u64> = track
        .events
        .iter()
        .filter(|e| e.kind == RawEventKind::DrumOrange)
        .map(|e| e.tick)
        .collect();
    let green_orange_conflict_ticks: std::collections::BTreeSet<u64> = track
        .events
        .iter()
        .filter(|e| e.kind == RawEventKind::DrumGreen && orange_ticks.contains(&e.tick))
        .map(|e| e.tick)
        .collect();

    let mut accent_lanes: BTreeMap<(u64, &'static str), ()> = BTreeMap::new();
    let mut ghost_lanes: BTreeMap<(u64, &'static str), ()> = BTreeMap::new();
    for event in &track.events {
        let name = match event.kind {
            RawEventKind::AccentRed => Some("red"),
            RawEventKind::AccentYellow => Some("yellow"),
            RawEventKind::AccentBlue => Some("blue"),
            RawEventKind::AccentGreen => Some("green"),
            RawEventKind::AccentOrange => Some("orange"),
            _ => None,
        };
        if let Some(name) = name {
            accent_lanes.insert((event.tick, name), ());
        }
        let name = match event.kind {
            RawEventKind::GhostRed => Some("red"),
            RawEventKind::GhostYellow => Some("yellow"),
            RawEventKind::GhostBlue => Some("blue"),
            RawEventKind::GhostGreen => Some("green"),
            RawEventKind::GhostOrange => Some("orange"),
            _ => None,
        };
        if let Some(name) = name {
            ghost_lanes.insert((event.tick, name), ());
        }
    }

    let mut by_tick: BTreeMap<u64, Vec<NoteEvent>> = BTreeMap::new();

    for event in &track.events {
        let Some(lane) = lane_for(event.kind) else { continue };
        let lane_name = match lane {
            Lane::Red => "red",
            Lane::Yellow => "yellow",
            Lane::Blue => "blue",
            Lane::Green => "green",
            Lane::Orange => "orange",
            Lane::Kick | Lane::DoubleKick => "",
        };

        let mut flags = 0u32;
        let note_type;

        match (drum_type, &lane) {
            (_, Lane::Kick) => note_type = NoteType::Kick,
            (_, Lane::DoubleKick) => {
                note_type = NoteType::Kick;
                flags |= model::note_flag::DOUBLE_KICK;
            }
            (DrumType::FiveLane, Lane::Green) => {
                let conflict = green_orange_conflict_ticks.contains(&event.tick);
                let (nt, is_cymbal) = remap_five_lane(&lane, conflict);
                note_type = nt;
                if is_cymbal {
                    flags |= model::note_flag::CYMBAL;
                } else {
                    flags |= model::note_flag::TOM;
                }
            }
            (DrumType::FiveLane, _) => {
                let (nt, is_cymbal) = remap_five_lane(&lane, false);
                note_type = nt;
                if is_cymbal {
                    flags |= model::note_flag::CYMBAL;
                } else {
                    flags |= model::note_flag::TOM;
                }
            }
            (DrumType::FourLanePro, Lane::Yellow) => {
                note_type = NoteType::YellowDrum;
                let is_cymbal = match format {
                    ChartFormat::Chart => in_intervals(&yellow_cymbal, event.tick),
                    ChartFormat::Mid => !in_intervals(&yellow_tom, event.tick),
                };
                flags |= if is_cymbal { model::note_flag::CYMBAL } else { model::note_flag::TOM };
            }
            (DrumType::FourLanePro, Lane::Blue) => {
                note_type = NoteType::BlueDrum;
                let is_cymbal = match format {
                    ChartFormat::Chart => in_intervals(&blue_cymbal, event.tick),
                    ChartFormat::Mid => !in_intervals(&blue_tom, event.tick),
                };
                flags |= if is_cymbal { model::note_flag::CYMBAL } else { model::note_flag::TOM };
            }
            (DrumType::FourLanePro, Lane::Green) | (DrumType::FourLanePro, Lane::Orange) => {
                note_type = NoteType::GreenDrum;
                let is_cymbal = match format {
                    ChartFormat::Chart => in_intervals(&green_cymbal, event.tick),
                    ChartFormat::Mid => !in_intervals(&green_tom, event.tick),
                };
                flags |= if is_cymbal { model::note_flag::CYMBAL } else { model::note_flag::TOM };
            }
            (DrumType::FourLane, _) => note_type = four_lane_note_type(&lane),
        }

        if flam_ticks.contains(&event.tick) {
            flags |= model::note_flag::FLAM;
        }
        if accent_lanes.contains_key(&(event.tick, lane_name)) {
            flags |= model::note_flag::ACCENT;
        } else if let Some(velocity) = event.velocity {
            if velocity == 127 {
                flags |= model::note_flag::ACCENT;
            }
        }
        if ghost_lanes.contains_key(&(event.tick, lane_name)) {
            flags |= model::note_flag::GHOST;
        } else if let Some(velocity) = event.velocity {
            if velocity == 1 {
                flags |= model::note_flag::GHOST;
            }
        }

        match disco_state_at(&disco, event.tick) {
            DiscoState::On => flags |= model::note_flag::DISCO,
            DiscoState::NoFlip => flags |= model::note_flag::DISCO_NOFLIP,
            DiscoState::Off => {}
        }

        let note = crate::normalize::to_note(event, note_type, flags, tempo_map);
        by_tick.entry(note.tick).or_default().push(note);
    }

    by_tick.into_values().collect()
}

/// Five-lane kits (red/yellow/blue/orange/green pads) are remapped onto
/// the four-lane-pro color+cymbal model: yellow is always a cymbal
/// (hi-hat), blue is always a tom (floor tom), orange always becomes a
/// green cymbal (crash). The green pad is the only contested lane: when
/// it co-occurs with orange in the same group it escalates to the blue
/// slot (tom) so the two don't collide on green; alone, it collapses onto
/// the green slot (tom) like orange does onto the cymbal side (spec
/// §4.5).
fn remap_five_lane(lane: &Lane, green_orange_conflict: bool) -> (NoteType, bool) {
    match lane {
        Lane::Red => (NoteType::RedDrum, false),
        Lane::Yellow => (NoteType::YellowDrum, true),
        Lane::Blue => (NoteType::BlueDrum, false),
        Lane::Orange => (NoteType::GreenDrum, true),
        Lane::Green if green_orange_conflict => (NoteType::BlueDrum, false),
        Lane::Green => (NoteType::GreenDrum, false),
        Lane::Kick | Lane::DoubleKick => unreachable!("kick has no cymbal/tom state"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;
    use crate::raw::{RawChart, RawTrackEvent};

    fn tempo_map() -> TempoMap {
        TempoMap::new(192, &[crate::model::TempoMarker { tick: 0, bpm: 120.0 }])
    }

    #[test]
    fn four_lane_pro_defaults_yellow_to_tom_in_chart_format() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::DrumYellow));
        let map = tempo_map();
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), Some(DrumType::FourLanePro), &map);
        let note = groups[0][0];
        assert!(note.has_flag(model::note_flag::TOM));
        assert!(!note.has_flag(model::note_flag::CYMBAL));
    }

    #[test]
    fn five_lane_orange_becomes_green_cymbal() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::DrumOrange));
        let map = tempo_map();
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), Some(DrumType::FiveLane), &map);
        let note = groups[0][0];
        assert_eq!(note.note_type, NoteType::GreenDrum);
        assert!(note.has_flag(model::note_flag::CYMBAL));
    }

    #[test]
    fn five_lane_green_alone_stays_green_tom() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::DrumGreen));
        let map = tempo_map();
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), Some(DrumType::FiveLane), &map);
        let note = groups[0][0];
        assert_eq!(note.note_type, NoteType::GreenDrum);
        assert!(note.has_flag(model::note_flag::TOM));
    }

    #[test]
    fn five_lane_green_with_orange_in_same_group_becomes_blue() {
        let mut track = RawTrack::default();
        track.events.push(RawTrackEvent::instant(0, RawEventKind::DrumGreen));
        track.events.push(RawTrackEvent::instant(0, RawEventKind::DrumOrange));
        let map = tempo_map();
        let groups = resolve_notes(&track, ChartFormat::Chart, &IniChartModifiers::default(), Some(DrumType::FiveLane), &map);
        let green = groups[0].iter().find(|n| n.note_type != NoteType::GreenDrum).unwrap();
        assert_eq!(green.note_type, NoteType::BlueDrum);
        assert!(green.has_flag(model::note_flag::TOM));
        let orange = groups[0].iter().find(|n| n.note_type == NoteType::GreenDrum).unwrap();
        assert!(orange.has_flag(model::note_flag::CYMBAL));
    }

    #[test]
    fn accent_and_ghost_use_exact_velocity_values() {
        let mut track = RawTrack::default();
        let mut accent = RawTrackEvent::instant(0, RawEventKind::DrumRed);
        accent.velocity = Some(127);
        let mut ghost = RawTrackEvent::instant(192, RawEventKind::DrumRed);
        ghost.velocity = Some(1);
        let mut neither = RawTrackEvent::instant(384, RawEventKind::DrumRed);
        neither.velocity = Some(105);
        track.events.extend([accent, ghost, neither]);
        let map = tempo_map();
        let groups = resolve_notes(&track, ChartFormat::Mid, &IniChartModifiers::default(), Some(DrumType::FourLane), &map);
        assert!(groups[0][0].has_flag(model::note_flag::ACCENT));
        assert!(groups[1][0].has_flag(model::note_flag::GHOST));
        assert!(!groups[2][0].has_flag(model::note_flag::ACCENT));
        assert!(!groups[2][0].has_flag(model::note_flag::GHOST));
    }

    #[test]
    fn infer_drum_type_reports_none_without_drum_track() {
        let raw = RawChart::new(192);
        assert!(infer_drum_type(&raw, &IniChartModifiers::default()).is_none());
    }

    #[test]
    fn infer_drum_type_respects_five_lane_flag() {
        let mut raw = RawChart::new(192);
        raw.track_mut(Instrument::Drums, Difficulty::Expert)
            .events
            .push(RawTrackEvent::instant(0, RawEventKind::DrumRed));
        let mut mods = IniChartModifiers::default();
        mods.five_lane_drums = true;
        assert_eq!(infer_drum_type(&raw, &mods), Some(DrumType::FiveLane));
    }
}
