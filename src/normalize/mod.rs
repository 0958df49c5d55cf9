//! Turns a [`RawChart`](crate::raw::RawChart) into a [`ParsedChart`] (spec
//! §4.5): sustain cutoff, drum type inference, drum/fret modifier
//! resolution, HOPO/strum/tap resolution, chord snapping, overlap repair,
//! and legacy Star Power recovery.

mod drum;
mod frets;
mod legacy_sp;
mod overlap;

use crate::model::{
    ChartFormat, DrumFreestyleSection, Difficulty, DrumType, FlexLane, IniChartModifiers,
    Instrument, InstrumentType, NoteEvent, ParsedChart, Phrase, Track,
};
use crate::raw::{RawChart, RawEventKind, RawTrack, RawTrackEvent};
use crate::timing::TempoMap;
use log::debug;
use std::collections::BTreeMap;

pub(crate) fn normalize(raw: RawChart, format: ChartFormat, mods: IniChartModifiers) -> ParsedChart {
    let tempo_map = TempoMap::new(raw.resolution, &raw.tempos);
    let drum_type = drum::infer_drum_type(&raw, &mods);

    let mut tracks = BTreeMap::new();
    for (&(instrument, difficulty), raw_track) in &raw.tracks {
        let track = normalize_track(
            instrument,
            difficulty,
            raw_track,
            format,
            &mods,
            drum_type,
            &tempo_map,
            raw.coda_tick,
        );
        if !track.is_empty()
            || !track.star_power_sections.is_empty()
            || !track.solo_sections.is_empty()
        {
            tracks.insert((instrument, difficulty), track);
        }
    }

    debug!("normalized {} track(s)", tracks.len());

    ParsedChart {
        resolution: raw.resolution,
        format,
        tempos: raw.tempos,
        time_signatures: raw.time_signatures,
        sections: raw.sections,
        end_events: raw.end_events,
        drum_type,
        has_vocals: raw.has_vocals,
        tracks,
    }
}

fn normalize_track(
    instrument: Instrument,
    difficulty: Difficulty,
    raw_track: &RawTrack,
    format: ChartFormat,
    mods: &IniChartModifiers,
    drum_type: Option<DrumType>,
    tempo_map: &TempoMap,
    coda_tick: Option<u64>,
) -> Track {
    let kind = instrument.kind();
    let raw_track = &apply_sustain_cutoff(raw_track, format, tempo_map.resolution(), mods);

    let note_event_groups = if kind == InstrumentType::Drums {
        drum::resolve_notes(raw_track, format, mods, drum_type, tempo_map)
    } else {
        frets::resolve_notes(raw_track, format, mods, tempo_map)
    };

    let (star_power_sections, solo_sections, flex_lanes, drum_freestyle_sections) =
        resolve_phrases(raw_track, tempo_map, coda_tick);

    let (star_power_sections, solo_sections, rejected_star_power_sections) =
        legacy_sp::resolve(instrument, difficulty, mods, star_power_sections, solo_sections);

    let note_event_groups = overlap::repair_notes(note_event_groups);
    let star_power_sections = overlap::repair_phrases(star_power_sections);
    let solo_sections = overlap::repair_phrases(solo_sections);

    Track {
        instrument,
        difficulty,
        note_event_groups,
        star_power_sections,
        rejected_star_power_sections,
        solo_sections,
        flex_lanes,
        drum_freestyle_sections,
    }
}

/// Any event with `length <= T` has its length zeroed (spec §4.5), where
/// `T` defaults to `sustain_cutoff_threshold` if the caller set one
/// (>= 0), else `resolution/3 + 1` for `.mid` and `0` for `.chart`.
fn apply_sustain_cutoff(
    raw_track: &RawTrack,
    format: ChartFormat,
    resolution: u32,
    mods: &IniChartModifiers,
) -> RawTrack {
    let threshold: u64 = if mods.sustain_cutoff_threshold >= 0 {
        mods.sustain_cutoff_threshold as u64
    } else if format == ChartFormat::Mid {
        u64::from(resolution) / 3 + 1
    } else {
        0
    };

    let mut track = raw_track.clone();
    for event in &mut track.events {
        if event.length <= threshold {
            event.length = 0;
        }
    }
    track
}

fn resolve_phrases(
    raw_track: &RawTrack,
    tempo_map: &TempoMap,
    coda_tick: Option<u64>,
) -> (Vec<Phrase>, Vec<Phrase>, Vec<FlexLane>, Vec<DrumFreestyleSection>) {
    let mut star_power = Vec::new();
    let mut solo = Vec::new();
    let mut flex = Vec::new();
    let mut freestyle = Vec::new();

    for event in &raw_track.events {
        let phrase = to_phrase(event, tempo_map);
        match event.kind {
            RawEventKind::StarPower => star_power.push(phrase),
            RawEventKind::SoloStart => solo.push(phrase),
            RawEventKind::FlexLaneSingle => flex.push(FlexLane { phrase, is_double: false }),
            RawEventKind::FlexLaneDouble => flex.push(FlexLane { phrase, is_double: true }),
            RawEventKind::DrumFreestyle => {
                let is_coda = coda_tick.is_some_and(|c| event.tick >= c);
                freestyle.push(DrumFreestyleSection { phrase, is_coda });
            }
            _ => {}
        }
    }

    star_power.sort_by_key(|p| p.tick);
    solo.sort_by_key(|p| p.tick);
    flex.sort_by_key(|f| f.phrase.tick);
    freestyle.sort_by_key(|f| f.phrase.tick);

    (star_power, solo, flex, freestyle)
}

pub(crate) fn to_phrase(event: &RawTrackEvent, tempo_map: &TempoMap) -> Phrase {
    Phrase {
        tick: event.tick,
        ms_time: tempo_map.tick_to_ms(event.tick),
        length: event.length,
        ms_length: tempo_map.length_to_ms(event.tick, event.length),
    }
}

pub(crate) fn to_note(event: &RawTrackEvent, note_type: crate::model::NoteType, flags: u32, tempo_map: &TempoMap) -> NoteEvent {
    NoteEvent {
        tick: event.tick,
        ms_time: tempo_map.tick_to_ms(event.tick),
        length: event.length,
        ms_length: tempo_map.length_to_ms(event.tick, event.length),
        note_type,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TempoMarker;

    #[test]
    fn empty_raw_chart_normalizes_to_no_tracks() {
        let raw = RawChart::new(192);
        let parsed = normalize(raw, ChartFormat::Chart, IniChartModifiers::default());
        assert!(parsed.tracks.is_empty());
    }

    #[test]
    fn sustain_cutoff_zeroes_short_chart_sustains_by_default() {
        let mut raw = RawChart::new(192);
        raw.tempos.push(TempoMarker { tick: 0, bpm: 120.0 });
        raw.track_mut(Instrument::Guitar, Difficulty::Expert)
            .events
            .push(RawTrackEvent::with_length(0, 1, RawEventKind::FretGreen));
        raw.finalize_sync_track();

        let parsed = normalize(raw, ChartFormat::Chart, IniChartModifiers::default());
        let track = parsed.track(Instrument::Guitar, Difficulty::Expert).unwrap();
        assert_eq!(track.note_event_groups[0][0].length, 0);
    }

    #[test]
    fn normalization_is_idempotent_on_already_normalized_flags() {
        // Running the pipeline twice on the same raw input must produce the
        // same output (spec §8: normalization idempotence).
        let mut raw = RawChart::new(192);
        raw.tempos.push(TempoMarker { tick: 0, bpm: 120.0 });
        raw.track_mut(Instrument::Guitar, Difficulty::Expert)
            .events
            .push(RawTrackEvent::instant(0, RawEventKind::FretGreen));
        raw.finalize_sync_track();

        let a = normalize(raw.clone(), ChartFormat::Chart, IniChartModifiers::default());
        let b = normalize(raw, ChartFormat::Chart, IniChartModifiers::default());
        assert_eq!(a.tracks.len(), b.tracks.len());
    }
}
