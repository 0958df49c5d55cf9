//! Frozen binary serialization (`BTRACK`) and BLAKE3 hashing of a
//! normalized track (spec §4.6). The wire format is part of the hash
//! contract: field order and byte width must never change, and floating
//! point fields are hashed as their raw `f64` bits so that two equal
//! values always serialize identically.

use crate::error::HashError;
use crate::model::{DrumFreestyleSection, FlexLane, ParsedChart, Phrase, Track};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const MAGIC: &[u8; 4] = b"CHNF";
const VERSION: u32 = 20240320;

/// Hashes the named track, returning the base64url-encoded digest and the
/// raw `BTRACK` bytes that produced it.
pub fn hash_track(
    parsed: &ParsedChart,
    instrument: crate::model::Instrument,
    difficulty: crate::model::Difficulty,
) -> Result<(String, Vec<u8>), HashError> {
    let track = parsed
        .track(instrument, difficulty)
        .ok_or(HashError::TrackNotFound { instrument, difficulty })?;

    let bytes = serialize_track(parsed, track);
    let digest = blake3::hash(&bytes);
    let encoded = URL_SAFE_NO_PAD.encode(digest.as_bytes());
    Ok((encoded, bytes))
}

fn serialize_track(parsed: &ParsedChart, track: &Track) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&parsed.resolution.to_le_bytes());

    write_tempos(&mut buf, parsed);
    write_time_signatures(&mut buf, parsed);

    let note_ticks = note_intervals(track);
    write_phrases(&mut buf, &prune_unplayed(&track.star_power_sections, &note_ticks));
    write_phrases(&mut buf, &prune_unplayed(&track.solo_sections, &note_ticks));
    write_flex_lanes(&mut buf, &track.flex_lanes);
    write_freestyle(&mut buf, &track.drum_freestyle_sections);
    write_notes(&mut buf, track);

    buf
}

fn note_intervals(track: &Track) -> Vec<(u64, u64)> {
    track
        .note_event_groups
        .iter()
        .flat_map(|group| group.iter().map(|n| (n.tick, n.tick + n.length.max(1))))
        .collect()
}

/// Drops phrases that don't overlap any note in the track: a Star Power or
/// solo phrase with nothing under it can never be activated, so it carries
/// no scoring meaning and shouldn't perturb the hash.
fn prune_unplayed(phrases: &[Phrase], note_ticks: &[(u64, u64)]) -> Vec<Phrase> {
    phrases
        .iter()
        .copied()
        .filter(|phrase| {
            let phrase_end = phrase.tick + phrase.length.max(1);
            note_ticks
                .iter()
                .any(|(note_start, note_end)| *note_start < phrase_end && phrase.tick < *note_end)
        })
        .collect()
}

fn dedup_by_tick_keep_last<T: Copy>(items: &[T], tick_of: impl Fn(&T) -> u64) -> Vec<T> {
    let mut sorted: Vec<T> = items.to_vec();
    sorted.sort_by_key(|item| tick_of(item));
    let mut deduped: Vec<T> = Vec::with_capacity(sorted.len());
    for item in sorted {
        if let Some(last) = deduped.last_mut() {
            if tick_of(last) == tick_of(&item) {
                *last = item;
                continue;
            }
        }
        deduped.push(item);
    }
    deduped
}

fn write_tempos(buf: &mut Vec<u8>, parsed: &ParsedChart) {
    let tempos = dedup_by_tick_keep_last(&parsed.tempos, |t| t.tick);
    buf.extend_from_slice(&(tempos.len() as u32).to_le_bytes());
    for tempo in tempos {
        buf.extend_from_slice(&tempo.tick.to_le_bytes());
        buf.extend_from_slice(&tempo.bpm.to_le_bytes());
    }
}

fn write_time_signatures(buf: &mut Vec<u8>, parsed: &ParsedChart) {
    let sigs = dedup_by_tick_keep_last(&parsed.time_signatures, |t| t.tick);
    buf.extend_from_slice(&(sigs.len() as u32).to_le_bytes());
    for sig in sigs {
        buf.extend_from_slice(&sig.tick.to_le_bytes());
        buf.extend_from_slice(&sig.numerator.to_le_bytes());
        buf.extend_from_slice(&sig.denominator.to_le_bytes());
    }
}

fn write_phrases(buf: &mut Vec<u8>, phrases: &[Phrase]) {
    buf.extend_from_slice(&(phrases.len() as u32).to_le_bytes());
    for phrase in phrases {
        buf.extend_from_slice(&phrase.tick.to_le_bytes());
        buf.extend_from_slice(&phrase.length.to_le_bytes());
    }
}

fn write_flex_lanes(buf: &mut Vec<u8>, lanes: &[FlexLane]) {
    buf.extend_from_slice(&(lanes.len() as u32).to_le_bytes());
    for lane in lanes {
        buf.extend_from_slice(&lane.phrase.tick.to_le_bytes());
        buf.extend_from_slice(&lane.phrase.length.to_le_bytes());
        buf.push(lane.is_double as u8);
    }
}

fn write_freestyle(buf: &mut Vec<u8>, sections: &[DrumFreestyleSection]) {
    buf.extend_from_slice(&(sections.len() as u32).to_le_bytes());
    for section in sections {
        buf.extend_from_slice(&section.phrase.tick.to_le_bytes());
        buf.extend_from_slice(&section.phrase.length.to_le_bytes());
        buf.push(section.is_coda as u8);
    }
}

fn write_notes(buf: &mut Vec<u8>, track: &Track) {
    buf.extend_from_slice(&(track.note_count() as u32).to_le_bytes());
    for group in &track.note_event_groups {
        for note in group {
            buf.extend_from_slice(&note.tick.to_le_bytes());
            buf.extend_from_slice(&note.length.to_le_bytes());
            buf.extend_from_slice(&note.note_type.as_u32().to_le_bytes());
            buf.extend_from_slice(&note.flags.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartFormat, Difficulty, Instrument, NoteEvent, NoteType};
    use std::collections::BTreeMap;

    fn chart_with_one_note() -> ParsedChart {
        let mut tracks = BTreeMap::new();
        tracks.insert(
            (Instrument::Guitar, Difficulty::Expert),
            Track {
                instrument: Instrument::Guitar,
                difficulty: Difficulty::Expert,
                note_event_groups: vec![vec![NoteEvent {
                    tick: 0,
                    ms_time: 0.0,
                    length: 0,
                    ms_length: 0.0,
                    note_type: NoteType::Green,
                    flags: crate::model::note_flag::STRUM,
                }]],
                star_power_sections: Vec::new(),
                rejected_star_power_sections: Vec::new(),
                solo_sections: Vec::new(),
                flex_lanes: Vec::new(),
                drum_freestyle_sections: Vec::new(),
            },
        );
        ParsedChart {
            resolution: 192,
            format: ChartFormat::Chart,
            tempos: vec![crate::model::TempoMarker { tick: 0, bpm: 120.0 }],
            time_signatures: vec![crate::model::TimeSignatureMarker { tick: 0, numerator: 4, denominator: 4 }],
            sections: Vec::new(),
            end_events: Vec::new(),
            drum_type: None,
            has_vocals: false,
            tracks,
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let chart = chart_with_one_note();
        let (a, _) = hash_track(&chart, Instrument::Guitar, Difficulty::Expert).unwrap();
        let (b, _) = hash_track(&chart, Instrument::Guitar, Difficulty::Expert).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_track_is_an_error() {
        let chart = chart_with_one_note();
        assert!(hash_track(&chart, Instrument::Bass, Difficulty::Expert).is_err());
    }

    #[test]
    fn different_note_type_changes_the_hash() {
        let mut chart = chart_with_one_note();
        let (original, _) = hash_track(&chart, Instrument::Guitar, Difficulty::Expert).unwrap();

        let track = chart.tracks.get_mut(&(Instrument::Guitar, Difficulty::Expert)).unwrap();
        track.note_event_groups[0][0].note_type = NoteType::Red;
        let (changed, _) = hash_track(&chart, Instrument::Guitar, Difficulty::Expert).unwrap();

        assert_ne!(original, changed);
    }

    #[test]
    fn unplayed_star_power_phrase_is_pruned_from_hash() {
        let mut with_sp = chart_with_one_note();
        with_sp
            .tracks
            .get_mut(&(Instrument::Guitar, Difficulty::Expert))
            .unwrap()
            .star_power_sections
            .push(Phrase { tick: 5_000, ms_time: 0.0, length: 100, ms_length: 0.0 });

        let baseline = chart_with_one_note();
        let (a, _) = hash_track(&baseline, Instrument::Guitar, Difficulty::Expert).unwrap();
        let (b, _) = hash_track(&with_sp, Instrument::Guitar, Difficulty::Expert).unwrap();
        assert_eq!(a, b, "a star power phrase with no notes under it must not affect the hash");
    }
}
