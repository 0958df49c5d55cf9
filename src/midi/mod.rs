//! The raw `.mid` (Standard MIDI File) parser (spec §4.3).
//!
//! Walks the SMF chunk structure with [`crate::byte_iter::ByteIter`],
//! converts delta-times to absolute ticks, and lowers note-on/note-off
//! pairs plus the handful of meta/sysex events this format cares about
//! into the same [`RawChart`] the `.chart` text parser builds.

mod tables;

use crate::byte_iter::ByteIter;
use crate::error::{invalid_midi, io};
use crate::model::{Difficulty, EndEvent, Instrument, InstrumentType, SectionMarker, TempoMarker, TimeSignatureMarker};
use crate::raw::{RawChart, RawEventKind, RawTrackEvent};
use log::{debug, trace, warn};
use snafu::ResultExt;
use std::collections::BTreeMap;

const META_EVENT: u8 = 0xff;
const META_TEXT_MIN: u8 = 0x01;
const META_TEXT_MAX: u8 = 0x09;
const META_TRACK_NAME: u8 = 0x03;
const META_TEMPO: u8 = 0x51;
const META_TIME_SIGNATURE: u8 = 0x58;
const META_END_OF_TRACK: u8 = 0x2f;

/// A held note-on, keyed by `(channel, note number)` so note-off is paired
/// with the most recent matching note-on on the same channel.
type HeldNotes = BTreeMap<(u8, u8), (u64, u8)>; // -> (start_tick, velocity)

/// Parses a `.mid` byte buffer into the raw intermediate model.
pub fn parse(bytes: &[u8]) -> crate::error::Result<RawChart> {
    let mut iter = ByteIter::new(bytes);
    iter.expect_tag("MThd").context(io!())?;
    let header_len = iter.read_u32().context(io!())?;
    if header_len != 6 {
        invalid_midi!("unexpected MThd length {}", header_len);
    }
    let format = iter.read_u16().context(io!())?;
    if format != 1 {
        invalid_midi!("unsupported SMF format {} (only format 1 is supported)", format);
    }
    let track_count = iter.read_u16().context(io!())?;
    if track_count == 0 {
        invalid_midi!("file declares zero tracks");
    }
    let division = iter.read_u16().context(io!())?;
    if division & 0x8000 != 0 {
        invalid_midi!("SMPTE division is not supported");
    }
    let resolution = u32::from(division);

    let mut raw = RawChart::new(resolution);
    let mut enhanced_opens: BTreeMap<(Instrument, Difficulty), bool> = BTreeMap::new();

    for track_index in 0..track_count {
        iter.expect_tag("MTrk").context(io!())?;
        let chunk_len = iter.read_u32().context(io!())? as usize;
        iter.push_limit(chunk_len);
        if track_index == 0 {
            parse_tempo_track(&mut iter, &mut raw)?;
        } else {
            parse_instrument_track(&mut iter, &mut raw, &mut enhanced_opens)?;
        }
        iter.pop_limit();
    }

    raw.finalize_sync_track();
    Ok(raw)
}

/// Track 0: the conductor track. Holds tempo map, time signatures, and
/// (per convention) the lyric/section text events some charts also stash
/// here instead of in a dedicated `EVENTS` track.
fn parse_tempo_track(iter: &mut ByteIter, raw: &mut RawChart) -> crate::error::Result<()> {
    let mut tick: u64 = 0;
    let mut running_status: Option<u8> = None;
    loop {
        if iter.is_end() {
            break;
        }
        let delta = iter.read_vlq().context(io!())?;
        tick += u64::from(delta);
        let status = peek_status(iter, &mut running_status)?;

        if status == META_EVENT {
            let meta_type = iter.read_u8().context(io!())?;
            let len = iter.read_vlq().context(io!())? as usize;
            let data = iter.read_n(len).context(io!())?;
            match meta_type {
                META_TEMPO => {
                    if data.len() != 3 {
                        invalid_midi!("tempo meta event at tick {} has bad length", tick);
                    }
                    let us_per_quarter = u32::from_be_bytes([0, data[0], data[1], data[2]]);
                    if us_per_quarter == 0 {
                        invalid_midi!("zero-length tempo at tick {}", tick);
                    }
                    // f64 math deliberately: this feeds the hash (spec §4.6)
                    // and must match floating point, not fixed-point, rounding.
                    let bpm = 60_000_000.0 / f64::from(us_per_quarter);
                    raw.tempos.push(TempoMarker { tick, bpm });
                }
                META_TIME_SIGNATURE => {
                    if data.len() < 2 {
                        invalid_midi!("time signature meta event at tick {} too short", tick);
                    }
                    let numerator = u32::from(data[0]);
                    let denominator = 1u32 << data[1];
                    if numerator == 0 {
                        invalid_midi!("zero time signature numerator at tick {}", tick);
                    }
                    raw.time_signatures.push(TimeSignatureMarker { tick, numerator, denominator });
                }
                META_END_OF_TRACK => {}
                t if (META_TEXT_MIN..=META_TEXT_MAX).contains(&t) => {
                    handle_text_event(raw, tick, data);
                }
                _ => trace!("ignoring meta event 0x{:02x} in tempo track", meta_type),
            }
            if meta_type == META_END_OF_TRACK {
                break;
            }
        } else if status == 0xf0 || status == 0xf7 {
            let len = iter.read_vlq().context(io!())? as usize;
            iter.read_n(len).context(io!())?;
        } else {
            skip_channel_event(iter, status)?;
        }
    }
    Ok(())
}

fn handle_text_event(raw: &mut RawChart, tick: u64, data: &[u8]) {
    let text = String::from_utf8_lossy(data);
    let text = text.trim();
    if let Some(name) = text.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if name == "end" {
            raw.end_events.push(EndEvent { tick });
        } else if name == "coda" {
            raw.coda_tick.get_or_insert(tick);
        } else if let Some(section) = name.strip_prefix("section ").or_else(|| name.strip_prefix("prc_")) {
            raw.sections.push(SectionMarker { tick, name: section.replace('_', " ") });
        }
    }
}

fn parse_instrument_track(
    iter: &mut ByteIter,
    raw: &mut RawChart,
    enhanced_opens: &mut BTreeMap<(Instrument, Difficulty), bool>,
) -> crate::error::Result<()> {
    let mut tick: u64 = 0;
    let mut running_status: Option<u8> = None;
    let mut track_instrument: Option<Instrument> = None;
    let mut is_events_track = false;
    let mut is_vocals_track = false;
    let mut chart_dynamics = false;
    let mut held: HeldNotes = HeldNotes::new();

    loop {
        if iter.is_end() {
            break;
        }
        let delta = iter.read_vlq().context(io!())?;
        tick += u64::from(delta);
        let status = peek_status(iter, &mut running_status)?;

        if status == META_EVENT {
            let meta_type = iter.read_u8().context(io!())?;
            let len = iter.read_vlq().context(io!())? as usize;
            let data = iter.read_n(len).context(io!())?;
            match meta_type {
                META_TRACK_NAME => {
                    let name = String::from_utf8_lossy(data).to_string();
                    if name == tables::EVENTS_TRACK_NAME {
                        is_events_track = true;
                    } else if name == tables::VOCALS_TRACK_NAME {
                        is_vocals_track = true;
                        raw.has_vocals = true;
                    } else if let Some((instrument, ())) = tables::track_identity(&name) {
                        debug!("parsing .mid track '{}'", name);
                        track_instrument = Some(instrument);
                    } else {
                        trace!("ignoring unrecognized .mid track '{}'", name);
                    }
                }
                t if (META_TEXT_MIN..=META_TEXT_MAX).contains(&t) => {
                    let text = String::from_utf8_lossy(data);
                    let text = text.trim();
                    if is_events_track {
                        handle_text_event(raw, tick, data);
                    } else if text == "[ENHANCED_OPENS]" {
                        if let Some(instrument) = track_instrument {
                            for difficulty in Difficulty::ALL {
                                enhanced_opens.insert((instrument, difficulty), true);
                            }
                        }
                    } else if text == "[ENABLE_CHART_DYNAMICS]" {
                        chart_dynamics = true;
                    }
                }
                META_END_OF_TRACK => break,
                _ => trace!("ignoring meta event 0x{:02x}", meta_type),
            }
        } else if status & 0xf0 == 0x90 {
            let note = iter.read_u8().context(io!())?;
            let velocity = iter.read_u8().context(io!())?;
            let channel = status & 0x0f;
            if velocity == 0 {
                note_off(raw, track_instrument, is_vocals_track, &mut held, enhanced_opens, chart_dynamics, channel, note, tick);
            } else {
                held.insert((channel, note), (tick, velocity));
            }
        } else if status & 0xf0 == 0x80 {
            let note = iter.read_u8().context(io!())?;
            let _velocity = iter.read_u8().context(io!())?;
            let channel = status & 0x0f;
            note_off(raw, track_instrument, is_vocals_track, &mut held, enhanced_opens, chart_dynamics, channel, note, tick);
        } else if status == 0xf0 || status == 0xf7 {
            let len = iter.read_vlq().context(io!())? as usize;
            let data = iter.read_n(len).context(io!())?;
            if let Some(instrument) = track_instrument {
                handle_sysex(raw, instrument, tick, data);
            }
        } else {
            skip_channel_event(iter, status)?;
        }
    }
    Ok(())
}

fn note_off(
    raw: &mut RawChart,
    track_instrument: Option<Instrument>,
    is_vocals_track: bool,
    held: &mut HeldNotes,
    enhanced_opens: &mut BTreeMap<(Instrument, Difficulty), bool>,
    chart_dynamics: bool,
    channel: u8,
    note: u8,
    tick: u64,
) {
    if is_vocals_track {
        return;
    }
    let Some(instrument) = track_instrument else { return };
    let Some((start_tick, velocity)) = held.remove(&(channel, note)) else {
        warn!("note-off with no matching note-on for note {} at tick {}", note, tick);
        return;
    };
    let length = tick.saturating_sub(start_tick);
    let kind = instrument.kind();

    for difficulty in Difficulty::ALL {
        let base = tables::difficulty_base(kind, difficulty);
        if note < base || note >= base + 12 {
            continue;
        }
        let offset = note - base;
        let Some(mut event_kind) = tables::lane_note(kind, offset) else { continue };
        if offset == 0 && *enhanced_opens.get(&(instrument, difficulty)).unwrap_or(&false) {
            event_kind = RawEventKind::FretOpen;
        }
        let mut event = RawTrackEvent::with_length(start_tick, length, event_kind);
        if chart_dynamics && chart_dynamics_applies(event_kind) {
            event.velocity = Some(velocity);
        }
        raw.track_mut(instrument, difficulty).events.push(event);
        return;
    }

    if let Some(event_kind) = tables::global_note(note) {
        for difficulty in Difficulty::ALL {
            if flex_lane_velocity_gated_out(event_kind, difficulty, velocity) {
                continue;
            }
            raw.track_mut(instrument, difficulty)
                .events
                .push(RawTrackEvent::with_length(start_tick, length, event_kind));
        }
    }
}

fn chart_dynamics_applies(kind: RawEventKind) -> bool {
    matches!(
        kind,
        RawEventKind::DrumRed
            | RawEventKind::DrumYellow
            | RawEventKind::DrumBlue
            | RawEventKind::DrumGreen
            | RawEventKind::DrumOrange
    )
}

/// Flex-lane velocity gating (spec §4.3): a flex-lane event whose velocity
/// falls outside its difficulty's accepted range is dropped for that
/// difficulty, even though the underlying MIDI note is instrument-wide.
fn flex_lane_velocity_gated_out(kind: RawEventKind, difficulty: Difficulty, velocity: u8) -> bool {
    if !matches!(kind, RawEventKind::FlexLaneSingle | RawEventKind::FlexLaneDouble) {
        return false;
    }
    let range = match difficulty {
        Difficulty::Easy => 21..=30,
        Difficulty::Medium => 21..=40,
        Difficulty::Hard => 21..=50,
        Difficulty::Expert => return false,
    };
    !range.contains(&velocity)
}

/// `50 53 00 00 <difficulty> <type> <on>` (spec §4.3): phase-shift-style
/// sysex for forced open (type 01) / forced tap (type 04). `difficulty ==
/// 0xff` fans the toggle out to every difficulty.
fn handle_sysex(raw: &mut RawChart, instrument: Instrument, tick: u64, data: &[u8]) {
    if data.len() != 6 || data[0] != 0x50 || data[1] != 0x53 || data[2] != 0x00 || data[3] != 0x00 {
        return;
    }
    let diff_byte = data[4];
    let event_type = data[5];
    let kind = match event_type {
        0x01 => RawEventKind::ForceOpen,
        0x04 => RawEventKind::ForceTap,
        _ => return,
    };
    let difficulties: &[Difficulty] = if diff_byte == 0xff {
        &Difficulty::ALL
    } else {
        match diff_byte {
            0 => &[Difficulty::Easy],
            1 => &[Difficulty::Medium],
            2 => &[Difficulty::Hard],
            3 => &[Difficulty::Expert],
            _ => return,
        }
    };
    for &difficulty in difficulties {
        raw.track_mut(instrument, difficulty)
            .events
            .push(RawTrackEvent::instant(tick, kind));
    }
}

fn peek_status(iter: &mut ByteIter, running_status: &mut Option<u8>) -> crate::error::Result<u8> {
    let byte = iter.peek_u8().context(io!())?;
    if byte & 0x80 != 0 {
        iter.read_u8().context(io!())?;
        if byte < 0xf0 {
            *running_status = Some(byte);
        }
        Ok(byte)
    } else {
        match running_status {
            Some(status) => Ok(*status),
            None => invalid_midi!("channel event with no running status"),
        }
    }
}

fn skip_channel_event(iter: &mut ByteIter, status: u8) -> crate::error::Result<()> {
    let data_bytes = match status & 0xf0 {
        0xc0 | 0xd0 => 1,
        _ => 2,
    };
    iter.read_n(data_bytes).context(io!())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_smf() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(b"MThd");
        bytes.extend(6u32.to_be_bytes());
        bytes.extend(1u16.to_be_bytes());
        bytes.extend(1u16.to_be_bytes());
        bytes.extend(192u16.to_be_bytes());

        let mut track = Vec::new();
        track.extend([0x00, 0xff, 0x51, 0x03, 0x07, 0xa1, 0x20]); // 120 bpm
        track.extend([0x00, 0xff, 0x2f, 0x00]);
        bytes.extend(b"MTrk");
        bytes.extend((track.len() as u32).to_be_bytes());
        bytes.extend(track);
        bytes
    }

    #[test]
    fn parses_minimal_header_and_tempo() {
        let raw = parse(&minimal_smf()).unwrap();
        assert_eq!(raw.resolution, 192);
        assert!((raw.tempos[0].bpm - 120.0).abs() < 0.01);
    }

    #[test]
    fn rejects_format_zero() {
        let mut bytes = minimal_smf();
        bytes[9] = 0; // format word low byte
        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn rejects_smpte_division() {
        let mut bytes = minimal_smf();
        bytes[12] = 0x80; // high bit of division's high byte
        assert!(parse(&bytes).is_err());
    }
}
