//! The raw `.chart` text parser (spec §4.2).
//!
//! A small explicit state machine walks the decoded text character by
//! character: `Outside` a section, `SectionName` (between `[` and `]`, a
//! newline here is fatal), and `Body` (between `{` and `}`, lines of the
//! form `KEY = VALUE`). This mirrors the teacher's preference for plain
//! state machines over combinator parsing (spec §9 makes the same point
//! about the modifier passes; the same reasoning applies to the scanner).

mod sections;

use crate::error::invalid_chart;
use crate::model::{EndEvent, SectionMarker, TempoMarker, TimeSignatureMarker};
use crate::raw::{RawChart, RawEventKind, RawTrackEvent};
use log::{debug, trace, warn};

#[derive(Clone, Copy, Eq, PartialEq)]
enum ScanState {
    Outside,
    SectionName,
    AwaitingBrace,
    Body,
}

struct Section {
    name: String,
    lines: Vec<String>,
}

/// Splits decoded `.chart` text into its bracketed sections, enforcing
/// the "newline inside a section name is fatal" rule.
fn scan_sections(text: &str) -> crate::error::Result<Vec<Section>> {
    let mut sections = Vec::new();
    let mut state = ScanState::Outside;
    let mut name_buf = String::new();
    let mut line_buf = String::new();
    let mut lines: Vec<String> = Vec::new();

    for ch in text.chars() {
        match state {
            ScanState::Outside => {
                if ch == '[' {
                    name_buf.clear();
                    state = ScanState::SectionName;
                }
                // Everything else outside a section is ignorable whitespace.
            }
            ScanState::SectionName => {
                if ch == ']' {
                    state = ScanState::AwaitingBrace;
                } else if ch == '\n' || ch == '\r' {
                    invalid_chart!("unterminated section name '{}'", name_buf);
                } else {
                    name_buf.push(ch);
                }
            }
            ScanState::AwaitingBrace => {
                if ch == '{' {
                    lines = Vec::new();
                    line_buf.clear();
                    state = ScanState::Body;
                }
                // whitespace/newlines between ] and { are ignored
            }
            ScanState::Body => {
                if ch == '}' {
                    if !line_buf.trim().is_empty() {
                        lines.push(std::mem::take(&mut line_buf));
                    }
                    sections.push(Section {
                        name: name_buf.clone(),
                        lines: std::mem::take(&mut lines),
                    });
                    state = ScanState::Outside;
                } else if ch == '\n' {
                    let trimmed = line_buf.trim();
                    if !trimmed.is_empty() {
                        lines.push(trimmed.to_string());
                    }
                    line_buf.clear();
                } else if ch != '\r' {
                    line_buf.push(ch);
                }
            }
        }
    }

    Ok(sections)
}

/// Parses a single `KEY = VALUE` (or `tick = TYPE VALUE [LEN]`) line,
/// tolerating `=` characters inside the value per spec §4.2.
fn split_kv(line: &str) -> Option<(&str, &str)> {
    let idx = line.find('=')?;
    Some((line[..idx].trim(), line[idx + 1..].trim()))
}

fn parse_song_section(raw: &mut RawChart, section: &Section) -> crate::error::Result<()> {
    for line in &section.lines {
        if let Some((key, value)) = split_kv(line) {
            if key == "Resolution" {
                raw.resolution = value.parse::<u32>().ok().filter(|r| *r > 0).unwrap_or(0);
            }
        }
    }
    Ok(())
}

fn parse_sync_track(raw: &mut RawChart, section: &Section) -> crate::error::Result<()> {
    for line in &section.lines {
        let Some((tick_str, value)) = split_kv(line) else { continue };
        let Ok(tick) = tick_str.parse::<u64>() else { continue };
        let mut parts = value.split_whitespace();
        match parts.next() {
            Some("B") => {
                let Some(millibpm) = parts.next().and_then(|s| s.parse::<f64>().ok()) else {
                    continue;
                };
                if millibpm <= 0.0 {
                    invalid_chart!("zero or negative tempo at tick {}", tick);
                }
                raw.tempos.push(TempoMarker { tick, bpm: millibpm / 1000.0 });
            }
            Some("TS") => {
                let Some(numerator) = parts.next().and_then(|s| s.parse::<u32>().ok()) else {
                    continue;
                };
                if numerator == 0 {
                    invalid_chart!("zero time signature numerator at tick {}", tick);
                }
                let denominator = match parts.next().and_then(|s| s.parse::<u32>().ok()) {
                    Some(exp) => 1u32 << exp,
                    None => 4,
                };
                raw.time_signatures.push(TimeSignatureMarker { tick, numerator, denominator });
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_events_section(raw: &mut RawChart, section: &Section) {
    for line in &section.lines {
        let Some((tick_str, value)) = split_kv(line) else { continue };
        let Ok(tick) = tick_str.parse::<u64>() else { continue };
        let Some(rest) = value.strip_prefix('E').map(str::trim) else { continue };
        let text = rest.trim_matches('"').trim();

        if let Some(name) = text.strip_prefix("section ").or_else(|| text.strip_prefix("prc ")) {
            raw.sections.push(SectionMarker { tick, name: name.trim().to_string() });
        } else if text == "end" {
            raw.end_events.push(EndEvent { tick });
        } else if text == "coda" {
            if raw.coda_tick.is_none() {
                raw.coda_tick = Some(tick);
            }
        } else if let Some(mix) = text.strip_prefix("mix ") {
            handle_disco_flip(raw, tick, mix);
        }
    }
}

/// `mix N drums M[flag]` (spec §4.2). `N` is a difficulty index
/// (0=easy..3=expert), `M` selects the disco-flip transition, and an
/// optional trailing flag further qualifies it. `easy`/`easynokick` are
/// parsed (so they're observable) but deliberately produce no state
/// change, per spec §9.
fn handle_disco_flip(raw: &mut RawChart, tick: u64, mix: &str) {
    use crate::model::Difficulty::*;
    let mut parts = mix.split_whitespace();
    let Some(diff_idx) = parts.next().and_then(|s| s.parse::<u32>().ok()) else { return };
    let Some("drums") = parts.next() else { return };
    let Some(token) = parts.next() else { return };

    let difficulty = match diff_idx {
        0 => Easy,
        1 => Medium,
        2 => Hard,
        3 => Expert,
        _ => return,
    };

    let digits_end = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
    let (number, flag) = token.split_at(digits_end);
    let Ok(m) = number.parse::<u32>() else { return };

    let kind = match (m, flag) {
        (_, "easy") | (_, "easynokick") => {
            trace!("ignoring disco-flip flag '{}' at tick {}", flag, tick);
            return;
        }
        (0, _) => RawEventKind::DiscoFlipOff,
        (1, "dnoflip") => RawEventKind::DiscoNoFlipOn,
        (1, _) => RawEventKind::DiscoFlipOn,
        _ => return,
    };
    raw.track_mut(crate::model::Instrument::Drums, difficulty)
        .events
        .push(RawTrackEvent::instant(tick, kind));
}

fn parse_instrument_section(
    raw: &mut RawChart,
    section: &Section,
    instrument: crate::model::Instrument,
    difficulty: crate::model::Difficulty,
) {
    let kind = instrument.kind();
    let mut solo_start: Option<u64> = None;

    for line in &section.lines {
        let Some((tick_str, value)) = split_kv(line) else { continue };
        let Ok(tick) = tick_str.parse::<u64>() else { continue };
        let mut parts = value.split_whitespace();
        match parts.next() {
            Some("E") => {
                let rest: String = parts.collect::<Vec<_>>().join(" ");
                match rest.as_str() {
                    "solo" => solo_start = Some(tick),
                    "soloend" => {
                        if let Some(start) = solo_start.take() {
                            // `.chart` solos are tick-inclusive; +1 normalizes to a half-open length.
                            let length = tick.saturating_sub(start) + 1;
                            raw.track_mut(instrument, difficulty)
                                .events
                                .push(RawTrackEvent::with_length(start, length, RawEventKind::SoloStart));
                        } else {
                            warn!("soloend with no matching solo at tick {}", tick);
                        }
                    }
                    _ => {}
                }
            }
            Some("S") => {
                let Some(code) = parts.next().and_then(|s| s.parse::<u32>().ok()) else { continue };
                let length = parts.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
                let event_kind = match code {
                    2 => RawEventKind::StarPower,
                    64 => RawEventKind::DrumFreestyle,
                    65 => RawEventKind::FlexLaneSingle,
                    66 => RawEventKind::FlexLaneDouble,
                    _ => continue,
                };
                raw.track_mut(instrument, difficulty)
                    .events
                    .push(RawTrackEvent::with_length(tick, length, event_kind));
            }
            Some("N") => {
                let Some(n) = parts.next().and_then(|s| s.parse::<u32>().ok()) else { continue };
                let length = parts.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
                if let Some(event_kind) = sections::note_for_instrument(kind, n) {
                    raw.track_mut(instrument, difficulty)
                        .events
                        .push(RawTrackEvent::with_length(tick, length, event_kind));
                }
            }
            _ => {}
        }
    }

    // Stable-sort events by tick (spec §4.2 post-pass); the scan already
    // appended in source order so this is a stable re-sort, not a reorder
    // of ties.
    raw.track_mut(instrument, difficulty).events.sort_by_key(|e| e.tick);
}

/// Parses a decoded `.chart` text buffer into the raw intermediate model.
pub fn parse(text: &str) -> crate::error::Result<RawChart> {
    let sections = scan_sections(text)?;
    if sections.is_empty() {
        invalid_chart!("no sections found");
    }

    let mut raw = RawChart::new(0);

    for section in &sections {
        match section.name.as_str() {
            "Song" => parse_song_section(&mut raw, section)?,
            "SyncTrack" => parse_sync_track(&mut raw, section)?,
            "Events" => parse_events_section(&mut raw, section),
            name => {
                if let Some((instrument, difficulty)) = sections::track_identity(name) {
                    debug!("parsing track section [{}]", name);
                    parse_instrument_section(&mut raw, section, instrument, difficulty);
                } else {
                    trace!("ignoring unrecognized section [{}]", name);
                }
            }
        }
    }

    if raw.resolution == 0 {
        invalid_chart!("missing or invalid Resolution in [Song] section");
    }
    if raw.tempos.is_empty() && raw.time_signatures.is_empty() && raw.tracks.is_empty() {
        invalid_chart!("chart has no sync track or track data");
    }

    raw.finalize_sync_track();
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Instrument};

    #[test]
    fn parses_minimal_chart_with_song_only_fails() {
        let text = "[Song]\n{\n  Name = \"x\"\n}\n";
        let err = parse(text).unwrap_err();
        assert!(format!("{}", err).contains("invalid .chart"));
    }

    #[test]
    fn parses_sync_track_tempo_and_time_signature() {
        let text = "[Song]\n{\n  Resolution = 192\n}\n[SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n";
        let raw = parse(text).unwrap();
        assert_eq!(raw.resolution, 192);
        assert_eq!(raw.tempos[0], TempoMarker { tick: 0, bpm: 120.0 });
        assert_eq!(
            raw.time_signatures[0],
            TimeSignatureMarker { tick: 0, numerator: 4, denominator: 4 }
        );
    }

    #[test]
    fn solo_pair_merges_into_inclusive_length() {
        let text = "[Song]\n{\n  Resolution = 192\n}\n[ExpertSingle]\n{\n  0 = N 0 0\n  100 = E solo\n  200 = E soloend\n}\n";
        let raw = parse(text).unwrap();
        let track = &raw.tracks[&(Instrument::Guitar, Difficulty::Expert)];
        let solo = track.events.iter().find(|e| e.kind == RawEventKind::SoloStart).unwrap();
        assert_eq!(solo.tick, 100);
        assert_eq!(solo.length, 101);
    }

    #[test]
    fn scenario_s1_two_note_groups() {
        let text = "[Song]\n{\n  Resolution = 192\n}\n[SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n[Events]\n{\n}\n[ExpertSingle]\n{\n  0 = N 0 0\n  192 = N 1 96\n}\n";
        let raw = parse(text).unwrap();
        let track = &raw.tracks[&(Instrument::Guitar, Difficulty::Expert)];
        assert_eq!(track.events.len(), 2);
        assert_eq!(track.events[0].tick, 0);
        assert_eq!(track.events[1].tick, 192);
        assert_eq!(track.events[1].length, 96);
    }
}
