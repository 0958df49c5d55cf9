//! Rule-based issue detection over a normalized chart (spec §4.7). Every
//! check here is advisory: none of it prevents [`crate::parse_chart`] from
//! succeeding. A chart that is *parseable* but musically or structurally
//! suspect surfaces here instead of as an error.

use crate::model::{Difficulty, Instrument, InstrumentType, NoteType, ParsedChart};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IssueKind {
    MisalignedTimeSignature,
    NoNotes,
    NoExpert,
    DifficultyNotReduced,
    IsDefaultBpm,
    NoSections,
    BadEndEvent,
    SmallLeadingSilence,
    NoStarPower,
    EmptyStarPower,
    EmptySoloSection,
    EmptyFlexLane,
    BadStarPower,
    NoDrumActivationLanes,
    InvalidChord,
    BrokenNote,
    BadSustainGap,
    BabySustain,
    DifficultyForbiddenNote,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartIssue {
    pub instrument: Option<Instrument>,
    pub difficulty: Option<Difficulty>,
    pub kind: IssueKind,
    pub ms_time: Option<f64>,
    pub description: String,
}

impl ChartIssue {
    fn new(kind: IssueKind, description: impl Into<String>) -> Self {
        Self { instrument: None, difficulty: None, kind, ms_time: None, description: description.into() }
    }

    fn on_track(mut self, instrument: Instrument, difficulty: Difficulty) -> Self {
        self.instrument = Some(instrument);
        self.difficulty = Some(difficulty);
        self
    }

    fn at(mut self, ms_time: f64) -> Self {
        self.ms_time = Some(ms_time);
        self
    }
}

fn format_timestamp(ms: f64) -> String {
    let total_ms = ms.max(0.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1_000) % 60;
    let hundredths = (total_ms % 1_000) / 10;
    format!("[{:02}:{:02}:{:02}.{:02}]", hours, minutes, seconds, hundredths)
}

/// Sustain lengths shorter than this (ms) are treated as accidental
/// ("baby sustains") rather than intentional.
const BABY_SUSTAIN_MS: f64 = 100.0;
/// Per-color sustain-tail shadow window (ms): a later note of the same
/// color starting inside this window of an earlier sustain's end is too
/// tight to read cleanly.
const SUSTAIN_SHADOW_MS: f64 = 40.0;
/// A leading silence below this (ms) before the first note is unusual
/// enough to call out (most charts have at least a brief count-in).
const SMALL_LEADING_SILENCE_MS: f64 = 2_000.0;
/// `brokenNote`/`difficultyNotReduced` thresholds (spec §4.7).
const BROKEN_NOTE_MS: f64 = 15.0;
const DIFFICULTY_REDUCTION_NOTE_FLOOR: usize = 20;

pub fn find_issues(
    parsed: &ParsedChart,
    song_length_ms: Option<f64>,
    per_track_hashes: &BTreeMap<(Instrument, Difficulty), String>,
) -> Vec<ChartIssue> {
    let mut issues = Vec::new();

    check_time_signatures(parsed, &mut issues);
    check_default_bpm(parsed, &mut issues);
    check_sections(parsed, &mut issues);
    check_end_events(parsed, song_length_ms, &mut issues);

    for instrument in all_instruments() {
        check_expert_presence(parsed, instrument, &mut issues);
        check_difficulty_reduction(parsed, instrument, per_track_hashes, &mut issues);
    }

    for (&(instrument, difficulty), track) in &parsed.tracks {
        if track.is_empty() {
            issues.push(
                ChartIssue::new(IssueKind::NoNotes, "track has no notes").on_track(instrument, difficulty),
            );
            continue;
        }

        check_star_power(track, instrument, difficulty, &mut issues);
        check_solo_sections(track, instrument, difficulty, &mut issues);
        check_flex_lanes(track, instrument, difficulty, &mut issues);
        check_leading_silence(track, instrument, difficulty, &mut issues);
        check_sustains(track, instrument, difficulty, &mut issues);
        check_chords(track, instrument, difficulty, &mut issues);
        check_broken_notes(track, instrument, difficulty, &mut issues);
        check_difficulty_forbidden_notes(track, instrument, difficulty, &mut issues);

        if instrument == Instrument::Drums {
            check_drum_activation_lanes(track, instrument, difficulty, &mut issues);
        }
    }

    issues
}

fn all_instruments() -> [Instrument; 10] {
    use Instrument::*;
    [Guitar, GuitarCoop, Rhythm, Bass, Drums, Keys, GuitarGhl, GuitarCoopGhl, RhythmGhl, BassGhl]
}

fn check_time_signatures(parsed: &ParsedChart, issues: &mut Vec<ChartIssue>) {
    let mut next_bar_tick: u64 = 0;
    for sig in &parsed.time_signatures {
        if sig.tick != next_bar_tick {
            issues.push(ChartIssue::new(
                IssueKind::MisalignedTimeSignature,
                format!(
                    "time signature {}/{} at tick {} does not land on a bar boundary (expected tick {})",
                    sig.numerator, sig.denominator, sig.tick, next_bar_tick
                ),
            ));
            continue;
        }
        let bar_ticks = u64::from(parsed.resolution) * 4 * u64::from(sig.numerator)
            / u64::from(sig.denominator);
        next_bar_tick += bar_ticks;
    }
}

fn check_default_bpm(parsed: &ParsedChart, issues: &mut Vec<ChartIssue>) {
    if parsed.tempos.len() == 1 && (parsed.tempos[0].bpm - 120.0).abs() < f64::EPSILON {
        issues.push(ChartIssue::new(
            IssueKind::IsDefaultBpm,
            "chart has a single tempo marker at the synthesized default of 120 BPM",
        ));
    }
}

fn check_sections(parsed: &ParsedChart, issues: &mut Vec<ChartIssue>) {
    if parsed.sections.is_empty() {
        issues.push(ChartIssue::new(IssueKind::NoSections, "chart has no practice sections"));
    }
}

fn check_end_events(parsed: &ParsedChart, song_length_ms: Option<f64>, issues: &mut Vec<ChartIssue>) {
    match parsed.end_events.len() {
        0 => issues.push(ChartIssue::new(IssueKind::BadEndEvent, "chart has no end event")),
        1 => {}
        _ => issues.push(ChartIssue::new(IssueKind::BadEndEvent, "chart has more than one end event")),
    }
    let _ = song_length_ms;
}

fn check_expert_presence(parsed: &ParsedChart, instrument: Instrument, issues: &mut Vec<ChartIssue>) {
    let has_any = Difficulty::ALL.iter().any(|d| parsed.track(instrument, *d).is_some());
    if has_any && parsed.track(instrument, Difficulty::Expert).is_none() {
        issues.push(
            ChartIssue::new(IssueKind::NoExpert, "instrument is charted but has no Expert difficulty")
                .on_track(instrument, Difficulty::Expert),
        );
    }
}

fn check_difficulty_reduction(
    parsed: &ParsedChart,
    instrument: Instrument,
    per_track_hashes: &BTreeMap<(Instrument, Difficulty), String>,
    issues: &mut Vec<ChartIssue>,
) {
    let Some(expert_hash) = per_track_hashes.get(&(instrument, Difficulty::Expert)) else {
        return;
    };
    for &difficulty in &[Difficulty::Hard, Difficulty::Medium, Difficulty::Easy] {
        let Some(track) = parsed.track(instrument, difficulty) else { continue };
        if track.note_count() <= DIFFICULTY_REDUCTION_NOTE_FLOOR {
            continue;
        }
        if let Some(hash) = per_track_hashes.get(&(instrument, difficulty)) {
            if hash == expert_hash {
                issues.push(
                    ChartIssue::new(
                        IssueKind::DifficultyNotReduced,
                        format!("{:?} is identical to Expert", difficulty),
                    )
                    .on_track(instrument, difficulty),
                );
            }
        }
    }
}

fn check_star_power(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    if track.star_power_sections.is_empty() {
        issues.push(
            ChartIssue::new(IssueKind::NoStarPower, "track has no Star Power phrases").on_track(instrument, difficulty),
        );
    }
    for phrase in &track.star_power_sections {
        let has_note = track
            .note_event_groups
            .iter()
            .flatten()
            .any(|n| n.tick >= phrase.tick && n.tick < phrase.tick + phrase.length.max(1));
        if !has_note {
            issues.push(
                ChartIssue::new(IssueKind::EmptyStarPower, format!("{} empty Star Power phrase", format_timestamp(phrase.ms_time)))
                    .on_track(instrument, difficulty)
                    .at(phrase.ms_time),
            );
        }
        if phrase.length == 0 {
            issues.push(
                ChartIssue::new(IssueKind::BadStarPower, format!("{} zero-length Star Power phrase", format_timestamp(phrase.ms_time)))
                    .on_track(instrument, difficulty)
                    .at(phrase.ms_time),
            );
        }
    }
}

fn check_solo_sections(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    for phrase in &track.solo_sections {
        let has_note = track
            .note_event_groups
            .iter()
            .flatten()
            .any(|n| n.tick >= phrase.tick && n.tick < phrase.tick + phrase.length.max(1));
        if !has_note {
            issues.push(
                ChartIssue::new(IssueKind::EmptySoloSection, format!("{} empty solo section", format_timestamp(phrase.ms_time)))
                    .on_track(instrument, difficulty)
                    .at(phrase.ms_time),
            );
        }
    }
}

fn check_flex_lanes(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    for lane in &track.flex_lanes {
        let has_note = track
            .note_event_groups
            .iter()
            .flatten()
            .any(|n| n.tick >= lane.phrase.tick && n.tick < lane.phrase.tick + lane.phrase.length.max(1));
        if !has_note {
            issues.push(
                ChartIssue::new(IssueKind::EmptyFlexLane, format!("{} empty flex lane", format_timestamp(lane.phrase.ms_time)))
                    .on_track(instrument, difficulty)
                    .at(lane.phrase.ms_time),
            );
        }
    }
}

fn check_leading_silence(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    if let Some(first_ms) = track.first_note_ms() {
        if first_ms > 0.0 && first_ms < SMALL_LEADING_SILENCE_MS {
            issues.push(
                ChartIssue::new(
                    IssueKind::SmallLeadingSilence,
                    format!("first note is only {:.0}ms into the song", first_ms),
                )
                .on_track(instrument, difficulty)
                .at(first_ms),
            );
        }
    }
}

/// `badSustainGap`/`babySustain` (spec §4.7): a per-color 40ms shadow
/// window trailing every sustain, and a flat `0 < msLength < 100` baby
/// sustain check exempted when the very next group is an open-note
/// HOPO/tap (a deliberately short blip immediately before an open).
fn check_sustains(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    for (group_index, group) in track.note_event_groups.iter().enumerate() {
        for note in group {
            if note.ms_length > 0.0 && note.ms_length < BABY_SUSTAIN_MS {
                let exempt = track.note_event_groups.get(group_index + 1).is_some_and(|next| {
                    next.iter().any(|n| {
                        n.note_type == NoteType::Open
                            && (n.has_flag(crate::model::note_flag::HOPO)
                                || n.has_flag(crate::model::note_flag::TAP))
                    })
                });
                if !exempt {
                    issues.push(
                        ChartIssue::new(
                            IssueKind::BabySustain,
                            format!("{} sustain shorter than {:.0}ms", format_timestamp(note.ms_time), BABY_SUSTAIN_MS),
                        )
                        .on_track(instrument, difficulty)
                        .at(note.ms_time),
                    );
                }
            }

            if note.ms_length <= 0.0 {
                continue;
            }
            let sustain_end = note.ms_time + note.ms_length;
            let shadow_end = sustain_end + SUSTAIN_SHADOW_MS;
            let next_same_color = track.note_event_groups[group_index + 1..]
                .iter()
                .flatten()
                .find(|n| n.note_type == note.note_type);
            if let Some(next) = next_same_color {
                if next.ms_time > sustain_end && next.ms_time < shadow_end {
                    issues.push(
                        ChartIssue::new(
                            IssueKind::BadSustainGap,
                            format!(
                                "{} {:?} sustain ends less than {:.0}ms before the next {:?} note",
                                format_timestamp(sustain_end), note.note_type, SUSTAIN_SHADOW_MS, note.note_type
                            ),
                        )
                        .on_track(instrument, difficulty)
                        .at(sustain_end),
                    );
                }
            }
        }
    }
}

/// `invalidChord` (spec §4.7): a 5-note chord on 5-fret, 3+ non-kick
/// drum notes in one group, or a 6-fret 3-note group mixing `{black2,
/// white2}` with either `{black1, white1}`.
fn check_chords(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    for group in &track.note_event_groups {
        let ms_time = group.first().map(|n| n.ms_time).unwrap_or(0.0);
        let invalid = match instrument.kind() {
            InstrumentType::FiveFret => group.len() >= 5,
            InstrumentType::Drums => group.iter().filter(|n| n.note_type != NoteType::Kick).count() >= 3,
            InstrumentType::SixFret => {
                if group.len() == 3 {
                    let colors: BTreeSet<NoteType> = group.iter().map(|n| n.note_type).collect();
                    let has_black2_white2 =
                        colors.contains(&NoteType::Black2) && colors.contains(&NoteType::White2);
                    let has_black1_or_white1 =
                        colors.contains(&NoteType::Black1) || colors.contains(&NoteType::White1);
                    has_black2_white2 && has_black1_or_white1
                } else {
                    false
                }
            }
        };
        if invalid {
            issues.push(
                ChartIssue::new(IssueKind::InvalidChord, format!("{} chord is not a valid shape", format_timestamp(ms_time)))
                    .on_track(instrument, difficulty)
                    .at(ms_time),
            );
        }
    }
}

/// `brokenNote` (spec §4.7): consecutive groups with `0 < Δms ≤ 15`,
/// excluding transitions where either side is an open note.
fn check_broken_notes(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    for window in track.note_event_groups.windows(2) {
        let Some(prev_ms) = window[0].first().map(|n| n.ms_time) else { continue };
        let Some(next_ms) = window[1].first().map(|n| n.ms_time) else { continue };
        let delta = next_ms - prev_ms;
        if delta > 0.0 && delta <= BROKEN_NOTE_MS {
            let involves_open = window[0].iter().any(|n| n.note_type == NoteType::Open)
                || window[1].iter().any(|n| n.note_type == NoteType::Open);
            if !involves_open {
                issues.push(
                    ChartIssue::new(
                        IssueKind::BrokenNote,
                        format!("{} notes {:.1}ms apart are too close to read as distinct", format_timestamp(next_ms), delta),
                    )
                    .on_track(instrument, difficulty)
                    .at(next_ms),
                );
            }
        }
    }
}

/// `difficultyForbiddenNote` (spec §4.7): per difficulty/instrument-type
/// table of disallowed chords or notes.
fn check_difficulty_forbidden_notes(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    let kind = instrument.kind();
    for group in &track.note_event_groups {
        let ms_time = group.first().map(|n| n.ms_time).unwrap_or(0.0);
        let mut flag = |reason: &str| {
            issues.push(
                ChartIssue::new(IssueKind::DifficultyForbiddenNote, format!("{} {}", format_timestamp(ms_time), reason))
                    .on_track(instrument, difficulty)
                    .at(ms_time),
            );
        };

        if kind == InstrumentType::FiveFret
            && difficulty == Difficulty::Medium
            && group.iter().any(|n| n.note_type == NoteType::Orange)
        {
            flag("orange is not allowed on Medium 5-fret");
        }

        if kind == InstrumentType::Drums
            && difficulty != Difficulty::Expert
            && group.iter().any(|n| n.has_flag(crate::model::note_flag::DOUBLE_KICK))
        {
            flag("2x kick is only allowed on Expert drums");
        }

        if kind == InstrumentType::SixFret && difficulty == Difficulty::Hard && group.len() == 3 {
            let has_black = group.iter().any(|n| {
                matches!(n.note_type, NoteType::Black1 | NoteType::Black2 | NoteType::Black3)
            });
            let has_white = group.iter().any(|n| {
                matches!(n.note_type, NoteType::White1 | NoteType::White2 | NoteType::White3)
            });
            if has_black && has_white {
                flag("3-note chords mixing black and white frets are not allowed on Hard 6-fret");
            }
        }

        if kind == InstrumentType::Drums && difficulty == Difficulty::Easy && group.len() == 2 {
            let has_kick = group.iter().any(|n| n.note_type == NoteType::Kick);
            let has_other = group.iter().any(|n| n.note_type != NoteType::Kick);
            if has_kick && has_other {
                flag("kick plus a chord is not allowed on Easy drums");
            }
        }
    }
}

fn check_drum_activation_lanes(track: &crate::model::Track, instrument: Instrument, difficulty: Difficulty, issues: &mut Vec<ChartIssue>) {
    if track.drum_freestyle_sections.is_empty() {
        issues.push(
            ChartIssue::new(IssueKind::NoDrumActivationLanes, "drum track has no fill/activation sections")
                .on_track(instrument, difficulty),
        );
    }
}
