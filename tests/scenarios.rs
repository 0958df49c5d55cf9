//! End-to-end scenarios and boundary cases against the crate's three
//! public operations (spec §8).

use chart_core::{
    find_issues, hash_track, parse_chart, ChartFormat, Difficulty, IniChartModifiers, Instrument,
    IssueKind,
};
use std::collections::BTreeMap;

fn chart(body: &str) -> Vec<u8> {
    body.as_bytes().to_vec()
}

#[test]
fn boundary_1_song_section_only_is_an_invalid_chart_error() {
    let bytes = chart("[Song]\n{\n  Name = \"x\"\n}\n");
    let result = parse_chart(&bytes, ChartFormat::Chart, IniChartModifiers::default());
    assert!(result.is_err());
}

#[test]
fn boundary_2_mid_header_format_zero_fails() {
    // MThd, length 6, format 0, 1 track, division 192.
    let mut bytes = vec![b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0, 192];
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&[0, 0, 0, 4]);
    bytes.extend_from_slice(&[0x00, 0xff, 0x2f, 0x00]);
    let result = parse_chart(&bytes, ChartFormat::Mid, IniChartModifiers::default());
    assert!(result.is_err());
}

#[test]
fn boundary_6_chart_solo_spanning_100_to_200_serializes_with_inclusive_length() {
    let bytes = chart(
        "[Song]\n{\n  Resolution = 192\n}\n\
         [SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n\
         [ExpertSingle]\n{\n  100 = E solo\n  100 = N 0 0\n  200 = N 1 0\n  200 = E soloend\n}\n",
    );
    let parsed = parse_chart(&bytes, ChartFormat::Chart, IniChartModifiers::default()).unwrap();
    let track = parsed.track(Instrument::Guitar, Difficulty::Expert).unwrap();
    assert_eq!(track.solo_sections.len(), 1);
    assert_eq!(track.solo_sections[0].length, 101);
}

#[test]
fn scenario_s1_two_notes_far_apart_are_both_strum() {
    let bytes = chart(
        "[Song]\n{\n  Resolution = 192\n}\n\
         [SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n\
         [Events]\n{\n}\n\
         [ExpertSingle]\n{\n  0 = N 0 0\n  192 = N 1 96\n}\n",
    );
    let parsed = parse_chart(&bytes, ChartFormat::Chart, IniChartModifiers::default()).unwrap();
    let track = parsed.track(Instrument::Guitar, Difficulty::Expert).unwrap();

    assert_eq!(track.note_event_groups.len(), 2);
    assert_eq!(track.note_event_groups[0][0].tick, 0);
    assert_eq!(track.note_event_groups[0][0].ms_time, 0.0);
    assert!(track.note_event_groups[0][0].has_flag(chart_core::note_flag::STRUM));

    assert_eq!(track.note_event_groups[1][0].tick, 192);
    assert_eq!(track.note_event_groups[1][0].ms_time, 500.0);
    assert!(track.note_event_groups[1][0].has_flag(chart_core::note_flag::STRUM));
}

#[test]
fn scenario_s4_chord_snap_merges_and_inherits_flags() {
    let mut mods = IniChartModifiers::default();
    mods.chord_snap_threshold = 10;
    let bytes = chart(
        "[Song]\n{\n  Resolution = 192\n}\n\
         [SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n\
         [ExpertSingle]\n{\n  100 = N 0 0\n  105 = N 1 0\n  120 = N 2 0\n}\n",
    );
    let parsed = parse_chart(&bytes, ChartFormat::Chart, mods).unwrap();
    let track = parsed.track(Instrument::Guitar, Difficulty::Expert).unwrap();

    assert_eq!(track.note_event_groups.len(), 2);
    assert_eq!(track.note_event_groups[0].len(), 2);
    assert_eq!(track.note_event_groups[0][0].tick, 100);
    assert_eq!(track.note_event_groups[1][0].tick, 120);
}

#[test]
fn scenario_s5_misaligned_time_signature_is_flagged_once() {
    let bytes = chart(
        "[Song]\n{\n  Resolution = 480\n}\n\
         [SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n  1 = TS 4\n}\n\
         [ExpertSingle]\n{\n  0 = N 0 0\n}\n",
    );
    let parsed = parse_chart(&bytes, ChartFormat::Chart, IniChartModifiers::default()).unwrap();
    let issues = find_issues(&parsed, None, &BTreeMap::new());
    let misaligned: Vec<_> = issues
        .iter()
        .filter(|i| i.kind == IssueKind::MisalignedTimeSignature)
        .collect();
    assert_eq!(misaligned.len(), 1);
}

#[test]
fn hash_is_deterministic_across_parses_of_the_same_bytes() {
    let bytes = chart(
        "[Song]\n{\n  Resolution = 192\n}\n\
         [SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n\
         [ExpertSingle]\n{\n  0 = N 0 0\n  192 = N 1 96\n}\n",
    );
    let a = parse_chart(&bytes, ChartFormat::Chart, IniChartModifiers::default()).unwrap();
    let b = parse_chart(&bytes, ChartFormat::Chart, IniChartModifiers::default()).unwrap();

    let (hash_a, bytes_a) = hash_track(&a, Instrument::Guitar, Difficulty::Expert).unwrap();
    let (hash_b, bytes_b) = hash_track(&b, Instrument::Guitar, Difficulty::Expert).unwrap();
    assert_eq!(hash_a, hash_b);
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn hash_track_errors_for_an_unplayed_difficulty() {
    let bytes = chart("[Song]\n{\n  Resolution = 192\n}\n[SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n[ExpertSingle]\n{\n  0 = N 0 0\n}\n");
    let parsed = parse_chart(&bytes, ChartFormat::Chart, IniChartModifiers::default()).unwrap();
    assert!(hash_track(&parsed, Instrument::Drums, Difficulty::Expert).is_err());
}
