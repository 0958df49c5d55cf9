//! Parses, normalizes, and hashes Clone Hero family rhythm-game charts.
//!
//! The crate has three pure operations: [`parse_chart`] turns a `.chart`
//! text buffer or a `.mid` Standard MIDI File buffer into a normalized
//! [`ParsedChart`]; [`hash_track`] serializes one of its tracks into a
//! frozen binary form and BLAKE3-hashes it; [`find_issues`] runs a
//! rule-based sanity sweep over the normalized result.

#![allow(dead_code)]

mod byte_iter;
mod chart_text;
mod encoding;
mod error;
mod hash;
mod issues;
mod midi;
mod model;
mod normalize;
mod raw;
mod timing;

pub use error::{HashError, ParseError, Result};
pub use hash::hash_track;
pub use issues::{find_issues, ChartIssue, IssueKind};
pub use model::{
    note_flag, ChartFormat, Difficulty, DrumFreestyleSection, DrumType, FlexLane,
    IniChartModifiers, Instrument, InstrumentType, NoteEvent, NoteType, ParsedChart, Phrase,
    Resolution, SectionMarker, TempoMarker, TimeSignatureMarker, Track,
};

/// Parses an in-memory chart buffer into a normalized, scoreable chart.
///
/// `format` selects the front-end: [`ChartFormat::Chart`] decodes `bytes`
/// as text (sniffing a UTF-16 BOM per spec), [`ChartFormat::Mid`] reads it
/// as a Standard MIDI File. Failure is fail-closed: no partial chart is
/// ever returned.
pub fn parse_chart(
    bytes: &[u8],
    format: ChartFormat,
    mods: IniChartModifiers,
) -> Result<ParsedChart> {
    let raw_chart = match format {
        ChartFormat::Chart => {
            let text = encoding::decode(bytes);
            chart_text::parse(&text)?
        }
        ChartFormat::Mid => midi::parse(bytes)?,
    };
    Ok(normalize::normalize(raw_chart, format, mods))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Mirrors the teacher's test-logging helper: enable `RUST_LOG` output
    /// once per test binary, timestamped via `chrono`.
    fn enable_logging() {
        INIT.call_once(|| {
            env_logger::Builder::from_default_env()
                .format(|buf, record| {
                    use std::io::Write;
                    writeln!(
                        buf,
                        "{} [{}] {}",
                        chrono::Local::now().format("%H:%M:%S%.3f"),
                        record.level(),
                        record.args()
                    )
                })
                .init();
        });
    }

    const MINIMAL_CHART: &str = "[Song]\n{\n  Resolution = 192\n}\n[SyncTrack]\n{\n  0 = B 120000\n  0 = TS 4\n}\n[Events]\n{\n  0 = E \"section Intro\"\n}\n[ExpertSingle]\n{\n  0 = N 0 0\n  192 = N 1 96\n  384 = N 1 0\n}\n";

    #[test]
    fn scenario_s1_parses_two_notes_and_hashes_deterministically() {
        enable_logging();
        let chart = parse_chart(MINIMAL_CHART.as_bytes(), ChartFormat::Chart, IniChartModifiers::default()).unwrap();
        let track = chart.track(Instrument::Guitar, Difficulty::Expert).unwrap();
        assert_eq!(track.note_count(), 3);

        let (hash_a, _) = hash_track(&chart, Instrument::Guitar, Difficulty::Expert).unwrap();
        let (hash_b, _) = hash_track(&chart, Instrument::Guitar, Difficulty::Expert).unwrap();
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn missing_resolution_fails_closed() {
        let text = "[Song]\n{\n  Name = \"x\"\n}\n";
        let result = parse_chart(text.as_bytes(), ChartFormat::Chart, IniChartModifiers::default());
        assert!(result.is_err());
    }

    #[test]
    fn tempo_map_is_monotonic_across_the_whole_chart() {
        let chart = parse_chart(MINIMAL_CHART.as_bytes(), ChartFormat::Chart, IniChartModifiers::default()).unwrap();
        let mut last_tick = 0;
        for tempo in &chart.tempos {
            assert!(tempo.tick >= last_tick);
            last_tick = tempo.tick;
        }
    }

    #[test]
    fn find_issues_runs_without_panicking_on_a_minimal_chart() {
        let chart = parse_chart(MINIMAL_CHART.as_bytes(), ChartFormat::Chart, IniChartModifiers::default()).unwrap();
        let issues = find_issues(&chart, None, &std::collections::BTreeMap::new());
        assert!(!issues.is_empty());
    }
}
