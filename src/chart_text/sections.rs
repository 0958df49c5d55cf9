//! Section-name table and per-instrument note-value decoding for the
//! `.chart` text format (spec §4.2).

use crate::model::{Difficulty, Instrument, InstrumentType};
use crate::raw::RawEventKind;

/// Maps a bracketed `.chart` section name to the track identity it holds,
/// or `None` for `Song`/`SyncTrack`/`Events`, which are handled specially.
pub(crate) fn track_identity(section_name: &str) -> Option<(Instrument, Difficulty)> {
    use Difficulty::*;
    use Instrument::*;

    let (difficulty_str, rest) = split_difficulty_prefix(section_name)?;
    let difficulty = match difficulty_str {
        "Easy" => Easy,
        "Medium" => Medium,
        "Hard" => Hard,
        "Expert" => Expert,
        _ => return None,
    };
    let instrument = match rest {
        "Single" => Guitar,
        "DoubleGuitar" => GuitarCoop,
        "DoubleBass" => Bass,
        "DoubleRhythm" => Rhythm,
        "Drums" => Drums,
        "Keys" => Keys,
        "GHLGuitar" => GuitarGhl,
        "GHLCoopGuitar" => GuitarCoopGhl,
        "GHLBass" => BassGhl,
        "GHLRhythm" => RhythmGhl,
        _ => return None,
    };
    Some((instrument, difficulty))
}

fn split_difficulty_prefix(name: &str) -> Option<(&str, &str)> {
    for prefix in ["Easy", "Medium", "Hard", "Expert"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return Some((prefix, rest));
        }
    }
    None
}

/// Decodes a `.chart` `N <n> <len>` value for a five-fret track (spec
/// §4.2: "0..7 with 5/6/7 as force/tap/open").
pub(crate) fn five_fret_note(n: u32) -> Option<RawEventKind> {
    use RawEventKind::*;
    Some(match n {
        0 => FretGreen,
        1 => FretRed,
        2 => FretYellow,
        3 => FretBlue,
        4 => FretOrange,
        5 => ForceUnnatural,
        6 => ForceTap,
        7 => FretOpen,
        _ => return None,
    })
}

/// Decodes a `.chart` `N <n> <len>` value for a six-fret (GHL) track. The
/// distilled spec describes the five-fret scheme explicitly but only
/// gestures at six-fret's ("6-fret uses bases ... with the same 0..8
/// schema"); this mirrors the five-fret layout's force/tap/open tail,
/// extended for the extra lane (see DESIGN.md).
pub(crate) fn six_fret_note(n: u32) -> Option<RawEventKind> {
    use RawEventKind::*;
    Some(match n {
        0 => FretWhite1,
        1 => FretWhite2,
        2 => FretWhite3,
        3 => FretBlack1,
        4 => FretBlack2,
        5 => FretBlack3,
        6 => ForceUnnatural,
        7 => ForceTap,
        8 => FretOpen,
        _ => return None,
    })
}

/// Decodes a `.chart` `N <n> <len>` value for a drum track (spec §4.2:
/// "drums 0..5 plus accents 34..38, ghosts 40..44, cymbal markers
/// 66/67/68, 2x kick 32").
pub(crate) fn drum_note(n: u32) -> Option<RawEventKind> {
    use RawEventKind::*;
    Some(match n {
        0 => DrumKick,
        1 => DrumRed,
        2 => DrumYellow,
        3 => DrumBlue,
        4 => DrumGreen,
        5 => DrumOrange,
        32 => Drum2xKick,
        34 => AccentRed,
        35 => AccentYellow,
        36 => AccentBlue,
        37 => AccentGreen,
        38 => AccentOrange,
        40 => GhostRed,
        41 => GhostYellow,
        42 => GhostBlue,
        43 => GhostGreen,
        44 => GhostOrange,
        66 => YellowCymbalMarker,
        67 => BlueCymbalMarker,
        68 => GreenCymbalMarker,
        _ => return None,
    })
}

pub(crate) fn note_for_instrument(kind: InstrumentType, n: u32) -> Option<RawEventKind> {
    match kind {
        InstrumentType::FiveFret => five_fret_note(n),
        InstrumentType::SixFret => six_fret_note(n),
        InstrumentType::Drums => drum_note(n),
    }
}

#[test]
fn recognizes_all_canonical_section_names() {
    assert_eq!(
        track_identity("ExpertSingle"),
        Some((Instrument::Guitar, Difficulty::Expert))
    );
    assert_eq!(
        track_identity("EasyDrums"),
        Some((Instrument::Drums, Difficulty::Easy))
    );
    assert_eq!(
        track_identity("HardGHLBass"),
        Some((Instrument::BassGhl, Difficulty::Hard))
    );
    assert_eq!(track_identity("SyncTrack"), None);
}

#[test]
fn five_fret_note_values_match_spec_table() {
    assert_eq!(five_fret_note(0), Some(RawEventKind::FretGreen));
    assert_eq!(five_fret_note(5), Some(RawEventKind::ForceUnnatural));
    assert_eq!(five_fret_note(6), Some(RawEventKind::ForceTap));
    assert_eq!(five_fret_note(7), Some(RawEventKind::FretOpen));
}
