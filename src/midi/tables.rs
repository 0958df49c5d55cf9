//! Note-number-to-lane tables for the `.mid` reader (spec §4.3).
//!
//! Five-fret, six-fret and drum tracks each reserve a 12-note block per
//! difficulty (`base(difficulty) + offset`); a handful of notes above 100
//! are instrument-wide and apply to every difficulty at once.

use crate::model::{Difficulty, InstrumentType};
use crate::raw::RawEventKind;

pub(crate) fn difficulty_base(instrument: InstrumentType, difficulty: Difficulty) -> u8 {
    let bases: [u8; 4] = match instrument {
        InstrumentType::SixFret => [94, 82, 70, 58], // Expert, Hard, Medium, Easy
        InstrumentType::FiveFret | InstrumentType::Drums => [96, 84, 72, 60],
    };
    match difficulty {
        Difficulty::Expert => bases[0],
        Difficulty::Hard => bases[1],
        Difficulty::Medium => bases[2],
        Difficulty::Easy => bases[3],
    }
}

/// Decodes a per-difficulty note into a fret/drum lane or modifier. `None`
/// for offsets not in use by that instrument kind (caller falls through to
/// [`global_note`]).
pub(crate) fn lane_note(instrument: InstrumentType, offset: u8) -> Option<RawEventKind> {
    use RawEventKind::*;
    Some(match (instrument, offset) {
        (InstrumentType::FiveFret, 0) => FretGreen,
        (InstrumentType::FiveFret, 1) => FretRed,
        (InstrumentType::FiveFret, 2) => FretYellow,
        (InstrumentType::FiveFret, 3) => FretBlue,
        (InstrumentType::FiveFret, 4) => FretOrange,
        (InstrumentType::FiveFret, 6) => ForceHopo,
        (InstrumentType::FiveFret, 7) => ForceStrum,

        (InstrumentType::SixFret, 0) => FretWhite1,
        (InstrumentType::SixFret, 1) => FretWhite2,
        (InstrumentType::SixFret, 2) => FretWhite3,
        (InstrumentType::SixFret, 3) => FretBlack1,
        (InstrumentType::SixFret, 4) => FretBlack2,
        (InstrumentType::SixFret, 5) => FretBlack3,
        (InstrumentType::SixFret, 6) => ForceHopo,
        (InstrumentType::SixFret, 7) => ForceStrum,

        (InstrumentType::Drums, 0) => DrumKick,
        (InstrumentType::Drums, 1) => DrumRed,
        (InstrumentType::Drums, 2) => DrumYellow,
        (InstrumentType::Drums, 3) => DrumBlue,
        (InstrumentType::Drums, 4) => DrumGreen,
        (InstrumentType::Drums, 5) => DrumOrange,

        _ => return None,
    })
}

/// Instrument-wide notes (spec §4.3): solo, forced tap, forced flam, pro-drum
/// tom markers, star power, drum freestyle (fill/BRE), flex lanes. Each
/// applies across every charted difficulty at once.
pub(crate) fn global_note(note: u8) -> Option<RawEventKind> {
    use RawEventKind::*;
    Some(match note {
        103 => SoloStart,
        104 => ForceTap,
        109 => ForceFlam,
        110 => YellowTomMarker,
        111 => BlueTomMarker,
        112 => GreenTomMarker,
        116 => StarPower,
        120 => DrumFreestyle,
        126 => FlexLaneSingle,
        127 => FlexLaneDouble,
        _ => return None,
    })
}

/// Recognized `PART`/meta track names mapped to a track identity (spec
/// §4.3's twelve canonical names).
pub(crate) fn track_identity(name: &str) -> Option<(crate::model::Instrument, ())> {
    use crate::model::Instrument::*;
    let instrument = match name {
        "PART GUITAR" => Guitar,
        "T1 GEMS" => Guitar,
        "PART GUITAR COOP" => GuitarCoop,
        "PART RHYTHM" => Rhythm,
        "PART BASS" => Bass,
        "PART DRUMS" => Drums,
        "PART KEYS" => Keys,
        "PART GUITAR GHL" => GuitarGhl,
        "PART GUITAR COOP GHL" => GuitarCoopGhl,
        "PART RHYTHM GHL" => RhythmGhl,
        "PART BASS GHL" => BassGhl,
        _ => return None,
    };
    Some((instrument, ()))
}

pub(crate) const EVENTS_TRACK_NAME: &str = "EVENTS";
pub(crate) const VOCALS_TRACK_NAME: &str = "PART VOCALS";
