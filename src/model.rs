//! The data model shared by both raw parsers, the normalizer, the hasher,
//! and the issue detector (spec §3).
//!
//! `NoteType` and `NoteFlag` are a frozen wire contract (spec §6): their
//! numeric values are part of the BLAKE3 hash preimage and must never be
//! renumbered.

use std::collections::BTreeMap;

/// Ticks-per-beat, aka chart resolution. Always positive.
pub type Resolution = u32;

/// `{tick, beatsPerMinute}`. The tempo map is sorted by tick and always
/// has an entry at tick 0 (spec §3).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoMarker {
    pub tick: u64,
    pub bpm: f64,
}

/// `{tick, numerator, denominator}`. Sorted by tick, tick 0 always
/// present, denominator a power of two.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSignatureMarker {
    pub tick: u64,
    pub numerator: u32,
    pub denominator: u32,
}

/// A `[Events]` section marker or a `.mid` `EVENTS` track text event.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionMarker {
    pub tick: u64,
    pub name: String,
}

/// An `end` text event. At-most-one-valid rule is applied by the issue
/// detector (spec §4.7), not by the parser.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EndEvent {
    pub tick: u64,
}

/// `(instrument, difficulty)` track identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Instrument {
    Guitar,
    GuitarCoop,
    Rhythm,
    Bass,
    Drums,
    Keys,
    GuitarGhl,
    GuitarCoopGhl,
    RhythmGhl,
    BassGhl,
}

impl Instrument {
    pub fn kind(self) -> InstrumentType {
        use Instrument::*;
        match self {
            Drums => InstrumentType::Drums,
            GuitarGhl | GuitarCoopGhl | RhythmGhl | BassGhl => InstrumentType::SixFret,
            Guitar | GuitarCoop | Rhythm | Bass | Keys => InstrumentType::FiveFret,
        }
    }
}

/// Derived grouping used by the modifier-resolution and issue-detection
/// tables (spec §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstrumentType {
    Drums,
    SixFret,
    FiveFret,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Difficulty {
    Expert,
    Hard,
    Medium,
    Easy,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Expert,
        Difficulty::Hard,
        Difficulty::Medium,
        Difficulty::Easy,
    ];
}

/// `{fourLane=0, fourLanePro=1, fiveLane=2}`; `None` if the chart has no
/// drum track.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DrumType {
    FourLane = 0,
    FourLanePro = 1,
    FiveLane = 2,
}

/// The frozen `NoteType` wire enum (spec §6). Values MUST NOT change.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u32)]
pub enum NoteType {
    Open = 1,
    Green = 2,
    Red = 3,
    Yellow = 4,
    Blue = 5,
    Orange = 6,
    Black1 = 7,
    Black2 = 8,
    Black3 = 9,
    White1 = 10,
    White2 = 11,
    White3 = 12,
    Kick = 13,
    RedDrum = 14,
    YellowDrum = 15,
    BlueDrum = 16,
    GreenDrum = 17,
}

impl NoteType {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_drum(self) -> bool {
        matches!(
            self,
            NoteType::Kick
                | NoteType::RedDrum
                | NoteType::YellowDrum
                | NoteType::BlueDrum
                | NoteType::GreenDrum
        )
    }
}

/// Bitmask flags on a [`NoteEvent`]. Values are a frozen wire contract
/// (spec §3/§6) and MUST NOT change.
pub mod note_flag {
    pub const STRUM: u32 = 1;
    pub const HOPO: u32 = 2;
    pub const TAP: u32 = 4;
    pub const DOUBLE_KICK: u32 = 8;
    pub const TOM: u32 = 16;
    pub const CYMBAL: u32 = 32;
    pub const DISCO_NOFLIP: u32 = 64;
    pub const DISCO: u32 = 128;
    pub const FLAM: u32 = 256;
    pub const GHOST: u32 = 512;
    pub const ACCENT: u32 = 1024;
}

/// A single normalized note after the pipeline has run (spec §3).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub tick: u64,
    pub ms_time: f64,
    pub length: u64,
    pub ms_length: f64,
    pub note_type: NoteType,
    pub flags: u32,
}

impl NoteEvent {
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// A generic `{tick, length}` phrase region. `length == 0` means "single
/// tick" per spec §3.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Phrase {
    pub tick: u64,
    pub ms_time: f64,
    pub length: u64,
    pub ms_length: f64,
}

/// A flex lane (roll/trill/tremolo); `is_double` marks a two-note
/// alternation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlexLane {
    pub phrase: Phrase,
    pub is_double: bool,
}

/// A drum freestyle section; `is_coda` marks that it's part of a big rock
/// ending rather than a scoreable activation lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrumFreestyleSection {
    pub phrase: Phrase,
    pub is_coda: bool,
}

/// A fully normalized track (spec §3). `note_event_groups` groups
/// simultaneous notes (a chord); groups are ordered by their common tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub instrument: Instrument,
    pub difficulty: Difficulty,
    pub note_event_groups: Vec<Vec<NoteEvent>>,
    pub star_power_sections: Vec<Phrase>,
    pub rejected_star_power_sections: Vec<Phrase>,
    pub solo_sections: Vec<Phrase>,
    pub flex_lanes: Vec<FlexLane>,
    pub drum_freestyle_sections: Vec<DrumFreestyleSection>,
}

impl Track {
    pub fn is_empty(&self) -> bool {
        self.note_event_groups.is_empty()
    }

    pub fn note_count(&self) -> usize {
        self.note_event_groups.iter().map(Vec::len).sum()
    }

    pub fn first_note_ms(&self) -> Option<f64> {
        self.note_event_groups
            .first()
            .and_then(|g| g.first())
            .map(|n| n.ms_time)
    }

    pub fn last_note_end_ms(&self) -> Option<f64> {
        self.note_event_groups.last().and_then(|group| {
            group
                .iter()
                .map(|n| n.ms_time + n.ms_length)
                .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
        })
    }
}

/// Optional modifiers recognized from the (external) `song.ini` parser
/// (spec §3). Defaults match spec exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IniChartModifiers {
    pub song_length: u64,
    pub hopo_frequency: u32,
    pub eighthnote_hopo: bool,
    pub multiplier_note: u32,
    pub sustain_cutoff_threshold: i64,
    pub chord_snap_threshold: u32,
    pub five_lane_drums: bool,
    pub pro_drums: bool,
}

impl Default for IniChartModifiers {
    fn default() -> Self {
        Self {
            song_length: 0,
            hopo_frequency: 0,
            eighthnote_hopo: false,
            multiplier_note: 0,
            sustain_cutoff_threshold: -1,
            chord_snap_threshold: 0,
            five_lane_drums: false,
            pro_drums: false,
        }
    }
}

/// Chart source format, needed because the normalizer differentiates a
/// handful of rules by format (sustain default, HOPO default, tom/cymbal
/// marker sense, legacy SP).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChartFormat {
    Chart,
    Mid,
}

/// The fully parsed and normalized chart returned by [`crate::parse_chart`].
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedChart {
    pub resolution: Resolution,
    pub format: ChartFormat,
    pub tempos: Vec<TempoMarker>,
    pub time_signatures: Vec<TimeSignatureMarker>,
    pub sections: Vec<SectionMarker>,
    pub end_events: Vec<EndEvent>,
    pub drum_type: Option<DrumType>,
    pub has_vocals: bool,
    pub tracks: BTreeMap<(Instrument, Difficulty), Track>,
}

impl ParsedChart {
    pub fn track(&self, instrument: Instrument, difficulty: Difficulty) -> Option<&Track> {
        self.tracks.get(&(instrument, difficulty))
    }
}
