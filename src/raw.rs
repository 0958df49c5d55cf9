//! The raw, format-agnostic intermediate model that both the `.chart` text
//! parser (`crate::chart_text`) and the `.mid` binary parser (`crate::midi`)
//! produce (spec §3/§4.1: "both parsers produce the same intermediate
//! structure"). The normalizer (`crate::normalize`) is the sole consumer.

use crate::model::{Difficulty, EndEvent, Instrument, Resolution, SectionMarker, TempoMarker, TimeSignatureMarker};
use std::collections::BTreeMap;

/// One raw event on a track, before any normalization. `length` is in
/// ticks (0 for an instantaneous event). `velocity`/`channel` are only
/// ever populated by the `.mid` parser, and only survive long enough for
/// the normalizer's dynamics-to-accent/ghost rule (spec §4.5) to consume
/// them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawTrackEvent {
    pub tick: u64,
    pub length: u64,
    pub kind: RawEventKind,
    pub velocity: Option<u8>,
}

impl RawTrackEvent {
    pub fn instant(tick: u64, kind: RawEventKind) -> Self {
        Self { tick, length: 0, kind, velocity: None }
    }

    pub fn with_length(tick: u64, length: u64, kind: RawEventKind) -> Self {
        Self { tick, length, kind, velocity: None }
    }
}

/// The tagged union of everything that can appear on a raw track (spec
/// §3: "type is one of ~55 enumerated codes"). Grouped here by what the
/// normalizer's passes do with them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RawEventKind {
    // Five/six-fret note lanes (the open lane is shared by both families).
    FretOpen,
    FretGreen,
    FretRed,
    FretYellow,
    FretBlue,
    FretOrange,
    FretBlack1,
    FretBlack2,
    FretBlack3,
    FretWhite1,
    FretWhite2,
    FretWhite3,

    // Fret modifiers (spec §4.2/§4.3: sustained in `.mid`, instant in `.chart`).
    ForceStrum,
    ForceHopo,
    ForceTap,
    ForceOpen,
    /// `.chart`'s single "force" note (value 5): toggles whatever the
    /// natural HOPO/strum computation would have produced, rather than
    /// naming a direction outright the way `.mid`'s ForceHopo/ForceStrum
    /// do. See DESIGN.md for why the two formats model this differently.
    ForceUnnatural,

    // Drum note lanes.
    DrumKick,
    Drum2xKick,
    DrumRed,
    DrumYellow,
    DrumBlue,
    DrumGreen,
    DrumOrange,

    // Drum modifiers.
    ForceFlam,
    YellowTomMarker,
    BlueTomMarker,
    GreenTomMarker,
    YellowCymbalMarker,
    BlueCymbalMarker,
    GreenCymbalMarker,
    AccentRed,
    AccentYellow,
    AccentBlue,
    AccentGreen,
    AccentOrange,
    GhostRed,
    GhostYellow,
    GhostBlue,
    GhostGreen,
    GhostOrange,

    // Phrases (all tracks).
    SoloStart,
    SoloEnd,
    StarPower,
    DrumFreestyle,
    FlexLaneSingle,
    FlexLaneDouble,

    // Disco flip register transitions (drums only, spec §4.2/§4.5).
    DiscoFlipOn,
    DiscoFlipOff,
    DiscoNoFlipOn,
}

/// Raw per-track event stream plus the identity it belongs to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTrack {
    pub events: Vec<RawTrackEvent>,
}

/// The shared intermediate structure both raw parsers build (spec §3/§4.1).
#[derive(Clone, Debug, PartialEq)]
pub struct RawChart {
    pub resolution: Resolution,
    pub tempos: Vec<TempoMarker>,
    pub time_signatures: Vec<TimeSignatureMarker>,
    pub sections: Vec<SectionMarker>,
    pub end_events: Vec<EndEvent>,
    pub coda_tick: Option<u64>,
    pub has_vocals: bool,
    pub tracks: BTreeMap<(Instrument, Difficulty), RawTrack>,
}

impl RawChart {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            tempos: Vec::new(),
            time_signatures: Vec::new(),
            sections: Vec::new(),
            end_events: Vec::new(),
            coda_tick: None,
            has_vocals: false,
            tracks: BTreeMap::new(),
        }
    }

    pub fn track_mut(&mut self, instrument: Instrument, difficulty: Difficulty) -> &mut RawTrack {
        self.tracks.entry((instrument, difficulty)).or_default()
    }

    /// Synthesizes a tempo at tick 0 (120 BPM) and a time signature at
    /// tick 0 (4/4) if either is missing, then sorts both by tick. Shared
    /// by both raw parsers since both need this before the timing engine
    /// can run (spec §3 invariants).
    pub fn finalize_sync_track(&mut self) {
        if !self.tempos.iter().any(|t| t.tick == 0) {
            self.tempos.push(TempoMarker { tick: 0, bpm: 120.0 });
        }
        if !self.time_signatures.iter().any(|t| t.tick == 0) {
            self.time_signatures.push(TimeSignatureMarker {
                tick: 0,
                numerator: 4,
                denominator: 4,
            });
        }
        self.tempos.sort_by_key(|t| t.tick);
        self.time_signatures.sort_by_key(|t| t.tick);
    }
}
