//! Error types for the chart core.
//!
//! Two surfaces, matching spec §7: [`ParseError`] is fatal (no partial
//! `ParsedChart` is ever returned), [`HashError`] only fires when a caller
//! asks `hash_track` for a track that isn't in the chart. Logical
//! anomalies in an otherwise-parseable chart are never errors; they become
//! [`crate::issues::ChartIssue`] entries instead.

use crate::model::{Difficulty, Instrument};
use snafu::Snafu;

/// Result alias for the parse path.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Fatal parse failures (spec §7: "fail-closed... partial output is never
/// returned").
#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum ParseError {
    #[snafu(display("{}: invalid .chart: {}", site, reason))]
    InvalidChart { site: String, reason: String },

    #[snafu(display("{}: invalid .mid: {}", site, reason))]
    InvalidMidi { site: String, reason: String },

    #[snafu(display("{}: error reading bytes: {}", site, source))]
    Io {
        site: String,
        source: crate::byte_iter::ByteError,
    },
}

/// Failures from [`crate::hash_track`].
#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum HashError {
    #[snafu(display("chart has no {:?} {:?} track", instrument, difficulty))]
    TrackNotFound {
        instrument: Instrument,
        difficulty: Difficulty,
    },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! io {
    () => {
        crate::error::Io { site: site!() }
    };
}

macro_rules! invalid_chart {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        return crate::error::InvalidChart {
            site: site!(),
            reason: format!($fmt $(, $arg)*),
        }
        .fail()
    };
}

macro_rules! invalid_midi {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        return crate::error::InvalidMidi {
            site: site!(),
            reason: format!($fmt $(, $arg)*),
        }
        .fail()
    };
}

pub(crate) use {invalid_chart, invalid_midi, io, site};

#[test]
fn site_macro_reports_file_and_line() {
    let line = line!() + 1;
    let site = site!();
    assert!(site.contains("error.rs"));
    assert!(site.contains(&format!("{}", line)));
}

#[test]
fn invalid_chart_macro_carries_message() {
    fn foo() -> Result<u64> {
        invalid_chart!("missing {}", "resolution");
    }
    let err = foo().unwrap_err();
    assert!(format!("{}", err).contains("missing resolution"));
}

#[test]
fn invalid_midi_macro_carries_message() {
    fn foo() -> Result<u64> {
        invalid_midi!("format {} unsupported", 2);
    }
    let err = foo().unwrap_err();
    assert!(format!("{}", err).contains("format 2 unsupported"));
}
