//! Legacy GH1/GH2 Star Power recovery (spec §4.3/§9).
//!
//! Very old charts predate the dedicated Star Power marker and instead
//! repurpose the solo marker (note/track-event 103) to mean "Star Power".
//! `multiplier_note == 103` names this explicitly; lacking that, a chart
//! with no Star Power phrases but more than one solo phrase is assumed to
//! be one of these legacy charts. A chart with exactly one solo and no
//! Star Power is left alone — a single solo is too common a genuine solo
//! to reinterpret.

use crate::model::{Difficulty, IniChartModifiers, Instrument, Phrase};
use log::debug;

pub(super) fn resolve(
    instrument: Instrument,
    difficulty: Difficulty,
    mods: &IniChartModifiers,
    star_power: Vec<Phrase>,
    solo: Vec<Phrase>,
) -> (Vec<Phrase>, Vec<Phrase>, Vec<Phrase>) {
    let legacy_trigger =
        mods.multiplier_note == 103 || (mods.multiplier_note == 0 && star_power.is_empty() && solo.len() > 1);

    if legacy_trigger {
        debug!(
            "recovering legacy Star Power from solo markers on {:?} {:?}",
            instrument, difficulty
        );
        (solo, Vec::new(), star_power)
    } else {
        (star_power, solo, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrase(tick: u64) -> Phrase {
        Phrase { tick, ms_time: 0.0, length: 1, ms_length: 0.0 }
    }

    #[test]
    fn multiple_solos_with_no_star_power_become_star_power() {
        let mods = IniChartModifiers::default();
        let (sp, solo, rejected) = resolve(
            Instrument::Guitar,
            Difficulty::Expert,
            &mods,
            Vec::new(),
            vec![phrase(0), phrase(100)],
        );
        assert_eq!(sp.len(), 2);
        assert!(solo.is_empty());
        assert!(rejected.is_empty());
    }

    #[test]
    fn single_solo_is_left_alone() {
        let mods = IniChartModifiers::default();
        let (sp, solo, _) = resolve(Instrument::Guitar, Difficulty::Expert, &mods, Vec::new(), vec![phrase(0)]);
        assert!(sp.is_empty());
        assert_eq!(solo.len(), 1);
    }

    #[test]
    fn multiplier_note_103_forces_recovery_even_with_one_solo() {
        let mut mods = IniChartModifiers::default();
        mods.multiplier_note = 103;
        let (sp, solo, _) = resolve(Instrument::Guitar, Difficulty::Expert, &mods, Vec::new(), vec![phrase(0)]);
        assert_eq!(sp.len(), 1);
        assert!(solo.is_empty());
    }
}
