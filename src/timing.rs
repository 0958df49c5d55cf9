//! Converts tick-based positions to millisecond time using the tempo map
//! (spec §4.4). All arithmetic is `f64`; rounding to the external
//! three-decimal boundary happens only where a value leaves the crate
//! (the hash's serialized form, spec §4.6).

use crate::model::{Resolution, TempoMarker};

/// A tempo map ready to answer tick→ms queries. Built once per chart and
/// shared by the normalizer and, later, the hasher.
pub(crate) struct TempoMap {
    resolution: Resolution,
    /// `(tick, bpm, ms_at_tick)`, sorted by tick, tick 0 always present.
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    pub(crate) fn new(resolution: Resolution, tempos: &[TempoMarker]) -> Self {
        let mut segments = Vec::with_capacity(tempos.len());
        let mut ms_at_tick = 0.0;
        let mut previous: Option<(u64, f64)> = None;

        for marker in tempos {
            if let Some((prev_tick, prev_bpm)) = previous {
                let delta_ticks = marker.tick.saturating_sub(prev_tick) as f64;
                ms_at_tick += ticks_to_ms(delta_ticks, prev_bpm, resolution);
            }
            segments.push((marker.tick, marker.bpm, ms_at_tick));
            previous = Some((marker.tick, marker.bpm));
        }

        Self { resolution, segments }
    }

    pub(crate) fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Converts an absolute tick to milliseconds from the start of the chart.
    pub(crate) fn tick_to_ms(&self, tick: u64) -> f64 {
        let idx = match self.segments.binary_search_by_key(&tick, |(t, _, _)| *t) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        let (seg_tick, bpm, seg_ms) = self.segments[idx];
        let delta_ticks = tick.saturating_sub(seg_tick) as f64;
        seg_ms + ticks_to_ms(delta_ticks, bpm, self.resolution)
    }

    /// Converts a tick-length starting at `start_tick` to a millisecond
    /// length, accounting for any tempo changes spanned by the note.
    pub(crate) fn length_to_ms(&self, start_tick: u64, length_ticks: u64) -> f64 {
        if length_ticks == 0 {
            return 0.0;
        }
        self.tick_to_ms(start_tick + length_ticks) - self.tick_to_ms(start_tick)
    }
}

fn ticks_to_ms(ticks: f64, bpm: f64, resolution: Resolution) -> f64 {
    let ms_per_tick = 60_000.0 / (bpm * f64::from(resolution));
    ticks * ms_per_tick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_tempo_is_linear() {
        let map = TempoMap::new(192, &[TempoMarker { tick: 0, bpm: 120.0 }]);
        assert!((map.tick_to_ms(192) - 500.0).abs() < 1e-9);
        assert!((map.tick_to_ms(96) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn tempo_change_is_monotonic() {
        let map = TempoMap::new(
            192,
            &[
                TempoMarker { tick: 0, bpm: 120.0 },
                TempoMarker { tick: 192, bpm: 240.0 },
            ],
        );
        let a = map.tick_to_ms(192);
        let b = map.tick_to_ms(384);
        assert!(b > a);
        assert!((a - 500.0).abs() < 1e-9);
        assert!((b - 750.0).abs() < 1e-9);
    }

    #[test]
    fn length_to_ms_matches_tick_delta() {
        let map = TempoMap::new(192, &[TempoMarker { tick: 0, bpm: 120.0 }]);
        assert!((map.length_to_ms(0, 192) - 500.0).abs() < 1e-9);
        assert_eq!(map.length_to_ms(100, 0), 0.0);
    }
}
