//! Tempo map: the breakpoints (tick → microseconds per quarter note) that
//! govern tick-to-time conversion for the whole file.

use log::debug;

use crate::error::TempoMapError;
use crate::smf::{EventPayload, MidiFile};

/// 120 BPM, the SMF default until a Set Tempo event says otherwise.
pub const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoMapEntry {
    pub start_tick: u64,
    pub micros_per_quarter_note: u32,
}

impl TempoMapEntry {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.micros_per_quarter_note)
    }
}

/// Ordered by strictly increasing `start_tick`; the first entry is always at
/// tick 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoMap {
    entries: Vec<TempoMapEntry>,
}

impl TempoMap {
    /// A single tempo for the whole timeline.
    pub fn constant(micros_per_quarter_note: u32) -> Self {
        Self {
            entries: vec![TempoMapEntry { start_tick: 0, micros_per_quarter_note }],
        }
    }

    pub fn entries(&self) -> &[TempoMapEntry] {
        &self.entries
    }

    fn push(&mut self, start_tick: u64, micros_per_quarter_note: u32) {
        if let Some(last) = self.entries.last_mut() {
            if last.start_tick == start_tick {
                last.micros_per_quarter_note = micros_per_quarter_note;
                // Overwriting may have made it equal to its predecessor.
                let len = self.entries.len();
                let previous = len.checked_sub(2).map(|i| self.entries[i].micros_per_quarter_note);
                if previous == Some(micros_per_quarter_note) {
                    self.entries.pop();
                }
                return;
            }
            if last.micros_per_quarter_note == micros_per_quarter_note {
                return;
            }
        }
        self.entries.push(TempoMapEntry { start_tick, micros_per_quarter_note });
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::constant(DEFAULT_TEMPO)
    }
}

/// Derives a [`TempoMap`] from the Set Tempo events of one track.
#[derive(Debug, Clone, Copy)]
pub struct TempoMapBuilder {
    source_track: usize,
    default_tempo: u32,
}

impl Default for TempoMapBuilder {
    fn default() -> Self {
        Self { source_track: 0, default_tempo: DEFAULT_TEMPO }
    }
}

impl TempoMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track to read tempo events from. Conventionally track 0.
    pub fn source_track(mut self, index: usize) -> Self {
        self.source_track = index;
        self
    }

    /// Tempo assumed before the first tempo event.
    pub fn default_tempo(mut self, micros_per_quarter_note: u32) -> Self {
        self.default_tempo = micros_per_quarter_note;
        self
    }

    pub fn build(&self, file: &MidiFile) -> Result<TempoMap, TempoMapError> {
        let track = file.track(self.source_track).ok_or(TempoMapError::SourceTrackOutOfRange {
            index: self.source_track,
            tracks: file.num_tracks(),
        })?;

        let mut map = TempoMap::constant(self.default_tempo);
        let mut previous = 0u64;
        for ev in track.events() {
            let EventPayload::Meta(meta) = &ev.payload else {
                continue;
            };
            let Some(tempo) = meta.tempo() else {
                continue;
            };
            if ev.absolute_ticks < previous {
                return Err(TempoMapError::NonMonotonicTempoEvents {
                    previous,
                    found: ev.absolute_ticks,
                });
            }
            previous = ev.absolute_ticks;
            map.push(ev.absolute_ticks, tempo);
        }

        debug!(
            "tempo map from track {}: {} entries",
            self.source_track,
            map.entries().len()
        );
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{TrackBody, smf};
    use pretty_assertions::assert_eq;

    fn entry(start_tick: u64, micros_per_quarter_note: u32) -> TempoMapEntry {
        TempoMapEntry { start_tick, micros_per_quarter_note }
    }

    fn build(tracks: &[Vec<u8>]) -> Result<TempoMap, TempoMapError> {
        let file = MidiFile::parse(&smf(480, tracks)).unwrap();
        TempoMapBuilder::new().build(&file)
    }

    #[test]
    fn no_tempo_events_gives_default() {
        let map = build(&[TrackBody::new().cc(10, 0, 22, 1).end(0)]).unwrap();
        assert_eq!(map.entries(), &[entry(0, 500_000)]);
        assert_eq!(map, TempoMap::default());
    }

    #[test]
    fn tempo_at_tick_zero_replaces_default() {
        let map = build(&[TrackBody::new().tempo(0, 600_000).tempo(960, 300_000).end(0)]).unwrap();
        assert_eq!(map.entries(), &[entry(0, 600_000), entry(960, 300_000)]);
    }

    #[test]
    fn late_first_tempo_keeps_implicit_default() {
        let map = build(&[TrackBody::new().tempo(100, 250_000).end(0)]).unwrap();
        assert_eq!(map.entries(), &[entry(0, 500_000), entry(100, 250_000)]);
    }

    #[test]
    fn consecutive_duplicates_are_dropped() {
        let body = TrackBody::new()
            .tempo(0, 500_000)
            .tempo(480, 500_000)
            .tempo(480, 400_000)
            .tempo(0, 400_000)
            .tempo(480, 500_000)
            .end(0);
        let map = build(&[body]).unwrap();
        assert_eq!(map.entries(), &[entry(0, 500_000), entry(960, 400_000), entry(1440, 500_000)]);
    }

    #[test]
    fn same_tick_tempos_keep_the_last() {
        let body = TrackBody::new()
            .tempo(480, 400_000)
            .tempo(0, 300_000)
            .tempo(0, 500_000)
            .end(0);
        let map = build(&[body]).unwrap();
        // The last one equals the default, so the breakpoint disappears.
        assert_eq!(map.entries(), &[entry(0, 500_000)]);
    }

    #[test]
    fn tempo_events_on_other_tracks_are_ignored() {
        let conductor = TrackBody::new().tempo(0, 400_000).end(0);
        let music = TrackBody::new().tempo(10, 100_000).cc(0, 0, 22, 1).end(0);
        let map = build(&[conductor.clone(), music.clone()]).unwrap();
        assert_eq!(map.entries(), &[entry(0, 400_000)]);

        let file = MidiFile::parse(&smf(480, &[conductor, music])).unwrap();
        let map = TempoMapBuilder::new().source_track(1).build(&file).unwrap();
        assert_eq!(map.entries(), &[entry(0, 500_000), entry(10, 100_000)]);
    }

    #[test]
    fn custom_default_tempo() {
        let file = MidiFile::parse(&smf(480, &[TrackBody::new().end(0)])).unwrap();
        let map = TempoMapBuilder::new().default_tempo(1_000_000).build(&file).unwrap();
        assert_eq!(map.entries(), &[entry(0, 1_000_000)]);
    }

    #[test]
    fn missing_source_track_is_an_error() {
        let file = MidiFile::parse(&smf(480, &[TrackBody::new().end(0)])).unwrap();
        let err = TempoMapBuilder::new().source_track(3).build(&file).unwrap_err();
        assert_eq!(err, TempoMapError::SourceTrackOutOfRange { index: 3, tracks: 1 });
    }

    #[test]
    fn out_of_order_tempo_events_are_rejected() {
        use crate::smf::{Format, MetaEvent, TimedEvent, Track};

        let tempo = |absolute_ticks: u64, micros: u32| TimedEvent {
            delta_ticks: 0,
            absolute_ticks,
            payload: EventPayload::Meta(MetaEvent {
                meta_type: 0x51,
                data: micros.to_be_bytes()[1..].to_vec(),
            }),
        };
        let track = Track::from_events(vec![tempo(0, 400_000), tempo(960, 300_000), tempo(480, 200_000)]);
        let file = MidiFile::from_parts(Format::SingleTrack, 480, vec![track]);
        let err = TempoMapBuilder::new().build(&file).unwrap_err();
        assert_eq!(err, TempoMapError::NonMonotonicTempoEvents { previous: 960, found: 480 });
    }

    #[test]
    fn bpm_of_entry() {
        assert_eq!(entry(0, 500_000).bpm(), 120.0);
        assert_eq!(entry(0, 1_000_000).bpm(), 60.0);
    }
}
