//! Projection of tick positions onto wall-clock time, and extraction of
//! controller events with their timestamps.

use crate::smf::{ChannelEvent, ChannelMessage, EventPayload, MidiFile};
use crate::tempo::TempoMap;

/// Used when the header's time division is 0.
pub const DEFAULT_TICKS_PER_QUARTER_NOTE: u16 = 480;

/// One matching Control Change event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerEvent {
    pub track_index: usize,
    /// 0–15
    pub channel: u8,
    pub timestamp_ms: f64,
    /// 0–127
    pub value: u8,
    pub absolute_ticks: u64,
}

/// A tempo map breakpoint placed on the time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub absolute_ticks: u64,
    pub timestamp_ms: f64,
    pub micros_per_quarter_note: u32,
    pub bpm: f64,
}

pub(crate) fn effective_ticks_per_quarter_note(ticks_per_quarter_note: u16) -> u16 {
    if ticks_per_quarter_note == 0 {
        DEFAULT_TICKS_PER_QUARTER_NOTE
    } else {
        ticks_per_quarter_note
    }
}

/// Milliseconds from the start of the timeline to `absolute_ticks`.
///
/// Each tempo segment contributes `ticks * µs_per_qn / ticks_per_qn`. The
/// `ticks * µs_per_qn` products are summed exactly and divided once, so the
/// result is monotone in `absolute_ticks` and exact at segment boundaries.
pub fn ticks_to_ms(absolute_ticks: u64, tempo_map: &TempoMap, ticks_per_quarter_note: u16) -> f64 {
    let tpqn = effective_ticks_per_quarter_note(ticks_per_quarter_note);

    let mut tick_micros: u128 = 0;
    let mut segments = tempo_map.entries().iter().peekable();
    while let Some(segment) = segments.next() {
        let tempo = u128::from(segment.micros_per_quarter_note);
        match segments.peek() {
            Some(next) if absolute_ticks >= next.start_tick => {
                tick_micros += u128::from(next.start_tick - segment.start_tick) * tempo;
            }
            _ => {
                let ticks = absolute_ticks.saturating_sub(segment.start_tick);
                tick_micros += u128::from(ticks) * tempo;
                break;
            }
        }
    }

    tick_micros as f64 / f64::from(tpqn) / 1000.0
}

/// Every Control Change for `controller`, in track order and then event order.
pub fn extract_controller_events(
    file: &MidiFile,
    tempo_map: &TempoMap,
    controller: u8,
) -> Vec<ControllerEvent> {
    let tpqn = file.ticks_per_quarter_note();
    file.tracks()
        .iter()
        .enumerate()
        .flat_map(|(track_index, track)| {
            track.events().iter().filter_map(move |ev| match ev.payload {
                EventPayload::Channel(ChannelEvent {
                    channel,
                    message: ChannelMessage::Controller { controller: number, value },
                }) if number == controller => Some(ControllerEvent {
                    track_index,
                    channel,
                    timestamp_ms: ticks_to_ms(ev.absolute_ticks, tempo_map, tpqn),
                    value,
                    absolute_ticks: ev.absolute_ticks,
                }),
                _ => None,
            })
        })
        .collect()
}

/// The tempo map's breakpoints with their timestamps.
pub fn tempo_changes(tempo_map: &TempoMap, ticks_per_quarter_note: u16) -> Vec<TempoChange> {
    tempo_map
        .entries()
        .iter()
        .map(|entry| TempoChange {
            absolute_ticks: entry.start_tick,
            timestamp_ms: ticks_to_ms(entry.start_tick, tempo_map, ticks_per_quarter_note),
            micros_per_quarter_note: entry.micros_per_quarter_note,
            bpm: entry.bpm(),
        })
        .collect()
}
