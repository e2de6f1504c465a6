//! Console report for one extraction.

use std::fmt;

use crate::config::ExtractConfig;
use crate::timeline::{TempoChange, effective_ticks_per_quarter_note, tempo_changes};
use crate::Extraction;

/// Formats milliseconds as `m:ss.sss`.
pub fn format_timestamp(ms: f64) -> String {
    let total_secs = ms / 1000.0;
    let mins = (total_secs / 60.0).floor();
    let secs = total_secs - mins * 60.0;
    format!("{}:{:06.3}", mins as u64, secs)
}

/// Renders an [`Extraction`] as the per-track listing plus summary.
pub struct Report<'a> {
    extraction: &'a Extraction,
    config: &'a ExtractConfig,
}

impl<'a> Report<'a> {
    pub fn new(extraction: &'a Extraction, config: &'a ExtractConfig) -> Self {
        Self { extraction, config }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Extraction { file, tempo_map, events } = self.extraction;
        let cc = self.config.controller;

        writeln!(f, "MIDI Format: {}", file.format().as_u16())?;
        writeln!(f, "Tracks: {}", file.num_tracks())?;
        writeln!(
            f,
            "Time division: {} ticks per quarter note",
            effective_ticks_per_quarter_note(file.ticks_per_quarter_note())
        )?;
        writeln!(f)?;

        let changes = tempo_changes(tempo_map, file.ticks_per_quarter_note());
        for (index, track) in file.tracks().iter().enumerate() {
            match track.name() {
                Some(name) => writeln!(f, "=== Track {index} ({name}) ===")?,
                None => writeln!(f, "=== Track {index} ===")?,
            }

            let mut tempos: &[TempoChange] = if index == self.config.tempo_source_track {
                &changes
            } else {
                &[]
            };
            for ev in events.iter().filter(|e| e.track_index == index) {
                // Tempo lines go before controller lines on the same tick.
                while let Some((change, rest)) = tempos.split_first() {
                    if change.absolute_ticks > ev.absolute_ticks {
                        break;
                    }
                    write_tempo(f, change)?;
                    tempos = rest;
                }
                writeln!(
                    f,
                    "[{}] CC{cc} (Channel {}): {}",
                    format_timestamp(ev.timestamp_ms),
                    ev.channel,
                    ev.value
                )?;
            }
            for change in tempos {
                write_tempo(f, change)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "=== Summary ===")?;
        writeln!(f, "Total CC{cc} messages found: {}", events.len())?;
        if events.is_empty() {
            writeln!(f, "No CC{cc} messages found in the MIDI file.")?;
            writeln!(
                f,
                "Note: CC{cc} refers to Control Change messages with controller number {cc}."
            )?;
        }
        Ok(())
    }
}

fn write_tempo(f: &mut fmt::Formatter<'_>, change: &TempoChange) -> fmt::Result {
    writeln!(
        f,
        "[{}] Tempo change: {} BPM",
        format_timestamp(change.timestamp_ms),
        change.bpm.round() as u64
    )
}
