//! Extracts timestamped Control Change events from Standard MIDI Files.
//!
//! The pipeline is `bytes → MidiFile → TempoMap → Vec<ControllerEvent>`;
//! every stage is a pure function of the previous one.

pub mod config;
pub mod cursor;
pub mod error;
pub mod report;
pub mod smf;
pub mod tempo;
pub mod timeline;

#[cfg(test)]
mod test_util;

use log::warn;

pub use config::ExtractConfig;
pub use error::{Error, ParseError, ParseErrorKind, TempoMapError};
pub use smf::MidiFile;
pub use tempo::{TempoMap, TempoMapBuilder};
pub use timeline::{
    ControllerEvent, TempoChange, extract_controller_events, tempo_changes, ticks_to_ms,
};

/// Everything derived from one file.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub file: MidiFile,
    pub tempo_map: TempoMap,
    pub events: Vec<ControllerEvent>,
}

/// Parses `bytes`, builds the tempo map and collects the configured controller.
pub fn extract(bytes: &[u8], config: &ExtractConfig) -> Result<Extraction, Error> {
    let file = MidiFile::parse(bytes)?;
    if file.ticks_per_quarter_note() == 0 {
        warn!(
            "time division is 0, assuming {} ticks per quarter note",
            timeline::DEFAULT_TICKS_PER_QUARTER_NOTE
        );
    }
    let tempo_map = config.tempo_map_builder().build(&file)?;
    let events = extract_controller_events(&file, &tempo_map, config.controller);
    Ok(Extraction { file, tempo_map, events })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{TrackBody, header_chunk, smf};

    #[test]
    fn extract_runs_the_whole_pipeline() {
        let conductor = TrackBody::new().tempo(0, 500_000).tempo(960, 250_000).end(0);
        let pedal = TrackBody::new()
            .cc(480, 0, 7, 90)
            .cc(0, 0, 22, 64)
            .cc(960, 0, 22, 0)
            .cc(0, 0, 64, 127)
            .end(0);
        let bytes = smf(480, &[conductor, pedal]);

        let out = extract(&bytes, &ExtractConfig::default()).unwrap();
        assert_eq!(out.file.num_tracks(), 2);
        assert_eq!(out.tempo_map.entries().len(), 2);
        let got: Vec<(usize, f64, u8)> =
            out.events.iter().map(|e| (e.track_index, e.timestamp_ms, e.value)).collect();
        assert_eq!(got, vec![(1, 500.0, 64), (1, 1250.0, 0)]);

        let config = ExtractConfig { controller: 64, ..ExtractConfig::default() };
        let out = extract(&bytes, &config).unwrap();
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].value, 127);
    }

    #[test]
    fn extract_honours_tempo_track_and_default_tempo() {
        let pedal = TrackBody::new().cc(480, 0, 22, 1).end(0);
        let bytes = smf(480, &[pedal.clone(), pedal]);
        let config = ExtractConfig {
            tempo_source_track: 1,
            default_tempo: 1_000_000,
            ..ExtractConfig::default()
        };
        let out = extract(&bytes, &config).unwrap();
        assert_eq!(out.events.len(), 2);
        assert!(out.events.iter().all(|e| e.timestamp_ms == 1000.0));
    }

    #[test]
    fn extract_reports_parse_and_tempo_errors() {
        let mut bytes = header_chunk(0, 1, 0x8000 | 0x1E28);
        bytes.extend(crate::test_util::track_chunk(&TrackBody::new().end(0)));
        let err = extract(&bytes, &ExtractConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse(ref e) if matches!(e.kind(), ParseErrorKind::UnsupportedTimingMode(_))
        ));
        assert_eq!(
            err.to_string(),
            "at byte offset 12: SMPTE time division 0x9e28 is not supported"
        );

        let bytes = smf(480, &[TrackBody::new().end(0)]);
        let config = ExtractConfig { tempo_source_track: 1, ..ExtractConfig::default() };
        let err = extract(&bytes, &config).unwrap_err();
        assert!(matches!(
            err,
            Error::TempoMap(TempoMapError::SourceTrackOutOfRange { index: 1, tracks: 1 })
        ));
    }
}
