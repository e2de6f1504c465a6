// config.rs

use crate::tempo::{DEFAULT_TEMPO, TempoMapBuilder};

/// Controller 22 is the haptic intensity lane.
pub const DEFAULT_CONTROLLER: u8 = 22;

/// What the extraction pipeline looks for and how it reads time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Controller number to report (0–127).
    pub controller: u8,
    /// Track whose Set Tempo events form the global tempo map.
    pub tempo_source_track: usize,
    /// Microseconds per quarter note until the first tempo event.
    pub default_tempo: u32,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            controller: DEFAULT_CONTROLLER,
            tempo_source_track: 0,
            default_tempo: DEFAULT_TEMPO,
        }
    }
}

impl ExtractConfig {
    pub fn tempo_map_builder(&self) -> TempoMapBuilder {
        TempoMapBuilder::new()
            .source_track(self.tempo_source_track)
            .default_tempo(self.default_tempo)
    }
}
