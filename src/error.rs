use thiserror::Error;

/// A failure while decoding a Standard MIDI File.
///
/// Every parse error is terminal for the file: a bad offset in one track
/// would corrupt every read after it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at byte offset {offset}: {kind}")]
pub struct ParseError {
    offset: usize,
    kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of buffer (needed {needed} bytes, {remaining} left)")]
    UnexpectedEndOfBuffer { needed: usize, remaining: usize },
    #[error("malformed variable-length quantity")]
    MalformedVlq,
    #[error("SMPTE time division {0:#06x} is not supported")]
    UnsupportedTimingMode(u16),
    #[error("track chunk declares {declared} bytes but its events do not fit")]
    TruncatedTrack { declared: u32 },
    #[error("unknown event status byte {0:#04x}")]
    UnknownEventType(u8),
    #[error("set tempo event must carry 3 bytes, found {0}")]
    MalformedTempoEvent(u32),
    #[error("expected chunk tag {expected:?}, found {found:?}")]
    InvalidHeaderTag { expected: [u8; 4], found: [u8; 4] },
    #[error("header chunk length {0} is shorter than 6")]
    InvalidHeaderLength(u32),
    #[error("unsupported file format {0}")]
    UnsupportedFormat(u16),
    #[error("data byte {0:#04x} has its high bit set")]
    InvalidDataByte(u8),
}

impl ParseError {
    pub const fn new(offset: usize, kind: ParseErrorKind) -> Self {
        Self { offset, kind }
    }

    /// Byte offset in the input where the error was detected.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Short reads inside a track chunk mean the chunk's declared length
    /// cut an event in half.
    pub(crate) fn within_track(self, declared: u32) -> Self {
        match self.kind {
            ParseErrorKind::UnexpectedEndOfBuffer { .. } => Self {
                offset: self.offset,
                kind: ParseErrorKind::TruncatedTrack { declared },
            },
            _ => self,
        }
    }
}

/// A failure while deriving the tempo map from a parsed file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TempoMapError {
    #[error("tempo event at tick {found} follows one at tick {previous}")]
    NonMonotonicTempoEvents { previous: u64, found: u64 },
    #[error("tempo source track {index} does not exist (file has {tracks} tracks)")]
    SourceTrackOutOfRange { index: usize, tracks: usize },
}

/// Any failure of the [`crate::extract`] pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    TempoMap(#[from] TempoMapError),
}
