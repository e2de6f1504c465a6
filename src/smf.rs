//! smf.rs
//!
//! Decodes a Standard MIDI File (SMF) into tracks of tick-stamped events.
//!
//! ### Layout of an SMF
//! - A header chunk: `MThd`, length (6), format, number of tracks, time division.
//! - One `MTrk` chunk per track: length, then a stream of `<delta-time> <event>`.
//! - Delta times are variable-length quantities counting ticks since the
//!   previous event of the same track.
//! - Channel messages may omit their status byte when it repeats the previous
//!   one ("running status"). Only channel messages set it; meta and SysEx
//!   events leave it in place.
//!
//! Nothing is interpreted beyond what the timeline needs: SysEx payloads and
//! most meta events are kept verbatim.

use log::debug;

use crate::cursor::ByteCursor;
use crate::error::{ParseError, ParseErrorKind};

const HEADER_TAG: [u8; 4] = *b"MThd";
const TRACK_TAG: [u8; 4] = *b"MTrk";
const HEADER_LEN: u32 = 6;

pub const META_TRACK_NAME: u8 = 0x03;
pub const META_END_OF_TRACK: u8 = 0x2F;
pub const META_SET_TEMPO: u8 = 0x51;

/// How the tracks of a file relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Format 0: one track holding every channel.
    SingleTrack,
    /// Format 1: simultaneous tracks sharing one tempo map.
    Parallel,
    /// Format 2: independent sequential patterns.
    Sequential,
}

impl Format {
    fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::SingleTrack),
            1 => Some(Self::Parallel),
            2 => Some(Self::Sequential),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::SingleTrack => 0,
            Self::Parallel => 1,
            Self::Sequential => 2,
        }
    }
}

/// A parsed MIDI file. Built once by [`MidiFile::parse`], read-only after.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiFile {
    format: Format,
    ticks_per_quarter_note: u16,
    tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    events: Vec<TimedEvent>,
}

/// An event with its position in its track.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub delta_ticks: u32,
    /// Running sum of `delta_ticks` within the track.
    pub absolute_ticks: u64,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Channel(ChannelEvent),
    Meta(MetaEvent),
    SysEx(SysExEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    /// 0–15
    pub channel: u8,
    pub message: ChannelMessage,
}

/// Channel voice and mode messages. All data values are 7-bit except the
/// 14-bit pitch bend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    PolyPressure { key: u8, pressure: u8 },
    Controller { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// 0..=16383, centre 8192.
    PitchBend { value: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEvent {
    pub meta_type: u8,
    pub data: Vec<u8>,
}

impl MetaEvent {
    /// Microseconds per quarter note, for Set Tempo events.
    pub fn tempo(&self) -> Option<u32> {
        if self.meta_type != META_SET_TEMPO || self.data.len() != 3 {
            return None;
        }
        ByteCursor::new(&self.data).read_u24_be().ok()
    }

    pub fn is_end_of_track(&self) -> bool {
        self.meta_type == META_END_OF_TRACK
    }

    /// Text, copyright, track name, lyric, marker and the other text-like metas.
    pub fn text(&self) -> Option<String> {
        (0x01..=0x0F)
            .contains(&self.meta_type)
            .then(|| String::from_utf8_lossy(&self.data).into_owned())
    }
}

/// System exclusive event. The payload is carried but never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysExEvent {
    /// `0xF0` or `0xF7` (escape/continuation).
    pub status: u8,
    pub data: Vec<u8>,
}

impl MidiFile {
    /// Parse a complete SMF from memory.
    ///
    /// Parsing is a pure function of the input: no I/O, no partial results.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut cursor = ByteCursor::new(bytes);

        let header_start = cursor.position();
        expect_tag(&mut cursor, HEADER_TAG)?;
        let header_len = cursor.read_u32_be()?;
        if header_len < HEADER_LEN {
            return Err(ParseError::new(
                header_start,
                ParseErrorKind::InvalidHeaderLength(header_len),
            ));
        }

        let format_offset = cursor.position();
        let raw_format = cursor.read_u16_be()?;
        let num_tracks = cursor.read_u16_be()?;
        let division_offset = cursor.position();
        let division = cursor.read_u16_be()?;
        // Extra header bytes are reserved for future extensions.
        cursor.skip((header_len - HEADER_LEN) as usize)?;

        let format = Format::from_u16(raw_format).ok_or_else(|| {
            ParseError::new(format_offset, ParseErrorKind::UnsupportedFormat(raw_format))
        })?;
        if division & 0x8000 != 0 {
            return Err(ParseError::new(
                division_offset,
                ParseErrorKind::UnsupportedTimingMode(division),
            ));
        }

        let tracks = (0..num_tracks)
            .map(|_| read_track_chunk(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;

        if !cursor.is_empty() {
            debug!("ignoring {} trailing bytes after the last track", cursor.remaining());
        }

        Ok(Self { format, ticks_per_quarter_note: division, tracks })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        format: Format,
        ticks_per_quarter_note: u16,
        tracks: Vec<Track>,
    ) -> Self {
        Self { format, ticks_per_quarter_note, tracks }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Ticks per quarter note from the header's time division.
    pub fn ticks_per_quarter_note(&self) -> u16 {
        self.ticks_per_quarter_note
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }
}

impl Track {
    #[cfg(test)]
    pub(crate) fn from_events(events: Vec<TimedEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The first Sequence/Track Name meta event, if any.
    pub fn name(&self) -> Option<String> {
        self.events.iter().find_map(|ev| match &ev.payload {
            EventPayload::Meta(meta) if meta.meta_type == META_TRACK_NAME => meta.text(),
            _ => None,
        })
    }

    /// Tick of the last event.
    pub fn end_tick(&self) -> u64 {
        self.events.last().map(|ev| ev.absolute_ticks).unwrap_or(0)
    }
}

fn expect_tag(cursor: &mut ByteCursor<'_>, expected: [u8; 4]) -> Result<(), ParseError> {
    let offset = cursor.position();
    let found = cursor.read_tag()?;
    if found != expected {
        return Err(ParseError::new(
            offset,
            ParseErrorKind::InvalidHeaderTag { expected, found },
        ));
    }
    Ok(())
}

fn read_track_chunk(cursor: &mut ByteCursor<'_>) -> Result<Track, ParseError> {
    let chunk_start = cursor.position();
    expect_tag(cursor, TRACK_TAG)?;
    let declared = cursor.read_u32_be()?;
    let body = cursor.sub_cursor(declared as usize).map_err(|_| {
        ParseError::new(chunk_start, ParseErrorKind::TruncatedTrack { declared })
    })?;

    let track = decode_track(body).map_err(|e| e.within_track(declared))?;
    debug!(
        "track chunk at {chunk_start}: {declared} bytes, {} events, ends at tick {}",
        track.len(),
        track.end_tick()
    );
    Ok(track)
}

/// Decoder state carried from one event to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DecoderState {
    running_status: Option<u8>,
}

fn decode_track(mut cursor: ByteCursor<'_>) -> Result<Track, ParseError> {
    let mut state = DecoderState::default();
    let mut decoded = Vec::new();
    while !cursor.is_empty() {
        let delta = cursor.read_vlq()?;
        let (payload, next) = decode_event(&mut cursor, state)?;
        state = next;
        decoded.push((delta, payload));
    }

    let terminated = matches!(
        decoded.last(),
        Some((_, EventPayload::Meta(meta))) if meta.is_end_of_track()
    );
    if !terminated {
        debug!("track chunk ending at {} has no End of Track event", cursor.position());
    }

    let events = decoded
        .into_iter()
        .scan(0u64, |ticks, (delta_ticks, payload)| {
            *ticks += u64::from(delta_ticks);
            Some(TimedEvent { delta_ticks, absolute_ticks: *ticks, payload })
        })
        .collect();
    Ok(Track { events })
}

/// Decodes one event (without its delta time), returning the state the next
/// event starts from.
fn decode_event(
    cursor: &mut ByteCursor<'_>,
    state: DecoderState,
) -> Result<(EventPayload, DecoderState), ParseError> {
    let offset = cursor.position();
    let first = cursor.peek_u8()?;
    let status = if first & 0x80 != 0 {
        cursor.skip(1)?;
        first
    } else {
        // Running status: the peeked byte is the first data byte.
        state
            .running_status
            .ok_or_else(|| ParseError::new(offset, ParseErrorKind::UnknownEventType(first)))?
    };

    match status {
        0x80..=0xEF => {
            let event = read_channel_event(cursor, status)?;
            let next = DecoderState { running_status: Some(status) };
            Ok((EventPayload::Channel(event), next))
        }
        0xFF => {
            let meta = read_meta_event(cursor)?;
            Ok((EventPayload::Meta(meta), state))
        }
        0xF0 | 0xF7 => {
            let len = cursor.read_vlq()?;
            let data = cursor.read_bytes(len as usize)?.to_vec();
            Ok((EventPayload::SysEx(SysExEvent { status, data }), state))
        }
        _ => Err(ParseError::new(offset, ParseErrorKind::UnknownEventType(status))),
    }
}

fn read_data_byte(cursor: &mut ByteCursor<'_>) -> Result<u8, ParseError> {
    let offset = cursor.position();
    let byte = cursor.read_u8()?;
    if byte & 0x80 != 0 {
        return Err(ParseError::new(offset, ParseErrorKind::InvalidDataByte(byte)));
    }
    Ok(byte)
}

fn read_channel_event(
    cursor: &mut ByteCursor<'_>,
    status: u8,
) -> Result<ChannelEvent, ParseError> {
    let channel = status & 0x0F;
    let d1 = read_data_byte(cursor)?;
    let message = match status >> 4 {
        0xC => ChannelMessage::ProgramChange { program: d1 },
        0xD => ChannelMessage::ChannelPressure { pressure: d1 },
        nibble => {
            let d2 = read_data_byte(cursor)?;
            match nibble {
                0x8 => ChannelMessage::NoteOff { key: d1, velocity: d2 },
                0x9 => ChannelMessage::NoteOn { key: d1, velocity: d2 },
                0xA => ChannelMessage::PolyPressure { key: d1, pressure: d2 },
                0xB => ChannelMessage::Controller { controller: d1, value: d2 },
                _ => ChannelMessage::PitchBend { value: u16::from(d1) | (u16::from(d2) << 7) },
            }
        }
    };
    Ok(ChannelEvent { channel, message })
}

fn read_meta_event(cursor: &mut ByteCursor<'_>) -> Result<MetaEvent, ParseError> {
    let offset = cursor.position();
    let meta_type = cursor.read_u8()?;
    let len = cursor.read_vlq()?;
    if meta_type == META_SET_TEMPO && len != 3 {
        return Err(ParseError::new(offset, ParseErrorKind::MalformedTempoEvent(len)));
    }
    let data = cursor.read_bytes(len as usize)?.to_vec();
    Ok(MetaEvent { meta_type, data })
}
