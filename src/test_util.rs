//! Byte-level fixture builders shared by the unit tests.

pub fn encode_vlq(mut value: u32) -> Vec<u8> {
    let mut out = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        out.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    out.reverse();
    out
}

pub fn header_chunk(format: u16, num_tracks: u16, division: u16) -> Vec<u8> {
    let mut out = b"MThd".to_vec();
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&format.to_be_bytes());
    out.extend_from_slice(&num_tracks.to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());
    out
}

pub fn track_chunk(body: &[u8]) -> Vec<u8> {
    let mut out = b"MTrk".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// A whole file with the given track bodies. The format is 0 for a single
/// track and 1 otherwise.
pub fn smf(division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let format = if tracks.len() == 1 { 0 } else { 1 };
    let mut out = header_chunk(format, tracks.len() as u16, division);
    for body in tracks {
        out.extend(track_chunk(body));
    }
    out
}

/// Track body builder. Each call appends one event with its delta time.
#[derive(Default)]
pub struct TrackBody {
    bytes: Vec<u8>,
}

impl TrackBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, delta: u32, event: &[u8]) -> Self {
        self.bytes.extend(encode_vlq(delta));
        self.bytes.extend_from_slice(event);
        self
    }

    pub fn tempo(self, delta: u32, micros_per_quarter_note: u32) -> Self {
        let [_, a, b, c] = micros_per_quarter_note.to_be_bytes();
        self.raw(delta, &[0xFF, 0x51, 0x03, a, b, c])
    }

    pub fn cc(self, delta: u32, channel: u8, controller: u8, value: u8) -> Self {
        self.raw(delta, &[0xB0 | channel, controller, value])
    }

    pub fn name(self, delta: u32, name: &str) -> Self {
        let mut event = vec![0xFF, 0x03];
        event.extend(encode_vlq(name.len() as u32));
        event.extend_from_slice(name.as_bytes());
        self.raw(delta, &event)
    }

    pub fn end(self, delta: u32) -> Vec<u8> {
        self.raw(delta, &[0xFF, 0x2F, 0x00]).bytes
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
