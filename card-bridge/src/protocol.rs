//! Framed binary wire protocol
//!
//! Both directions use fixed-size frames that start with a sync byte. All
//! integers are little-endian, two's complement where signed. There is no
//! length prefix and no checksum.
//!
//! Host to device, [`OUTPUT_FRAME_LEN`] bytes:
//!
//! | Offset | Width    | Meaning                             |
//! |--------|----------|-------------------------------------|
//! | 0      | 1        | [`SYNC_HOST_TO_DEVICE`]             |
//! | 1      | 1        | flags: bit 0 pulse 1, bit 1 pulse 2 |
//! | 2      | i16      | audio out 1                         |
//! | 4      | i16      | audio out 2                         |
//! | 6      | i16      | CV out 1                            |
//! | 8      | i16      | CV out 2                            |
//!
//! Device to host, [`INPUT_FRAME_LEN`] bytes:
//!
//! | Offset | Width    | Meaning                                      |
//! |--------|----------|----------------------------------------------|
//! | 0      | 1        | [`SYNC_DEVICE_TO_HOST`]                      |
//! | 1      | 1        | flags: pulse 1, pulse 2, switch in bits 2-3  |
//! | 2      | 2 × i16  | CV in 1, CV in 2                             |
//! | 6      | 2 × i16  | audio in 1, audio in 2                       |
//! | 10     | 3 × i16  | knobs Main, X, Y                             |
//!
//! The device re-aligns on any sync byte seen in the middle of a frame. A
//! payload byte equal to [`SYNC_HOST_TO_DEVICE`] therefore restarts the frame
//! and the frame it belonged to is lost.

use crate::cell::{Snapshot, Targets};

/// First byte of every host-to-device frame.
pub const SYNC_HOST_TO_DEVICE: u8 = 0xC0;

/// First byte of every device-to-host frame.
pub const SYNC_DEVICE_TO_HOST: u8 = 0xC1;

/// Length of a host-to-device frame.
pub const OUTPUT_FRAME_LEN: usize = 10;

/// Length of a device-to-host frame.
pub const INPUT_FRAME_LEN: usize = 16;

/// Errors from decoding a complete frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// The first byte is not the sync byte for this direction.
    BadSync,
    /// The buffer is not exactly one frame long.
    Length,
}

fn le_i16(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

impl Targets {
    /// Decode a complete host-to-device frame.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        if frame.len() != OUTPUT_FRAME_LEN {
            return Err(FrameError::Length);
        }
        if frame[0] != SYNC_HOST_TO_DEVICE {
            return Err(FrameError::BadSync);
        }
        Ok(Targets::from_flags(
            frame[1],
            [le_i16(frame, 2), le_i16(frame, 4)],
            [le_i16(frame, 6), le_i16(frame, 8)],
        ))
    }

    /// Build the host-to-device frame that carries these targets.
    pub fn encode(&self) -> [u8; OUTPUT_FRAME_LEN] {
        let mut frame = [0u8; OUTPUT_FRAME_LEN];
        frame[0] = SYNC_HOST_TO_DEVICE;
        frame[1] = self.flags();
        for (chunk, value) in frame[2..]
            .chunks_exact_mut(2)
            .zip(self.audio.into_iter().chain(self.cv))
        {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        frame
    }
}

impl Snapshot {
    /// Build the device-to-host frame for this snapshot.
    pub fn encode(&self) -> [u8; INPUT_FRAME_LEN] {
        let mut frame = [0u8; INPUT_FRAME_LEN];
        frame[0] = SYNC_DEVICE_TO_HOST;
        frame[1] = self.flags();
        let knobs = self.knobs.map(|k| k as i16);
        for (chunk, value) in frame[2..]
            .chunks_exact_mut(2)
            .zip(self.cv.into_iter().chain(self.audio).chain(knobs))
        {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        frame
    }

    /// Decode a complete device-to-host frame.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        if frame.len() != INPUT_FRAME_LEN {
            return Err(FrameError::Length);
        }
        if frame[0] != SYNC_DEVICE_TO_HOST {
            return Err(FrameError::BadSync);
        }
        let snapshot = Snapshot {
            cv: [le_i16(frame, 2), le_i16(frame, 4)],
            audio: [le_i16(frame, 6), le_i16(frame, 8)],
            knobs: [
                le_i16(frame, 10) as u16,
                le_i16(frame, 12) as u16,
                le_i16(frame, 14) as u16,
            ],
            ..Snapshot::default()
        };
        Ok(snapshot.with_flags(frame[1]))
    }
}

/// Reassembles host-to-device frames from a byte stream.
///
/// Bytes before the first sync byte are dropped. A sync byte seen while a
/// frame is in progress abandons that frame and starts a new one.
#[derive(Debug, Clone)]
pub struct FrameParser {
    buf: [u8; OUTPUT_FRAME_LEN],
    pos: usize,
}

impl FrameParser {
    /// A parser waiting for a sync byte.
    pub const fn new() -> Self {
        Self {
            buf: [0; OUTPUT_FRAME_LEN],
            pos: 0,
        }
    }

    /// Number of bytes of the frame in progress, sync included.
    pub fn pending(&self) -> usize {
        self.pos
    }

    /// Feed one byte. Returns the targets when it completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<Targets> {
        if byte == SYNC_HOST_TO_DEVICE {
            if self.pos > 0 {
                #[cfg(feature = "defmt")]
                defmt::trace!("resync after {=usize} bytes", self.pos);
            }
            self.buf[0] = byte;
            self.pos = 1;
            return None;
        }
        if self.pos == 0 {
            return None;
        }

        self.buf[self.pos] = byte;
        self.pos += 1;
        if self.pos < OUTPUT_FRAME_LEN {
            return None;
        }

        self.pos = 0;
        Targets::decode(&self.buf).ok()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
