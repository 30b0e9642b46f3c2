//! Framed binary telemetry snapshots.
//!
//! One [`SensingSnapshot`] is emitted per sensing period while a client is
//! connected. Frames are self-delimiting so a stream reader never needs an
//! out-of-band delimiter.
//!
//! Wire format, version 1:
//!
//! ```text
//! offset  size  field
//! 0       1     frame tag (0xC5; bumped on incompatible layout changes)
//! 1       4     payload length, u32 little-endian
//! 5       n     payload
//! ```
//!
//! The payload is a bincode encoding with the following field order, all
//! scalars little-endian fixed width:
//!
//! - control bitmask, u8 (bit 0 up, bit 1 down, bit 2 left, bit 3 right)
//! - `absolute_time` f32, `last_lap_duration` f32
//! - `car_position` 3×f32
//! - `car_speed` f32, `car_angle` f32 (degrees)
//! - `ray_distances`: u64 count followed by that many f32
//! - `frame_image`: u8 presence tag, then u64 length + raw bytes if present

use crate::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First byte of every telemetry frame.
pub const FRAME_TAG: u8 = 0xC5;
/// Bytes preceding the payload: tag + u32 length.
pub const FRAME_HEADER_LEN: usize = 5;

const CTRL_UP: u8 = 1 << 0;
const CTRL_DOWN: u8 = 1 << 1;
const CTRL_LEFT: u8 = 1 << 2;
const CTRL_RIGHT: u8 = 1 << 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("frame tag mismatch: got {0:#04x}")]
    BadTag(u8),
    #[error("incomplete frame: have {have} bytes, need {needed}")]
    Incomplete { have: usize, needed: usize },
    #[error("payload encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}

/// Telemetry state captured once per sensing period.
///
/// Constructed, packed and sent; never retained by the producer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensingSnapshot {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub absolute_time: f32,
    pub last_lap_duration: f32,
    pub car_position: Vec3,
    pub car_speed: f32,
    pub car_angle: f32,
    pub ray_distances: Vec<f32>,
    pub frame_image: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
struct WirePayload {
    controls: u8,
    absolute_time: f32,
    last_lap_duration: f32,
    car_position: [f32; 3],
    car_speed: f32,
    car_angle: f32,
    ray_distances: Vec<f32>,
    frame_image: Option<Vec<u8>>,
}

impl From<&SensingSnapshot> for WirePayload {
    fn from(snapshot: &SensingSnapshot) -> WirePayload {
        let mut controls = 0u8;
        if snapshot.up {
            controls |= CTRL_UP;
        }
        if snapshot.down {
            controls |= CTRL_DOWN;
        }
        if snapshot.left {
            controls |= CTRL_LEFT;
        }
        if snapshot.right {
            controls |= CTRL_RIGHT;
        }

        WirePayload {
            controls,
            absolute_time: snapshot.absolute_time,
            last_lap_duration: snapshot.last_lap_duration,
            car_position: [
                snapshot.car_position.x,
                snapshot.car_position.y,
                snapshot.car_position.z,
            ],
            car_speed: snapshot.car_speed,
            car_angle: snapshot.car_angle,
            ray_distances: snapshot.ray_distances.clone(),
            frame_image: snapshot.frame_image.clone(),
        }
    }
}

impl From<WirePayload> for SensingSnapshot {
    fn from(payload: WirePayload) -> SensingSnapshot {
        SensingSnapshot {
            up: payload.controls & CTRL_UP != 0,
            down: payload.controls & CTRL_DOWN != 0,
            left: payload.controls & CTRL_LEFT != 0,
            right: payload.controls & CTRL_RIGHT != 0,
            absolute_time: payload.absolute_time,
            last_lap_duration: payload.last_lap_duration,
            car_position: Vec3::new(
                payload.car_position[0],
                payload.car_position[1],
                payload.car_position[2],
            ),
            car_speed: payload.car_speed,
            car_angle: payload.car_angle,
            ray_distances: payload.ray_distances,
            frame_image: payload.frame_image,
        }
    }
}

impl SensingSnapshot {
    /// Serializes the snapshot into one self-delimited frame.
    ///
    /// Does not fail for any well-formed snapshot; the error path exists
    /// only because the payload encoder reports one.
    pub fn pack(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = bincode::serialize(&WirePayload::from(self))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.push(FRAME_TAG);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decodes one frame from the start of `bytes`.
    ///
    /// Truncated or malformed input is an error; use [`FrameDecoder`] to
    /// read from a stream that delivers partial frames.
    pub fn unpack(bytes: &[u8]) -> Result<SensingSnapshot, SnapshotError> {
        let needed = frame_len(bytes)?;
        if bytes.len() < needed {
            return Err(SnapshotError::Incomplete {
                have: bytes.len(),
                needed,
            });
        }

        let payload: WirePayload = bincode::deserialize(&bytes[FRAME_HEADER_LEN..needed])?;
        Ok(payload.into())
    }
}

/// Total size in bytes of the frame starting at `bytes[0]`.
///
/// Reports `Incomplete` until the 5-byte header has arrived.
pub fn frame_len(bytes: &[u8]) -> Result<usize, SnapshotError> {
    match bytes.first() {
        None => Err(SnapshotError::Incomplete {
            have: 0,
            needed: FRAME_HEADER_LEN,
        }),
        Some(&tag) if tag != FRAME_TAG => Err(SnapshotError::BadTag(tag)),
        Some(_) if bytes.len() < FRAME_HEADER_LEN => Err(SnapshotError::Incomplete {
            have: bytes.len(),
            needed: FRAME_HEADER_LEN,
        }),
        Some(_) => {
            let len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
            Ok(FRAME_HEADER_LEN + len)
        }
    }
}

/// Incremental decoder for a byte stream carrying consecutive frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete frame, `Ok(None)` while more bytes are
    /// needed, or an error if the stream is corrupt.
    pub fn next_frame(&mut self) -> Result<Option<SensingSnapshot>, SnapshotError> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let needed = match frame_len(&self.buf) {
            Ok(needed) => needed,
            Err(SnapshotError::Incomplete { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        if self.buf.len() < needed {
            return Ok(None);
        }

        let frame: Vec<u8> = self.buf.drain(..needed).collect();
        SensingSnapshot::unpack(&frame).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_snapshot() -> SensingSnapshot {
        SensingSnapshot {
            up: true,
            down: false,
            left: false,
            right: true,
            absolute_time: 42.5,
            last_lap_duration: 63.21,
            car_position: Vec3::new(12.0, -35.0, 76.0),
            car_speed: 18.75,
            car_angle: 93.5,
            ray_distances: (0..15).map(|i| i as f32 * 1.5).collect(),
            frame_image: None,
        }
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let snapshot = sample_snapshot();
        let frame = snapshot.pack().unwrap();
        let decoded = SensingSnapshot::unpack(&frame).unwrap();

        assert_eq!(decoded, snapshot);
        assert_approx_eq!(decoded.car_position.y, -35.0, 1e-6);
        assert_approx_eq!(decoded.car_speed, 18.75, 1e-6);
    }

    #[test]
    fn test_roundtrip_with_image_payload() {
        let mut snapshot = sample_snapshot();
        snapshot.frame_image = Some(vec![0u8, 127, 255, 3, 9]);

        let frame = snapshot.pack().unwrap();
        let decoded = SensingSnapshot::unpack(&frame).unwrap();
        assert_eq!(decoded.frame_image, snapshot.frame_image);
    }

    #[test]
    fn test_frame_is_self_delimiting() {
        let snapshot = sample_snapshot();
        let mut frame = snapshot.pack().unwrap();
        assert_eq!(frame_len(&frame).unwrap(), frame.len());

        // Trailing bytes of the next frame must not confuse the decoder.
        frame.extend_from_slice(&[FRAME_TAG, 1, 2, 3]);
        let decoded = SensingSnapshot::unpack(&frame).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_unpack_rejects_truncated_frame() {
        let frame = sample_snapshot().pack().unwrap();
        let result = SensingSnapshot::unpack(&frame[..frame.len() - 3]);
        assert!(matches!(result, Err(SnapshotError::Incomplete { .. })));
    }

    #[test]
    fn test_unpack_rejects_bad_tag() {
        let mut frame = sample_snapshot().pack().unwrap();
        frame[0] = 0x00;
        assert!(matches!(
            SensingSnapshot::unpack(&frame),
            Err(SnapshotError::BadTag(0x00))
        ));
    }

    #[test]
    fn test_controls_pack_into_one_byte() {
        let snapshot = SensingSnapshot {
            up: true,
            down: true,
            left: true,
            right: true,
            ..SensingSnapshot::default()
        };

        let frame = snapshot.pack().unwrap();
        assert_eq!(frame[FRAME_HEADER_LEN], 0b0000_1111);
    }

    #[test]
    fn test_decoder_handles_split_and_batched_frames() {
        let first = sample_snapshot();
        let mut second = sample_snapshot();
        second.car_speed = -4.0;

        let mut stream = first.pack().unwrap();
        stream.extend_from_slice(&second.pack().unwrap());

        let mut decoder = FrameDecoder::new();
        let (head, tail) = stream.split_at(7);

        decoder.push_bytes(head);
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.push_bytes(tail);
        assert_eq!(decoder.next_frame().unwrap(), Some(first));
        assert_eq!(decoder.next_frame().unwrap(), Some(second));
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_surfaces_corrupt_stream() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xAB, 0, 0, 0, 0]);
        assert!(matches!(
            decoder.next_frame(),
            Err(SnapshotError::BadTag(0xAB))
        ));
    }
}
