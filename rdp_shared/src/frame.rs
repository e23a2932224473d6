//! Frame codec (C2).
//!
//! Wire layout: `checksum (2 bytes, big-endian) ∥ correlation_id (36 ASCII
//! bytes) ∥ payload (0..)`. The checksum covers exactly the bytes that
//! follow it. Stateless, free functions, safe to call concurrently.

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::crc16_xmodem;
use crate::error::RdpError;

/// Maximum total frame size, inclusive of checksum and correlation id.
pub const MTU: usize = 2048;

/// Length of a correlation id on the wire.
pub const CORRELATION_ID_LEN: usize = 36;

/// `checksum` + `correlation_id`; the minimum length of a well-formed frame.
pub const HEADER_LEN: usize = 2 + CORRELATION_ID_LEN;

/// Encodes a frame carrying `correlation_id` and `payload`.
///
/// `correlation_id` must be exactly [`CORRELATION_ID_LEN`] bytes; the
/// combined frame must fit within [`MTU`]. Both preconditions are enforced
/// with debug assertions since callers within this crate always supply a
/// canonical UUID string; callers across the adapter boundary get
/// `RdpError::PayloadTooLarge` for an oversized payload.
pub fn encode(correlation_id: &str, payload: &[u8]) -> Result<Bytes, RdpError> {
    debug_assert_eq!(correlation_id.len(), CORRELATION_ID_LEN);

    let total = HEADER_LEN + payload.len();
    if total > MTU {
        return Err(RdpError::PayloadTooLarge { len: total, max: MTU });
    }

    let mut data_section = BytesMut::with_capacity(CORRELATION_ID_LEN + payload.len());
    data_section.extend_from_slice(correlation_id.as_bytes());
    data_section.extend_from_slice(payload);

    let checksum = crc16_xmodem(&data_section);

    let mut frame = BytesMut::with_capacity(2 + data_section.len());
    frame.put_u16(checksum);
    frame.extend_from_slice(&data_section);
    Ok(frame.freeze())
}

/// Decodes a frame, verifying its checksum.
///
/// Returns `RdpError::MalformedFrame` if `frame` is shorter than
/// [`HEADER_LEN`] or if the recomputed checksum does not match the carried
/// one. Never partially decodes: the id and payload are returned together
/// or not at all.
pub fn decode(frame: &[u8]) -> Result<(String, Bytes), RdpError> {
    if frame.len() < HEADER_LEN {
        return Err(RdpError::MalformedFrame);
    }

    let carried = u16::from_be_bytes([frame[0], frame[1]]);
    let data_section = &frame[2..];
    let computed = crc16_xmodem(data_section);
    if carried != computed {
        return Err(RdpError::MalformedFrame);
    }

    let correlation_id = std::str::from_utf8(&data_section[..CORRELATION_ID_LEN])
        .map_err(|_| RdpError::MalformedFrame)?
        .to_string();
    let payload = Bytes::copy_from_slice(&data_section[CORRELATION_ID_LEN..]);

    Ok((correlation_id, payload))
}
