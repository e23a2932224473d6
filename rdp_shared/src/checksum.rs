//! Frame checksum (C1).
//!
//! CRC-16/XMODEM: polynomial 0x1021, initial value 0, no input/output
//! reflection, no final XOR. Implementations on both ends of the wire must
//! agree bit-for-bit, so this pins to the `crc` crate's named catalog entry
//! rather than hand-rolling the shift-register loop.

use crc::{Crc, CRC_16_XMODEM};

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Computes the CRC-16/XMODEM checksum of `bytes`.
pub fn crc16_xmodem(bytes: &[u8]) -> u16 {
    XMODEM.checksum(bytes)
}
