// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRC-16/CCITT as computed by the board firmware: reflected polynomial
//! 0x8408, initial value 0, no final xor.
//!
//! Running the CRC over a frame's covered bytes followed by the
//! little-endian CRC itself yields 0.

/// Fold one byte into a running CRC.
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut data = byte ^ (crc as u8);
    data ^= data << 4;
    let data = u16::from(data);
    ((data << 8) | (crc >> 8)) ^ (data >> 4) ^ (data << 3)
}

pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0, |crc, &b| crc16_update(crc, b))
}

#[cfg(test)]
#[path = "crc_tests.rs"]
mod tests;
