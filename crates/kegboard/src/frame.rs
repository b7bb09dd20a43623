// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-frame encode and decode.

use crate::crc::crc16_ccitt;
use crate::error::KegboardError;
use crate::message::Message;

pub const PREFIX: &[u8; 8] = b"KBSP v1:";
pub const TRAILER: &[u8; 2] = b"\r\n";
pub const PAYLOAD_MAXLEN: usize = 112;

/// Prefix plus message id and payload length.
pub const HEADER_LEN: usize = 12;

/// Header, CRC and trailer around an empty payload.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 4;

pub fn encode(message: &Message) -> Result<Vec<u8>, KegboardError> {
    let payload = message.encode_payload()?;
    if payload.len() > PAYLOAD_MAXLEN {
        return Err(KegboardError::PayloadTooLong(payload.len()));
    }

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
    frame.extend_from_slice(PREFIX);
    frame.extend_from_slice(&message.id().to_le_bytes());
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = crc16_ccitt(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(TRAILER);
    Ok(frame)
}

pub fn decode(frame: &[u8]) -> Result<Message, KegboardError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(KegboardError::FrameTooShort(frame.len()));
    }
    if !frame.starts_with(PREFIX) {
        return Err(KegboardError::BadPrefix);
    }

    let message_id = u16::from_le_bytes([frame[8], frame[9]]);
    let declared = usize::from(u16::from_le_bytes([frame[10], frame[11]]));
    if !Message::is_known_id(message_id) {
        return Err(KegboardError::UnknownMessage(message_id));
    }
    if declared > PAYLOAD_MAXLEN {
        return Err(KegboardError::PayloadTooLong(declared));
    }
    let actual = frame.len() - MIN_FRAME_LEN;
    if declared != actual {
        return Err(KegboardError::LengthMismatch { declared, actual });
    }

    let (covered, trailer) = frame.split_at(frame.len() - TRAILER.len());
    if trailer != TRAILER {
        return Err(KegboardError::BadTrailer([trailer[0], trailer[1]]));
    }
    let residue = crc16_ccitt(covered);
    if residue != 0 {
        return Err(KegboardError::BadCrc(residue));
    }

    Message::decode_payload(message_id, &frame[HEADER_LEN..HEADER_LEN + declared])
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
