// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload field codecs.

use crate::error::KegboardError;

/// A temperature in millionths of a degree Celsius, as sent by the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(pub i32);

impl Temperature {
    pub fn from_celsius(celsius: f64) -> Self {
        Self((celsius * 1e6).round() as i32)
    }

    pub fn as_celsius(self) -> f64 {
        f64::from(self.0) / 1e6
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}C", self.as_celsius())
    }
}

/// Appends tagged fields to a payload buffer.
pub(crate) struct FieldWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> FieldWriter<'a> {
    pub(crate) fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    fn put(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        let len = u8::try_from(value.len())
            .map_err(|_| KegboardError::FieldTooLong { tag, len: value.len() })?;
        self.buf.push(tag);
        self.buf.push(len);
        self.buf.extend_from_slice(value);
        Ok(())
    }

    pub(crate) fn u8(&mut self, tag: u8, value: u8) -> Result<(), KegboardError> {
        self.put(tag, &[value])
    }

    pub(crate) fn u16(&mut self, tag: u8, value: u16) -> Result<(), KegboardError> {
        self.put(tag, &value.to_le_bytes())
    }

    pub(crate) fn u32(&mut self, tag: u8, value: u32) -> Result<(), KegboardError> {
        self.put(tag, &value.to_le_bytes())
    }

    pub(crate) fn u64(&mut self, tag: u8, value: u64) -> Result<(), KegboardError> {
        self.put(tag, &value.to_le_bytes())
    }

    pub(crate) fn temperature(&mut self, tag: u8, value: Temperature) -> Result<(), KegboardError> {
        self.put(tag, &value.0.to_le_bytes())
    }

    pub(crate) fn output(&mut self, tag: u8, on: bool) -> Result<(), KegboardError> {
        self.u16(tag, u16::from(on))
    }

    /// Nul-terminated string.
    pub(crate) fn string(&mut self, tag: u8, value: &str) -> Result<(), KegboardError> {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.put(tag, &bytes)
    }

    pub(crate) fn bytes(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        self.put(tag, value)
    }
}

/// Iterate `(tag, value)` pairs of a payload.
pub(crate) fn fields(
    payload: &[u8],
) -> impl Iterator<Item = Result<(u8, &[u8]), KegboardError>> + '_ {
    let mut rest = payload;
    std::iter::from_fn(move || {
        let (&tag, after_tag) = rest.split_first()?;
        let Some((&len, body)) = after_tag.split_first() else {
            rest = &[];
            return Some(Err(KegboardError::TruncatedField { tag }));
        };
        let len = usize::from(len);
        if body.len() < len {
            rest = &[];
            return Some(Err(KegboardError::TruncatedField { tag }));
        }
        let (value, next) = body.split_at(len);
        rest = next;
        Some(Ok((tag, value)))
    })
}

fn fixed<const N: usize>(tag: u8, value: &[u8]) -> Result<[u8; N], KegboardError> {
    value
        .try_into()
        .map_err(|_| KegboardError::FieldLength { tag, expected: N, actual: value.len() })
}

pub(crate) fn parse_u8(tag: u8, value: &[u8]) -> Result<u8, KegboardError> {
    Ok(fixed::<1>(tag, value)?[0])
}

pub(crate) fn parse_u16(tag: u8, value: &[u8]) -> Result<u16, KegboardError> {
    fixed(tag, value).map(u16::from_le_bytes)
}

pub(crate) fn parse_u32(tag: u8, value: &[u8]) -> Result<u32, KegboardError> {
    fixed(tag, value).map(u32::from_le_bytes)
}

pub(crate) fn parse_u64(tag: u8, value: &[u8]) -> Result<u64, KegboardError> {
    fixed(tag, value).map(u64::from_le_bytes)
}

pub(crate) fn parse_temperature(tag: u8, value: &[u8]) -> Result<Temperature, KegboardError> {
    fixed(tag, value).map(i32::from_le_bytes).map(Temperature)
}

/// Any non-zero byte means the output is on.
pub(crate) fn parse_output(value: &[u8]) -> bool {
    value.iter().any(|&b| b != 0)
}

/// Strips surrounding nul padding; invalid UTF-8 is replaced, never rejected.
pub(crate) fn parse_string(value: &[u8]) -> String {
    String::from_utf8_lossy(value).trim_matches('\0').to_string()
}

#[cfg(test)]
#[path = "field_tests.rs"]
mod tests;
