// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message kinds and their field layouts.
//!
//! Decoding starts from each kind's `Default` and applies the fields that
//! are present; unknown tags are skipped.

use crate::error::KegboardError;
use crate::field::{self, FieldWriter, Temperature};

/// Field layout of one message kind.
trait Fields: Default {
    const ID: u16;
    const NAME: &'static str;

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError>;

    /// Apply one field; unknown tags are ignored.
    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError>;

    fn decode(payload: &[u8]) -> Result<Self, KegboardError> {
        let mut message = Self::default();
        for entry in field::fields(payload) {
            let (tag, value) = entry?;
            message.read_field(tag, value)?;
        }
        Ok(message)
    }
}

/// Sent by the board at startup and in reply to a ping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hello {
    pub firmware_version: u16,
}

impl Fields for Hello {
    const ID: u16 = 0x01;
    const NAME: &'static str = "hello";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.u16(0x01, self.firmware_version)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        if tag == 0x01 {
            self.firmware_version = field::parse_u16(tag, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub board_name: String,
    pub baud_rate: u16,
    pub update_interval: u16,
}

impl Fields for Configuration {
    const ID: u16 = 0x02;
    const NAME: &'static str = "configuration";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.string(0x01, &self.board_name)?;
        w.u16(0x02, self.baud_rate)?;
        w.u16(0x03, self.update_interval)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        match tag {
            0x01 => self.board_name = field::parse_string(value),
            0x02 => self.baud_rate = field::parse_u16(tag, value)?,
            0x03 => self.update_interval = field::parse_u16(tag, value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Current odometer value of a flow meter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeterStatus {
    pub meter_name: String,
    pub meter_reading: u32,
}

impl Fields for MeterStatus {
    const ID: u16 = 0x10;
    const NAME: &'static str = "meter_status";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.string(0x01, &self.meter_name)?;
        w.u32(0x02, self.meter_reading)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        match tag {
            0x01 => self.meter_name = field::parse_string(value),
            0x02 => self.meter_reading = field::parse_u32(tag, value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemperatureReading {
    pub sensor_name: String,
    pub sensor_reading: Temperature,
}

impl Fields for TemperatureReading {
    const ID: u16 = 0x11;
    const NAME: &'static str = "temperature_reading";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.string(0x01, &self.sensor_name)?;
        w.temperature(0x02, self.sensor_reading)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        match tag {
            0x01 => self.sensor_name = field::parse_string(value),
            0x02 => self.sensor_reading = field::parse_temperature(tag, value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputStatus {
    pub output_name: String,
    pub output_reading: bool,
}

impl Fields for OutputStatus {
    const ID: u16 = 0x12;
    const NAME: &'static str = "output_status";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.string(0x01, &self.output_name)?;
        w.output(0x02, self.output_reading)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        match tag {
            0x01 => self.output_name = field::parse_string(value),
            0x02 => self.output_reading = field::parse_output(value),
            _ => {}
        }
        Ok(())
    }
}

/// A onewire device appeared on (status 1) or left (status 0) the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnewirePresence {
    pub device_id: u64,
    pub status: u8,
}

impl Fields for OnewirePresence {
    const ID: u16 = 0x13;
    const NAME: &'static str = "onewire_presence";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.u64(0x01, self.device_id)?;
        w.u8(0x02, self.status)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        match tag {
            0x01 => self.device_id = field::parse_u64(tag, value)?,
            0x02 => self.status = field::parse_u8(tag, value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthToken {
    pub device: String,
    pub token: Vec<u8>,
    pub status: u8,
}

impl AuthToken {
    /// Token bytes as lowercase hex, the form used in token events.
    pub fn token_hex(&self) -> String {
        self.token.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl Fields for AuthToken {
    const ID: u16 = 0x14;
    const NAME: &'static str = "auth_token";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.string(0x01, &self.device)?;
        w.bytes(0x02, &self.token)?;
        w.u8(0x03, self.status)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        match tag {
            0x01 => self.device = field::parse_string(value),
            0x02 => self.token = value.to_vec(),
            0x03 => self.status = field::parse_u8(tag, value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ping;

impl Fields for Ping {
    const ID: u16 = 0x81;
    const NAME: &'static str = "ping";

    fn write_fields(&self, _: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        Ok(())
    }

    fn read_field(&mut self, _: u8, _: &[u8]) -> Result<(), KegboardError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOutput {
    pub output_id: u8,
    pub output_mode: bool,
}

impl Fields for SetOutput {
    const ID: u16 = 0x84;
    const NAME: &'static str = "set_output";

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), KegboardError> {
        w.u8(0x01, self.output_id)?;
        w.output(0x02, self.output_mode)
    }

    fn read_field(&mut self, tag: u8, value: &[u8]) -> Result<(), KegboardError> {
        match tag {
            0x01 => self.output_id = field::parse_u8(tag, value)?,
            0x02 => self.output_mode = field::parse_output(value),
            _ => {}
        }
        Ok(())
    }
}

macro_rules! messages {
    ($( $variant:ident ),+ $(,)?) => {
        /// A decoded Kegboard message.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Message {
            $( $variant($variant), )+
        }

        impl Message {
            pub fn id(&self) -> u16 {
                match self {
                    $( Message::$variant(_) => <$variant as Fields>::ID, )+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( Message::$variant(_) => <$variant as Fields>::NAME, )+
                }
            }

            pub(crate) fn encode_payload(&self) -> Result<Vec<u8>, KegboardError> {
                let mut payload = Vec::new();
                let mut w = FieldWriter::new(&mut payload);
                match self {
                    $( Message::$variant(m) => m.write_fields(&mut w)?, )+
                }
                Ok(payload)
            }

            pub(crate) fn decode_payload(id: u16, payload: &[u8]) -> Result<Self, KegboardError> {
                match id {
                    $( <$variant as Fields>::ID => <$variant as Fields>::decode(payload).map(Message::$variant), )+
                    _ => Err(KegboardError::UnknownMessage(id)),
                }
            }

            pub(crate) fn is_known_id(id: u16) -> bool {
                matches!(id, $( <$variant as Fields>::ID )|+)
            }
        }

        $(
            impl From<$variant> for Message {
                fn from(m: $variant) -> Self {
                    Message::$variant(m)
                }
            }
        )+
    };
}

messages! {
    Hello,
    Configuration,
    MeterStatus,
    TemperatureReading,
    OutputStatus,
    OnewirePresence,
    AuthToken,
    Ping,
    SetOutput,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
