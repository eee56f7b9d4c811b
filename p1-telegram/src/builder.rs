//! Synthetic telegram builder
//!
//! Produces byte-exact telegrams the way a meter emits them. Used to test
//! consumers and to replay known readings without hardware.

use crate::crc::crc16;
use crate::fields::{FieldPattern, FIELD_TABLE};
use crate::frame::Frame;
use crate::record::{FieldId, TelegramRecord};

/// Builder for a P1 telegram
#[derive(Debug, Clone)]
pub struct TelegramBuilder {
    identification: String,
    lines: Vec<String>,
    with_checksum: bool,
}

impl TelegramBuilder {
    /// Start a telegram with the given meter identification (without `/`)
    pub fn new(identification: &str) -> Self {
        Self {
            identification: identification.to_string(),
            lines: Vec::new(),
            with_checksum: true,
        }
    }

    /// Add a raw data line (without terminator)
    pub fn line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// Add the line carrying `id`, formatted the way its field table entry
    /// expects. Derived fields have no line and are ignored.
    pub fn field(mut self, id: FieldId, value: f64) -> Self {
        if let Some(descriptor) = FIELD_TABLE.iter().find(|d| d.id == id) {
            let line = match descriptor.pattern {
                FieldPattern::Register { obis, unit } => {
                    format!("{}({:010.3}*{})", obis.to_reduced_string(), value, unit)
                }
                FieldPattern::Gas => format!("0-1:24.2.1(101209112500W)({:09.3}*m3)", value),
            };
            self.lines.push(line);
        }
        self
    }

    /// Add a line for every extracted field present in `record`
    pub fn record(self, record: &TelegramRecord) -> Self {
        record
            .present()
            .filter(|(id, _)| !id.is_derived())
            .fold(self, |builder, (id, value)| builder.field(id, value))
    }

    /// Leave the trailer without checksum digits
    pub fn unchecked(mut self) -> Self {
        self.with_checksum = false;
        self
    }

    /// Render the telegram bytes, checksum included
    pub fn build_bytes(&self) -> Vec<u8> {
        let mut data = format!("/{}\r\n\r\n", self.identification).into_bytes();
        for line in &self.lines {
            data.extend_from_slice(line.as_bytes());
            data.extend_from_slice(b"\r\n");
        }
        data.push(b'!');
        if self.with_checksum {
            let crc = crc16(&data);
            data.extend_from_slice(format!("{:04X}", crc).as_bytes());
        }
        data.extend_from_slice(b"\r\n");
        data
    }

    pub fn build(&self) -> Frame {
        Frame::new(self.build_bytes())
    }
}
