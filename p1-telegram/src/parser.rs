//! Telegram parser and validator

use crate::crc::crc16;
use crate::fields::COMPILED_FIELDS;
use crate::frame::Frame;
use crate::record::TelegramRecord;
use crate::state::TRAILER_MARKER;
use p1_core::{P1Error, P1Result};
use std::fmt;

/// Outcome of checksum validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Trailer carried a checksum and it matched
    Verified(u16),
    /// Trailer carried no checksum digits (DSMR 2.2/3 meters, or a meter
    /// configured without CRC); nothing was verified
    Unchecked,
}

impl ChecksumStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, ChecksumStatus::Verified(_))
    }
}

impl fmt::Display for ChecksumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumStatus::Verified(crc) => write!(f, "verified 0x{:04X}", crc),
            ChecksumStatus::Unchecked => f.write_str("unchecked"),
        }
    }
}

/// A validated telegram
#[derive(Debug, Clone, PartialEq)]
pub struct Telegram {
    identification: Option<String>,
    checksum: ChecksumStatus,
    record: TelegramRecord,
}

impl Telegram {
    /// Validate a frame and extract its fields
    ///
    /// Checksum validation runs first; a frame that fails it yields no
    /// fields at all.
    ///
    /// # Errors
    ///
    /// * `P1Error::Structural` if the trailer boundary cannot be found or the
    ///   checksum digits are not hexadecimal
    /// * `P1Error::Checksum` if the given and calculated checksums differ
    /// * `P1Error::FieldConversion` if a matched field's value is not numeric
    pub fn parse(frame: &Frame) -> P1Result<Self> {
        let checksum = validate_checksum(frame.as_bytes())?;
        let record = extract_fields(frame.as_bytes())?;

        log::debug!(
            "Parsed telegram ({}): {} fields present",
            checksum,
            record.present().count()
        );

        Ok(Self {
            identification: frame.identification(),
            checksum,
            record,
        })
    }

    /// Meter identification from the header line
    pub fn identification(&self) -> Option<&str> {
        self.identification.as_deref()
    }

    pub fn checksum(&self) -> ChecksumStatus {
        self.checksum
    }

    pub fn record(&self) -> &TelegramRecord {
        &self.record
    }

    pub fn into_record(self) -> TelegramRecord {
        self.record
    }
}

/// Split a frame at the last CRLF that is immediately followed by the
/// trailer marker
///
/// Returns the checksummed region (through the `!`) and the remainder.
fn split_trailer(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let boundary = data
        .windows(3)
        .rposition(|w| w[0] == b'\r' && w[1] == b'\n' && w[2] == TRAILER_MARKER)?;
    Some(data.split_at(boundary + 3))
}

/// Verify the trailer checksum of a raw telegram
///
/// An empty remainder after the `!` marker is accepted as
/// [`ChecksumStatus::Unchecked`].
pub fn validate_checksum(data: &[u8]) -> P1Result<ChecksumStatus> {
    let (region, remainder) = split_trailer(data).ok_or_else(|| {
        P1Error::Structural("no trailer line found after a line terminator".to_string())
    })?;

    let digits = remainder.trim_ascii();
    if digits.is_empty() {
        return Ok(ChecksumStatus::Unchecked);
    }

    let given = std::str::from_utf8(digits)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_hexdigit()))
        .and_then(|s| u16::from_str_radix(s, 16).ok())
        .ok_or_else(|| {
            P1Error::Structural(format!(
                "invalid checksum digits {:?}",
                String::from_utf8_lossy(digits)
            ))
        })?;

    let calculated = crc16(region);
    if given != calculated {
        return Err(P1Error::Checksum { given, calculated });
    }

    Ok(ChecksumStatus::Verified(calculated))
}

/// Run every field table entry over the telegram and compute derived fields
pub fn extract_fields(data: &[u8]) -> P1Result<TelegramRecord> {
    let mut record = TelegramRecord::new();

    for (descriptor, regex) in COMPILED_FIELDS.iter() {
        let value = match regex.captures(data).and_then(|caps| caps.get(1)) {
            Some(m) => Some(convert(descriptor.id.as_str(), m.as_bytes())?),
            None => descriptor.default,
        };
        record.set(descriptor.id, value);
    }

    record.compute_derived();
    Ok(record)
}

/// Strict decimal conversion: digits with at most one decimal point
///
/// Empty text is a conversion error, not an absent field.
fn convert(field: &'static str, text: &[u8]) -> P1Result<f64> {
    let fail = || P1Error::FieldConversion {
        field,
        text: String::from_utf8_lossy(text).into_owned(),
    };

    let mut digits = 0usize;
    let mut points = 0usize;
    for &b in text {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => points += 1,
            _ => return Err(fail()),
        }
    }
    if digits == 0 || points > 1 {
        return Err(fail());
    }

    std::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(fail)
}
