//! Telegram acquisition statistics

use crate::parser::ChecksumStatus;
use p1_core::P1Error;

/// Counters for telegram acquisition
///
/// Tracks how many frames were read and how each one ended. Unchecked
/// telegrams are counted apart from verified ones: they indicate a meter
/// configured without CRC, not a protocol violation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelegramStatistics {
    /// Telegrams accepted with a matching checksum
    pub telegrams_verified: u64,
    /// Telegrams accepted without checksum digits
    pub telegrams_unchecked: u64,
    /// Transport failures and timeouts
    pub acquisition_errors: u64,
    /// Line limit reached without a complete frame
    pub frame_overflows: u64,
    /// Frames without a locatable trailer or with malformed checksum digits
    pub structural_errors: u64,
    /// Frames whose checksum did not match
    pub checksum_errors: u64,
    /// Frames with a non-numeric field value
    pub conversion_errors: u64,
    /// Records the publisher failed to deliver
    pub publish_errors: u64,
}

impl TelegramStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Count an accepted telegram
    pub fn record_accepted(&mut self, checksum: ChecksumStatus) {
        match checksum {
            ChecksumStatus::Verified(_) => self.telegrams_verified += 1,
            ChecksumStatus::Unchecked => self.telegrams_unchecked += 1,
        }
    }

    /// Count a failed frame by error kind
    pub fn record_error(&mut self, error: &P1Error) {
        match error {
            P1Error::Acquisition(_) | P1Error::Timeout => self.acquisition_errors += 1,
            P1Error::FrameOverflow { .. } => self.frame_overflows += 1,
            P1Error::Structural(_) => self.structural_errors += 1,
            P1Error::Checksum { .. } => self.checksum_errors += 1,
            P1Error::FieldConversion { .. } => self.conversion_errors += 1,
            P1Error::Publish(_) => self.publish_errors += 1,
            P1Error::InvalidData(_) | P1Error::Config(_) => {}
        }
    }

    /// Telegrams accepted, verified or not
    pub fn telegrams_accepted(&self) -> u64 {
        self.telegrams_verified + self.telegrams_unchecked
    }

    /// Frames rejected after they were read
    pub fn frames_rejected(&self) -> u64 {
        self.frame_overflows + self.structural_errors + self.checksum_errors + self.conversion_errors
    }

    /// Frames read, whether accepted or rejected
    pub fn frames_read(&self) -> u64 {
        self.telegrams_accepted() + self.frames_rejected()
    }

    /// Get rejected frames as a percentage of all frames that reached the parser
    ///
    /// Returns 0.0 if no frames have been seen.
    pub fn error_rate(&self) -> f64 {
        let total = self.frames_read();
        if total == 0 {
            0.0
        } else {
            (self.frames_rejected() as f64 / total as f64) * 100.0
        }
    }
}
