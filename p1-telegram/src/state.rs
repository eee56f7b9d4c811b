//! Telegram framing state machine

use p1_core::{P1Error, P1Result};

/// Header marker, the first character of the meter identification line
pub const HEADER_MARKER: u8 = b'/';

/// Trailer marker, followed by the optional checksum
pub const TRAILER_MARKER: u8 = b'!';

/// Classification of one raw line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Contains the header marker anywhere in the line
    Header,
    /// Begins with the trailer marker
    Trailer,
    /// Anything else
    Body,
}

impl LineClass {
    /// Classify a raw line. Header detection wins over trailer detection.
    pub fn classify(line: &[u8]) -> Self {
        if line.contains(&HEADER_MARKER) {
            LineClass::Header
        } else if line.first() == Some(&TRAILER_MARKER) {
            LineClass::Trailer
        } else {
            LineClass::Body
        }
    }
}

/// Frame assembly state
///
/// # State Transitions
/// ```text
/// AwaitingHeader   -- header  --> AccumulatingBody
/// AwaitingHeader   -- body    --> AwaitingHeader      (line dropped)
/// AwaitingHeader   -- trailer --> AwaitingHeader      (line dropped)
/// AccumulatingBody -- header  --> AccumulatingBody    (frame restarted)
/// AccumulatingBody -- body    --> AccumulatingBody
/// AccumulatingBody -- trailer --> Complete
/// any non-final    -- line limit reached --> Overflow
/// ```
///
/// `Complete` and `Overflow` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingState {
    #[default]
    AwaitingHeader,
    AccumulatingBody,
    Complete,
    Overflow,
}

/// What the reader does with the line that caused a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Discard the line
    Drop,
    /// Discard the partial frame and start a new one with this line
    Restart,
    /// Append the line to the frame
    Append,
}

impl FramingState {
    /// Transition table for one classified line
    ///
    /// Returns the next state and what to do with the line.
    ///
    /// # Errors
    ///
    /// Feeding a line into a final state is a programming error and is
    /// reported as `P1Error::InvalidData`.
    pub fn on_line(self, class: LineClass) -> P1Result<(FramingState, LineAction)> {
        use FramingState::*;

        let next = match (self, class) {
            (AwaitingHeader | AccumulatingBody, LineClass::Header) => (AccumulatingBody, LineAction::Restart),
            (AwaitingHeader, LineClass::Body | LineClass::Trailer) => (AwaitingHeader, LineAction::Drop),
            (AccumulatingBody, LineClass::Body) => (AccumulatingBody, LineAction::Append),
            (AccumulatingBody, LineClass::Trailer) => (Complete, LineAction::Append),
            (Complete | Overflow, _) => {
                return Err(P1Error::InvalidData(format!(
                    "Line fed to final framing state {}",
                    self.as_str()
                )));
            }
        };

        Ok(next)
    }

    /// Apply the line limit after a transition
    pub fn check_limit(self, lines_read: usize, max_lines: usize) -> FramingState {
        if !self.is_final() && lines_read >= max_lines {
            FramingState::Overflow
        } else {
            self
        }
    }

    /// Check if no more lines should be requested
    pub fn is_final(&self) -> bool {
        matches!(self, FramingState::Complete | FramingState::Overflow)
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            FramingState::AwaitingHeader => "AwaitingHeader",
            FramingState::AccumulatingBody => "AccumulatingBody",
            FramingState::Complete => "Complete",
            FramingState::Overflow => "Overflow",
        }
    }
}
