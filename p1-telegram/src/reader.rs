//! Frame reader: assembles one telegram from a line source

use crate::frame::Frame;
use crate::state::{FramingState, LineAction, LineClass, HEADER_MARKER};
use bytes::BytesMut;
use p1_core::{P1Error, P1Result};
use p1_transport::LineSource;

/// Largest known real-world telegram has 35 lines
pub const DEFAULT_MAX_LINES: usize = 35;

/// Frame reader
///
/// Holds only configuration. Every call to [`FrameReader::read_one_frame`]
/// starts from `AwaitingHeader` with an empty buffer, so a failed attempt
/// never leaks lines into the next one.
#[derive(Debug, Clone, Copy)]
pub struct FrameReader {
    max_lines: usize,
}

impl FrameReader {
    /// Create a reader with the default line limit
    pub fn new() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
        }
    }

    /// Create a reader with a custom line limit
    pub fn with_max_lines(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Read lines until one complete frame has been assembled
    ///
    /// Every line read during the call counts towards the line limit,
    /// including noise before the header.
    ///
    /// # Errors
    ///
    /// * acquisition errors from the line source, unchanged
    /// * `P1Error::FrameOverflow` when the limit is reached first
    pub async fn read_one_frame<S: LineSource + ?Sized>(&self, source: &mut S) -> P1Result<Frame> {
        let mut state = FramingState::AwaitingHeader;
        let mut buffer = BytesMut::new();
        let mut lines_read = 0usize;

        while !state.is_final() {
            let line = source.next_line().await?;
            lines_read += 1;

            let class = LineClass::classify(&line);
            let (next, action) = state.on_line(class)?;

            match action {
                LineAction::Drop => {
                    log::trace!("Dropping line outside telegram: {:?}", String::from_utf8_lossy(&line));
                }
                LineAction::Restart => {
                    if !buffer.is_empty() {
                        log::debug!("Header seen mid-telegram, discarding {} partial bytes", buffer.len());
                    }
                    buffer.clear();
                    let start = line.iter().position(|&b| b == HEADER_MARKER).unwrap_or(0);
                    buffer.extend_from_slice(&line[start..]);
                }
                LineAction::Append => buffer.extend_from_slice(&line),
            }

            state = next.check_limit(lines_read, self.max_lines);
        }

        if state == FramingState::Overflow {
            return Err(P1Error::FrameOverflow {
                lines: lines_read,
                limit: self.max_lines,
            });
        }

        log::debug!("Assembled telegram frame: {} lines read, {} bytes", lines_read, buffer.len());
        Ok(Frame::new(buffer.freeze()))
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
