use thiserror::Error;

/// Main error type for P1 telegram acquisition
///
/// Every frame-level variant aborts processing of the current telegram only.
/// Callers decide whether to keep acquiring; see [`P1Error::is_acquisition`].
#[derive(Error, Debug)]
pub enum P1Error {
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] std::io::Error),

    #[error("Timeout while waiting for a line")]
    Timeout,

    #[error("Frame overflow: {lines} lines read without a complete telegram (limit {limit})")]
    FrameOverflow { lines: usize, limit: usize },

    #[error("Malformed telegram: {0}")]
    Structural(String),

    #[error("Checksum mismatch: given 0x{given:04X}, calculated 0x{calculated:04X}")]
    Checksum { given: u16, calculated: u16 },

    #[error("Field {field} has non-numeric value {text:?}")]
    FieldConversion { field: &'static str, text: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Publish error: {0}")]
    Publish(String),
}

impl P1Error {
    /// Transport failed or timed out while lines were being acquired
    pub fn is_acquisition(&self) -> bool {
        matches!(self, P1Error::Acquisition(_) | P1Error::Timeout)
    }

    /// The line source has no more data and never will
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, P1Error::Acquisition(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }

    /// Short, stable name of the error kind, used for logging and statistics
    pub fn kind(&self) -> &'static str {
        match self {
            P1Error::Acquisition(_) => "acquisition",
            P1Error::Timeout => "timeout",
            P1Error::FrameOverflow { .. } => "frame_overflow",
            P1Error::Structural(_) => "structural",
            P1Error::Checksum { .. } => "checksum",
            P1Error::FieldConversion { .. } => "field_conversion",
            P1Error::InvalidData(_) => "invalid_data",
            P1Error::Config(_) => "config",
            P1Error::Publish(_) => "publish",
        }
    }
}

/// Result type alias for P1 operations
pub type P1Result<T> = Result<T, P1Error>;
