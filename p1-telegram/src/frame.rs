//! Assembled telegram frame

use bytes::Bytes;
use std::fmt;

/// One complete telegram as received, from the header marker through the
/// trailer line terminator
///
/// A frame is immutable once assembled; the reader hands it to the parser
/// and drops it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Wrap raw telegram bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Raw frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the frame, returning its bytes
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of `\n` terminated lines in the frame
    pub fn line_count(&self) -> usize {
        self.bytes.iter().filter(|&&b| b == b'\n').count()
    }

    /// Meter identification from the header line, without the `/` marker
    /// and line terminator, e.g. `ISK5\2M550T-1012`
    pub fn identification(&self) -> Option<String> {
        let first = self.bytes.split(|&b| b == b'\n').next()?;
        let rest = first.strip_prefix(b"/")?;
        let text = String::from_utf8_lossy(rest).trim_end().to_string();
        (!text.is_empty()).then_some(text)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identification() {
        let frame = Frame::new(&b"/ISK5\\2M550T-1012\r\n\r\n!\r\n"[..]);
        assert_eq!(frame.identification().as_deref(), Some("ISK5\\2M550T-1012"));
        assert_eq!(frame.line_count(), 3);
    }

    #[test]
    fn test_identification_missing() {
        assert_eq!(Frame::new(&b"1-0:1.8.1(1.0*kWh)\r\n!\r\n"[..]).identification(), None);
        assert_eq!(Frame::new(&b"/\r\n!\r\n"[..]).identification(), None);
    }
}
