//! Line source trait and the buffered line reader shared by all transports

use p1_core::{P1Error, P1Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Longest line accepted before the stream is considered garbage
///
/// DSMR 5 text messages are the longest regular lines (1024 characters
/// hex-encoded); anything well beyond that is not a telegram.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Source of terminated lines, one per call
///
/// Each call returns one complete line including its `\n` terminator, or
/// fails. A source never returns a partial line.
#[async_trait]
pub trait LineSource: Send {
    /// Read the next line
    ///
    /// # Errors
    ///
    /// * `P1Error::Timeout` if no complete line arrived within the read timeout
    /// * `P1Error::Acquisition` on I/O failure; end of stream is reported as
    ///   `std::io::ErrorKind::UnexpectedEof`
    async fn next_line(&mut self) -> P1Result<Vec<u8>>;
}

#[async_trait]
impl<S: LineSource + ?Sized> LineSource for &mut S {
    async fn next_line(&mut self) -> P1Result<Vec<u8>> {
        (**self).next_line().await
    }
}

#[async_trait]
impl<S: LineSource + ?Sized> LineSource for Box<S> {
    async fn next_line(&mut self) -> P1Result<Vec<u8>> {
        (**self).next_line().await
    }
}

/// Transport layer trait that extends LineSource with the physical link lifecycle
#[async_trait]
pub trait TransportLayer: LineSource {
    /// Open the physical layer connection
    async fn open(&mut self) -> P1Result<()>;

    /// Check if the link is closed
    fn is_closed(&self) -> bool;

    /// Close the link
    async fn close(&mut self) -> P1Result<()>;
}

/// Buffered line reader over any async byte stream
#[derive(Debug)]
pub struct LineReader<R> {
    reader: BufReader<R>,
    timeout: Option<Duration>,
    max_line_length: usize,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    /// Create a line reader without a read timeout
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            timeout: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Set the per-line read timeout. None means wait forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum accepted line length in bytes
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length.max(1);
        self
    }

    /// Change the per-line read timeout
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Get a mutable reference to the underlying stream
    pub fn get_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    /// Consume the reader, returning the underlying stream
    ///
    /// Bytes already buffered but not yet returned as a line are lost.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    async fn read_line(&mut self) -> P1Result<Vec<u8>> {
        let limit = self.max_line_length;
        let mut line = Vec::new();
        let n = (&mut self.reader)
            .take(limit as u64)
            .read_until(b'\n', &mut line)
            .await?;

        if n == 0 {
            return Err(P1Error::Acquisition(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Line source reached end of stream",
            )));
        }

        if line.last() != Some(&b'\n') {
            if line.len() >= limit {
                return Err(P1Error::Acquisition(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Line exceeds {} bytes without a terminator", limit),
                )));
            }
            return Err(P1Error::Acquisition(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Line source ended in the middle of a line",
            )));
        }

        Ok(line)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for LineReader<R> {
    async fn next_line(&mut self) -> P1Result<Vec<u8>> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.read_line())
                .await
                .map_err(|_| P1Error::Timeout)?,
            None => self.read_line().await,
        }
    }
}
