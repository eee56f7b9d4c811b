//! TCP transport implementation
//!
//! Reads P1 lines from a serial-to-network bridge (ser2net, ESP-Link and
//! similar), which forwards the meter's byte stream unchanged.

use p1_core::{P1Error, P1Result};
use crate::stream::{LineReader, LineSource, TransportLayer};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            connect_timeout: Some(Duration::from_secs(30)),
            timeout: Some(crate::serial::DEFAULT_READ_TIMEOUT),
        }
    }

    /// Create TCP settings with a read timeout
    pub fn with_timeout(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new(address)
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    reader: Option<LineReader<TcpStream>>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            reader: None,
            settings,
            closed: true,
        }
    }

    /// Create TCP transport from address string
    pub fn from_address(address: &str) -> P1Result<Self> {
        let addr: SocketAddr = address.parse().map_err(|e| {
            P1Error::InvalidData(format!("Invalid TCP address {}: {}", address, e))
        })?;
        Ok(Self::new(TcpSettings::new(addr)))
    }

    /// Settings the connection was (or will be) made with
    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> P1Result<()> {
        if !self.closed {
            return Err(P1Error::Acquisition(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let stream = if let Some(timeout) = self.settings.connect_timeout {
            tokio::time::timeout(timeout, TcpStream::connect(self.settings.address))
                .await
                .map_err(|_| P1Error::Timeout)??
        } else {
            TcpStream::connect(self.settings.address).await?
        };

        log::info!("Connected to P1 bridge at {}", self.settings.address);

        self.reader = Some(LineReader::new(stream).with_timeout(self.settings.timeout));
        self.closed = false;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> P1Result<()> {
        if let Some(reader) = self.reader.take() {
            let mut stream = reader.into_inner();
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl LineSource for TcpTransport {
    async fn next_line(&mut self) -> P1Result<Vec<u8>> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            P1Error::Acquisition(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })?;

        let result = reader.next_line().await;
        if matches!(&result, Err(e) if e.is_end_of_stream()) {
            self.closed = true;
        }
        result
    }
}
