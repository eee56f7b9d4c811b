//! Serial port transport implementation

use p1_core::{P1Error, P1Result};
use crate::stream::{LineReader, LineSource, TransportLayer};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

/// Baud rate of DSMR 4 and later P1 ports
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout used when none is configured
///
/// Meters send a telegram every 1 to 10 seconds, so a silent link for
/// longer than this means the cable or the meter is gone.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Serial port transport layer settings
///
/// The defaults match a DSMR P1 port: 115200 baud, 7 data bits, even
/// parity, one stop bit, no flow control and RTS deasserted.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
    pub request_to_send: bool,
    pub timeout: Option<Duration>,
}

impl SerialSettings {
    /// Create new serial settings with P1 defaults
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            data_bits: tokio_serial::DataBits::Seven,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::Even,
            flow_control: tokio_serial::FlowControl::None,
            request_to_send: false,
            timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }

    /// Create serial settings with timeout
    pub fn with_timeout(port_name: String, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new(port_name, baud_rate)
        }
    }
}

/// Serial port transport layer implementation
pub struct SerialTransport {
    reader: Option<LineReader<SerialStream>>,
    settings: SerialSettings,
    closed: bool,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings)
            .field("closed", &self.closed)
            .finish()
    }
}

impl SerialTransport {
    /// Create a new serial transport layer
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            reader: None,
            settings,
            closed: true,
        }
    }

    /// Create serial transport with port name and baud rate
    pub fn new_simple(port_name: String, baud_rate: u32) -> Self {
        Self::new(SerialSettings::new(port_name, baud_rate))
    }

    /// Settings the port was (or will be) opened with
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Change the read timeout, also on an already open port
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.settings.timeout = timeout;
        if let Some(reader) = self.reader.as_mut() {
            reader.set_timeout(timeout);
        }
    }
}

#[async_trait]
impl TransportLayer for SerialTransport {
    async fn open(&mut self) -> P1Result<()> {
        if !self.closed {
            return Err(P1Error::Acquisition(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Serial port has already been opened",
            )));
        }

        let builder = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control);

        let mut stream = builder.open_native_async().map_err(|e| {
            P1Error::Acquisition(std::io::Error::other(format!(
                "Failed to open serial port {}: {}",
                self.settings.port_name, e
            )))
        })?;

        stream
            .write_request_to_send(self.settings.request_to_send)
            .map_err(|e| {
                P1Error::Acquisition(std::io::Error::other(format!(
                    "Failed to set RTS on {}: {}",
                    self.settings.port_name, e
                )))
            })?;

        log::info!(
            "Opened serial port {} at {} baud",
            self.settings.port_name,
            self.settings.baud_rate
        );

        self.reader = Some(LineReader::new(stream).with_timeout(self.settings.timeout));
        self.closed = false;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> P1Result<()> {
        if self.reader.take().is_some() {
            log::info!("Closed serial port {}", self.settings.port_name);
        }
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl LineSource for SerialTransport {
    async fn next_line(&mut self) -> P1Result<Vec<u8>> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            P1Error::Acquisition(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Serial port not open",
            ))
        })?;

        let result = reader.next_line().await;
        if matches!(&result, Err(e) if e.is_end_of_stream()) {
            self.closed = true;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_settings_defaults() {
        let settings = SerialSettings::new("/dev/ttyUSB0".to_string(), DEFAULT_BAUD_RATE);
        assert_eq!(settings.port_name, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.data_bits, tokio_serial::DataBits::Seven);
        assert_eq!(settings.parity, tokio_serial::Parity::Even);
        assert_eq!(settings.stop_bits, tokio_serial::StopBits::One);
        assert!(!settings.request_to_send);
        assert_eq!(settings.timeout, Some(DEFAULT_READ_TIMEOUT));
    }

    #[test]
    fn test_serial_settings_with_timeout() {
        let settings =
            SerialSettings::with_timeout("COM3".to_string(), 9600, Duration::from_secs(3));
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout, Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_next_line_before_open() {
        let mut transport = SerialTransport::new_simple("/dev/null-p1".to_string(), 9600);
        assert!(transport.is_closed());
        let err = transport.next_line().await.unwrap_err();
        assert!(err.is_acquisition());
    }
}
