//! p1 - DSMR P1 smart meter telegram acquisition
//!
//! Reads telegrams from a smart meter's P1 port, validates their CRC-16
//! checksum, extracts energy, power, voltage and gas readings and publishes
//! them as InfluxDB line protocol.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `p1-core`: Error handling and OBIS codes
//! - `p1-transport`: Line sources (Serial, TCP)
//! - `p1-telegram`: Framing, checksum validation and field extraction
//! - `p1-publish`: Publishers (UDP, writer)
//! - `p1`: Configuration, the monitor loop and the `p1-monitor` binary
//!
//! # Usage
//!
//! ```no_run
//! use p1::{Monitor, LineProtocolWriter, SerialTransport, TransportLayer};
//!
//! # async fn run() -> p1::P1Result<()> {
//! let mut port = SerialTransport::new_simple("/dev/ttyUSB0".to_string(), 115_200);
//! port.open().await?;
//! let mut monitor = Monitor::new(port, LineProtocolWriter::stdout());
//! monitor.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod monitor;

// Re-export core types
pub use p1_core::{ObisCode, P1Error, P1Result};
pub use p1_transport::{LineReader, LineSource, SerialSettings, SerialTransport, TcpSettings, TcpTransport, TransportLayer};
pub use p1_telegram::{
    ChecksumStatus, FieldId, Frame, FrameReader, Telegram, TelegramBuilder, TelegramRecord,
    TelegramStatistics,
};
pub use p1_publish::{
    HttpPublisher, HttpSettings, InfluxPoint, LineProtocolWriter, Publisher, UdpPublisher,
    UdpSettings,
};

pub use config::MonitorConfig;
pub use monitor::Monitor;
