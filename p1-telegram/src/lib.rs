//! Telegram layer for DSMR P1 acquisition
//!
//! This crate assembles telegram frames from a line source, validates their
//! CRC-16 checksum and extracts the measurements declared in the field
//! table.
//!
//! ```no_run
//! use p1_telegram::{FrameReader, Telegram};
//! use p1_transport::{SerialTransport, TransportLayer};
//!
//! # async fn run() -> p1_core::P1Result<()> {
//! let mut port = SerialTransport::new_simple("/dev/ttyUSB0".to_string(), 115_200);
//! port.open().await?;
//! let frame = FrameReader::new().read_one_frame(&mut port).await?;
//! let telegram = Telegram::parse(&frame)?;
//! println!("{:?}", telegram.record());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod crc;
pub mod fields;
pub mod frame;
pub mod parser;
pub mod reader;
pub mod record;
pub mod state;
pub mod statistics;

pub use p1_core::{P1Error, P1Result};
pub use builder::TelegramBuilder;
pub use crc::{crc16, Crc16};
pub use fields::{FieldDescriptor, FieldPattern, FIELD_TABLE};
pub use frame::Frame;
pub use parser::{extract_fields, validate_checksum, ChecksumStatus, Telegram};
pub use reader::{FrameReader, DEFAULT_MAX_LINES};
pub use record::{FieldId, TelegramRecord};
pub use state::{FramingState, LineAction, LineClass};
pub use statistics::TelegramStatistics;
