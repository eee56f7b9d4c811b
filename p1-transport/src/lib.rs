//! Transport layer module for DSMR P1 telegram acquisition
//!
//! This crate turns a byte stream from the meter into terminated lines.
//! Framing and validation live in `p1-telegram`; this layer only knows
//! about line terminators, timeouts and the physical link.

pub mod stream;
pub mod tcp;
pub mod serial;

pub use p1_core::{P1Error, P1Result};
pub use stream::{LineReader, LineSource, TransportLayer, DEFAULT_MAX_LINE_LENGTH};
pub use tcp::{TcpTransport, TcpSettings};
pub use serial::{SerialTransport, SerialSettings};
