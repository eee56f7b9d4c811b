//! Publishing layer for P1 telegram records
//!
//! Records are published as InfluxDB line protocol, either as UDP datagrams
//! to an InfluxDB or Telegraf listener, through the InfluxDB HTTP write API,
//! or written to any async writer.

pub mod http;
pub mod point;
pub mod publisher;
pub mod udp;
pub mod writer;

pub use p1_core::{P1Error, P1Result};
pub use http::{HttpPublisher, HttpSettings, DEFAULT_DATABASE, DEFAULT_INFLUX_PORT};
pub use point::{parse_tags, InfluxPoint, DEFAULT_MEASUREMENT};
pub use publisher::Publisher;
pub use udp::{UdpPublisher, UdpSettings, MAX_UDP_PAYLOAD_SIZE};
pub use writer::LineProtocolWriter;
