//! UDP line protocol publisher

use crate::point::InfluxPoint;
use crate::publisher::Publisher;
use async_trait::async_trait;
use p1_core::{P1Error, P1Result};
use p1_telegram::TelegramRecord;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Maximum UDP payload size
pub const MAX_UDP_PAYLOAD_SIZE: usize = 65507;

/// UDP publisher settings
#[derive(Debug, Clone)]
pub struct UdpSettings {
    pub remote_address: SocketAddr,
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
}

impl UdpSettings {
    /// Create new UDP settings with the default measurement and no tags
    pub fn new(remote_address: SocketAddr) -> Self {
        Self {
            remote_address,
            measurement: crate::point::DEFAULT_MEASUREMENT.to_string(),
            tags: BTreeMap::new(),
        }
    }
}

/// Sends one line protocol datagram per record to an InfluxDB or Telegraf
/// UDP listener
#[derive(Debug)]
pub struct UdpPublisher {
    socket: UdpSocket,
    settings: UdpSettings,
}

impl UdpPublisher {
    /// Bind a local socket and connect it to the remote listener
    pub async fn connect(settings: UdpSettings) -> P1Result<Self> {
        let local: SocketAddr = if settings.remote_address.is_ipv4() {
            "0.0.0.0:0".parse()
        } else {
            "[::]:0".parse()
        }
        .map_err(|e| P1Error::Config(format!("Invalid local address: {}", e)))?;

        let socket = UdpSocket::bind(local).await?;
        socket.connect(settings.remote_address).await?;
        log::info!("Publishing line protocol to udp://{}", settings.remote_address);

        Ok(Self { socket, settings })
    }

    pub fn settings(&self) -> &UdpSettings {
        &self.settings
    }
}

#[async_trait]
impl Publisher for UdpPublisher {
    async fn publish(&mut self, record: &TelegramRecord) -> P1Result<()> {
        let point = InfluxPoint::from_record(&self.settings.measurement, &self.settings.tags, record);
        if point.is_empty() {
            log::debug!("Nothing to publish, record has no fields");
            return Ok(());
        }

        let line = point.to_line_protocol();
        if line.len() > MAX_UDP_PAYLOAD_SIZE {
            return Err(P1Error::Publish(format!(
                "Line protocol payload too large for UDP: {} bytes",
                line.len()
            )));
        }

        self.socket
            .send(line.as_bytes())
            .await
            .map_err(|e| P1Error::Publish(format!("UDP send failed: {}", e)))?;
        Ok(())
    }
}
