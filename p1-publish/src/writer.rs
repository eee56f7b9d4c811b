//! Line protocol publisher over any async writer

use crate::point::{InfluxPoint, DEFAULT_MEASUREMENT};
use crate::publisher::Publisher;
use async_trait::async_trait;
use p1_core::{P1Error, P1Result};
use p1_telegram::TelegramRecord;
use std::collections::BTreeMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes one line protocol line per record, flushing after each
///
/// With stdout this feeds collectors such as Telegraf's `execd` input.
#[derive(Debug)]
pub struct LineProtocolWriter<W> {
    writer: W,
    measurement: String,
    tags: BTreeMap<String, String>,
}

impl LineProtocolWriter<tokio::io::Stdout> {
    /// Write to standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> LineProtocolWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_measurement(mut self, measurement: &str) -> Self {
        self.measurement = measurement.to_string();
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Publisher for LineProtocolWriter<W> {
    async fn publish(&mut self, record: &TelegramRecord) -> P1Result<()> {
        let point = InfluxPoint::from_record(&self.measurement, &self.tags, record);
        if point.is_empty() {
            return Ok(());
        }

        let mut line = point.to_line_protocol();
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| P1Error::Publish(format!("Write failed: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| P1Error::Publish(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}
