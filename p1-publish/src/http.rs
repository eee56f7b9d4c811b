//! InfluxDB HTTP write API publisher

use crate::point::{InfluxPoint, DEFAULT_MEASUREMENT};
use crate::publisher::Publisher;
use async_trait::async_trait;
use p1_core::{P1Error, P1Result};
use p1_telegram::TelegramRecord;
use std::collections::BTreeMap;
use std::time::Duration;

/// Port of the InfluxDB HTTP API
pub const DEFAULT_INFLUX_PORT: u16 = 8086;

/// Database written to when none is configured
pub const DEFAULT_DATABASE: &str = "p1smartmeter";

/// HTTP publisher settings
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub retention_policy: Option<String>,
    /// Prefix in front of `/write`, for servers behind a reverse proxy
    pub path: String,
    /// Use https; certificates are verified
    pub ssl: bool,
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl HttpSettings {
    /// Create settings for an InfluxDB server on the default port
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_INFLUX_PORT,
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            retention_policy: None,
            path: String::new(),
            ssl: false,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            tags: BTreeMap::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Write endpoint without query string, e.g. `http://localhost:8086/write`
    pub fn write_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let path = self.path.trim_matches('/');
        if path.is_empty() {
            format!("{}://{}:{}/write", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}/write", scheme, self.host, self.port, path)
        }
    }

    /// Query parameters of a write request
    pub fn write_query(&self) -> Vec<(&'static str, &str)> {
        let mut query = vec![("db", self.database.as_str())];
        if let Some(rp) = &self.retention_policy {
            query.push(("rp", rp.as_str()));
        }
        query
    }
}

/// Writes one point per record through the InfluxDB 1.x HTTP API
#[derive(Debug)]
pub struct HttpPublisher {
    client: reqwest::Client,
    settings: HttpSettings,
}

impl HttpPublisher {
    pub fn new(settings: HttpSettings) -> P1Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| P1Error::Config(format!("Cannot create HTTP client: {}", e)))?;

        log::info!(
            "Publishing line protocol to {} (database {})",
            settings.write_url(),
            settings.database
        );
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&mut self, record: &TelegramRecord) -> P1Result<()> {
        let point = InfluxPoint::from_record(&self.settings.measurement, &self.settings.tags, record);
        if point.is_empty() {
            log::debug!("Nothing to publish, record has no fields");
            return Ok(());
        }

        let mut request = self
            .client
            .post(self.settings.write_url())
            .query(&self.settings.write_query())
            .body(point.to_line_protocol());
        if let Some(username) = &self.settings.username {
            request = request.basic_auth(username, self.settings.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| P1Error::Publish(format!("InfluxDB write failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(P1Error::Publish(format!(
                "InfluxDB rejected write with {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(())
    }
}
