//! Monitor configuration
//!
//! Loaded from an optional TOML file; command line flags override it.
//!
//! ```toml
//! [source]
//! kind = "serial"
//! device = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [framing]
//! max_lines = 35
//!
//! [publish]
//! target = { kind = "udp", address = "127.0.0.1:8089" }
//! measurement = "smartmeter"
//! tags = { location = "home" }
//! ```
//!
//! The InfluxDB HTTP write API is selected with `kind = "http"`:
//!
//! ```toml
//! [publish.target]
//! kind = "http"
//! host = "influx.local"
//! database = "p1smartmeter"
//! username = "root"
//! password = "root"
//! ```

use p1_core::{P1Error, P1Result};
use p1_publish::{HttpSettings, DEFAULT_DATABASE, DEFAULT_INFLUX_PORT, DEFAULT_MEASUREMENT};
use p1_telegram::DEFAULT_MAX_LINES;
use p1_transport::serial::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Complete monitor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    pub framing: FramingConfig,
    pub publish: PublishConfig,
}

/// Where telegram lines come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// P1 port on a local serial device
    Serial {
        #[serde(default = "default_device")]
        device: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_read_timeout_secs")]
        read_timeout_secs: u64,
    },
    /// Serial-to-network bridge
    Tcp {
        address: String,
        #[serde(default = "default_read_timeout_secs")]
        read_timeout_secs: u64,
    },
}

impl SourceConfig {
    pub fn read_timeout(&self) -> Duration {
        match self {
            SourceConfig::Serial { read_timeout_secs, .. } | SourceConfig::Tcp { read_timeout_secs, .. } => {
                Duration::from_secs(*read_timeout_secs)
            }
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Serial {
            device: default_device(),
            baud_rate: default_baud_rate(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

/// Serial device used when none is configured
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_secs() -> u64 {
    10
}

/// Frame assembly settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    pub max_lines: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Where records go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub target: PublishTarget,
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            target: PublishTarget::Stdout,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            tags: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PublishTarget {
    /// Line protocol on standard output
    Stdout,
    /// Line protocol datagrams to an InfluxDB or Telegraf UDP listener
    Udp { address: String },
    /// InfluxDB HTTP write API
    Http(InfluxHttpConfig),
}

/// InfluxDB server reached over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxHttpConfig {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_policy: Option<String>,
    pub path: String,
    pub ssl: bool,
}

impl Default for InfluxHttpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_INFLUX_PORT,
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            retention_policy: None,
            path: String::new(),
            ssl: false,
        }
    }
}

impl InfluxHttpConfig {
    /// Publisher settings carrying the measurement and tags of `publish`
    pub fn settings(&self, publish: &PublishConfig) -> HttpSettings {
        let mut settings = HttpSettings::new(&self.host);
        settings.port = self.port;
        settings.username = self.username.clone();
        settings.password = self.password.clone();
        settings.database = self.database.clone();
        settings.retention_policy = self.retention_policy.clone();
        settings.path = self.path.clone();
        settings.ssl = self.ssl;
        settings.measurement = publish.measurement.clone();
        settings.tags = publish.tags.clone();
        settings
    }
}

impl MonitorConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> P1Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| P1Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> P1Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            P1Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> P1Result<String> {
        toml::to_string_pretty(self).map_err(|e| P1Error::Config(e.to_string()))
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> P1Result<()> {
        if self.framing.max_lines == 0 {
            return Err(P1Error::Config("framing.max_lines must be at least 1".to_string()));
        }
        if self.publish.measurement.is_empty() {
            return Err(P1Error::Config("publish.measurement must not be empty".to_string()));
        }
        if let SourceConfig::Serial { baud_rate: 0, .. } = self.source {
            return Err(P1Error::Config("source.baud_rate must not be 0".to_string()));
        }
        if let PublishTarget::Http(http) = &self.publish.target {
            if http.host.is_empty() || http.database.is_empty() {
                return Err(P1Error::Config(
                    "publish.target host and database must not be empty".to_string(),
                ));
            }
            if http.password.is_some() && http.username.is_none() {
                return Err(P1Error::Config("publish.target password given without username".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_p1_port() {
        let config = MonitorConfig::default();
        assert_eq!(
            config.source,
            SourceConfig::Serial {
                device: "/dev/ttyUSB0".to_string(),
                baud_rate: 115_200,
                read_timeout_secs: 10,
            }
        );
        assert_eq!(config.framing.max_lines, 35);
        assert_eq!(config.publish.measurement, "smartmeter");
        assert_eq!(config.publish.target, PublishTarget::Stdout);
        assert_eq!(config.source.read_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(MonitorConfig::from_toml_str("").unwrap(), MonitorConfig::default());
    }

    #[test]
    fn test_parse_full_file() {
        let text = r#"
            [source]
            kind = "tcp"
            address = "192.168.1.20:2001"

            [framing]
            max_lines = 40

            [publish]
            target = { kind = "udp", address = "127.0.0.1:8089" }
            measurement = "p1"
            tags = { location = "home" }
        "#;
        let config = MonitorConfig::from_toml_str(text).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Tcp {
                address: "192.168.1.20:2001".to_string(),
                read_timeout_secs: 10,
            }
        );
        assert_eq!(config.framing.max_lines, 40);
        assert_eq!(
            config.publish.target,
            PublishTarget::Udp { address: "127.0.0.1:8089".to_string() }
        );
        assert_eq!(config.publish.tags.get("location").map(String::as_str), Some("home"));
    }

    #[test]
    fn test_partial_serial_source_uses_defaults() {
        let config = MonitorConfig::from_toml_str("[source]\nkind = \"serial\"\nbaud_rate = 9600\n").unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Serial {
                device: "/dev/ttyUSB0".to_string(),
                baud_rate: 9600,
                read_timeout_secs: 10,
            }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(MonitorConfig::from_toml_str("[framing]\nmax_lines = 0\n").is_err());
        assert!(MonitorConfig::from_toml_str("[source]\nkind = \"carrier-pigeon\"\n").is_err());
        assert!(MonitorConfig::from_toml_str("[publish]\nmeasurement = \"\"\n").is_err());
    }

    #[test]
    fn test_http_target() {
        let text = r#"
            [publish]
            measurement = "p1"
            tags = { location = "home" }

            [publish.target]
            kind = "http"
            host = "influx.local"
            username = "root"
            password = "root"
            retention_policy = "one_year"
        "#;
        let config = MonitorConfig::from_toml_str(text).unwrap();
        let PublishTarget::Http(http) = &config.publish.target else {
            panic!("expected http target, got {:?}", config.publish.target);
        };
        assert_eq!(http.port, 8086);
        assert_eq!(http.database, "p1smartmeter");

        let settings = http.settings(&config.publish);
        assert_eq!(settings.write_url(), "http://influx.local:8086/write");
        assert_eq!(settings.write_query(), vec![("db", "p1smartmeter"), ("rp", "one_year")]);
        assert_eq!(settings.username.as_deref(), Some("root"));
        assert_eq!(settings.measurement, "p1");
        assert_eq!(settings.tags.get("location").map(String::as_str), Some("home"));

        let text = config.to_toml_string().unwrap();
        assert_eq!(MonitorConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_http_target_rejects_password_without_username() {
        let text = "[publish.target]\nkind = \"http\"\npassword = \"secret\"\n";
        assert!(MonitorConfig::from_toml_str(text).is_err());
        assert!(MonitorConfig::from_toml_str("[publish.target]\nkind = \"http\"\ndatabase = \"\"\n").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = MonitorConfig::default();
        config.publish.tags.insert("meter".to_string(), "ISK5".to_string());
        let text = config.to_toml_string().unwrap();
        assert_eq!(MonitorConfig::from_toml_str(&text).unwrap(), config);
    }
}
