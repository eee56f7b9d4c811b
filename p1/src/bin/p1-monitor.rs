//! p1-monitor: read DSMR P1 telegrams and publish them as InfluxDB line protocol

use anyhow::{bail, Context};
use clap::Parser;
use p1::config::{InfluxHttpConfig, MonitorConfig, PublishTarget, SourceConfig, DEFAULT_DEVICE};
use p1_transport::serial::DEFAULT_BAUD_RATE;
use p1::{
    FrameReader, HttpPublisher, LineProtocolWriter, Monitor, Publisher, SerialSettings, SerialTransport,
    TcpSettings, TcpTransport, TelegramStatistics, TransportLayer, UdpPublisher, UdpSettings,
};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "p1-monitor",
    version,
    about = "Read DSMR P1 telegrams from a smart meter and publish them as InfluxDB line protocol"
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "P1_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port to read telegrams from
    #[arg(short, long)]
    device: Option<String>,

    /// Baud rate of the serial port
    #[arg(short, long)]
    baudrate: Option<u32>,

    /// Read from a serial-to-network bridge instead (host:port)
    #[arg(long, conflicts_with = "device")]
    tcp: Option<String>,

    /// Send line protocol datagrams to this UDP listener instead of stdout
    #[arg(long, conflicts_with = "influx")]
    udp: Option<String>,

    #[command(flatten)]
    influx: InfluxArgs,

    /// Measurement name
    #[arg(long)]
    measurement: Option<String>,

    /// Maximum lines per telegram before the attempt is abandoned
    #[arg(long)]
    max_lines: Option<usize>,

    /// Read, publish and print a single telegram, then exit
    #[arg(long)]
    once: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Tags added to every point (key=value)
    tags: Vec<String>,
}

/// InfluxDB HTTP write API; any of these selects the HTTP publisher
#[derive(clap::Args, Debug)]
#[group(id = "influx", multiple = true)]
struct InfluxArgs {
    /// InfluxDB host
    #[arg(long = "influx-hostname")]
    hostname: Option<String>,

    /// InfluxDB HTTP port
    #[arg(long = "influx-port")]
    port: Option<u16>,

    #[arg(long = "influx-username")]
    username: Option<String>,

    #[arg(long = "influx-password", env = "P1_INFLUX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long = "influx-database")]
    database: Option<String>,

    #[arg(long = "influx-retention-policy")]
    retention_policy: Option<String>,

    /// Path prefix in front of /write
    #[arg(long = "influx-path")]
    path: Option<String>,

    /// Connect over https
    #[arg(long = "influx-ssl")]
    ssl: bool,
}

impl InfluxArgs {
    fn is_set(&self) -> bool {
        self.hostname.is_some()
            || self.port.is_some()
            || self.username.is_some()
            || self.password.is_some()
            || self.database.is_some()
            || self.retention_policy.is_some()
            || self.path.is_some()
            || self.ssl
    }

    /// Overlay the flags on an HTTP target from the configuration file, if any
    fn apply(&self, target: &PublishTarget) -> PublishTarget {
        let mut http = match target {
            PublishTarget::Http(http) => http.clone(),
            _ => InfluxHttpConfig::default(),
        };
        if let Some(hostname) = &self.hostname {
            http.host = hostname.clone();
        }
        if let Some(port) = self.port {
            http.port = port;
        }
        if let Some(username) = &self.username {
            http.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            http.password = Some(password.clone());
        }
        if let Some(database) = &self.database {
            http.database = database.clone();
        }
        if let Some(rp) = &self.retention_policy {
            http.retention_policy = Some(rp.clone());
        }
        if let Some(path) = &self.path {
            http.path = path.clone();
        }
        http.ssl |= self.ssl;
        PublishTarget::Http(http)
    }
}

impl Args {
    fn apply(&self, config: &mut MonitorConfig) -> anyhow::Result<()> {
        if let Some(address) = &self.tcp {
            config.source = SourceConfig::Tcp {
                address: address.clone(),
                read_timeout_secs: config.source.read_timeout().as_secs(),
            };
        } else if self.device.is_some() || self.baudrate.is_some() {
            let read_timeout_secs = config.source.read_timeout().as_secs();
            let (mut device, mut baud_rate) = match &config.source {
                SourceConfig::Serial { device, baud_rate, .. } => (device.clone(), *baud_rate),
                SourceConfig::Tcp { .. } => (DEFAULT_DEVICE.to_string(), DEFAULT_BAUD_RATE),
            };
            if let Some(d) = &self.device {
                device = d.clone();
            }
            if let Some(b) = self.baudrate {
                baud_rate = b;
            }
            config.source = SourceConfig::Serial { device, baud_rate, read_timeout_secs };
        }

        if let Some(address) = &self.udp {
            config.publish.target = PublishTarget::Udp { address: address.clone() };
        } else if self.influx.is_set() {
            config.publish.target = self.influx.apply(&config.publish.target);
        }
        if let Some(measurement) = &self.measurement {
            config.publish.measurement = measurement.clone();
        }
        if let Some(max_lines) = self.max_lines {
            config.framing.max_lines = max_lines;
        }
        config.publish.tags.extend(p1_publish::parse_tags(&self.tags)?);

        config.validate()?;
        Ok(())
    }
}

async fn open_source(config: &SourceConfig) -> anyhow::Result<Box<dyn TransportLayer>> {
    let mut transport: Box<dyn TransportLayer> = match config {
        SourceConfig::Serial { device, baud_rate, .. } => Box::new(SerialTransport::new(
            SerialSettings::with_timeout(device.clone(), *baud_rate, config.read_timeout()),
        )),
        SourceConfig::Tcp { address, .. } => {
            let address: SocketAddr = address
                .parse()
                .with_context(|| format!("invalid TCP address {}", address))?;
            Box::new(TcpTransport::new(TcpSettings::with_timeout(address, config.read_timeout())))
        }
    };
    transport.open().await?;
    Ok(transport)
}

async fn open_publisher(config: &MonitorConfig) -> anyhow::Result<Box<dyn Publisher>> {
    let publish = &config.publish;
    Ok(match &publish.target {
        PublishTarget::Stdout => Box::new(
            LineProtocolWriter::stdout()
                .with_measurement(&publish.measurement)
                .with_tags(publish.tags.clone()),
        ),
        PublishTarget::Udp { address } => {
            let remote_address: SocketAddr = address
                .parse()
                .with_context(|| format!("invalid UDP address {}", address))?;
            Box::new(
                UdpPublisher::connect(UdpSettings {
                    remote_address,
                    measurement: publish.measurement.clone(),
                    tags: publish.tags.clone(),
                })
                .await?,
            )
        }
        PublishTarget::Http(http) => Box::new(HttpPublisher::new(http.settings(publish))?),
    })
}

fn log_statistics(stats: &TelegramStatistics) {
    tracing::info!(
        frames = stats.frames_read(),
        verified = stats.telegrams_verified,
        unchecked = stats.telegrams_unchecked,
        checksum_errors = stats.checksum_errors,
        structural_errors = stats.structural_errors,
        conversion_errors = stats.conversion_errors,
        frame_overflows = stats.frame_overflows,
        acquisition_errors = stats.acquisition_errors,
        publish_errors = stats.publish_errors,
        "Telegram statistics ({:.1}% rejected)",
        stats.error_rate()
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting p1-monitor v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    args.apply(&mut config)?;

    let source = open_source(&config.source).await?;
    let publisher = open_publisher(&config).await?;
    let mut monitor = Monitor::new(source, publisher)
        .with_frame_reader(FrameReader::with_max_lines(config.framing.max_lines));

    if args.once {
        let telegram = monitor.run_once().await?;
        if let Some(id) = telegram.identification() {
            tracing::info!("Meter {} ({})", id, telegram.checksum());
        }
        monitor.source_mut().close().await?;
        return Ok(());
    }

    let outcome = tokio::select! {
        result = monitor.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping");
            Ok(())
        }
    };

    log_statistics(monitor.statistics());
    monitor.source_mut().close().await?;

    if let Err(e) = outcome {
        bail!("monitor stopped: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "p1-monitor", "--device", "/dev/ttyAMA0", "--baudrate", "9600", "--udp", "127.0.0.1:8089",
            "--measurement", "p1", "location=home",
        ]);
        let mut config = MonitorConfig::default();
        args.apply(&mut config).unwrap();

        assert_eq!(
            config.source,
            SourceConfig::Serial {
                device: "/dev/ttyAMA0".to_string(),
                baud_rate: 9600,
                read_timeout_secs: 10,
            }
        );
        assert_eq!(config.publish.target, PublishTarget::Udp { address: "127.0.0.1:8089".to_string() });
        assert_eq!(config.publish.measurement, "p1");
        assert_eq!(config.publish.tags.get("location").map(String::as_str), Some("home"));
    }

    #[test]
    fn test_tcp_source() {
        let args = Args::parse_from(["p1-monitor", "--tcp", "192.168.1.20:2001"]);
        let mut config = MonitorConfig::default();
        args.apply(&mut config).unwrap();
        assert!(matches!(config.source, SourceConfig::Tcp { .. }));
    }

    #[test]
    fn test_bad_tag_rejected() {
        let args = Args::parse_from(["p1-monitor", "novalue"]);
        assert!(args.apply(&mut MonitorConfig::default()).is_err());
    }

    #[test]
    fn test_influx_flags_select_http_target() {
        let args = Args::parse_from([
            "p1-monitor", "--influx-hostname", "influx.local", "--influx-username", "root",
            "--influx-password", "root", "--influx-retention-policy", "one_year", "--influx-ssl",
        ]);
        let mut config = MonitorConfig::default();
        args.apply(&mut config).unwrap();

        let PublishTarget::Http(http) = &config.publish.target else {
            panic!("expected http target, got {:?}", config.publish.target);
        };
        assert_eq!(http.host, "influx.local");
        assert_eq!(http.port, 8086);
        assert_eq!(http.database, "p1smartmeter");
        assert_eq!(http.username.as_deref(), Some("root"));
        assert_eq!(http.retention_policy.as_deref(), Some("one_year"));
        assert!(http.ssl);
        assert_eq!(http.settings(&config.publish).write_url(), "https://influx.local:8086/write");
    }

    #[test]
    fn test_influx_flags_override_config_target() {
        let mut config = MonitorConfig::from_toml_str(
            "[publish.target]\nkind = \"http\"\nhost = \"db.local\"\ndatabase = \"energy\"\n",
        )
        .unwrap();
        let args = Args::parse_from(["p1-monitor", "--influx-port", "9086"]);
        args.apply(&mut config).unwrap();

        let PublishTarget::Http(http) = &config.publish.target else {
            panic!("expected http target");
        };
        assert_eq!((http.host.as_str(), http.port, http.database.as_str()), ("db.local", 9086, "energy"));
    }

    #[test]
    fn test_udp_conflicts_with_influx() {
        assert!(Args::try_parse_from(["p1-monitor", "--udp", "127.0.0.1:8089", "--influx-hostname", "h"]).is_err());
    }

    #[test]
    fn test_device_conflicts_with_tcp() {
        assert!(Args::try_parse_from(["p1-monitor", "--device", "/dev/ttyUSB0", "--tcp", "h:1"]).is_err());
    }
}
