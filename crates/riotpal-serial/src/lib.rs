//! riotpal-serial - Serial port and TCP transports
//!
//! This crate provides [`Transport`] implementations for devices attached to
//! a serial port or reachable through a TCP serial bridge.
//!
//! # Supported Transports
//!
//! - Serial port: `dev=/dev/ttyACM0`, `dev=/dev/ttyUSB0:9600`, `dev=COM1`
//! - TCP socket: `ip=host:port`
//!
//! # Example
//!
//! ```no_run
//! use riotpal_core::{RegisterAccess, RegisterTable};
//! use riotpal_serial::{SerialConfig, SerialTransport};
//!
//! let transport = SerialTransport::open(SerialConfig::new("/dev/ttyACM0"))?;
//! let table = RegisterTable::from_csv_file("mem_map.csv")?;
//! let mut regs = RegisterAccess::new(transport, table);
//! let res = regs.read_register("sys.sn", 0, None)?;
//! println!("{:?}", res.data);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod transport;

// Re-exports
pub use config::SerialConfig;
pub use discovery::{available_configs, PortRegistry};
pub use error::{Result, SerialError};
pub use transport::serial::{PortOpener, SerialTransport, SystemOpener};
pub use transport::tcp::TcpTransport;

use riotpal_core::Transport;

/// Connection options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// Serial port connection
    Serial {
        /// Device path (e.g., "/dev/ttyACM0" or "COM1")
        device: String,
        /// Baud rate (None for the configured default)
        baud: Option<u32>,
    },
    /// TCP socket connection
    Tcp {
        /// Hostname or IP address
        host: String,
        /// Port number
        port: u16,
    },
}

impl Connection {
    /// Parse a connection string
    ///
    /// Formats:
    /// - `dev=/dev/ttyACM0` - Serial with default baud
    /// - `dev=/dev/ttyACM0:115200` - Serial with specified baud
    /// - `ip=host:port` - TCP connection
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(dev) = s.strip_prefix("dev=") {
            if let Some((device, baud_str)) = dev.rsplit_once(':') {
                let baud = baud_str
                    .parse()
                    .map_err(|_| SerialError::InvalidConnection(format!("Invalid baud rate: {}", baud_str)))?;
                Ok(Connection::Serial {
                    device: device.to_string(),
                    baud: Some(baud),
                })
            } else {
                Ok(Connection::Serial {
                    device: dev.to_string(),
                    baud: None,
                })
            }
        } else if let Some(ip) = s.strip_prefix("ip=") {
            let (host, port_str) = ip
                .rsplit_once(':')
                .ok_or_else(|| SerialError::InvalidConnection("Missing port in ip= parameter".to_string()))?;
            let port = port_str
                .parse()
                .map_err(|_| SerialError::InvalidConnection(format!("Invalid port: {}", port_str)))?;
            Ok(Connection::Tcp {
                host: host.to_string(),
                port,
            })
        } else {
            Err(SerialError::InvalidConnection(format!(
                "{}. Use dev=... or ip=...",
                s
            )))
        }
    }
}

/// Open a connection and return a boxed transport
///
/// `template` supplies the baud rate, timeout and connect wait where the
/// connection string does not.
pub fn open_transport(
    connection: &str,
    template: &SerialConfig,
    registry: &PortRegistry,
) -> Result<Box<dyn Transport>> {
    match Connection::parse(connection)? {
        Connection::Serial { device, baud } => {
            let config = SerialConfig {
                port: device,
                baud_rate: baud.unwrap_or(template.baud_rate),
                ..template.clone()
            };
            Ok(Box::new(SerialTransport::open_registered(config, registry)?))
        }
        Connection::Tcp { host, port } => Ok(Box::new(TcpTransport::connect_registered(
            &host,
            port,
            template.timeout,
            registry,
        )?)),
    }
}
