//! Serial connection settings

use std::time::Duration;

/// Port opened when none is given
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
/// Baud rate used when none is given
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// Read timeout used when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Delay after opening a port before it is used
pub const DEFAULT_CONNECT_WAIT: Duration = Duration::ZERO;

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path (e.g., "/dev/ttyACM0" or "COM1")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout; a read that sees no line within it is a timeout
    pub timeout: Duration,
    /// Wait after every open, for boards that reset on connect
    pub connect_wait: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            connect_wait: DEFAULT_CONNECT_WAIT,
        }
    }
}

impl SerialConfig {
    /// Default settings for `port`
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the wait after opening
    pub fn with_connect_wait(mut self, connect_wait: Duration) -> Self {
        self.connect_wait = connect_wait;
        self
    }
}
