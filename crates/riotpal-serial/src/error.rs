//! Error types for serial and TCP transports

use thiserror::Error;

/// Transport setup and I/O errors
#[derive(Debug, Error)]
pub enum SerialError {
    /// Failed to connect to device
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection string could not be parsed
    #[error("Invalid connection string: {0}")]
    InvalidConnection(String),

    /// Port is already held by another transport
    #[error("Port {0} is already in use")]
    PortInUse(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations
pub type Result<T> = core::result::Result<T, SerialError>;

impl From<SerialError> for riotpal_core::Error {
    fn from(e: SerialError) -> Self {
        riotpal_core::Error::Transport(e.to_string())
    }
}
