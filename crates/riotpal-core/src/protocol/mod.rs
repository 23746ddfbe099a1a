//! Response parsers
//!
//! A request is one line written to the transport. The reply is consumed
//! line by line until a terminal condition is reached. Three reply
//! conventions exist:
//!
//! - [`transcript`]: free-form lines with `Command: `, `Success: ` and
//!   `Error: ` markers, used by shell-style test firmware
//! - [`record`]: one JSON object per line, merged until a `result` field
//!   arrives
//! - [`register`]: a single comma-separated status line, used by the
//!   register access firmware
//!
//! Every exchange ends in a [`CommandResult`]. Read failures and undecodable
//! replies are folded into the result; only a failed write is an `Err`.

pub mod record;
pub mod register;
pub mod transcript;

use core::str::FromStr;

use crate::error::{Error, Result};
use crate::result::CommandResult;
use crate::transport::Transport;

/// Reply convention, chosen once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// `Command:`/`Success:`/`Error:` marker lines
    #[default]
    LineTranscript,
    /// One JSON object per line, terminated by a `result` field
    StructuredRecord,
    /// Single comma-separated status line
    RegisterExchange,
}

impl Protocol {
    /// Send `command` and parse the reply using this convention
    pub fn exchange(self, transport: &mut dyn Transport, command: &str) -> Result<CommandResult> {
        match self {
            Self::LineTranscript => transcript::exchange(transport, command),
            Self::StructuredRecord => record::exchange(transport, command),
            Self::RegisterExchange => register::exchange(transport, command),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transcript" | "shell" => Ok(Self::LineTranscript),
            "record" | "json" => Ok(Self::StructuredRecord),
            "register" | "ll" => Ok(Self::RegisterExchange),
            _ => Err(format!(
                "unknown protocol '{}', expected transcript, record or register",
                s
            )),
        }
    }
}

/// Write one request line
pub(crate) fn send(transport: &mut dyn Transport, command: &str) -> Result<()> {
    log::debug!("Sending: {}", command);
    transport
        .write_line(command)
        .map_err(|e| Error::Transport(format!("failed to send '{}': {}", command, e)))
}

/// Read one reply line; read failures count as a timeout
pub(crate) fn receive(transport: &mut dyn Transport) -> Option<String> {
    match transport.read_line() {
        Ok(Some(line)) => {
            log::debug!("Response: {}", line);
            Some(line)
        }
        Ok(None) => {
            log::debug!("Timeout");
            None
        }
        Err(e) => {
            log::warn!("Read failed, treating as timeout: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ScriptedTransport;

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("json".parse::<Protocol>(), Ok(Protocol::StructuredRecord));
        assert_eq!("Shell".parse::<Protocol>(), Ok(Protocol::LineTranscript));
        assert_eq!("register".parse::<Protocol>(), Ok(Protocol::RegisterExchange));
        assert!("xml".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_failed_write_is_error() {
        let mut transport = ScriptedTransport::new();
        transport.fail_writes = true;
        let err = Protocol::LineTranscript
            .exchange(&mut transport, "help")
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_read_error_is_timeout() {
        let mut transport = ScriptedTransport::new().read_error("device unplugged");
        for protocol in [
            Protocol::LineTranscript,
            Protocol::StructuredRecord,
            Protocol::RegisterExchange,
        ] {
            let res = protocol.exchange(&mut transport, "ex").unwrap();
            assert!(res.is_timeout());
            assert!(res.data.is_none());
        }
    }
}
