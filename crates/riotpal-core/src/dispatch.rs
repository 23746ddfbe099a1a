//! Named command dispatch
//!
//! [`CommandDispatch`] sends arbitrary device commands (`i2c_acquire 0`,
//! `help`, ...) and parses the reply with the session's [`Protocol`]. It is
//! the generic counterpart of [`RegisterAccess`](crate::RegisterAccess) for
//! firmware that exposes named commands instead of a register map.

use core::fmt::Display;

use crate::error::Result;
use crate::protocol::Protocol;
use crate::result::{CommandResult, Data, Value};
use crate::transport::Transport;

/// Command listing the device's commands
pub const HELP_CMD: &str = "help";

/// Named-command facade over a transport
pub struct CommandDispatch<T: Transport> {
    transport: T,
    protocol: Protocol,
}

impl<T: Transport> CommandDispatch<T> {
    /// Create a dispatcher parsing replies with `protocol`
    pub fn new(transport: T, protocol: Protocol) -> Self {
        Self {
            transport,
            protocol,
        }
    }

    /// Reply convention in use
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give up the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Close the transport
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }

    /// Send a raw command line
    pub fn send(&mut self, command: &str) -> Result<CommandResult> {
        self.protocol.exchange(&mut self.transport, command)
    }

    /// Send `name` followed by space separated arguments
    pub fn call<A: Display>(&mut self, name: &str, args: &[A]) -> Result<CommandResult> {
        let mut command = name.to_string();
        for arg in args {
            command.push_str(&format!(" {}", arg));
        }
        self.send(&command)
    }

    /// Ask the device which commands it supports
    ///
    /// Returns an empty list if the device does not answer `help` with a
    /// list.
    pub fn command_list(&mut self) -> Result<Vec<String>> {
        let res = self.send(HELP_CMD)?;
        if !res.is_success() {
            log::warn!("'{}' failed: {}", HELP_CMD, res.message);
            return Ok(Vec::new());
        }

        let names = match res.data {
            Some(Data::Strings(tokens)) => tokens,
            Some(Data::Values(values)) => values
                .into_iter()
                .map(|v| match v {
                    Value::Literal(s) => s,
                    Value::Int(i) => i.to_string(),
                })
                .collect(),
            Some(Data::Text(text)) => text.split_whitespace().map(str::to_string).collect(),
            _ => Vec::new(),
        };
        log::debug!("Device commands: {:?}", names);
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::result::ResultKind;
    use crate::transport::mock::ScriptedTransport;

    #[test]
    fn test_call_formats_arguments() {
        let transport = ScriptedTransport::new()
            .reply("Command: i2c_read_reg(0, 0x50, 0, 2)")
            .reply("Success: [1, 2]");
        let mut dispatch = CommandDispatch::new(transport, Protocol::LineTranscript);
        let res = dispatch.call("i2c_read_reg", &[0, 80, 0, 2]).unwrap();
        assert_eq!(dispatch.transport_mut().sent, vec!["i2c_read_reg 0 80 0 2"]);
        assert_eq!(res.data_as_integers(), Some(vec![1, 2]));
    }

    #[test]
    fn test_record_protocol() {
        let transport = ScriptedTransport::new().reply(r#"{"cmd":"x","result":"Error","data":5}"#);
        let mut dispatch = CommandDispatch::new(transport, Protocol::StructuredRecord);
        let res = dispatch.send("x").unwrap();
        assert_eq!(res.kind, ResultKind::Error);
        assert_eq!(res.data, Some(Data::Integer(5)));
    }

    #[test]
    fn test_command_list_transcript() {
        let transport = ScriptedTransport::new().reply("Success: [i2c_acquire, i2c_release, help]");
        let mut dispatch = CommandDispatch::new(transport, Protocol::LineTranscript);
        assert_eq!(
            dispatch.command_list().unwrap(),
            vec!["i2c_acquire", "i2c_release", "help"]
        );
        assert_eq!(dispatch.transport_mut().sent, vec![HELP_CMD]);
    }

    #[test]
    fn test_command_list_register() {
        let transport = ScriptedTransport::new().reply("0,rr,wr,ex,mcu_rst");
        let mut dispatch = CommandDispatch::new(transport, Protocol::RegisterExchange);
        assert_eq!(
            dispatch.command_list().unwrap(),
            vec!["rr", "wr", "ex", "mcu_rst"]
        );
    }

    #[test]
    fn test_command_list_timeout_is_empty() {
        let mut dispatch = CommandDispatch::new(ScriptedTransport::new(), Protocol::LineTranscript);
        assert!(dispatch.command_list().unwrap().is_empty());
    }

    #[test]
    fn test_write_failure_is_err() {
        let mut transport = ScriptedTransport::new();
        transport.fail_writes = true;
        let mut dispatch = CommandDispatch::new(transport, Protocol::LineTranscript);
        assert!(matches!(dispatch.send("help"), Err(Error::Transport(_))));
    }

    #[test]
    fn test_shared_transport_hand_off() {
        let mut transport = ScriptedTransport::new().reply("Success: a").reply("0");
        {
            let mut dispatch = CommandDispatch::new(&mut transport, Protocol::LineTranscript);
            assert!(dispatch.send("a").unwrap().is_success());
        }
        let mut regs = crate::RegisterAccess::new(&mut transport, crate::RegisterTable::default());
        assert!(regs.execute_changes().unwrap().is_success());
        assert_eq!(transport.sent, vec!["a", "ex"]);
    }
}
