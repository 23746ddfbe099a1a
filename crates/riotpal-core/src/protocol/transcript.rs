//! Line-transcript replies
//!
//! Shell-style firmware prints arbitrary lines while it works. Three markers
//! matter:
//!
//! ```text
//! Command: i2c_read_reg 0 0x50 0 1
//! Success: [0x12]
//! ```
//!
//! `Command: ` echoes the command as the device understood it, `Success: `
//! and `Error: ` end the exchange. A success line may carry a bracketed,
//! comma-space separated list of values.

use crate::error::Result;
use crate::number::parse_i64;
use crate::result::{CommandResult, Data, Value};
use crate::transport::Transport;

use super::{receive, send};

/// Echo marker
pub const COMMAND_MARKER: &str = "Command: ";
/// Terminal success marker
pub const SUCCESS_MARKER: &str = "Success: ";
/// Terminal error marker
pub const ERROR_MARKER: &str = "Error: ";

/// Send `command` and read until a terminal marker or a timeout
pub fn exchange(transport: &mut dyn Transport, command: &str) -> Result<CommandResult> {
    send(transport, command)?;

    let mut echo = command.to_string();
    while let Some(line) = receive(transport) {
        if line.contains(COMMAND_MARKER) {
            echo = line.replace(COMMAND_MARKER, "");
        }

        if line.contains(SUCCESS_MARKER) {
            let message = line.replace(SUCCESS_MARKER, "");
            let data = parse_list(&message).map(Data::Values);
            log::debug!("Success");
            return Ok(CommandResult::success(echo, message, data));
        }

        if line.contains(ERROR_MARKER) {
            let message = line.replace(ERROR_MARKER, "");
            log::debug!("Error: {}", message);
            return Ok(CommandResult::error(echo, message, None));
        }
    }

    Ok(CommandResult::timeout(echo))
}

/// Extract the bracketed value list of a success message
///
/// Elements that are not integer literals are kept verbatim. Returns `None`
/// when the message has no brackets.
pub fn parse_list(message: &str) -> Option<Vec<Value>> {
    let start = message.find('[')?;
    let end = message.find(']')?;
    let inner = message.get(start + 1..end).unwrap_or("");
    if inner.is_empty() {
        return Some(Vec::new());
    }

    let values = inner
        .split(", ")
        .map(|item| match parse_i64(item) {
            Some(v) => Value::Int(v),
            None => Value::Literal(item.to_string()),
        })
        .collect();
    Some(values)
}
