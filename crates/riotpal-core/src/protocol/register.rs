//! Register-exchange replies
//!
//! The register firmware answers every request with one line:
//!
//! ```text
//! 0                     success, no payload
//! 0,0x2a                success, integer payload
//! 0,0x0807060504030201  success, byte payload (most significant byte first)
//! 22                    error, errno value
//! ```
//!
//! A device that reboots while answering emits a NUL before the status, so
//! `"\0" "0"` is accepted as success.

use crate::errno;
use crate::error::Result;
use crate::number::{parse_i64, parse_u64};
use crate::result::{CommandResult, Data, Value};
use crate::transport::Transport;

use super::{receive, send};

/// Status token of a successful reply
pub const SUCCESS: &str = "0";
/// Status token of a successful reply that raced a device reset
pub const RESET_SUCCESS: &str = "\u{0}0";
/// Message attached to successful replies
pub const SUCCESS_MESSAGE: &str = "EOK-command success [0]";

/// Payload tokens at most this many characters past a two character prefix
/// are decoded as a single integer
const MAX_INTEGER_DIGITS: usize = 8;

/// Send `command` and decode the single reply line
pub fn exchange(transport: &mut dyn Transport, command: &str) -> Result<CommandResult> {
    send(transport, command)?;
    Ok(match receive(transport) {
        Some(line) => decode_reply(command, &line),
        None => CommandResult::timeout(command),
    })
}

/// Decode one reply line into a result
///
/// Never fails: anything that cannot be decoded becomes an error result.
pub fn decode_reply(command: &str, line: &str) -> CommandResult {
    let tokens: Vec<&str> = line.split(',').collect();
    let status = match tokens[0] {
        RESET_SUCCESS => SUCCESS,
        status => status,
    };

    if status == SUCCESS {
        log::debug!("Success");
        return CommandResult::success(command, SUCCESS_MESSAGE, decode_payload(&tokens[1..]));
    }

    let res = match parse_u64(status) {
        Some(code) => match errno::describe(code) {
            Some(message) => CommandResult::error(command, message, Some(Data::Integer(code))),
            None => CommandResult::error(
                command,
                format!("Unknown Error unrecognized error code [{}]", code),
                Some(Data::Integer(code)),
            ),
        },
        None => CommandResult::error(
            command,
            format!("Unknown Error invalid status {:?}", status),
            Some(Data::Text(status.to_string())),
        ),
    };
    log::debug!("Error: {}", res.message);
    res
}

/// Decode the payload tokens of a successful reply
///
/// The first token decides the shape: short tokens are integers (negative
/// ones become a signed [`Value`]), long
/// `0x` tokens are byte strings, anything else is kept as text.
pub fn decode_payload(tokens: &[&str]) -> Option<Data> {
    let first = tokens.first()?;
    let strings = || Data::Strings(tokens.iter().map(|t| t.to_string()).collect());

    if first.len() <= MAX_INTEGER_DIGITS + 2 {
        if let Some(v) = parse_u64(first) {
            return Some(Data::Integer(v));
        }
        return Some(match parse_i64(first) {
            Some(v) => Data::Values(vec![Value::Int(v)]),
            None => strings(),
        });
    }

    if let Some(digits) = first.strip_prefix("0x") {
        return Some(match hex::decode(digits.trim()) {
            Ok(mut bytes) => {
                bytes.reverse();
                Data::Bytes(bytes)
            }
            Err(e) => {
                log::warn!("Malformed byte payload {:?}: {}", first, e);
                strings()
            }
        });
    }

    Some(strings())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultKind;
    use crate::transport::mock::ScriptedTransport;

    #[test]
    fn test_plain_success() {
        let res = decode_reply("wr 0 1", "0");
        assert!(res.is_success());
        assert_eq!(res.message, SUCCESS_MESSAGE);
        assert!(res.data.is_none());
    }

    #[test]
    fn test_reset_normalized() {
        let res = decode_reply("mcu_rst", "\u{0}0");
        assert!(res.is_success());
    }

    #[test]
    fn test_integer_payload() {
        assert_eq!(decode_reply("rr 0 4", "0,0x12345678").data, Some(Data::Integer(0x12345678)));
        assert_eq!(decode_reply("rr 0 1", "0,200").data, Some(Data::Integer(200)));
        assert_eq!(decode_reply("rr 0 4", "0,4294967295").data, Some(Data::Integer(u64::from(u32::MAX))));
    }

    #[test]
    fn test_byte_payload_reversed() {
        let res = decode_reply("rr 0 5", "0,0x0102030405");
        assert_eq!(res.data, Some(Data::Bytes(vec![5, 4, 3, 2, 1])));
        assert_eq!(res.data_as_integer(), Some(0x0102030405));
    }

    #[test]
    fn test_odd_hex_falls_back_to_strings() {
        let res = decode_reply("rr 0 5", "0,0x010203040");
        assert!(res.is_success());
        assert_eq!(res.data, Some(Data::Strings(vec!["0x010203040".into()])));
    }

    #[test]
    fn test_long_text_payload() {
        let res = decode_reply("help", "0,rr_and_wr_cmds,ex");
        assert_eq!(
            res.data,
            Some(Data::Strings(vec!["rr_and_wr_cmds".into(), "ex".into()]))
        );
    }

    #[test]
    fn test_signed_payload() {
        let res = decode_reply("rr 0 1", "0,-1");
        assert_eq!(res.data, Some(Data::Values(vec![Value::Int(-1)])));
        assert_eq!(res.data_as_integer(), None);

        let res = decode_reply("rr 0 1", "0,-x");
        assert_eq!(res.data, Some(Data::Strings(vec!["-x".into()])));
    }

    #[test]
    fn test_first_token_decides_integer() {
        let res = decode_reply("rr 0 1", "0,5,6");
        assert_eq!(res.data, Some(Data::Integer(5)));
    }

    #[test]
    fn test_error_code_rendered() {
        let res = decode_reply("rr 9999 1", "5");
        assert_eq!(res.kind, ResultKind::Error);
        assert_eq!(res.data, Some(Data::Integer(5)));
        assert!(res.message.ends_with("[5]"));
        #[cfg(unix)]
        assert_eq!(
            res.message,
            format!("EIO-{} [5]", nix::errno::Errno::EIO.desc())
        );
        #[cfg(not(unix))]
        assert!(res.message.starts_with("Unknown Error"));
    }

    #[test]
    fn test_garbage_status_is_generic_error() {
        let res = decode_reply("rr 0 1", "ok?");
        assert_eq!(res.kind, ResultKind::Error);
        assert!(res.message.starts_with("Unknown Error"));
        assert_eq!(res.data, Some(Data::Text("ok?".into())));

        let res = decode_reply("rr 0 1", "");
        assert_eq!(res.kind, ResultKind::Error);

        let res = decode_reply("rr 0 1", "4000");
        assert_eq!(res.kind, ResultKind::Error);
        assert_eq!(res.data, Some(Data::Integer(4000)));
    }

    #[test]
    fn test_exchange_timeout() {
        let mut transport = ScriptedTransport::new();
        let res = exchange(&mut transport, "ex").unwrap();
        assert_eq!(transport.sent, vec!["ex"]);
        assert!(res.is_timeout());
        assert!(res.data.is_none());
    }
}
