//! Structured-record replies
//!
//! JSON-speaking firmware answers with one object per line. Objects are
//! merged field by field, later fields overwriting earlier ones, until the
//! merged record holds a `result` field:
//!
//! ```text
//! {"cmd":"i2c_read_reg(0, 0x50, 0, 2)"}
//! {"data":[1,2],"result":"Success"}
//! ```
//!
//! Lines that are not JSON objects (boot banners, debug prints) are kept in
//! [`CommandResult::notes`] and do not end the exchange. They also become the
//! message when the record carries no `msg` field.

use serde_json::{Map, Value as Json};

use crate::error::Result;
use crate::result::{CommandResult, Data, ResultKind, Value};
use crate::transport::Transport;

use super::{receive, send};

/// Field whose arrival ends the exchange
pub const RESULT_FIELD: &str = "result";

/// Send `command` and merge reply records until a `result` field arrives
pub fn exchange(transport: &mut dyn Transport, command: &str) -> Result<CommandResult> {
    send(transport, command)?;

    let mut record = Map::new();
    let mut notes = Vec::new();
    while !record.contains_key(RESULT_FIELD) {
        let Some(line) = receive(transport) else {
            let mut res = CommandResult::timeout(echo_of(&record, command));
            res.notes = notes;
            return Ok(res);
        };

        match serde_json::from_str::<Json>(&line) {
            Ok(Json::Object(fields)) => record.extend(fields),
            _ => {
                log::debug!("Undecodable record line kept as note: {}", line);
                notes.push(line);
            }
        }
    }

    Ok(into_result(record, command, notes))
}

fn echo_of(record: &Map<String, Json>, command: &str) -> String {
    match record.get("cmd") {
        Some(Json::String(cmd)) => cmd.clone(),
        _ => command.to_string(),
    }
}

/// Convert a completed record into a result
///
/// `notes` are the undecodable lines seen on the way.
pub fn into_result(
    mut record: Map<String, Json>,
    command: &str,
    notes: Vec<String>,
) -> CommandResult {
    let echo = echo_of(&record, command);
    let kind = match record.get(RESULT_FIELD) {
        Some(Json::String(s)) if s == "Success" => ResultKind::Success,
        Some(Json::String(s)) if s == "Timeout" => ResultKind::Timeout,
        _ => ResultKind::Error,
    };
    let message = match record.remove("msg") {
        Some(Json::String(s)) => s,
        Some(Json::Array(parts)) => parts
            .iter()
            .map(|p| match p {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
        None if notes.is_empty() => kind.as_str().to_string(),
        None => notes.join("\n"),
    };

    let mut res = match kind {
        ResultKind::Timeout => CommandResult::timeout(echo),
        ResultKind::Success => {
            CommandResult::success(echo, message, record.remove("data").and_then(json_to_data))
        }
        ResultKind::Error => {
            CommandResult::error(echo, message, record.remove("data").and_then(json_to_data))
        }
    };
    res.notes = notes;
    res
}

/// Narrow a JSON payload to the most specific [`Data`] variant
pub fn json_to_data(value: Json) -> Option<Data> {
    match value {
        Json::Null => None,
        Json::Number(n) => match n.as_u64() {
            Some(v) => Some(Data::Integer(v)),
            None => Some(Data::Json(Json::Number(n))),
        },
        Json::String(s) => Some(Data::Text(s)),
        Json::Array(items) => {
            if let Some(ints) = items.iter().map(Json::as_u64).collect::<Option<Vec<_>>>() {
                return Some(Data::Integers(ints));
            }
            let values = items
                .iter()
                .map(|item| match item {
                    Json::Number(n) => n.as_i64().map(Value::Int),
                    Json::String(s) => Some(Value::Literal(s.clone())),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>();
            match values {
                Some(values) => Some(Data::Values(values)),
                None => Some(Data::Json(Json::Array(items))),
            }
        }
        other => Some(Data::Json(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ScriptedTransport;
    use serde_json::json;

    #[test]
    fn test_merge_until_result() {
        let mut transport = ScriptedTransport::new()
            .reply("main(): This is RIOT!")
            .reply(r#"{"cmd":"i2c_read_reg(0, 0x50, 0, 2)"}"#)
            .reply(r#"{"data":[1,2]}"#)
            .reply(r#"{"result":"Success"}"#)
            .reply(r#"{"result":"Error"}"#);

        let res = exchange(&mut transport, "i2c_read_reg 0 80 0 2").unwrap();
        assert!(res.is_success());
        assert_eq!(res.command, "i2c_read_reg(0, 0x50, 0, 2)");
        assert_eq!(res.data, Some(Data::Integers(vec![1, 2])));
        assert_eq!(res.notes, vec!["main(): This is RIOT!"]);
    }

    #[test]
    fn test_error_record_keeps_message() {
        let mut transport = ScriptedTransport::new()
            .reply(r#"{"msg":"bus locked","data":16,"result":"Error"}"#);
        let res = exchange(&mut transport, "i2c_acquire 0").unwrap();
        assert_eq!(res.kind, ResultKind::Error);
        assert_eq!(res.message, "bus locked");
        assert_eq!(res.data, Some(Data::Integer(16)));
        assert_eq!(res.command, "i2c_acquire 0");
    }

    #[test]
    fn test_timeout_keeps_notes_and_drops_data() {
        let mut transport = ScriptedTransport::new()
            .reply(r#"{"data":[1]}"#)
            .reply("garbage {")
            .timeout();
        let res = exchange(&mut transport, "help").unwrap();
        assert!(res.is_timeout());
        assert!(res.data.is_none());
        assert_eq!(res.notes, vec!["garbage {"]);
    }

    #[test]
    fn test_non_object_json_is_note() {
        let mut transport = ScriptedTransport::new()
            .reply("42")
            .reply(r#"{"result":"Success"}"#);
        let res = exchange(&mut transport, "x").unwrap();
        assert!(res.is_success());
        assert_eq!(res.notes, vec!["42"]);
        assert_eq!(res.message, "42");
    }

    #[test]
    fn test_notes_become_message_without_msg() {
        let mut transport = ScriptedTransport::new()
            .reply("i2c: nack")
            .reply("retrying")
            .reply(r#"{"result":"Error","data":5}"#);
        let res = exchange(&mut transport, "i2c_write_reg 0 80 0 1").unwrap();
        assert_eq!(res.kind, ResultKind::Error);
        assert_eq!(res.message, "i2c: nack\nretrying");
        assert_eq!(res.notes.len(), 2);

        let mut transport = ScriptedTransport::new()
            .reply("boot")
            .reply(r#"{"msg":"done","result":"Success"}"#);
        let res = exchange(&mut transport, "x").unwrap();
        assert_eq!(res.message, "done");
        assert_eq!(res.notes, vec!["boot"]);
    }

    #[test]
    fn test_plain_success_message() {
        let mut transport = ScriptedTransport::new().reply(r#"{"result":"Success"}"#);
        let res = exchange(&mut transport, "x").unwrap();
        assert_eq!(res.message, "Success");
        assert!(res.notes.is_empty());
    }

    #[test]
    fn test_json_to_data_variants() {
        assert_eq!(json_to_data(json!(null)), None);
        assert_eq!(json_to_data(json!(7)), Some(Data::Integer(7)));
        assert_eq!(
            json_to_data(json!(["a", -1])),
            Some(Data::Values(vec![Value::Literal("a".into()), Value::Int(-1)]))
        );
        assert_eq!(
            json_to_data(json!({"k": 1})),
            Some(Data::Json(json!({"k": 1})))
        );
        assert_eq!(json_to_data(json!("ok")), Some(Data::Text("ok".into())));
    }

    #[test]
    fn test_unknown_result_value_is_error() {
        let mut record = Map::new();
        record.insert("result".into(), json!("Weird"));
        let res = into_result(record, "cmd", Vec::new());
        assert_eq!(res.kind, ResultKind::Error);
    }
}
