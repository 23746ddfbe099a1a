//! Command results
//!
//! Every public register or command operation returns a [`CommandResult`].
//! A result is always terminal: it is a success, a device-reported error, or
//! a timeout. Timeouts never carry data; errors carry the device's raw
//! numeric error code when one could be decoded.

use serde::Serialize;

/// Terminal outcome of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultKind {
    /// The device acknowledged the command
    Success,
    /// The device reported an error, or its reply could not be decoded
    Error,
    /// No terminal reply arrived before the read timeout
    Timeout,
}

impl ResultKind {
    /// Name as used on the wire by the structured-record protocol
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
            Self::Timeout => "Timeout",
        }
    }
}

impl core::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a bracketed line-transcript list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Element parsed as an integer literal
    Int(i64),
    /// Element kept verbatim
    Literal(String),
}

/// Payload of a result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Data {
    /// A single integer (scalar reads, bit-field reads, device error codes)
    Integer(u64),
    /// Decoded array elements, in element order
    Integers(Vec<u64>),
    /// Raw bytes in little-endian (ascending address) order
    Bytes(Vec<u8>),
    /// Line-transcript list elements, or a signed register payload
    Values(Vec<Value>),
    /// Undecoded payload tokens
    Strings(Vec<String>),
    /// A single undecoded token
    Text(String),
    /// Structured-record payload that has no narrower representation
    Json(serde_json::Value),
}

impl Data {
    /// Interpret the payload as one unsigned integer
    ///
    /// Byte sequences of up to eight bytes are composed little-endian.
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Bytes(bytes) if bytes.len() <= 8 => Some(le_to_u64(bytes)),
            Self::Integers(values) if values.len() == 1 => Some(values[0]),
            Self::Values(values) if values.len() == 1 => match values[0] {
                Value::Int(v) => u64::try_from(v).ok(),
                Value::Literal(_) => None,
            },
            _ => None,
        }
    }

    /// Interpret the payload as a list of unsigned integers
    pub fn as_integers(&self) -> Option<Vec<u64>> {
        match self {
            Self::Integer(v) => Some(vec![*v]),
            Self::Integers(values) => Some(values.clone()),
            Self::Bytes(bytes) => Some(bytes.iter().map(|&b| u64::from(b)).collect()),
            Self::Values(values) => values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => u64::try_from(*i).ok(),
                    Value::Literal(_) => None,
                })
                .collect(),
            _ => None,
        }
    }
}

/// Compose up to eight little-endian bytes into an integer
pub(crate) fn le_to_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Outcome of one command exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    /// The command as sent, or as echoed back by the device
    pub command: String,
    /// Terminal outcome
    pub kind: ResultKind,
    /// Human-readable description of the outcome
    pub message: String,
    /// Decoded payload, if any
    pub data: Option<Data>,
    /// Reply lines that could not be decoded, in arrival order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl CommandResult {
    /// Successful result
    pub fn success(command: impl Into<String>, message: impl Into<String>, data: Option<Data>) -> Self {
        Self {
            command: command.into(),
            kind: ResultKind::Success,
            message: message.into(),
            data,
            notes: Vec::new(),
        }
    }

    /// Device error result
    pub fn error(command: impl Into<String>, message: impl Into<String>, data: Option<Data>) -> Self {
        Self {
            command: command.into(),
            kind: ResultKind::Error,
            message: message.into(),
            data,
            notes: Vec::new(),
        }
    }

    /// Timeout result (never carries data)
    pub fn timeout(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            kind: ResultKind::Timeout,
            message: "Timeout occurred".to_string(),
            data: None,
            notes: Vec::new(),
        }
    }

    /// Whether the device acknowledged the command
    pub fn is_success(&self) -> bool {
        self.kind == ResultKind::Success
    }

    /// Whether the exchange timed out
    pub fn is_timeout(&self) -> bool {
        self.kind == ResultKind::Timeout
    }

    /// Payload as one integer, see [`Data::as_integer`]
    pub fn data_as_integer(&self) -> Option<u64> {
        self.data.as_ref().and_then(Data::as_integer)
    }

    /// Payload as a list of integers, see [`Data::as_integers`]
    pub fn data_as_integers(&self) -> Option<Vec<u64>> {
        self.data.as_ref().and_then(Data::as_integers)
    }
}
