//! Register access
//!
//! [`RegisterAccess`] turns register names from a [`RegisterTable`] into
//! `rr`/`wr` requests and decodes the replies. Registers are addressed in one
//! of three ways (see [`AddressMode`]):
//!
//! - bit fields are read-modify-written over the bytes that cover them
//! - arrays are addressed by element offset and count, and decoded into
//!   little-endian elements
//! - scalars are read and written whole
//!
//! The device stores multi-byte values little-endian. `wr` takes bytes in
//! ascending address order; `rr` answers with the covered bytes as one hex
//! number, most significant byte first.

use crate::error::{Error, Result};
use crate::number::parse_u64;
use crate::protocol::Protocol;
use crate::result::{le_to_u64, CommandResult, Data, ResultKind};
use crate::table::{AddressMode, BitField, RegisterTable, DEVICE_SPECIFIC};
use crate::transport::Transport;

/// Read bytes: `rr <address> <size>`
pub const READ_REG_CMD: &str = "rr";
/// Write bytes: `wr <address> <byte>...`
pub const WRITE_REG_CMD: &str = "wr";
/// Apply pending configuration changes
pub const EXECUTE_CMD: &str = "ex";
/// Reset the device
pub const RESET_CMD: &str = "mcu_rst";

/// Value written to a register
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteData {
    /// Unsigned integer, decomposed little-endian into the target size
    Integer(u64),
    /// Byte sequence, most significant byte first
    Bytes(Vec<u8>),
    /// Array elements, in element order
    Elements(Vec<u64>),
}

impl WriteData {
    /// The value as one integer, if it has a single-integer reading
    pub fn to_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Bytes(bytes) if bytes.len() <= 8 => {
                Some(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
            }
            Self::Elements(values) if values.len() == 1 => Some(values[0]),
            _ => None,
        }
    }

    /// Encode as little-endian bytes with `element_size` bytes per integer
    fn to_le_bytes(&self, element_size: usize) -> Vec<u8> {
        match self {
            Self::Integer(v) => le_bytes(*v, element_size),
            Self::Elements(values) => values
                .iter()
                .flat_map(|&v| le_bytes(v, element_size))
                .collect(),
            Self::Bytes(bytes) => bytes.iter().rev().copied().collect(),
        }
    }
}

impl From<u64> for WriteData {
    fn from(v: u64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for WriteData {
    fn from(v: u32) -> Self {
        Self::Integer(u64::from(v))
    }
}

impl From<u8> for WriteData {
    fn from(v: u8) -> Self {
        Self::Integer(u64::from(v))
    }
}

impl From<Vec<u64>> for WriteData {
    fn from(values: Vec<u64>) -> Self {
        Self::Elements(values)
    }
}

impl From<&[u64]> for WriteData {
    fn from(values: &[u64]) -> Self {
        Self::Elements(values.to_vec())
    }
}

fn le_bytes(value: u64, size: usize) -> Vec<u8> {
    if size < 8 && value >> (8 * size) != 0 {
        log::warn!("Value {:#x} truncated to {} byte(s)", value, size);
    }
    (0..size)
        .map(|i| if i < 8 { (value >> (8 * i)) as u8 } else { 0 })
        .collect()
}

fn bit_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn check_field(bit_offset: u32, width: u32) -> Result<BitField> {
    if width == 0 || bit_offset.checked_add(width).map_or(true, |end| end > 64) {
        return Err(Error::InvalidValue(format!(
            "bit field of {} bit(s) at offset {} does not fit in 64 bits",
            width, bit_offset
        )));
    }
    Ok(BitField {
        offset: bit_offset,
        width,
    })
}

/// Payload that was terminal but not what the operation needs
fn malformed(mut res: CommandResult, what: &str) -> CommandResult {
    log::warn!("Malformed response to '{}': {}", res.command, what);
    res.kind = ResultKind::Error;
    res.message = format!("Unknown Error {}", what);
    res
}

/// Split a byte payload into little-endian elements
fn decode_array(data: &Data, size: usize, element_size: usize) -> Option<Vec<u64>> {
    if element_size == 0 || element_size > 8 {
        return None;
    }
    let bytes: Vec<u8> = match data {
        Data::Integer(v) => v
            .to_le_bytes()
            .into_iter()
            .chain(std::iter::repeat(0))
            .take(size)
            .collect(),
        Data::Bytes(bytes) => bytes.clone(),
        _ => return None,
    };
    Some(bytes.chunks_exact(element_size).map(le_to_u64).collect())
}

/// Result of comparing a register with its default value
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultCheck {
    /// Register name
    pub name: String,
    /// Default value from the table
    pub expected: String,
    /// The read
    pub result: CommandResult,
    /// Whether the read value equals the default
    pub matches: bool,
}

/// Compare a read payload with a table default
///
/// Both sides are compared as integers when the default is an integer
/// literal, otherwise as text. An array matches when every element equals
/// the default.
fn weak_eq(data: Option<&Data>, expected: &str) -> bool {
    match (parse_u64(expected), data) {
        (Some(want), Some(Data::Integers(values))) => {
            !values.is_empty() && values.iter().all(|&v| v == want)
        }
        (Some(want), Some(data)) => data.as_integer() == Some(want),
        (None, Some(Data::Text(text))) => text == expected,
        (None, Some(Data::Strings(tokens))) => tokens.len() == 1 && tokens[0] == expected,
        _ => false,
    }
}

/// Register engine over a transport
///
/// Owns its transport; use [`RegisterAccess::into_transport`] to hand the
/// transport to another facade.
pub struct RegisterAccess<T: Transport> {
    transport: T,
    table: RegisterTable,
}

impl<T: Transport> RegisterAccess<T> {
    /// Create a register engine
    pub fn new(transport: T, table: RegisterTable) -> Self {
        Self { transport, table }
    }

    /// The register table
    pub fn table(&self) -> &RegisterTable {
        &self.table
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

    fn send_cmd(&mut self, command: &str) -> Result<CommandResult> {
        Protocol::RegisterExchange.exchange(&mut self.transport, command)
    }

    /// Read `size` bytes starting at `address`
    pub fn read_bytes(&mut self, address: u32, size: usize) -> Result<CommandResult> {
        log::debug!("read_bytes({}, {})", address, size);
        self.send_cmd(&format!("{} {} {}", READ_REG_CMD, address, size))
    }

    /// Write bytes starting at `address`
    ///
    /// An integer is decomposed into `size` little-endian bytes. A byte
    /// sequence or element list is taken most significant first and sent in
    /// reverse; `size` is ignored for those.
    pub fn write_bytes(
        &mut self,
        address: u32,
        data: impl Into<WriteData>,
        size: usize,
    ) -> Result<CommandResult> {
        let data = data.into();
        log::debug!("write_bytes({}, {:?})", address, data);

        let wire: Vec<u8> = match &data {
            WriteData::Integer(v) => le_bytes(*v, size),
            WriteData::Bytes(bytes) => bytes.iter().rev().copied().collect(),
            WriteData::Elements(values) => values
                .iter()
                .rev()
                .map(|&v| {
                    u8::try_from(v)
                        .map_err(|_| Error::InvalidValue(format!("{} is not a byte", v)))
                })
                .collect::<Result<_>>()?,
        };

        let mut cmd = format!("{} {}", WRITE_REG_CMD, address);
        for byte in wire {
            cmd.push_str(&format!(" {}", byte));
        }
        self.send_cmd(&cmd)
    }

    /// Read a `width`-bit field starting at bit `bit_offset` of `address`
    pub fn read_bits(&mut self, address: u32, bit_offset: u32, width: u32) -> Result<CommandResult> {
        let field = check_field(bit_offset, width)?;
        log::debug!("read_bits({}, {}, {})", address, bit_offset, width);

        let mut res = self.read_bytes(address, field.span())?;
        if res.is_success() {
            let Some(raw) = res.data_as_integer() else {
                return Ok(malformed(res, "bit field payload is not an integer"));
            };
            res.command = format!("{}, read_bits {} {} {}", res.command, address, bit_offset, width);
            res.data = Some(Data::Integer((raw >> bit_offset) & bit_mask(width)));
        }
        log::debug!("Bits: {:?}", res.data);
        Ok(res)
    }

    /// Replace a `width`-bit field starting at bit `bit_offset` of `address`
    ///
    /// The covering bytes are read, modified and written back. Nothing is
    /// written unless the read succeeds; a failed read is returned as is.
    pub fn write_bits(
        &mut self,
        address: u32,
        bit_offset: u32,
        width: u32,
        value: u64,
    ) -> Result<CommandResult> {
        let field = check_field(bit_offset, width)?;
        log::debug!("write_bits({}, {}, {}, {})", address, bit_offset, width, value);

        let span = field.span();
        let read = self.read_bytes(address, span)?;
        if !read.is_success() {
            return Ok(read);
        }
        let Some(current) = read.data_as_integer() else {
            return Ok(malformed(read, "bit field payload is not an integer"));
        };

        let mask = bit_mask(width) << bit_offset;
        let updated = (current & !mask) | ((value << bit_offset) & mask);

        let mut res = self.write_bytes(address, updated, span)?;
        let mut command = format!("{}, {}", read.command, res.command);
        if res.is_success() {
            command.push_str(&format!(
                ", write_bits {} {} {} {}",
                address, bit_offset, width, value
            ));
        }
        res.command = command;
        Ok(res)
    }

    fn element_address(base: u32, element_offset: usize, element_size: usize) -> Result<u32> {
        element_offset
            .checked_mul(element_size)
            .and_then(|off| u32::try_from(off).ok())
            .and_then(|off| base.checked_add(off))
            .ok_or_else(|| {
                Error::InvalidValue(format!("element offset {} out of range", element_offset))
            })
    }

    /// Read a register by name
    ///
    /// `element_offset` and `element_count` only apply to array registers;
    /// `None` reads every element.
    pub fn read_register(
        &mut self,
        name: &str,
        element_offset: usize,
        element_count: Option<usize>,
    ) -> Result<CommandResult> {
        let descriptor = self.table.lookup(name)?;
        let (base, mode) = (descriptor.offset, descriptor.mode());

        let mut res = match mode {
            AddressMode::BitField(field) => self.read_bits(base, field.offset, field.width)?,
            AddressMode::Array {
                element_size,
                count,
            } => {
                let address = Self::element_address(base, element_offset, element_size)?;
                let elements = element_count.unwrap_or(count);
                let size = elements.checked_mul(element_size).ok_or_else(|| {
                    Error::InvalidValue(format!("element count {} out of range", elements))
                })?;
                let mut res = self.read_bytes(address, size)?;
                if res.is_success() {
                    match res.data.as_ref().and_then(|d| decode_array(d, size, element_size)) {
                        Some(elements) => res.data = Some(Data::Integers(elements)),
                        None => log::debug!("Array payload left undecoded: {:?}", res.data),
                    }
                }
                res
            }
            AddressMode::Scalar { size } => self.read_bytes(base, size)?,
        };

        res.message = format!("cmd={} response={}", name, res.message);
        Ok(res)
    }

    /// Write a register by name
    ///
    /// `element_offset` only applies to array registers. Bit fields need a
    /// value with a single-integer reading. A byte sequence or element list
    /// written to a scalar is taken as bytes, most significant first, and
    /// may not be longer than the register.
    pub fn write_register(
        &mut self,
        name: &str,
        data: impl Into<WriteData>,
        element_offset: usize,
    ) -> Result<CommandResult> {
        let data = data.into();
        let descriptor = self.table.lookup(name)?;
        let (base, mode) = (descriptor.offset, descriptor.mode());

        let mut res = match mode {
            AddressMode::BitField(field) => {
                let value = data.to_integer().ok_or_else(|| {
                    Error::InvalidValue(format!("bit field {} needs a single integer", name))
                })?;
                self.write_bits(base, field.offset, field.width, value)?
            }
            AddressMode::Array { element_size, .. } => {
                let address = Self::element_address(base, element_offset, element_size)?;
                let mut bytes = data.to_le_bytes(element_size);
                bytes.reverse();
                let size = bytes.len();
                self.write_bytes(address, WriteData::Bytes(bytes), size)?
            }
            AddressMode::Scalar { size } => {
                let len = match &data {
                    WriteData::Integer(_) => size,
                    WriteData::Bytes(bytes) => bytes.len(),
                    WriteData::Elements(values) => values.len(),
                };
                if len > size {
                    return Err(Error::InvalidValue(format!(
                        "{} byte(s) do not fit register {} of {} byte(s)",
                        len, name, size
                    )));
                }
                self.write_bytes(base, data, size)?
            }
        };

        res.message = format!("cmd={} response={}", name, res.message);
        Ok(res)
    }

    /// Read every register whose name starts with `prefix`, in table order
    pub fn read_struct(&mut self, prefix: &str) -> Result<Vec<CommandResult>> {
        let names: Vec<String> = self
            .table
            .with_prefix(prefix)
            .map(|d| d.name.clone())
            .collect();
        names
            .iter()
            .map(|name| self.read_register(name, 0, None))
            .collect()
    }

    /// Apply pending configuration changes on the device
    pub fn execute_changes(&mut self) -> Result<CommandResult> {
        log::debug!("execute_changes");
        self.send_cmd(EXECUTE_CMD)
    }

    /// Reset the device
    pub fn reset_device(&mut self) -> Result<CommandResult> {
        log::debug!("reset_device");
        self.send_cmd(RESET_CMD)
    }

    /// Compare every register that has a default value with the device
    ///
    /// Registers flagged `DEVICE_SPECIFIC` are skipped.
    pub fn verify_defaults(&mut self) -> Result<Vec<DefaultCheck>> {
        let targets: Vec<(String, String)> = self
            .table
            .iter()
            .filter(|d| !d.has_flag(DEVICE_SPECIFIC))
            .filter_map(|d| d.default_value.clone().map(|v| (d.name.clone(), v)))
            .collect();

        let mut checks = Vec::with_capacity(targets.len());
        for (name, expected) in targets {
            let result = self.read_register(&name, 0, None)?;
            let matches = result.is_success() && weak_eq(result.data.as_ref(), &expected);
            if !matches {
                log::warn!(
                    "Register {} differs from default {}: {:?}",
                    name,
                    expected,
                    result.data
                );
            }
            checks.push(DefaultCheck {
                name,
                expected,
                result,
                matches,
            });
        }
        Ok(checks)
    }
}
