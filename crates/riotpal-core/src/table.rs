//! Register table (memory map) loading
//!
//! A memory map is a comma-separated file with a header row. Cells may be
//! quoted with single quotes:
//!
//! ```text
//! name,offset,type_size,total_size,bits,bit_offset,flag,default,description
//! sys.sn,0,4,12,,,DEVICE_SPECIFIC,,'serial number, 3 words'
//! sys.fw_rev,12,4,,,,,0x00010000,firmware revision
//! sys.mode.init,16,1,,1,0,,0,init bit
//! ```
//!
//! Rows are validated into [`RegisterDescriptor`] values once, when the table
//! is loaded. Extra columns are ignored. If a name appears twice the later
//! row wins but keeps the position of the first.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::number::parse_u64;

/// Columns every memory map must provide
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "name",
    "offset",
    "type_size",
    "total_size",
    "bits",
    "bit_offset",
    "flag",
    "default",
];

/// Flag marking registers whose contents differ between devices
pub const DEVICE_SPECIFIC: &str = "DEVICE_SPECIFIC";

/// A sub-byte field inside a register's covering bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    /// Position of the least significant bit of the field
    pub offset: u32,
    /// Number of bits
    pub width: u32,
}

impl BitField {
    /// Number of bytes that must be read to cover the field
    ///
    /// `(width - 1 + offset) / 8 + 1`, rounding down: a byte-aligned 8-bit
    /// field spans one byte.
    pub fn span(&self) -> usize {
        (self.width.saturating_sub(1).saturating_add(self.offset) / 8 + 1) as usize
    }
}

/// How a register is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// Sub-byte field
    BitField(BitField),
    /// Sequence of equally sized elements
    Array {
        /// Bytes per element
        element_size: usize,
        /// Number of elements in the whole register
        count: usize,
    },
    /// Single value of `size` bytes
    Scalar {
        /// Size in bytes
        size: usize,
    },
}

/// One register of the memory map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDescriptor {
    /// Unique register name
    pub name: String,
    /// Byte address of the register
    pub offset: u32,
    /// Bytes per element
    pub element_size: usize,
    /// Bytes spanned by the whole register
    pub total_size: usize,
    /// Bit-field position, if this is a sub-byte field
    pub bit_field: Option<BitField>,
    /// Free-form tags
    pub flags: BTreeSet<String>,
    /// Expected value after reset, verbatim from the table
    pub default_value: Option<String>,
}

impl RegisterDescriptor {
    /// Scalar register of `size` bytes at `offset`
    pub fn scalar(name: &str, offset: u32, size: usize) -> Self {
        Self {
            name: name.to_string(),
            offset,
            element_size: size,
            total_size: size,
            bit_field: None,
            flags: BTreeSet::new(),
            default_value: None,
        }
    }

    /// Array register of `count` elements of `element_size` bytes at `offset`
    pub fn array(name: &str, offset: u32, element_size: usize, count: usize) -> Self {
        Self {
            total_size: element_size * count,
            ..Self::scalar(name, offset, element_size)
        }
    }

    /// Bit field of `width` bits starting at bit `bit_offset` of byte `offset`
    pub fn bits(name: &str, offset: u32, bit_offset: u32, width: u32) -> Self {
        let field = BitField {
            offset: bit_offset,
            width,
        };
        Self {
            bit_field: Some(field),
            ..Self::scalar(name, offset, field.span())
        }
    }

    /// Addressing mode; bit field takes priority over array over scalar
    pub fn mode(&self) -> AddressMode {
        if let Some(field) = self.bit_field {
            AddressMode::BitField(field)
        } else if self.element_size != 0 && self.total_size != self.element_size {
            AddressMode::Array {
                element_size: self.element_size,
                count: self.total_size / self.element_size,
            }
        } else {
            AddressMode::Scalar {
                size: self.total_size,
            }
        }
    }

    /// Whether the register carries `flag`
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

/// Row as it appears in the file, before validation
#[derive(Debug, Deserialize)]
struct RawRow {
    name: String,
    offset: String,
    type_size: String,
    total_size: String,
    bits: String,
    bit_offset: String,
    flag: String,
    #[serde(rename = "default")]
    default_value: String,
}

impl RawRow {
    fn into_descriptor(self, row: usize) -> Result<RegisterDescriptor> {
        let invalid = |column: &'static str, value: &str| Error::InvalidRow {
            row,
            column,
            value: value.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("name", &self.name));
        }

        let offset = parse_u64(&self.offset)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| invalid("offset", &self.offset))?;

        let element_size = parse_size(&self.type_size).ok_or_else(|| invalid("type_size", &self.type_size))?;

        let total_size = if self.total_size.is_empty() {
            element_size
        } else {
            parse_size(&self.total_size).ok_or_else(|| invalid("total_size", &self.total_size))?
        };

        let bit_field = if self.bits.is_empty() {
            None
        } else {
            let width = parse_u64(&self.bits)
                .filter(|w| (1..=64).contains(w))
                .ok_or_else(|| invalid("bits", &self.bits))? as u32;
            let bit_offset = if self.bit_offset.is_empty() {
                0
            } else {
                parse_u64(&self.bit_offset)
                    .filter(|o| o + u64::from(width) <= 64)
                    .ok_or_else(|| invalid("bit_offset", &self.bit_offset))? as u32
            };
            Some(BitField {
                offset: bit_offset,
                width,
            })
        };

        let flags = self
            .flag
            .split(|c: char| c.is_whitespace() || c == '|' || c == ';')
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        let default_value = if self.default_value.is_empty() {
            None
        } else {
            Some(self.default_value)
        };

        Ok(RegisterDescriptor {
            name: self.name,
            offset,
            element_size,
            total_size,
            bit_field,
            flags,
            default_value,
        })
    }
}

fn parse_size(s: &str) -> Option<usize> {
    parse_u64(s)
        .filter(|&v| v > 0)
        .and_then(|v| usize::try_from(v).ok())
}

/// Immutable name → descriptor mapping, in source row order
#[derive(Debug, Clone, Default)]
pub struct RegisterTable {
    entries: Vec<RegisterDescriptor>,
    index: HashMap<String, usize>,
}

impl RegisterTable {
    /// Build a table from descriptors; later duplicates replace earlier ones
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = RegisterDescriptor>) -> Self {
        let mut table = Self::default();
        for descriptor in descriptors {
            table.insert(descriptor);
        }
        table
    }

    fn insert(&mut self, descriptor: RegisterDescriptor) {
        match self.index.get(&descriptor.name) {
            Some(&pos) => {
                log::warn!(
                    "Duplicate register '{}', later definition replaces earlier one",
                    descriptor.name
                );
                self.entries[pos] = descriptor;
            }
            None => {
                self.index.insert(descriptor.name.clone(), self.entries.len());
                self.entries.push(descriptor);
            }
        }
    }

    /// Load a memory map file
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading memory map {}", path.display());
        Self::from_reader(File::open(path)?)
    }

    /// Parse a memory map from a string
    pub fn from_csv_str(content: &str) -> Result<Self> {
        Self::from_reader(content.as_bytes())
    }

    /// Parse a memory map from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .quote(b'\'')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if let Some(&missing) = REQUIRED_COLUMNS
            .iter()
            .find(|&&column| !headers.iter().any(|h| h == column))
        {
            return Err(Error::MissingColumn(missing));
        }

        let mut table = Self::default();
        for (i, row) in reader.deserialize::<RawRow>().enumerate() {
            let descriptor = row?.into_descriptor(i + 1)?;
            log::debug!("Imported register: {:?}", descriptor);
            table.insert(descriptor);
        }
        log::debug!("Imported {} registers", table.len());
        Ok(table)
    }

    /// Look up a register
    pub fn get(&self, name: &str) -> Option<&RegisterDescriptor> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    /// Look up a register, failing with [`Error::NotFound`]
    pub fn lookup(&self, name: &str) -> Result<&RegisterDescriptor> {
        self.get(name).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// All registers in table order
    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.entries.iter()
    }

    /// Registers whose name starts with `prefix`, in table order
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a RegisterDescriptor> {
        self.entries.iter().filter(move |d| d.name.starts_with(prefix))
    }

    /// Number of registers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = "\
name,offset,type_size,total_size,bits,bit_offset,flag,default,description
sys.sn,0,4,12,,,DEVICE_SPECIFIC,,'serial number, 3 words'
sys.fw_rev,12,4,,,,,0x00010000,firmware revision
sys.mode.init,16,1,,1,0,,0,init bit
sys.mode.dut_rst,16,1,,1,1,,1,reset bit
user_reg.64,100,1,8,,,,,user area
i2c.r_count,200,2,2,,,,0,read count
";

    #[test]
    fn test_load_modes() {
        let table = RegisterTable::from_csv_str(MAP).unwrap();
        assert_eq!(table.len(), 6);

        let sn = table.get("sys.sn").unwrap();
        assert_eq!(
            sn.mode(),
            AddressMode::Array {
                element_size: 4,
                count: 3
            }
        );
        assert!(sn.has_flag(DEVICE_SPECIFIC));
        assert_eq!(sn.default_value, None);

        let rev = table.get("sys.fw_rev").unwrap();
        assert_eq!(rev.mode(), AddressMode::Scalar { size: 4 });
        assert_eq!(rev.default_value.as_deref(), Some("0x00010000"));

        let rst = table.get("sys.mode.dut_rst").unwrap();
        assert_eq!(
            rst.mode(),
            AddressMode::BitField(BitField {
                offset: 1,
                width: 1
            })
        );

        let count = table.get("i2c.r_count").unwrap();
        assert_eq!(count.mode(), AddressMode::Scalar { size: 2 });
    }

    #[test]
    fn test_table_order_and_prefix() {
        let table = RegisterTable::from_csv_str(MAP).unwrap();
        let names: Vec<_> = table.with_prefix("sys.mode").map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["sys.mode.init", "sys.mode.dut_rst"]);
        assert_eq!(table.with_prefix("SYS").count(), 0);
    }

    #[test]
    fn test_missing_column() {
        let csv = "name,offset,type_size,total_size,bits,bit_offset,flag\nx,0,1,,,,\n";
        let err = RegisterTable::from_csv_str(csv).unwrap_err();
        assert!(matches!(err, Error::MissingColumn("default")));
    }

    #[test]
    fn test_invalid_cell_reports_row() {
        let csv = "name,offset,type_size,total_size,bits,bit_offset,flag,default\n\
                   a,0,1,,,,,\n\
                   b,zero,1,,,,,\n";
        let err = RegisterTable::from_csv_str(csv).unwrap_err();
        match err {
            Error::InvalidRow { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "offset");
                assert_eq!(value, "zero");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bit_field_bounds() {
        let csv = "name,offset,type_size,total_size,bits,bit_offset,flag,default\n\
                   a,0,1,,60,8,,\n";
        assert!(matches!(
            RegisterTable::from_csv_str(csv),
            Err(Error::InvalidRow {
                column: "bit_offset",
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_last_wins_in_place() {
        let csv = "name,offset,type_size,total_size,bits,bit_offset,flag,default\n\
                   a,0,1,,,,,\n\
                   b,1,1,,,,,\n\
                   a,7,2,,,,,\n";
        let table = RegisterTable::from_csv_str(csv).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a").unwrap().offset, 7);
        let names: Vec<_> = table.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_lookup_not_found() {
        let table = RegisterTable::from_csv_str(MAP).unwrap();
        assert!(matches!(table.lookup("nope"), Err(Error::NotFound(n)) if n == "nope"));
    }

    #[test]
    fn test_bit_span() {
        assert_eq!(BitField { offset: 0, width: 1 }.span(), 1);
        assert_eq!(BitField { offset: 7, width: 2 }.span(), 2);
        assert_eq!(BitField { offset: 4, width: 12 }.span(), 2);
        assert_eq!(BitField { offset: 0, width: 64 }.span(), 8);
        assert_eq!(BitField { offset: 0, width: 8 }.span(), 1);
        assert_eq!(BitField { offset: 1, width: 8 }.span(), 2);
        assert_eq!(BitField { offset: 0, width: 16 }.span(), 2);
    }

    #[test]
    fn test_zero_width_span() {
        assert_eq!(BitField { offset: 0, width: 0 }.span(), 1);
        assert_eq!(BitField { offset: 9, width: 0 }.span(), 2);
        let reg = RegisterDescriptor::bits("empty", 4, 3, 0);
        assert_eq!(reg.total_size, 1);
    }

    #[test]
    fn test_descriptor_builders() {
        let reg = RegisterDescriptor::array("user_reg.64", 100, 1, 8);
        assert_eq!(reg.total_size, 8);
        let bits = RegisterDescriptor::bits("b", 3, 6, 4);
        assert_eq!(bits.total_size, 2);
        assert!(matches!(bits.mode(), AddressMode::BitField(_)));
    }
}
