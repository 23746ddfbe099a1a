//! riotpal-dummy - In-memory register device emulator for testing
//!
//! This crate provides a dummy device that answers the register firmware's
//! `rr`/`wr`/`ex`/`mcu_rst` commands from a byte-addressed memory image. It
//! is useful for testing and development without real hardware.

use std::collections::VecDeque;

use riotpal_core::number::parse_u64;
use riotpal_core::{AddressMode, RegisterTable, Result, Transport};

/// Status for a malformed or unknown command
pub const EINVAL: u32 = 22;
/// Status for an access outside the memory image
pub const ERANGE: u32 = 34;

/// Commands answered by the emulator, as reported by `help`
pub const COMMANDS: [&str; 5] = ["rr", "wr", "ex", "mcu_rst", "help"];

/// Configuration for the dummy device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Memory image size in bytes
    pub size: usize,
    /// Initial value of every byte
    pub fill: u8,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self { size: 1024, fill: 0 }
    }
}

/// Dummy register device
///
/// Implements [`Transport`]: every line written is answered immediately and
/// the answer is returned by the next read.
pub struct DummyDevice {
    config: DummyConfig,
    data: Vec<u8>,
    replies: VecDeque<String>,
    requests: Vec<String>,
    silent: bool,
    executed: usize,
    resets: usize,
}

impl DummyDevice {
    /// Create a new dummy device with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![config.fill; config.size];
        Self {
            config,
            data,
            replies: VecDeque::new(),
            requests: Vec::new(),
            silent: false,
            executed: 0,
            resets: 0,
        }
    }

    /// Create a new dummy device with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy device with pre-filled memory
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut device = Self::new(config);
        let len = core::cmp::min(initial_data.len(), device.data.len());
        device.data[..len].copy_from_slice(&initial_data[..len]);
        device
    }

    /// Create a dummy device holding every integer default of `table`
    ///
    /// Defaults that are not integer literals, or that fall outside the
    /// memory image, are skipped.
    pub fn from_table(config: DummyConfig, table: &RegisterTable) -> Self {
        let mut device = Self::new(config);
        for descriptor in table.iter() {
            let Some(value) = descriptor.default_value.as_deref().and_then(parse_u64) else {
                continue;
            };
            let base = descriptor.offset as usize;
            match descriptor.mode() {
                AddressMode::BitField(field) => {
                    let span = field.span();
                    let Some(bytes) = device.data.get_mut(base..base + span) else {
                        continue;
                    };
                    let current = bytes
                        .iter()
                        .rev()
                        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
                    let width_mask = if field.width >= 64 {
                        u64::MAX
                    } else {
                        (1u64 << field.width) - 1
                    };
                    let mask = width_mask << field.offset;
                    let updated = (current & !mask) | ((value << field.offset) & mask);
                    for (i, byte) in bytes.iter_mut().enumerate() {
                        *byte = (updated >> (8 * i)) as u8;
                    }
                }
                AddressMode::Array {
                    element_size,
                    count,
                } => {
                    for element in 0..count {
                        device.store(base + element * element_size, value, element_size);
                    }
                }
                AddressMode::Scalar { size } => device.store(base, value, size),
            }
        }
        device
    }

    fn store(&mut self, address: usize, value: u64, size: usize) {
        if let Some(bytes) = self.data.get_mut(address..address + size) {
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = if i < 8 { (value >> (8 * i)) as u8 } else { 0 };
            }
        }
    }

    /// Get a reference to the memory image
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the memory image
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Stop answering; every read times out until switched back
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
        if silent {
            self.replies.clear();
        }
    }

    /// Every line written so far
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    /// Number of `ex` commands handled
    pub fn execute_count(&self) -> usize {
        self.executed
    }

    /// Number of `mcu_rst` commands handled
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    fn range(&self, address: u64, size: usize) -> Option<core::ops::Range<usize>> {
        let start = usize::try_from(address).ok()?;
        let end = start.checked_add(size)?;
        (end <= self.data.len()).then_some(start..end)
    }

    fn handle_read(&mut self, args: &[&str]) -> String {
        let (Some(address), Some(size)) = (
            args.first().and_then(|a| parse_u64(a)),
            args.get(1).and_then(|s| parse_u64(s)).and_then(|s| usize::try_from(s).ok()),
        ) else {
            return EINVAL.to_string();
        };
        if size == 0 || args.len() != 2 {
            return EINVAL.to_string();
        }
        let Some(range) = self.range(address, size) else {
            return ERANGE.to_string();
        };

        let mut reply = String::from("0,0x");
        for byte in self.data[range].iter().rev() {
            reply.push_str(&format!("{:02x}", byte));
        }
        reply
    }

    fn handle_write(&mut self, args: &[&str]) -> String {
        let Some(address) = args.first().and_then(|a| parse_u64(a)) else {
            return EINVAL.to_string();
        };
        let Some(bytes) = args[1..]
            .iter()
            .map(|b| parse_u64(b).and_then(|v| u8::try_from(v).ok()))
            .collect::<Option<Vec<u8>>>()
        else {
            return EINVAL.to_string();
        };
        if bytes.is_empty() {
            return EINVAL.to_string();
        }
        let Some(range) = self.range(address, bytes.len()) else {
            return ERANGE.to_string();
        };

        self.data[range].copy_from_slice(&bytes);
        "0".to_string()
    }

    fn handle(&mut self, line: &str) -> String {
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            return EINVAL.to_string();
        };
        let args: Vec<&str> = tokens.collect();

        match command {
            "rr" => self.handle_read(&args),
            "wr" => self.handle_write(&args),
            "ex" => {
                self.executed += 1;
                "0".to_string()
            }
            "mcu_rst" => {
                self.resets += 1;
                "\u{0}0".to_string()
            }
            "help" => format!("0,{}", COMMANDS.join(",")),
            _ => EINVAL.to_string(),
        }
    }
}

impl Transport for DummyDevice {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self.requests.push(line.to_string());
        if self.silent {
            log::debug!("dummy: ignoring '{}'", line);
            return Ok(());
        }
        let reply = self.handle(line);
        log::debug!("dummy: '{}' -> '{}'", line, reply.escape_debug());
        self.replies.push_back(reply);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if self.silent {
            return Ok(None);
        }
        Ok(self.replies.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.replies.clear();
        Ok(())
    }
}
