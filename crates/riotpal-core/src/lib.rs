//! riotpal-core - Protocol abstraction for RIOT test devices
//!
//! This crate talks to test firmware over any line-oriented [`Transport`].
//! It provides:
//!
//! - response parsers for the three reply conventions used by RIOT test
//!   firmware ([`Protocol`])
//! - a register map loaded from a CSV memory map ([`RegisterTable`])
//! - a register engine that reads and writes named registers, bit fields
//!   and arrays ([`RegisterAccess`])
//! - a generic named-command dispatcher ([`CommandDispatch`])
//!
//! # Example
//!
//! ```no_run
//! use riotpal_core::{RegisterAccess, RegisterTable, Transport};
//!
//! fn dump_sys<T: Transport>(transport: T) -> riotpal_core::Result<()> {
//!     let table = RegisterTable::from_csv_file("mem_map.csv")?;
//!     let mut regs = RegisterAccess::new(transport, table);
//!     for res in regs.read_struct("sys")? {
//!         println!("{}: {:?}", res.message, res.data);
//!     }
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod dispatch;
pub mod errno;
pub mod error;
pub mod number;
pub mod protocol;
pub mod result;
pub mod table;
pub mod transport;

// Re-exports
pub use access::{DefaultCheck, RegisterAccess, WriteData};
pub use dispatch::CommandDispatch;
pub use error::{Error, Result};
pub use protocol::Protocol;
pub use result::{CommandResult, Data, ResultKind, Value};
pub use table::{AddressMode, BitField, RegisterDescriptor, RegisterTable};
pub use transport::Transport;
