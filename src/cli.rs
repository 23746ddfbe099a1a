//! CLI argument parsing

use clap::{Parser, Subcommand};
use riotpal_core::Protocol;
use std::path::PathBuf;

/// Parse a hex, octal, binary or decimal register value
fn parse_value(s: &str) -> Result<u64, String> {
    riotpal_core::number::parse_u64(s).ok_or_else(|| format!("Invalid number: {}", s))
}

#[derive(Parser)]
#[command(name = "riotpal")]
#[command(author, version, about = "Register and command access to RIOT test devices", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub connect: ConnectArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// How to reach the device
#[derive(clap::Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Connection string: dev=<path>[:<baud>] or ip=<host>:<port>
    #[arg(
        short,
        long,
        global = true,
        env = "RIOTPAL_PORT",
        default_value = "dev=/dev/ttyACM0"
    )]
    pub connection: String,

    /// Read timeout in milliseconds
    #[arg(long, global = true, env = "RIOTPAL_TIMEOUT_MS", default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Seconds to wait after opening the port
    #[arg(long, global = true, default_value_t = 0)]
    pub connect_wait: u64,

    /// Talk to the in-memory emulator instead of hardware
    #[arg(long, global = true)]
    pub dummy: bool,
}

/// Register map options shared across register commands
#[derive(clap::Args, Debug, Clone)]
pub struct MemMapArgs {
    /// Register map (CSV memory map)
    #[arg(short, long, env = "RIOTPAL_MEM_MAP")]
    pub mem_map: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List serial ports that are not in use
    ListPorts,

    /// Read a register
    Read {
        #[command(flatten)]
        map: MemMapArgs,

        /// Register name
        name: String,

        /// First array element to read
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Number of array elements to read (default: all)
        #[arg(long)]
        count: Option<usize>,
    },

    /// Write a register
    Write {
        #[command(flatten)]
        map: MemMapArgs,

        /// Register name
        name: String,

        /// Value, or one value per array element
        #[arg(required = true, value_parser = parse_value)]
        values: Vec<u64>,

        /// First array element to write
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Read every register whose name starts with a prefix
    Struct {
        #[command(flatten)]
        map: MemMapArgs,

        /// Register name prefix (e.g. "sys")
        prefix: String,
    },

    /// Read every register in the map
    Dump {
        #[command(flatten)]
        map: MemMapArgs,
    },

    /// Compare registers with their default values
    Verify {
        #[command(flatten)]
        map: MemMapArgs,
    },

    /// Apply pending configuration changes
    Execute,

    /// Reset the device
    Reset,

    /// Send a raw command line
    Send {
        /// Reply convention: transcript, record or register
        #[arg(long, default_value = "transcript")]
        protocol: Protocol,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// List the commands the device advertises
    Commands {
        /// Reply convention: transcript, record or register
        #[arg(long, default_value = "transcript")]
        protocol: Protocol,
    },
}
