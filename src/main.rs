//! riotpal - Register and command access to RIOT test devices
//!
//! Talks to RIOT test firmware over a serial port, a TCP serial bridge or
//! the in-memory emulator.
//!
//! # Architecture
//!
//! Every command opens one [`Transport`] and hands it to a facade:
//! - **Register commands** (read, write, struct, dump, verify, execute,
//!   reset) use a `RegisterAccess` driven by a CSV memory map
//! - **Device commands** (send, commands) use a `CommandDispatch` with the
//!   reply convention chosen on the command line

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, ConnectArgs, MemMapArgs};
use riotpal_core::{RegisterAccess, RegisterTable, Transport};

type BoxError = Box<dyn std::error::Error>;

fn main() -> Result<(), BoxError> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let connect = &cli.connect;
    match cli.command {
        Commands::ListPorts => list_ports(connect),
        Commands::Read {
            map,
            name,
            offset,
            count,
        } => {
            let mut regs = open_registers(connect, Some(&map))?;
            commands::run_read(&mut regs, &name, offset, count)
        }
        Commands::Write {
            map,
            name,
            values,
            offset,
        } => {
            let mut regs = open_registers(connect, Some(&map))?;
            commands::run_write(&mut regs, &name, values, offset)
        }
        Commands::Struct { map, prefix } => {
            let mut regs = open_registers(connect, Some(&map))?;
            commands::run_struct(&mut regs, &prefix)
        }
        Commands::Dump { map } => {
            let mut regs = open_registers(connect, Some(&map))?;
            commands::run_dump(&mut regs)
        }
        Commands::Verify { map } => {
            let mut regs = open_registers(connect, Some(&map))?;
            commands::run_verify(&mut regs)
        }
        Commands::Execute => {
            let mut regs = open_registers(connect, None)?;
            commands::run_execute(&mut regs)
        }
        Commands::Reset => {
            let mut regs = open_registers(connect, None)?;
            commands::run_reset(&mut regs)
        }
        Commands::Send { protocol, command } => {
            commands::run_send(open_transport(connect, None)?, protocol, &command)
        }
        Commands::Commands { protocol } => {
            commands::run_command_list(open_transport(connect, None)?, protocol)
        }
    }
}

/// Load the register map, or an empty one for commands that need none
fn load_table(map: Option<&MemMapArgs>) -> Result<RegisterTable, BoxError> {
    match map {
        Some(args) => {
            let table = RegisterTable::from_csv_file(&args.mem_map)?;
            log::info!("Loaded {} registers from {:?}", table.len(), args.mem_map);
            Ok(table)
        }
        None => Ok(RegisterTable::default()),
    }
}

fn open_registers(
    connect: &ConnectArgs,
    map: Option<&MemMapArgs>,
) -> Result<RegisterAccess<Box<dyn Transport>>, BoxError> {
    let table = load_table(map)?;
    let transport = open_transport(connect, Some(&table))?;
    Ok(RegisterAccess::new(transport, table))
}

/// Open the device selected on the command line
///
/// The emulator is pre-filled with the defaults of `table`, if given.
fn open_transport(
    connect: &ConnectArgs,
    table: Option<&RegisterTable>,
) -> Result<Box<dyn Transport>, BoxError> {
    if connect.dummy {
        return open_dummy(table);
    }
    open_hardware(connect)
}

#[cfg(feature = "dummy")]
fn open_dummy(table: Option<&RegisterTable>) -> Result<Box<dyn Transport>, BoxError> {
    use riotpal_dummy::{DummyConfig, DummyDevice};

    log::info!("Using in-memory emulator");
    let device = match table {
        Some(table) => DummyDevice::from_table(DummyConfig::default(), table),
        None => DummyDevice::new_default(),
    };
    Ok(Box::new(device))
}

#[cfg(not(feature = "dummy"))]
fn open_dummy(_table: Option<&RegisterTable>) -> Result<Box<dyn Transport>, BoxError> {
    Err("Built without emulator support".into())
}

#[cfg(feature = "serial")]
fn serial_template(connect: &ConnectArgs) -> riotpal_serial::SerialConfig {
    use std::time::Duration;

    riotpal_serial::SerialConfig::default()
        .with_timeout(Duration::from_millis(connect.timeout_ms))
        .with_connect_wait(Duration::from_secs(connect.connect_wait))
}

#[cfg(feature = "serial")]
fn open_hardware(connect: &ConnectArgs) -> Result<Box<dyn Transport>, BoxError> {
    let registry = riotpal_serial::PortRegistry::new();
    Ok(riotpal_serial::open_transport(
        &connect.connection,
        &serial_template(connect),
        &registry,
    )?)
}

#[cfg(not(feature = "serial"))]
fn open_hardware(_connect: &ConnectArgs) -> Result<Box<dyn Transport>, BoxError> {
    Err("Built without serial port support, use --dummy".into())
}

#[cfg(feature = "serial")]
fn list_ports(connect: &ConnectArgs) -> Result<(), BoxError> {
    commands::run_list_ports(&serial_template(connect))
}

#[cfg(not(feature = "serial"))]
fn list_ports(_connect: &ConnectArgs) -> Result<(), BoxError> {
    commands::run_list_ports()
}
