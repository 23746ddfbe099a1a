//! Named command and port listing implementations

use riotpal_core::{CommandDispatch, Protocol, Transport};

use super::report;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Send one raw command line and print the parsed reply
pub fn run_send<T: Transport>(transport: T, protocol: Protocol, command: &[String]) -> CmdResult {
    let mut dispatch = CommandDispatch::new(transport, protocol);
    let res = dispatch.send(&command.join(" "))?;
    dispatch.close()?;
    report(&res)
}

/// Print the commands the device advertises
pub fn run_command_list<T: Transport>(transport: T, protocol: Protocol) -> CmdResult {
    let mut dispatch = CommandDispatch::new(transport, protocol);
    let names = dispatch.command_list()?;
    dispatch.close()?;

    if names.is_empty() {
        return Err("Device did not report any commands".into());
    }
    println!("Device commands:");
    println!();
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

/// List serial ports that can be opened
#[cfg(feature = "serial")]
pub fn run_list_ports(template: &riotpal_serial::SerialConfig) -> CmdResult {
    let registry = riotpal_serial::PortRegistry::new();
    let configs = riotpal_serial::available_configs(&registry, template)?;

    if configs.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    println!("Available serial ports:");
    println!();
    for config in configs {
        println!("  dev={}:{}", config.port, config.baud_rate);
    }
    Ok(())
}

#[cfg(not(feature = "serial"))]
pub fn run_list_ports() -> CmdResult {
    Err("Built without serial port support".into())
}
