//! Register command implementations

use indicatif::{ProgressBar, ProgressStyle};
use riotpal_core::{CommandResult, RegisterAccess, Transport, WriteData};

use super::{report, CommandFailed};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Read one register, or a window of an array register
pub fn run_read<T: Transport>(
    regs: &mut RegisterAccess<T>,
    name: &str,
    offset: usize,
    count: Option<usize>,
) -> CmdResult {
    let res = regs.read_register(name, offset, count)?;
    report(&res)
}

/// Write one register
///
/// A single value is written as an integer. Several values are written as
/// consecutive array elements, or as bytes (most significant first) when the
/// register is a scalar.
pub fn run_write<T: Transport>(
    regs: &mut RegisterAccess<T>,
    name: &str,
    values: Vec<u64>,
    offset: usize,
) -> CmdResult {
    let data = match values.as_slice() {
        [value] => WriteData::Integer(*value),
        _ => WriteData::Elements(values),
    };
    let res = regs.write_register(name, data, offset)?;
    report(&res)
}

fn report_all(results: &[CommandResult]) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(results)?);
    match results.iter().find(|r| !r.is_success()) {
        Some(res) => Err(CommandFailed {
            command: res.command.clone(),
            kind: res.kind,
            message: res.message.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Read every register under a name prefix
pub fn run_struct<T: Transport>(regs: &mut RegisterAccess<T>, prefix: &str) -> CmdResult {
    let results = regs.read_struct(prefix)?;
    if results.is_empty() {
        return Err(format!("No registers start with '{}'", prefix).into());
    }
    report_all(&results)
}

/// Read every register in the map with a progress bar
pub fn run_dump<T: Transport>(regs: &mut RegisterAccess<T>) -> CmdResult {
    let names: Vec<String> = regs.table().iter().map(|d| d.name.clone()).collect();

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut results = Vec::with_capacity(names.len());
    for name in &names {
        pb.set_message(name.clone());
        results.push(regs.read_register(name, 0, None)?);
        pb.inc(1);
    }
    pb.finish_with_message("Dump complete");

    let timeouts = results.iter().filter(|r| r.is_timeout()).count();
    if timeouts > 0 {
        log::warn!("{} of {} register reads timed out", timeouts, results.len());
    }
    report_all(&results)
}

/// Compare every register that has a default with the device
pub fn run_verify<T: Transport>(regs: &mut RegisterAccess<T>) -> CmdResult {
    let checks = regs.verify_defaults()?;

    println!("{:<32} {:>20} {:>20}  {}", "Register", "Default", "Read", "Status");
    println!("{}", "-".repeat(84));
    for check in &checks {
        let read = match &check.result.data {
            Some(data) => serde_json::to_string(data)?,
            None => check.result.kind.to_string(),
        };
        println!(
            "{:<32} {:>20} {:>20}  {}",
            check.name,
            check.expected,
            read,
            if check.matches { "OK" } else { "MISMATCH" }
        );
    }

    let mismatches = checks.iter().filter(|c| !c.matches).count();
    println!();
    println!("{} register(s) checked, {} mismatch(es)", checks.len(), mismatches);
    if mismatches > 0 {
        return Err(format!("{} register(s) differ from their defaults", mismatches).into());
    }
    Ok(())
}

/// Apply pending configuration changes
pub fn run_execute<T: Transport>(regs: &mut RegisterAccess<T>) -> CmdResult {
    let res = regs.execute_changes()?;
    report(&res)
}

/// Reset the device
pub fn run_reset<T: Transport>(regs: &mut RegisterAccess<T>) -> CmdResult {
    let res = regs.reset_device()?;
    report(&res)
}
