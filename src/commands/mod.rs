//! CLI command implementations
//!
//! Register commands work on a [`RegisterAccess`](riotpal_core::RegisterAccess)
//! over any transport; device commands send named commands through a
//! [`CommandDispatch`](riotpal_core::CommandDispatch).

mod device;
mod registers;

pub use device::{run_command_list, run_list_ports, run_send};
pub use registers::{
    run_dump, run_execute, run_read, run_reset, run_struct, run_verify, run_write,
};

use riotpal_core::{CommandResult, ResultKind};

/// A device operation did not succeed
#[derive(Debug, thiserror::Error)]
#[error("{command}: {kind} ({message})")]
pub struct CommandFailed {
    /// Command as sent or echoed
    pub command: String,
    /// Outcome reported by the device
    pub kind: ResultKind,
    /// Device message
    pub message: String,
}

/// Print a result as JSON and turn a failure into an error
pub fn report(res: &CommandResult) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(res)?);
    if res.is_success() {
        Ok(())
    } else {
        Err(CommandFailed {
            command: res.command.clone(),
            kind: res.kind,
            message: res.message.clone(),
        }
        .into())
    }
}
