//! External command execution
//!
//! Binlog capture, flashback, dump reseed and hook scripts are all
//! external processes. They share one contract: arguments are passed
//! without a shell, stdout and stderr are captured, only the exit status
//! decides success, and a timeout bounds every invocation.

mod command;
mod errors;
mod runner;

pub use command::{CommandOutput, CommandSpec};
pub use errors::{ExecError, ExecResult};
pub use runner::{CommandRunner, ProcessRunner};
