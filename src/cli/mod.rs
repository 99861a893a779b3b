//! CLI module for gridsql
//!
//! Provides command-line interface for:
//! - run: Execute a plan over an in-process cluster
//! - explain: Validate and print a plan's projection chains

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{execute, explain, explain_plan, load_config, run, run_command, run_plan};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{value_from_json, value_to_json, write_response, NodeInput};
