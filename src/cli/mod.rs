//! Command-line interface
//!
//! - serve: run the HTTP API over an in-memory store
//! - explain: print the SQL a query compiles to

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{explain, run, run_command, serve, Explained, QueryInput};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_response, write_stdout};
