//! dronelink CLI library
//!
//! Command-line front end for a drone remote-control session: argument
//! parsing, layered configuration, the console line parser and the command
//! handlers shared by the `dronelink` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::{CommandDispatcher, Flow};
pub use config::{AppConfig, CliConfig, ConfigOverrides};
pub use console::{parse_console_line, ConsoleInput};
pub use error::{CliError, Result};
