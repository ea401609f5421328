mod bootstrap;
mod commands;
mod level_file;

pub(crate) use bootstrap::{init_tracing, PlaytestConfig};
pub(crate) use commands::{any_failed, execute, Command};
