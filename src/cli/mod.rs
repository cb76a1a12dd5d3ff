//! Command-line front end.
pub mod args;
pub mod plugin;
pub mod render;
pub mod session;

pub use args::Cli;
pub use plugin::CliPlugin;
