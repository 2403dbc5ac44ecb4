//! CLI command implementations

pub mod error;
pub mod ingest;

pub use error::CliError;
pub use ingest::{Cli, Commands, OutputFormat};
