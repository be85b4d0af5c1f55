//! Command implementations for the CLI
//!
//! - start: Run the exporter
//! - test: Validate configuration and database connectivity
//! - config: Configuration display

pub mod config;
pub mod start;
pub mod test;
