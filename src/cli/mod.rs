// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for the simulated overlay.
//!
//! This module contains argument parsing, console output, and the `simulate` command.

// Modules
/// CLI arguments.
pub mod args;

/// Console output macros and log setup.
pub mod logging;

/// Simulated session runner.
pub mod simulate;
