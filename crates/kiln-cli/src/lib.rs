//! Command-line front end for the kiln build pipeline.
//!
//! The binary lives in `main.rs`; everything it calls is exposed here so the
//! commands can be driven from tests.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
