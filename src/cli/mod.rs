//! Command-line interface

pub mod args;
pub mod commands;
pub mod interrupt;

pub use args::{Cli, Commands};
