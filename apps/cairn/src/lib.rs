//! # Cairn
//!
//! Command-line front end for `cairn-core`: configuration, the data
//! directory layout, and the subcommands.

pub mod cli;
pub mod config;
