//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the server's TOML file, writes it back,
//! and supplies defaults when no file exists yet.

pub mod config;
