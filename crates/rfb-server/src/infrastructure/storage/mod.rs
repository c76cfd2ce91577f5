//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the optional TOML file, fills in defaults
//! for anything it omits, checks the result and converts it into the engine's
//! own settings type.

pub mod config;
