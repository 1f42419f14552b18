//! Configuration module for the media helper
//!
//! Handles loading configuration from TOML files and environment variable overrides.

pub mod config;

pub use config::*;
