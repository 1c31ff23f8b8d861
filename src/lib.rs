//! Command-line front end for the Wayfinder execution core.

pub mod cli;
pub mod config;

pub use config::EngineConfig;
