//! Terminal client for the cyberfarm script runner

pub mod args;
pub mod config;
pub mod runner;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
