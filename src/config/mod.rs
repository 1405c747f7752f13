//! User configuration

pub mod config;

pub use config::{Config, Defaults, ReporterConfig};
