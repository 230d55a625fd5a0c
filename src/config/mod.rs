//! Configuration module for ImageFerry
//!
//! Provides configuration management including CLI arguments,
//! the JSON endpoint configuration file, and validation.

mod settings;

pub use settings::*;
