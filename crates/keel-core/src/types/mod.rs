//! Type definitions shared across Keel crates

pub mod config_types;
pub mod matrix_types;

pub use config_types::*;
pub use matrix_types::*;
