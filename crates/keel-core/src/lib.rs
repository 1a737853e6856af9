//! # keel-core
//!
//! Core library for Keel providing:
//! - Hierarchical configuration loading (`keel.yaml`)
//! - The release matrix data model shared by resolver and runner
//! - Dotted numeric engine versions
//! - Policy-driven retry for remote lookups

pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod version;

pub use config::ConfigLoader;
pub use error::{Error, Result};
pub use types::KeelConfig;
pub use version::EngineVersion;
