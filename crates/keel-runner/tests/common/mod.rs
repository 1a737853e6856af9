//! Common test infrastructure for keel-runner tests
//!
//! # Modules
//!
//! - `fake_runtime`: In-process `ContainerRuntime` with scripted behaviour
//! - `actions`: Scripted `TargetAction` implementations
//! - `targets`: Build target factories

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod actions;
pub mod fake_runtime;
pub mod targets;

pub use actions::*;
pub use fake_runtime::*;
pub use targets::*;
