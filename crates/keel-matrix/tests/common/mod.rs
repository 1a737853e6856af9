//! Common test infrastructure for keel-matrix tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `builders`: Fluent builders for upstream release records
//! - `fixtures`: Test configurations
//! - `mock_server`: Wiremock setup for the releases API and artifact downloads
//! - `sources`: In-process `UpstreamSource` fakes

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod fixtures;
pub mod mock_server;
pub mod sources;

pub use builders::*;
pub use fixtures::*;
pub use mock_server::*;
pub use sources::*;
