//! Testbed Core
//!
//! Core domain types and error handling for the Testbed build farm.
//! Defines the platform catalog, typed build attributes, and the resolved
//! `Build` every other crate passes around.

pub mod attributes;
pub mod build;
pub mod env;
pub mod error;
pub mod platform;

pub use attributes::{BuildAttributes, Requirement};
pub use build::{Build, DEFAULT_TIMEOUT_SECS};
pub use env::EnvSnapshot;
pub use error::{Error, Result};
pub use platform::{Arch, Catalog, Platform};
