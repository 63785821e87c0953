//! Subburn Common Utilities
//!
//! Shared infrastructure for all Subburn crates:
//! - Error types, render stages, and result aliases
//! - Frame clock and wall clock utilities
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod stage;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use stage::*;
