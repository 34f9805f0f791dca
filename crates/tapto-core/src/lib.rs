//! Core value types shared by the Tapto reader daemon.
//!
//! Tokens, scan events and device specifications live here so that the
//! hardware drivers and the daemon agree on a single vocabulary.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
