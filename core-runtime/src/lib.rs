//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the media core:
//! - Logging and tracing infrastructure
//! - Configuration management and backend profile selection
//! - Event bus system

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
