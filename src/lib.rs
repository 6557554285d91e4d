//! Workspace entry crate.
//!
//! Re-exports the [`core_service`] façade so hosts can depend on
//! `boujee-media-workspace` alone and toggle the `desktop-shims` feature
//! here instead of on each crate.

pub use core_service::*;
