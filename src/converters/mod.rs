//! Format converters
//!
//! This module contains converters from LMMS projects to other formats.

pub mod mmp_to_midi;

// Re-export for convenience
pub use mmp_to_midi::{mmp_to_midi, MmpError};
