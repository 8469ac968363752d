//! Tamarin arbitrary instance generation library.
//!
//! This is the main entry point for Tamarin, re-exporting the generation
//! engine and, with the `derive` feature, `#[derive(Reflect)]`.

pub use tamarin_core::*;

// Re-export derive macros when available
#[cfg(feature = "derive")]
pub use tamarin_derive::*;
