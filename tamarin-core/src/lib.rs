//! Core functionality for Tamarin arbitrary instance generation.
//!
//! This crate provides the generation engine: type reflection, property
//! trees, constraint resolution, combinable arbitraries, path expressions,
//! manipulations and the sampling pipeline that ties them together.

pub mod arbitrary;
pub mod builder;
pub mod constraint;
pub mod data;
pub mod engine;
pub mod error;
pub mod generator;
pub mod introspector;
pub mod manipulation;
pub mod node;
pub mod orchestrator;
pub mod path;
pub mod property;
pub mod reflect;
pub mod value;

// Re-export the main types
pub use arbitrary::*;
pub use builder::*;
pub use constraint::*;
pub use data::*;
pub use engine::{Tamarin, TamarinBuilder};
pub use error::*;
pub use generator::*;
pub use introspector::*;
pub use manipulation::*;
pub use node::*;
pub use orchestrator::Validator;
pub use path::*;
pub use property::*;
pub use reflect::*;
pub use value::*;
